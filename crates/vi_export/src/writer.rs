//! Paginated CSV writer for CMSDB imports.
//!
//! CMSDB accepts a bounded number of rows per import, so the sorted export is
//! cut into pages of `page_size` rows, one file per page, each with the fixed
//! header. Pages are staged as `.<name>.tmp` and renamed into place once
//! flushed, so a failed page never leaves a truncated import file behind.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::batch::{derive_batch, BatchNumber};
use crate::error::{ExportError, Result};
use crate::merge::MergedRecord;

/// Column header in CMSDB import order.
pub const HEADER: [&str; 7] = [
    "Person responsible for the VI",
    "Date",
    "Serial number",
    "Batch number",
    "Hybrid status",
    "Usability for prototypes",
    "Folder",
];

pub const DEFAULT_PAGE_SIZE: usize = 70;
pub const DEFAULT_FILE_PATTERN: &str = "VI_res_part_{n}.csv";
const PAGE_PLACEHOLDER: &str = "{n}";

/// Output file name with a `{n}` placeholder for the 1-based page number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FilePattern(String);

impl FilePattern {
    pub fn new(pattern: impl Into<String>) -> std::result::Result<Self, String> {
        let pattern = pattern.into();
        match pattern.matches(PAGE_PLACEHOLDER).count() {
            1 => {}
            0 => return Err(format!("File pattern '{}' must contain {{n}}", pattern)),
            _ => {
                return Err(format!(
                    "File pattern '{}' must contain {{n}} only once",
                    pattern
                ))
            }
        }
        if pattern.contains('/') || pattern.contains('\\') {
            return Err(format!(
                "File pattern '{}' must be a file name, not a path (use output_dir)",
                pattern
            ));
        }
        if pattern.starts_with('.') {
            return Err(format!(
                "File pattern '{}' must not start with '.' (reserved for staging files)",
                pattern
            ));
        }
        Ok(Self(pattern))
    }

    /// File name for a 1-based page number.
    pub fn file_name(&self, number: usize) -> String {
        self.0.replace(PAGE_PLACEHOLDER, &number.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for FilePattern {
    fn default() -> Self {
        Self(DEFAULT_FILE_PATTERN.to_string())
    }
}

impl TryFrom<String> for FilePattern {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FilePattern> for String {
    fn from(pattern: FilePattern) -> Self {
        pattern.0
    }
}

impl FromStr for FilePattern {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for FilePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One CSV data row, fields in `HEADER` order.
#[derive(Debug, Serialize)]
pub struct OutputRow<'a> {
    pub name: &'a str,
    pub date_inspected: NaiveDate,
    pub serial_number: &'a str,
    pub batch_number: BatchNumber,
    pub hybrid_status: &'a str,
    pub prototype_usability: &'a str,
    pub combined_folders: &'a str,
}

impl<'a> From<&'a MergedRecord> for OutputRow<'a> {
    fn from(record: &'a MergedRecord) -> Self {
        Self {
            name: &record.name,
            date_inspected: record.date_inspected,
            serial_number: &record.serial_number,
            batch_number: derive_batch(&record.serial_number),
            hybrid_status: &record.hybrid_status,
            prototype_usability: &record.prototype_usability,
            combined_folders: &record.combined_folders,
        }
    }
}

/// Half-open slice `[start, end)` of the sorted export for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRange {
    /// 1-based page number, as used in the file name
    pub number: usize,
    pub start: usize,
    pub end: usize,
}

impl PageRange {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Split `total` rows into `ceil(total / page_size)` pages. Zero rows means
/// zero pages.
pub fn plan_pages(total: usize, page_size: NonZeroUsize) -> Vec<PageRange> {
    let size = page_size.get();
    (0..total)
        .step_by(size)
        .enumerate()
        .map(|(index, start)| PageRange {
            number: index + 1,
            start,
            end: (start + size).min(total),
        })
        .collect()
}

/// A page file that is (or, in a dry run, would be) on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenPage {
    pub number: usize,
    pub path: PathBuf,
    pub rows: usize,
}

pub struct PageWriter {
    output_dir: PathBuf,
    pattern: FilePattern,
    page_size: NonZeroUsize,
}

impl PageWriter {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        pattern: FilePattern,
        page_size: NonZeroUsize,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            pattern,
            page_size,
        }
    }

    pub fn page_path(&self, number: usize) -> PathBuf {
        self.output_dir.join(self.pattern.file_name(number))
    }

    /// Pages `write_all` would produce for `total` rows, without touching disk.
    pub fn plan(&self, total: usize) -> Vec<WrittenPage> {
        plan_pages(total, self.page_size)
            .into_iter()
            .map(|range| WrittenPage {
                number: range.number,
                path: self.page_path(range.number),
                rows: range.len(),
            })
            .collect()
    }

    /// Write every page in order. Stops at the first failing page; pages
    /// committed before it stay on disk.
    pub fn write_all(&self, records: &[MergedRecord]) -> Result<Vec<WrittenPage>> {
        let ranges = plan_pages(records.len(), self.page_size);
        if ranges.is_empty() {
            info!("No records to export, no files written");
            return Ok(Vec::new());
        }

        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| ExportError::file_write(&self.output_dir, e))?;

        let mut written = Vec::with_capacity(ranges.len());
        for range in ranges {
            let page = self.write_page(range, &records[range.start..range.end])?;
            written.push(page);
        }
        Ok(written)
    }

    fn write_page(&self, range: PageRange, rows: &[MergedRecord]) -> Result<WrittenPage> {
        let final_path = self.page_path(range.number);
        let mut staged = StagedFile::new(&final_path);

        let file = File::create(&staged.temp_path)
            .map_err(|e| ExportError::file_write(&staged.temp_path, e))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        writer
            .write_record(HEADER)
            .map_err(|e| csv_failure(&staged.temp_path, e))?;
        let mut not_applicable = 0usize;
        for record in rows {
            let row = OutputRow::from(record);
            if !row.batch_number.is_code() {
                not_applicable += 1;
            }
            writer
                .serialize(row)
                .map_err(|e| csv_failure(&staged.temp_path, e))?;
        }

        let file = writer
            .into_inner()
            .map_err(|e| ExportError::file_write(&staged.temp_path, e.into_error()))?;
        file.sync_all()
            .map_err(|e| ExportError::file_write(&staged.temp_path, e))?;
        drop(file);

        staged.commit()?;

        if not_applicable > 0 {
            debug!(page = range.number, not_applicable, "Serial numbers without a batch code");
        }
        info!(
            path = %final_path.display(),
            rows = rows.len(),
            "VI data exported"
        );

        Ok(WrittenPage {
            number: range.number,
            path: final_path,
            rows: rows.len(),
        })
    }
}

/// IO failures inside the CSV encoder are filesystem errors; anything else is
/// an encoding error.
fn csv_failure(path: &Path, err: csv::Error) -> ExportError {
    match err.kind() {
        csv::ErrorKind::Io(io) => {
            ExportError::file_write(path, std::io::Error::new(io.kind(), io.to_string()))
        }
        _ => ExportError::csv(path, err),
    }
}

/// Temp file next to the final path, removed on drop unless committed.
struct StagedFile {
    temp_path: PathBuf,
    final_path: PathBuf,
    committed: bool,
}

impl StagedFile {
    fn new(final_path: &Path) -> Self {
        let file_name = final_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = final_path.with_file_name(format!(".{}.tmp", file_name));
        Self {
            temp_path,
            final_path: final_path.to_path_buf(),
            committed: false,
        }
    }

    fn commit(&mut self) -> Result<()> {
        std::fs::rename(&self.temp_path, &self.final_path)
            .map_err(|e| ExportError::file_write(&self.final_path, e))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed && self.temp_path.exists() {
            let _ = std::fs::remove_file(&self.temp_path);
            warn!("Cleaned up unfinished page: {}", self.temp_path.display());
        }
    }
}

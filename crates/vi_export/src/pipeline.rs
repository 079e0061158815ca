//! Fetch, merge, sort and paginate: one export run.

use serde::Serialize;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use tracing::info;
use vi_export_db::{InspectionRecord, ViDb};

use crate::config::AppConfig;
use crate::error::Result;
use crate::merge::{merge_duplicates, passthrough, MergedRecord};
use crate::writer::{FilePattern, PageWriter, WrittenPage};

/// Everything the transform and write stages need.
#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub output_dir: PathBuf,
    pub file_pattern: FilePattern,
    pub page_size: NonZeroUsize,
    pub merge_duplicates: bool,
    /// Plan pages without writing anything.
    pub dry_run: bool,
}

impl ExportSettings {
    pub fn from_config(config: &AppConfig, dry_run: bool) -> Self {
        Self {
            output_dir: config.export.output_dir.clone(),
            file_pattern: config.export.file_pattern.clone(),
            page_size: config.export.page_size,
            merge_duplicates: config.export.merge_duplicates,
            dry_run,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    pub fetched: usize,
    pub exported: usize,
    pub page_size: usize,
    pub dry_run: bool,
    pub pages: Vec<WrittenPage>,
}

/// Merge (or pass through) and sort by inspection date.
///
/// The sort is stable, so rows inspected on the same day keep the order in
/// which their serial numbers were first fetched.
pub fn prepare_rows(records: Vec<InspectionRecord>, merge: bool) -> Vec<MergedRecord> {
    let mut rows = if merge {
        merge_duplicates(records)
    } else {
        passthrough(records)
    };
    rows.sort_by_key(|row| row.date_inspected);
    rows
}

/// Transform fetched records and write (or plan) the page files.
pub fn export_records(
    records: Vec<InspectionRecord>,
    settings: &ExportSettings,
) -> Result<ExportSummary> {
    let fetched = records.len();
    let rows = prepare_rows(records, settings.merge_duplicates);
    info!(
        fetched,
        exported = rows.len(),
        merged = settings.merge_duplicates,
        "Prepared export rows"
    );

    let writer = PageWriter::new(
        &settings.output_dir,
        settings.file_pattern.clone(),
        settings.page_size,
    );
    let pages = if settings.dry_run {
        let planned = writer.plan(rows.len());
        for page in &planned {
            info!(path = %page.path.display(), rows = page.rows, "Would write page");
        }
        planned
    } else {
        writer.write_all(&rows)?
    };

    Ok(ExportSummary {
        fetched,
        exported: rows.len(),
        page_size: settings.page_size.get(),
        dry_run: settings.dry_run,
        pages,
    })
}

/// Run a full export against the configured store.
///
/// The configuration is validated before connecting. The connection is closed
/// before the fetch result is inspected, so it is released on the failure path
/// too. A store failure returns before any file is touched.
pub async fn run(config: &AppConfig, dry_run: bool) -> Result<ExportSummary> {
    config.validate()?;

    let mut db = ViDb::connect(&config.database).await?;
    let fetched = db.fetch_inspections(config.export.cutoff).await;
    db.close().await;
    let records = fetched?;

    export_records(records, &ExportSettings::from_config(config, dry_run))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::error::ExportError;
    use chrono::NaiveDate;
    use tempfile::tempdir;
    use vi_export_db::DbError;

    fn record(id: i64, date: &str, serial: &str) -> InspectionRecord {
        InspectionRecord {
            id,
            name: format!("person-{}", id),
            date_inspected: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            serial_number: serial.to_string(),
            hybrid_status: "ok".to_string(),
            prototype_usability: "yes".to_string(),
            folder: None,
        }
    }

    fn settings(dir: &std::path::Path, page_size: usize) -> ExportSettings {
        ExportSettings {
            output_dir: dir.to_path_buf(),
            file_pattern: FilePattern::default(),
            page_size: NonZeroUsize::new(page_size).unwrap(),
            merge_duplicates: true,
            dry_run: false,
        }
    }

    #[test]
    fn test_prepare_rows_sorts_globally_and_stably() {
        let rows = prepare_rows(
            vec![
                record(1, "2024-03-05", "S-3"),
                record(2, "2024-02-10", "S-1"),
                record(3, "2024-03-05", "S-2"),
                record(4, "2024-02-20", "S-4"),
            ],
            true,
        );
        let serials: Vec<&str> = rows.iter().map(|r| r.serial_number.as_str()).collect();
        assert_eq!(serials, vec!["S-1", "S-4", "S-3", "S-2"]);
    }

    #[test]
    fn test_prepare_rows_without_merge() {
        let rows = prepare_rows(
            vec![record(1, "2024-03-05", "S-1"), record(2, "2024-03-01", "S-1")],
            false,
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "person-2");
    }

    #[test]
    fn test_export_records_dry_run_writes_nothing() {
        let dir = tempdir().unwrap();
        let mut settings = settings(dir.path(), 2);
        settings.dry_run = true;

        let records = (0..5)
            .map(|i| record(i, "2024-03-01", &format!("S-{}", i)))
            .collect();
        let summary = export_records(records, &settings).unwrap();

        assert!(summary.dry_run);
        assert_eq!(summary.pages.len(), 3);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_export_records_counts() {
        let dir = tempdir().unwrap();
        let summary = export_records(
            vec![
                record(1, "2024-03-01", "S-1"),
                record(2, "2024-03-01", "S-1"),
                record(3, "2024-03-02", "S-2"),
            ],
            &settings(dir.path(), 70),
        )
        .unwrap();

        assert_eq!(summary.fetched, 3);
        assert_eq!(summary.exported, 2);
        assert_eq!(summary.page_size, 70);
        assert_eq!(summary.pages.len(), 1);
        assert!(summary.pages[0].path.exists());
    }

    fn unreachable_store(output_dir: &std::path::Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.database.host = "127.0.0.1".to_string();
        config.database.port = 1;
        config.export.output_dir = output_dir.to_path_buf();
        config
    }

    #[tokio::test]
    async fn test_run_store_failure_writes_nothing() {
        let dir = tempdir().unwrap();
        let config = unreachable_store(dir.path());

        let result = run(&config, false).await;

        assert!(
            matches!(result, Err(ExportError::Db(DbError::Connection(_)))),
            "expected connection error, got {:?}",
            result
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_config_before_connecting() {
        let dir = tempdir().unwrap();
        let mut config = unreachable_store(dir.path());
        config.database.table = "reports; DROP TABLE reports".to_string();

        let result = run(&config, false).await;

        assert!(
            matches!(result, Err(ExportError::Config(ConfigError::Invalid(_)))),
            "expected config error, got {:?}",
            result
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}

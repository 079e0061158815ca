//! Visual-inspection export for CMSDB.
//!
//! Reads inspection reports newer than a cutoff from PostgreSQL, keeps one
//! row per serial number, derives the batch number and writes the rows in
//! date order as CSV files of at most `page_size` rows each.
//!
//! ```rust,ignore
//! let config = vi_export::config::resolve(None, ConfigOverrides::default())?;
//! let summary = vi_export::pipeline::run(&config, false).await?;
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod merge;
pub mod pipeline;
pub mod writer;

pub use batch::{derive_batch, BatchNumber};
pub use error::{ExportError, Result};
pub use merge::MergedRecord;
pub use pipeline::{export_records, prepare_rows, ExportSettings, ExportSummary};
pub use vi_export_db::InspectionRecord;

//! CLI module for the VI export
//!
//! Flags shared by every command live in `SettingsArgs`; each command
//! resolves them against the config file before doing anything else.

pub mod config;
pub mod error;
pub mod export;

use chrono::NaiveDate;
use clap::Args;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use vi_export::config::{self as app_config, AppConfig, ConfigError, ConfigOverrides};
use vi_export::writer::FilePattern;

/// Configuration sources and overrides accepted by every command.
#[derive(Debug, Args)]
pub struct SettingsArgs {
    /// Config file (default: $VI_EXPORT_HOME/config.toml or ~/.vi_export/config.toml)
    #[arg(long, value_name = "PATH", env = "VI_EXPORT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database host
    #[arg(long, env = "VI_EXPORT_DB_HOST")]
    pub host: Option<String>,

    /// Database port
    #[arg(long, env = "VI_EXPORT_DB_PORT")]
    pub port: Option<u16>,

    /// Database name
    #[arg(long, env = "VI_EXPORT_DB_NAME")]
    pub dbname: Option<String>,

    /// Database user
    #[arg(long, env = "VI_EXPORT_DB_USER")]
    pub user: Option<String>,

    /// Database password (prefer the environment variable)
    #[arg(long, env = "VI_EXPORT_DB_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Table holding the inspection reports
    #[arg(long)]
    pub table: Option<String>,

    /// Export reports inspected strictly after this date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub cutoff: Option<NaiveDate>,

    /// Maximum data rows per CSV file
    #[arg(long, value_name = "ROWS")]
    pub page_size: Option<NonZeroUsize>,

    /// Directory for the CSV files
    #[arg(long, short = 'o', value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// File name pattern; {n} is replaced by the page number
    #[arg(long, value_name = "PATTERN")]
    pub file_pattern: Option<FilePattern>,

    /// Export every report instead of one row per serial number
    #[arg(long)]
    pub keep_duplicates: bool,
}

impl SettingsArgs {
    pub fn resolve(self) -> Result<AppConfig, ConfigError> {
        let overrides = ConfigOverrides {
            host: self.host,
            port: self.port,
            dbname: self.dbname,
            user: self.user,
            password: self.password,
            table: self.table,
            cutoff: self.cutoff,
            page_size: self.page_size,
            output_dir: self.output_dir,
            file_pattern: self.file_pattern,
            keep_duplicates: self.keep_duplicates,
        };
        app_config::resolve(self.config.as_deref(), overrides)
    }
}

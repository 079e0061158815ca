//! Run configuration.
//!
//! Read from `config.toml` (`--config`, else `$VI_EXPORT_HOME/config.toml`,
//! else `~/.vi_export/config.toml`). Every key is optional; missing keys keep
//! the defaults below, and command-line flags (which also read the
//! `VI_EXPORT_DB_*` environment variables) override the file.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use vi_export_db::{guard, DbConfig};

use crate::writer::{FilePattern, DEFAULT_PAGE_SIZE};

pub const DEFAULT_CUTOFF: &str = "2024-02-01";
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Error type for config operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config not found at: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for config operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Complete configuration for one export run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// `[database]` section
    pub database: DbConfig,
    /// `[export]` section
    pub export: ExportConfig,
}

/// `[export]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    /// Only reports inspected strictly after this date are exported.
    pub cutoff: NaiveDate,

    /// Maximum data rows per file (CMSDB import cap).
    pub page_size: NonZeroUsize,

    pub output_dir: PathBuf,

    /// File name with `{n}` for the 1-based page number.
    pub file_pattern: FilePattern,

    /// Collapse reports of the same serial number into one row.
    pub merge_duplicates: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            cutoff: default_cutoff(),
            page_size: default_page_size(),
            output_dir: PathBuf::from("."),
            file_pattern: FilePattern::default(),
            merge_duplicates: true,
        }
    }
}

fn default_cutoff() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 2, 1).unwrap_or(NaiveDate::MIN)
}

fn default_page_size() -> NonZeroUsize {
    NonZeroUsize::new(DEFAULT_PAGE_SIZE).unwrap_or(NonZeroUsize::MIN)
}

/// Values supplied on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dbname: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub table: Option<String>,
    pub cutoff: Option<NaiveDate>,
    pub page_size: Option<NonZeroUsize>,
    pub output_dir: Option<PathBuf>,
    pub file_pattern: Option<FilePattern>,
    pub keep_duplicates: bool,
}

impl AppConfig {
    /// Apply overrides on top of file values.
    pub fn apply(&mut self, overrides: ConfigOverrides) {
        let db = &mut self.database;
        if let Some(host) = overrides.host {
            db.host = host;
        }
        if let Some(port) = overrides.port {
            db.port = port;
        }
        if let Some(dbname) = overrides.dbname {
            db.dbname = dbname;
        }
        if let Some(user) = overrides.user {
            db.user = user;
        }
        if let Some(password) = overrides.password {
            db.password = password;
        }
        if let Some(table) = overrides.table {
            db.table = table;
        }

        let export = &mut self.export;
        if let Some(cutoff) = overrides.cutoff {
            export.cutoff = cutoff;
        }
        if let Some(page_size) = overrides.page_size {
            export.page_size = page_size;
        }
        if let Some(output_dir) = overrides.output_dir {
            export.output_dir = output_dir;
        }
        if let Some(pattern) = overrides.file_pattern {
            export.file_pattern = pattern;
        }
        if overrides.keep_duplicates {
            export.merge_duplicates = false;
        }
    }

    /// Checks that need the fully resolved config.
    pub fn validate(&self) -> Result<()> {
        if self.database.host.trim().is_empty() {
            return Err(ConfigError::Invalid("database.host is empty".to_string()));
        }
        if self.database.port == 0 {
            return Err(ConfigError::Invalid("database.port must not be 0".to_string()));
        }
        if self.database.dbname.trim().is_empty() {
            return Err(ConfigError::Invalid("database.dbname is empty".to_string()));
        }
        guard::validate_identifier(&self.database.table)
            .map_err(|e| ConfigError::Invalid(format!("database.table: {}", e)))?;
        Ok(())
    }

    /// Copy that is safe to print or log.
    pub fn redacted(&self) -> Self {
        Self {
            database: self.database.redacted(),
            export: self.export.clone(),
        }
    }
}

/// Default config location: `<vi_export home>/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    vi_export_logging::vi_export_home()
        .ok()
        .map(|home| home.join(CONFIG_FILE_NAME))
}

/// Load configuration from a file. A missing file yields the defaults.
pub fn load_config(config_path: &Path) -> Result<AppConfig> {
    if !config_path.exists() {
        return Ok(AppConfig::default());
    }

    let content = std::fs::read_to_string(config_path).map_err(|source| ConfigError::Io {
        path: config_path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Toml {
        path: config_path.to_path_buf(),
        source,
    })
}

/// Resolve the configuration for a run: explicit file (must exist) or the
/// default location (may be absent), then overrides, then validation.
pub fn resolve(explicit: Option<&Path>, overrides: ConfigOverrides) -> Result<AppConfig> {
    let mut config = match explicit {
        Some(path) if !path.exists() => return Err(ConfigError::NotFound(path.to_path_buf())),
        Some(path) => load_config(path)?,
        None => match default_config_path() {
            Some(path) => load_config(&path)?,
            None => AppConfig::default(),
        },
    };
    config.apply(overrides);
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.export.cutoff.to_string(), DEFAULT_CUTOFF);
        assert_eq!(config.export.page_size.get(), 70);
        assert_eq!(config.export.file_pattern.as_str(), "VI_res_part_{n}.csv");
        assert!(config.export.merge_duplicates);
        assert_eq!(config.database.port, 6604);
        assert_eq!(config.database.dbname, "ot_hybrids");
    }

    #[test]
    fn test_load_empty_file() {
        let temp = TempDir::new().unwrap();
        let path = write_config(&temp, "");
        assert_eq!(load_config(&path).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_nonexistent_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = load_config(&temp.path().join("nonexistent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_partial_config() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            &temp,
            r#"
            [export]
            page_size = 25
            "#,
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.export.page_size.get(), 25);
        assert_eq!(config.export.cutoff.to_string(), DEFAULT_CUTOFF);
        assert_eq!(config.database.table, "reports");
    }

    #[test]
    fn test_load_full_config() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            &temp,
            r#"
            [database]
            host = "db.internal"
            port = 5432
            dbname = "vi"
            user = "reader"
            password = "s3cret"
            table = "public.reports"

            [export]
            cutoff = "2024-06-30"
            page_size = 100
            output_dir = "/tmp/vi"
            file_pattern = "cmsdb_{n}.csv"
            merge_duplicates = false
            "#,
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.user, "reader");
        assert_eq!(config.database.table, "public.reports");
        assert_eq!(config.export.cutoff.to_string(), "2024-06-30");
        assert_eq!(config.export.page_size.get(), 100);
        assert_eq!(config.export.output_dir, PathBuf::from("/tmp/vi"));
        assert_eq!(config.export.file_pattern.file_name(3), "cmsdb_3.csv");
        assert!(!config.export.merge_duplicates);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let temp = TempDir::new().unwrap();
        for content in [
            "[export]\npage_size = 0\n",
            "[export]\nfile_pattern = \"export.csv\"\n",
            "[export]\ncutoff = \"01/02/2024\"\n",
            "[database]\nport = 70000\n",
            "[export]\nunknown_key = 1\n",
        ] {
            let path = write_config(&temp, content);
            let result = load_config(&path);
            assert!(
                matches!(result, Err(ConfigError::Toml { .. })),
                "expected parse error for {:?}",
                content
            );
        }
    }

    #[test]
    fn test_overrides_win() {
        let mut config = AppConfig::default();
        config.apply(ConfigOverrides {
            host: Some("override-host".to_string()),
            password: Some("pw".to_string()),
            cutoff: NaiveDate::from_ymd_opt(2025, 1, 1),
            page_size: NonZeroUsize::new(10),
            keep_duplicates: true,
            ..ConfigOverrides::default()
        });
        assert_eq!(config.database.host, "override-host");
        assert_eq!(config.database.password, "pw");
        assert_eq!(config.database.port, 6604);
        assert_eq!(config.export.cutoff.to_string(), "2025-01-01");
        assert_eq!(config.export.page_size.get(), 10);
        assert!(!config.export.merge_duplicates);
    }

    #[test]
    fn test_validate() {
        assert!(AppConfig::default().validate().is_ok());

        let mut config = AppConfig::default();
        config.database.table = "reports; DROP TABLE reports".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = AppConfig::default();
        config.database.host = " ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_resolve_explicit_missing_file() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.toml");
        let result = resolve(Some(&missing), ConfigOverrides::default());
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_resolve_explicit_file_with_overrides() {
        let temp = TempDir::new().unwrap();
        let path = write_config(&temp, "[export]\npage_size = 5\n");
        let config = resolve(
            Some(&path),
            ConfigOverrides {
                page_size: NonZeroUsize::new(7),
                ..ConfigOverrides::default()
            },
        )
        .unwrap();
        assert_eq!(config.export.page_size.get(), 7);
    }

    #[test]
    fn test_redacted_hides_password() {
        let mut config = AppConfig::default();
        config.database.password = "s3cret".to_string();
        let shown = toml::to_string(&config.redacted()).unwrap();
        assert!(!shown.contains("s3cret"));
    }
}

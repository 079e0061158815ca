//! Operator-facing error reports
//!
//! Every error includes:
//! - What went wrong
//! - Context about the situation
//! - Suggestions for how to fix it

use std::fmt;
use vi_export::config::ConfigError;
use vi_export::ExportError;
use vi_export_db::DbError;

/// An error with helpful context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    /// The main error message
    pub message: String,
    /// Additional context about what was happening
    pub context: Option<String>,
    /// Suggestions for how to fix the error
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    /// Create a new helpful error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Add multiple suggestions
    pub fn with_suggestions(
        mut self,
        suggestions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.suggestions.extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    /// Build the report for a failed export.
    pub fn from_export(err: &ExportError) -> Self {
        match err {
            ExportError::Db(DbError::Connection(source)) => {
                Self::new(format!("Cannot connect to the inspection database: {}", source))
                    .with_context("The run was aborted before any file was written")
                    .with_suggestions([
                        "TRY: Check database.host and database.port (default port 6604)",
                        "TRY: Check the user and password (VI_EXPORT_DB_PASSWORD)",
                        "TRY: Verify the server accepts connections from this machine",
                    ])
            }
            ExportError::Db(DbError::Query(source)) => {
                Self::new(format!("The inspection query failed: {}", source))
                    .with_context("The run was aborted before any file was written")
                    .with_suggestions([
                        "TRY: Check database.table names the inspection report table",
                        "TRY: The table needs id, name, date_inspected, serial_number, hybrid_status, prototype_usability and folder columns",
                    ])
            }
            ExportError::Db(DbError::InvalidConfig(msg)) => {
                Self::new(format!("Invalid database configuration: {}", msg)).with_suggestions([
                    "TRY: Use a plain table name such as reports or public.reports",
                ])
            }
            ExportError::Config(config_err) => Self::from_config(config_err),
            ExportError::FileWrite { path, source } => {
                Self::new(format!("Cannot write {}: {}", path.display(), source))
                    .with_context("Pages written before this one are complete and were kept")
                    .with_suggestions([
                        "TRY: Check that the output directory is writable".to_string(),
                        "TRY: Check free disk space".to_string(),
                        format!("TRY: Make sure {} is not open in another program", path.display()),
                    ])
            }
            ExportError::Csv { path, source } => {
                Self::new(format!("Cannot encode CSV for {}: {}", path.display(), source))
                    .with_context("Pages written before this one are complete and were kept")
            }
        }
    }

    /// Build the report for an unusable configuration.
    pub fn from_config(err: &ConfigError) -> Self {
        match err {
            ConfigError::NotFound(path) => {
                Self::new(format!("Config file not found: {}", path.display())).with_suggestions([
                    "TRY: Check the --config path".to_string(),
                    "TRY: Omit --config to use ~/.vi_export/config.toml or the built-in defaults"
                        .to_string(),
                ])
            }
            ConfigError::Toml { path, source } => {
                Self::new(format!("Config file {} is not valid", path.display()))
                    .with_context(source.to_string())
                    .with_suggestions([
                        "TRY: Dates are quoted strings: cutoff = \"2024-02-01\"",
                        "TRY: page_size must be at least 1; file_pattern must contain {n}",
                    ])
            }
            ConfigError::Io { path, source } => {
                Self::new(format!("Cannot read config file {}: {}", path.display(), source))
            }
            ConfigError::Invalid(msg) => Self::new(format!("Invalid configuration: {}", msg)),
        }
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

/// Print an error as a JSON object on stdout for `--json` callers.
pub fn print_json_error(err: &anyhow::Error) {
    let report = match err.downcast_ref::<HelpfulError>() {
        Some(helpful) => serde_json::json!({
            "status": "failed",
            "error": helpful.message,
            "context": helpful.context,
            "suggestions": helpful.suggestions,
        }),
        None => serde_json::json!({
            "status": "failed",
            "error": format!("{:#}", err),
        }),
    };
    println!("{}", report);
}

//! Error types for the database layer.

use thiserror::Error;

/// Database operation result type.
pub type Result<T> = std::result::Result<T, DbError>;

/// Database errors.
///
/// Connection and query failures carry the same `sqlx::Error` type, so the
/// variant records which phase of the run produced it.
#[derive(Error, Debug)]
pub enum DbError {
    /// Store unreachable or credentials rejected.
    #[error("Connection error: {0}")]
    Connection(#[source] sqlx::Error),

    /// Query rejected by the store, or rows that do not decode.
    #[error("Query error: {0}")]
    Query(#[source] sqlx::Error),

    /// Configuration that would produce an invalid statement.
    #[error("Invalid database configuration: {0}")]
    InvalidConfig(String),
}

impl DbError {
    /// Create an invalid configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

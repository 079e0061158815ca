//! Read-only access to the VI inspection-report store.
//!
//! The export issues exactly one query per run, so this crate holds a single
//! `PgConnection` rather than a pool.
//!
//! # Usage
//!
//! ```rust,ignore
//! use vi_export_db::{DbConfig, ViDb};
//!
//! let mut db = ViDb::connect(&DbConfig::default()).await?;
//! let fetched = db.fetch_inspections(cutoff).await;
//! db.close().await;
//! let records = fetched?;
//! ```

mod error;
pub mod guard;
mod types;

pub use error::{DbError, Result};
pub use types::InspectionRecord;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{ConnectOptions, Connection};
use std::fmt;
use tracing::{debug, info, warn};

pub const DEFAULT_PORT: u16 = 6604;
pub const DEFAULT_DBNAME: &str = "ot_hybrids";
pub const DEFAULT_TABLE: &str = "reports";

/// Connection settings for the inspection-report store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    /// Table holding the reports (`table` or `schema.table`)
    pub table: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            dbname: DEFAULT_DBNAME.to_string(),
            user: String::new(),
            password: String::new(),
            table: DEFAULT_TABLE.to_string(),
        }
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"***")
            .field("table", &self.table)
            .finish()
    }
}

impl DbConfig {
    /// Copy of this config that is safe to print.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.password.is_empty() {
            copy.password = "***".to_string();
        }
        copy
    }

    /// Build sqlx connect options. Empty user/password fall back to libpq
    /// defaults (`PGUSER`, `.pgpass`, ...).
    pub fn connect_options(&self) -> PgConnectOptions {
        let mut options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.dbname);
        if !self.user.is_empty() {
            options = options.username(&self.user);
        }
        if !self.password.is_empty() {
            options = options.password(&self.password);
        }
        options
    }

    /// The single statement this crate runs against the store.
    ///
    /// The cutoff is bound as `$1`. Casts pin the column types the row
    /// decoder expects regardless of how the upstream schema declares them;
    /// NULL text becomes `''` except for `folder`, whose NULL is meaningful.
    /// A NULL serial number therefore merges with an empty one.
    pub fn inspection_query(&self) -> Result<String> {
        guard::validate_identifier(&self.table)
            .map_err(|e| DbError::invalid_config(e.to_string()))?;

        let sql = format!(
            "SELECT id::BIGINT AS id, \
             COALESCE(name::TEXT, '') AS name, \
             date_inspected::DATE AS date_inspected, \
             COALESCE(serial_number::TEXT, '') AS serial_number, \
             COALESCE(hybrid_status::TEXT, '') AS hybrid_status, \
             COALESCE(prototype_usability::TEXT, '') AS prototype_usability, \
             folder::TEXT AS folder \
             FROM {} \
             WHERE date_inspected > $1",
            self.table
        );
        guard::validate_read_only(&sql).map_err(|e| DbError::invalid_config(e.to_string()))?;
        Ok(sql)
    }
}

/// An open connection to the inspection-report store.
pub struct ViDb {
    conn: PgConnection,
    query: String,
}

impl ViDb {
    /// Validate the configuration and open one connection.
    pub async fn connect(config: &DbConfig) -> Result<Self> {
        let query = config.inspection_query()?;

        let conn = config
            .connect_options()
            .connect()
            .await
            .map_err(DbError::Connection)?;

        info!(
            host = %config.host,
            port = config.port,
            dbname = %config.dbname,
            "Connected to PostgreSQL"
        );

        Ok(Self { conn, query })
    }

    /// Fetch every report inspected strictly after `cutoff`, in the order the
    /// store returns them.
    pub async fn fetch_inspections(&mut self, cutoff: NaiveDate) -> Result<Vec<InspectionRecord>> {
        debug!(sql = %self.query, %cutoff, "Fetching inspection reports");

        let rows = sqlx::query_as::<_, InspectionRecord>(&self.query)
            .bind(cutoff)
            .fetch_all(&mut self.conn)
            .await
            .map_err(DbError::Query)?;

        info!(rows = rows.len(), %cutoff, "Fetched inspection reports");
        Ok(rows)
    }

    /// Close the connection. Failure to close is logged, never returned.
    pub async fn close(self) {
        match self.conn.close().await {
            Ok(()) => info!("PostgreSQL connection closed"),
            Err(err) => warn!("Failed to close PostgreSQL connection cleanly: {}", err),
        }
    }
}

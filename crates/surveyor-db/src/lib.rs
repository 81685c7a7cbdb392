//! Surveyor Database Layer
//!
//! Provides the `SQLite` merge store that every query round is ingested into,
//! the aggregate queries the analyses read back, and run bookkeeping.
//!
//! # Architecture
//!
//! - **Merge store**: `assets` rows are keyed by normalized URL and merged with
//!   the rules in `surveyor_core::record`
//! - **Migrations**: SQL migrations are embedded and versioned using `SQLx`
//! - **Aggregation**: distinct-IP enumeration, `/24` prefix lookups and per-IP
//!   fan-out grouping
//!
//! # Example
//!
//! ```ignore
//! use surveyor_db::{assets, Database};
//!
//! let db = Database::new("results/20260101_120000/res.db").await?;
//! db.run_migrations().await?;
//! let new_urls = assets::ingest(db.pool(), &batch).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod aggregation;
pub mod assets;
pub mod connection;
pub mod error;
pub mod migrations;
/// Run bookkeeping for pipeline executions.
pub mod scan_runs;

// Re-export commonly used types
pub use aggregation::FanoutRow;
pub use connection::StorePool;
pub use error::{DatabaseError, Result};
pub use scan_runs::{RunCounters, ScanRun, ScanRunStatus};

use std::path::Path;

/// High-level database interface.
///
/// Wraps a `StorePool` and handles initialization and migration.
#[derive(Debug, Clone)]
pub struct Database {
    pool: StorePool,
}

impl Database {
    /// Open the database at `path` (or `:memory:` for in-memory).
    ///
    /// # Errors
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let pool = StorePool::new(path).await?;
        Ok(Self { pool })
    }

    /// Run all pending database migrations.
    ///
    /// # Errors
    /// Returns `DatabaseError::Migration` if any migration fails.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(self.pool.pool()).await
    }

    /// Get the current schema version.
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(self.pool.pool()).await
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Sqlite> {
        self.pool.pool()
    }

    /// Close the database connection gracefully.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

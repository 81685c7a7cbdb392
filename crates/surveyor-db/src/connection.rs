//! Database connection management.
//!
//! Provides a `StorePool` wrapper around `SQLx` that owns connection setup for
//! both on-disk run stores and in-memory test stores.

use crate::error::{DatabaseError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;

const MEMORY_PATH: &str = ":memory:";

/// `SQLite` connection pool for the merge store.
#[derive(Debug, Clone)]
pub struct StorePool {
    pool: Pool<Sqlite>,
}

impl StorePool {
    /// Open (creating if missing) the database at `path`.
    ///
    /// `:memory:` opens a private in-memory database held by a single
    /// connection that is never recycled, so the schema survives for the
    /// lifetime of the pool.
    ///
    /// # Errors
    /// Returns `DatabaseError::Open` if the path is not valid UTF-8 or the
    /// database cannot be opened.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path_str = path.as_ref().to_str().ok_or_else(|| {
            DatabaseError::Open("invalid database path: not valid UTF-8".to_string())
        })?;
        let in_memory = path_str == MEMORY_PATH;

        let mut connect_options = SqliteConnectOptions::from_str(path_str)
            .map_err(|e| DatabaseError::Open(format!("invalid connection string: {e}")))?
            .create_if_missing(true);
        if !in_memory {
            connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| DatabaseError::Open(format!("failed to initialize pool: {e}")))?;

        tracing::info!("Database pool created at {}", path_str);

        Ok(Self { pool })
    }

    /// Get a reference to the underlying `SQLx` pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Close the connection pool gracefully.
    pub async fn close(self) {
        self.pool.close().await;
        tracing::info!("Database pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_pool_creation() {
        let pool = StorePool::new(":memory:").await.expect("create pool");
        sqlx::query("SELECT 1")
            .execute(pool.pool())
            .await
            .expect("run query");
    }

    #[tokio::test]
    async fn test_memory_pool_keeps_state() {
        let pool = StorePool::new(":memory:").await.expect("create pool");
        sqlx::query("CREATE TABLE t (x INTEGER)")
            .execute(pool.pool())
            .await
            .expect("create table");
        sqlx::query("INSERT INTO t VALUES (1)")
            .execute(pool.pool())
            .await
            .expect("insert");

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM t")
            .fetch_one(pool.pool())
            .await
            .expect("count");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_file_pool_creates_database() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("res.db");

        let pool = StorePool::new(&path).await.expect("create pool");
        pool.close().await;
        assert!(path.exists());
    }
}

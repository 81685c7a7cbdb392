//! Scan run bookkeeping, one row per pipeline execution.

use crate::error::{DatabaseError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};

/// A recorded pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRun {
    /// Unique identifier for the run
    pub id: String,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished (if finished)
    pub completed_at: Option<DateTime<Utc>>,
    /// Current status
    pub status: ScanRunStatus,
    /// Number of validated targets queried in round one
    pub targets: u32,
    /// Records returned by round one
    pub round_one_records: u32,
    /// Records returned by round two
    pub round_two_records: u32,
    /// URLs that were new to the store across both rounds
    pub new_identities: u32,
    /// Error message if the run failed
    pub error_message: Option<String>,
}

/// Status of a scan run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScanRunStatus {
    /// Run is in progress
    InProgress,
    /// Run completed
    Completed,
    /// Run aborted with an error
    Failed,
}

impl std::fmt::Display for ScanRunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InProgress => write!(f, "InProgress"),
            Self::Completed => write!(f, "Completed"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

impl ScanRunStatus {
    /// Parse from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "InProgress" => Some(Self::InProgress),
            "Completed" => Some(Self::Completed),
            "Failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Counters written when a run completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    /// Records returned by round one
    pub round_one_records: u32,
    /// Records returned by round two
    pub round_two_records: u32,
    /// URLs new to the store
    pub new_identities: u32,
}

/// Create a new in-progress run.
pub async fn create_scan_run(pool: &Pool<Sqlite>, targets: u32) -> Result<ScanRun> {
    let id = uuid::Uuid::new_v4().to_string();
    let started_at = Utc::now();
    let status = ScanRunStatus::InProgress;

    sqlx::query("INSERT INTO scan_runs (id, started_at, status, targets) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(started_at.to_rfc3339())
        .bind(status.to_string())
        .bind(i64::from(targets))
        .execute(pool)
        .await?;

    Ok(ScanRun {
        id,
        started_at,
        completed_at: None,
        status,
        targets,
        round_one_records: 0,
        round_two_records: 0,
        new_identities: 0,
        error_message: None,
    })
}

/// Mark a run completed and record its counters.
pub async fn complete_scan_run(
    pool: &Pool<Sqlite>,
    run_id: &str,
    counters: RunCounters,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE scan_runs
         SET status = ?, completed_at = ?, round_one_records = ?, round_two_records = ?,
             new_identities = ?
         WHERE id = ?",
    )
    .bind(ScanRunStatus::Completed.to_string())
    .bind(Utc::now().to_rfc3339())
    .bind(i64::from(counters.round_one_records))
    .bind(i64::from(counters.round_two_records))
    .bind(i64::from(counters.new_identities))
    .bind(run_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFoundWithMessage(format!(
            "Scan run '{run_id}' not found"
        )));
    }
    Ok(())
}

/// Mark a run failed with an error message.
pub async fn fail_scan_run(pool: &Pool<Sqlite>, run_id: &str, error_message: &str) -> Result<()> {
    let result = sqlx::query(
        "UPDATE scan_runs SET status = ?, completed_at = ?, error_message = ? WHERE id = ?",
    )
    .bind(ScanRunStatus::Failed.to_string())
    .bind(Utc::now().to_rfc3339())
    .bind(error_message)
    .bind(run_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFoundWithMessage(format!(
            "Scan run '{run_id}' not found"
        )));
    }
    Ok(())
}

/// Fetch a run by ID.
pub async fn get_scan_run(pool: &Pool<Sqlite>, run_id: &str) -> Result<Option<ScanRun>> {
    let row = sqlx::query(
        "SELECT id, started_at, completed_at, status, targets, round_one_records,
                round_two_records, new_identities, error_message
         FROM scan_runs WHERE id = ?",
    )
    .bind(run_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let status_str: String = row.try_get("status")?;
    let status = ScanRunStatus::parse(&status_str)
        .ok_or_else(|| DatabaseError::Decode(format!("invalid scan run status '{status_str}'")))?;
    let started_at: String = row.try_get("started_at")?;
    let completed_at: Option<String> = row.try_get("completed_at")?;

    Ok(Some(ScanRun {
        id: row.try_get("id")?,
        started_at: parse_timestamp(&started_at)?,
        completed_at: completed_at.as_deref().map(parse_timestamp).transpose()?,
        status,
        targets: count_column(&row, "targets")?,
        round_one_records: count_column(&row, "round_one_records")?,
        round_two_records: count_column(&row, "round_two_records")?,
        new_identities: count_column(&row, "new_identities")?,
        error_message: row.try_get("error_message")?,
    }))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Decode(format!("invalid timestamp '{value}': {e}")))
}

fn count_column(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<u32> {
    let value: i64 = row.try_get(column)?;
    u32::try_from(value).map_err(|_| DatabaseError::Decode(format!("{column} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    async fn setup_test_db() -> Database {
        let db = Database::new(":memory:").await.expect("create test database");
        db.run_migrations().await.expect("run migrations");
        db
    }

    #[tokio::test]
    async fn test_create_and_complete_scan_run() {
        let db = setup_test_db().await;

        let run = create_scan_run(db.pool(), 4).await.expect("create scan run");
        assert_eq!(run.status, ScanRunStatus::InProgress);
        assert_eq!(run.targets, 4);

        let counters = RunCounters {
            round_one_records: 12,
            round_two_records: 3,
            new_identities: 9,
        };
        complete_scan_run(db.pool(), &run.id, counters)
            .await
            .expect("complete scan run");

        let stored = get_scan_run(db.pool(), &run.id)
            .await
            .expect("get scan run")
            .expect("run exists");
        assert_eq!(stored.status, ScanRunStatus::Completed);
        assert!(stored.completed_at.is_some());
        assert_eq!(stored.round_one_records, 12);
        assert_eq!(stored.new_identities, 9);
        assert!(stored.error_message.is_none());
    }

    #[tokio::test]
    async fn test_fail_scan_run() {
        let db = setup_test_db().await;
        let run = create_scan_run(db.pool(), 1).await.expect("create scan run");

        fail_scan_run(db.pool(), &run.id, "no source enabled")
            .await
            .expect("fail scan run");

        let stored = get_scan_run(db.pool(), &run.id)
            .await
            .expect("get scan run")
            .expect("run exists");
        assert_eq!(stored.status, ScanRunStatus::Failed);
        assert_eq!(stored.error_message.as_deref(), Some("no source enabled"));
    }

    #[tokio::test]
    async fn test_complete_missing_run() {
        let db = setup_test_db().await;
        let result = complete_scan_run(db.pool(), "missing", RunCounters::default()).await;
        match result {
            Err(DatabaseError::NotFoundWithMessage(msg)) => {
                assert!(msg.contains("Scan run 'missing' not found"));
            }
            _ => panic!("Expected NotFoundWithMessage error"),
        }
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(ScanRunStatus::parse("Completed"), Some(ScanRunStatus::Completed));
        assert_eq!(ScanRunStatus::parse("bogus"), None);
        assert_eq!(ScanRunStatus::InProgress.to_string(), "InProgress");
    }
}

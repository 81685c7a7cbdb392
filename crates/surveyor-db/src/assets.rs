//! Merge store for canonical asset records.
//!
//! Rows in the `assets` table are keyed by normalized URL. Ingesting a batch
//! inserts unseen URLs and merges the rest through
//! [`AssetRecord::merged_with`], so re-ingesting the same batch leaves the
//! table unchanged.

use crate::error::{DatabaseError, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite, SqliteConnection};
use surveyor_core::{normalize_url, AssetRecord, TrustLevel};

const SELECT_COLUMNS: &str = "id, organization, domain, host, protocol, url, ip, port, \
                              status_code, length, title, source, trust_level";

/// Ingest a batch into the store inside one transaction.
///
/// Returns the number of net-new URLs. A record whose write fails is logged
/// and skipped; the rest of the batch is still committed.
///
/// # Errors
/// Returns `DatabaseError` if the transaction cannot be opened or committed.
pub async fn ingest(pool: &Pool<Sqlite>, batch: &[AssetRecord]) -> Result<usize> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0;
    let mut merged = 0;

    for record in batch {
        match upsert(&mut *tx, record).await {
            Ok(true) => inserted += 1,
            Ok(false) => merged += 1,
            Err(e) => {
                tracing::warn!(url = %record.url, source = %record.source, "Skipping record: {}", e);
            }
        }
    }

    tx.commit().await?;

    tracing::info!(
        records = batch.len(),
        inserted,
        merged,
        "Ingested batch into asset store"
    );
    Ok(inserted)
}

/// Insert or merge one record. Returns `true` when the URL was new.
async fn upsert(conn: &mut SqliteConnection, record: &AssetRecord) -> Result<bool> {
    let incoming = record.clone().canonicalized();

    let existing = sqlx::query(&format!(
        "SELECT {SELECT_COLUMNS} FROM assets WHERE url = ?"
    ))
    .bind(&incoming.url)
    .fetch_optional(&mut *conn)
    .await?;

    match existing {
        None => {
            sqlx::query(
                "INSERT INTO assets (organization, domain, host, protocol, url, ip, port,
                                     status_code, length, title, source, trust_level)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&incoming.organization)
            .bind(&incoming.domain)
            .bind(&incoming.host)
            .bind(&incoming.protocol)
            .bind(&incoming.url)
            .bind(&incoming.ip)
            .bind(i64::from(incoming.port))
            .bind(i64::from(incoming.status_code))
            .bind(i64::from(incoming.length))
            .bind(&incoming.title)
            .bind(&incoming.source)
            .bind(incoming.trust_level.level())
            .execute(&mut *conn)
            .await?;
            Ok(true)
        }
        Some(row) => {
            let id: i64 = row.try_get("id")?;
            let stored = row_to_record(&row)?;
            let merged = stored.merged_with(&incoming);

            sqlx::query(
                "UPDATE assets SET organization = ?, domain = ?, host = ?, protocol = ?, ip = ?,
                                   port = ?, status_code = ?, length = ?, title = ?, source = ?,
                                   trust_level = ?
                 WHERE id = ?",
            )
            .bind(&merged.organization)
            .bind(&merged.domain)
            .bind(&merged.host)
            .bind(&merged.protocol)
            .bind(&merged.ip)
            .bind(i64::from(merged.port))
            .bind(i64::from(merged.status_code))
            .bind(i64::from(merged.length))
            .bind(&merged.title)
            .bind(&merged.source)
            .bind(merged.trust_level.level())
            .bind(id)
            .execute(&mut *conn)
            .await?;
            Ok(false)
        }
    }
}

/// Look up the stored record for a URL (normalized before lookup).
pub async fn get_by_url(pool: &Pool<Sqlite>, url: &str) -> Result<Option<AssetRecord>> {
    let row = sqlx::query(&format!(
        "SELECT {SELECT_COLUMNS} FROM assets WHERE url = ?"
    ))
    .bind(normalize_url(url))
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_record).transpose()
}

/// All stored records in insertion order.
pub async fn all_assets(pool: &Pool<Sqlite>) -> Result<Vec<AssetRecord>> {
    let rows = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM assets ORDER BY id"))
        .fetch_all(pool)
        .await?;

    rows.iter().map(row_to_record).collect()
}

/// Number of distinct URLs in the store.
pub async fn count_assets(pool: &Pool<Sqlite>) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM assets")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

fn row_to_record(row: &SqliteRow) -> Result<AssetRecord> {
    let trust: i64 = row.try_get("trust_level")?;
    let trust_level = TrustLevel::from_level(trust)
        .ok_or_else(|| DatabaseError::Decode(format!("invalid trust_level {trust}")))?;

    Ok(AssetRecord {
        organization: row.try_get("organization")?,
        domain: row.try_get("domain")?,
        host: row.try_get("host")?,
        protocol: row.try_get("protocol")?,
        url: row.try_get("url")?,
        ip: row.try_get("ip")?,
        port: decode_number(row, "port")?,
        status_code: decode_number(row, "status_code")?,
        length: decode_number(row, "length")?,
        title: row.try_get("title")?,
        source: row.try_get("source")?,
        trust_level,
    })
}

fn decode_number<T: TryFrom<i64>>(row: &SqliteRow, column: &str) -> Result<T> {
    let value: i64 = row.try_get(column)?;
    T::try_from(value)
        .map_err(|_| DatabaseError::Decode(format!("{column} out of range: {value}")))
}

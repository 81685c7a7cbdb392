//! Aggregate queries over the asset store used by the density and fan-out
//! analyses.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};

/// Raw per-IP aggregate as returned by [`ip_fanout`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanoutRow {
    /// IP address
    pub ip: String,
    /// Distinct non-empty URLs observed on the IP
    pub url_count: i64,
    /// Comma-joined distinct non-empty domains
    pub domains: String,
    /// Comma-joined distinct source cells (each may itself be `;`-joined)
    pub sources: String,
}

/// Distinct non-empty IPs currently stored.
pub async fn distinct_ips(pool: &Pool<Sqlite>) -> Result<Vec<String>> {
    let ips = sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT ip FROM assets WHERE ip != '' ORDER BY ip",
    )
    .fetch_all(pool)
    .await?;
    Ok(ips)
}

/// Non-empty organizations of records whose IP starts with `prefix`.
///
/// `prefix` is the leading octets without a trailing dot (`"1.2.3"`); it is
/// matched as `LIKE '1.2.3.%'`.
pub async fn organizations_in_block(pool: &Pool<Sqlite>, prefix: &str) -> Result<Vec<String>> {
    let organizations = sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT organization FROM assets
         WHERE ip LIKE ? AND organization != ''
         ORDER BY organization",
    )
    .bind(format!("{prefix}.%"))
    .fetch_all(pool)
    .await?;
    Ok(organizations)
}

/// IPs serving at least `min_urls` distinct URLs, busiest first.
pub async fn ip_fanout(pool: &Pool<Sqlite>, min_urls: u32) -> Result<Vec<FanoutRow>> {
    let rows = sqlx::query(
        "SELECT ip,
                COUNT(DISTINCT NULLIF(url, '')) AS url_count,
                GROUP_CONCAT(DISTINCT NULLIF(domain, '')) AS domains,
                GROUP_CONCAT(DISTINCT NULLIF(source, '')) AS sources
         FROM assets
         WHERE ip != ''
         GROUP BY ip
         HAVING url_count >= ?
         ORDER BY url_count DESC, ip ASC",
    )
    .bind(i64::from(min_urls))
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<FanoutRow> {
            Ok(FanoutRow {
                ip: row.try_get("ip")?,
                url_count: row.try_get("url_count")?,
                domains: row
                    .try_get::<Option<String>, _>("domains")?
                    .unwrap_or_default(),
                sources: row
                    .try_get::<Option<String>, _>("sources")?
                    .unwrap_or_default(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assets, Database};
    use surveyor_core::AssetRecord;

    async fn setup_test_db() -> Database {
        let db = Database::new(":memory:").await.expect("create test database");
        db.run_migrations().await.expect("run migrations");
        db
    }

    fn asset(url: &str, ip: &str, organization: &str, domain: &str, source: &str) -> AssetRecord {
        AssetRecord {
            organization: organization.to_string(),
            domain: domain.to_string(),
            url: url.to_string(),
            ip: ip.to_string(),
            source: source.to_string(),
            ..AssetRecord::default()
        }
    }

    #[tokio::test]
    async fn test_distinct_ips_skips_empty() {
        let db = setup_test_db().await;
        let batch = vec![
            asset("http://a.example.com", "1.2.3.4", "A", "", "quake"),
            asset("http://b.example.com", "1.2.3.4", "A", "", "quake"),
            asset("http://c.example.com", "", "A", "", "quake"),
            asset("http://d.example.com", "1.2.3.9", "A", "", "quake"),
        ];
        assets::ingest(db.pool(), &batch).await.expect("ingest");

        let ips = distinct_ips(db.pool()).await.expect("distinct ips");
        assert_eq!(ips, vec!["1.2.3.4", "1.2.3.9"]);
    }

    #[tokio::test]
    async fn test_organizations_in_block() {
        let db = setup_test_db().await;
        let batch = vec![
            asset("http://1.2.3.1", "1.2.3.1", "A", "", "fofa"),
            asset("http://1.2.3.2", "1.2.3.2", "B", "", "fofa"),
            asset("http://1.2.3.3", "1.2.3.3", "", "", "fofa"),
            asset("http://1.2.30.1", "1.2.30.1", "C", "", "fofa"),
        ];
        assets::ingest(db.pool(), &batch).await.expect("ingest");

        let orgs = organizations_in_block(db.pool(), "1.2.3")
            .await
            .expect("organizations");
        assert_eq!(orgs, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_ip_fanout_threshold_and_projections() {
        let db = setup_test_db().await;
        let mut batch = Vec::new();
        for port in 0..11 {
            batch.push(asset(
                &format!("http://busy.example.com:{}", 8000 + port),
                "5.5.5.5",
                "A",
                if port % 2 == 0 { "busy.example.com" } else { "" },
                if port == 0 { "fofa;quake" } else { "quake" },
            ));
        }
        for port in 0..9 {
            batch.push(asset(
                &format!("http://quiet.example.com:{}", 8000 + port),
                "6.6.6.6",
                "A",
                "quiet.example.com",
                "hunter",
            ));
        }
        assets::ingest(db.pool(), &batch).await.expect("ingest");

        let rows = ip_fanout(db.pool(), 10).await.expect("fanout");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ip, "5.5.5.5");
        assert_eq!(rows[0].url_count, 11);
        assert_eq!(rows[0].domains, "busy.example.com");

        let mut sources: Vec<&str> = rows[0].sources.split(',').collect();
        sources.sort_unstable();
        assert_eq!(sources, vec!["fofa;quake", "quake"]);

        let rows = ip_fanout(db.pool(), 9).await.expect("fanout");
        assert_eq!(
            rows.iter().map(|r| r.ip.as_str()).collect::<Vec<_>>(),
            vec!["5.5.5.5", "6.6.6.6"]
        );
    }
}

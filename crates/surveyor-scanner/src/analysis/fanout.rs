//! Per-IP fan-out analysis.

use crate::error::Result;
use sqlx::{Pool, Sqlite};
use std::collections::BTreeSet;
use surveyor_db::aggregation;

/// An IP serving many distinct URLs, worth a manual port scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpFanout {
    /// IP address
    pub ip: String,
    /// Distinct non-empty URLs on the IP
    pub distinct_url_count: usize,
    /// Distinct non-empty domains on the IP
    pub domains: BTreeSet<String>,
    /// Distinct sources that observed the IP
    pub sources: BTreeSet<String>,
}

/// IPs with at least `min_urls_per_ip` distinct URLs, busiest first and then
/// by IP.
pub async fn analyze(pool: &Pool<Sqlite>, min_urls_per_ip: u32) -> Result<Vec<IpFanout>> {
    let rows = aggregation::ip_fanout(pool, min_urls_per_ip).await?;
    let flagged: Vec<IpFanout> = rows
        .into_iter()
        .map(|row| IpFanout {
            distinct_url_count: usize::try_from(row.url_count).unwrap_or_default(),
            domains: split_set(&row.domains),
            sources: split_set(&row.sources),
            ip: row.ip,
        })
        .collect();

    tracing::info!(flagged = flagged.len(), threshold = min_urls_per_ip, "Fan-out analysis finished");
    Ok(flagged)
}

/// Split a `,`/`;`-joined cell into its distinct non-empty parts.
fn split_set(joined: &str) -> BTreeSet<String> {
    joined
        .split([',', ';'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(ToString::to_string)
        .collect()
}

//! CIDR density analysis.

use crate::error::Result;
use ipnet::Ipv4Net;
use sqlx::{Pool, Sqlite};
use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;
use surveyor_db::aggregation;

/// Prefix length of the blocks IPs are grouped into.
pub const BLOCK_PREFIX_LEN: u8 = 24;

/// A /24 block holding enough distinct IPs to be expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenseBlock {
    /// The /24 network
    pub block: Ipv4Net,
    /// Distinct stored IPs inside the block
    pub ip_count: usize,
    /// Non-empty organizations seen on those IPs
    pub organizations: BTreeSet<String>,
    /// More than one organization was seen
    pub is_mixed: bool,
}

impl DenseBlock {
    /// Block in CIDR notation (`a.b.c.0/24`).
    #[must_use]
    pub fn cidr(&self) -> String {
        self.block.to_string()
    }
}

/// The /24 containing `addr`.
#[must_use]
pub fn block_of(addr: Ipv4Addr) -> Ipv4Net {
    let [a, b, c, _] = addr.octets();
    Ipv4Net::new(Ipv4Addr::new(a, b, c, 0), BLOCK_PREFIX_LEN).unwrap_or_else(|_| Ipv4Net::from(addr))
}

/// The leading three octets of a /24 (`"a.b.c"`).
fn block_prefix(block: &Ipv4Net) -> String {
    let [a, b, c, _] = block.network().octets();
    format!("{a}.{b}.{c}")
}

/// Group stored IPs by /24 and return the blocks with at least
/// `min_ips_per_block` distinct IPs, ordered by block address.
///
/// Stored values that are not IPv4 addresses are ignored.
pub async fn analyze(pool: &Pool<Sqlite>, min_ips_per_block: usize) -> Result<Vec<DenseBlock>> {
    let mut blocks: BTreeMap<Ipv4Net, BTreeSet<Ipv4Addr>> = BTreeMap::new();
    for ip in aggregation::distinct_ips(pool).await? {
        match ip.trim().parse::<Ipv4Addr>() {
            Ok(addr) => {
                blocks.entry(block_of(addr)).or_default().insert(addr);
            }
            Err(_) => tracing::debug!(%ip, "Skipping non-IPv4 value"),
        }
    }

    let mut dense = Vec::new();
    for (block, members) in blocks {
        if members.len() < min_ips_per_block {
            continue;
        }
        let organizations: BTreeSet<String> =
            aggregation::organizations_in_block(pool, &block_prefix(&block))
                .await?
                .into_iter()
                .collect();
        let is_mixed = organizations.len() > 1;
        tracing::info!(
            block = %block,
            ips = members.len(),
            organizations = organizations.len(),
            "Dense block found"
        );
        dense.push(DenseBlock {
            block,
            ip_count: members.len(),
            organizations,
            is_mixed,
        });
    }

    Ok(dense)
}

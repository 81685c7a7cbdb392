//! Second-round target generation and trust assignment.

use crate::analysis::density::DenseBlock;
use crate::error::Result;
use sqlx::{Pool, Sqlite};
use std::collections::HashSet;
use surveyor_core::{AssetRecord, HostKind, Target, TrustLevel};
use surveyor_db::aggregation;

/// Organization label for a block shared by several organizations.
pub const MIXED_BLOCK_LABEL: &str = "mixed-block";

/// Organization label for a block with no attributed organization.
pub const UNKNOWN_ORGANIZATION_LABEL: &str = "unknown-organization";

/// Label a dense block's second-round target is attributed to.
#[must_use]
pub fn block_label(block: &DenseBlock) -> String {
    let mut organizations = block.organizations.iter();
    match (organizations.next(), organizations.next()) {
        (Some(only), None) => only.clone(),
        (Some(_), Some(_)) => MIXED_BLOCK_LABEL.to_string(),
        (None, _) => UNKNOWN_ORGANIZATION_LABEL.to_string(),
    }
}

/// One target per dense block, skipping blocks that were already a
/// first-round CIDR target.
///
/// The overlap check is exact string equality on the CIDR; a first-round
/// `/16` covering the block does not suppress it.
#[must_use]
pub fn second_round_targets(dense_blocks: &[DenseBlock], first_round: &[Target]) -> Vec<Target> {
    let queried: HashSet<&str> = first_round
        .iter()
        .filter(|target| target.kind() == HostKind::Cidr)
        .map(|target| target.host.trim())
        .collect();

    dense_blocks
        .iter()
        .filter_map(|block| {
            let cidr = block.cidr();
            if queried.contains(cidr.as_str()) {
                tracing::debug!(%cidr, "Block already queried in round one");
                return None;
            }
            Some(Target::new(block_label(block), cidr))
        })
        .collect()
}

/// Distinct IPs in the store before the second round starts.
#[derive(Debug, Clone, Default)]
pub struct KnownIps(HashSet<String>);

impl KnownIps {
    /// Take the snapshot from the store.
    pub async fn snapshot(pool: &Pool<Sqlite>) -> Result<Self> {
        Ok(aggregation::distinct_ips(pool).await?.into_iter().collect())
    }

    /// Whether `ip` was already known.
    #[must_use]
    pub fn contains(&self, ip: &str) -> bool {
        self.0.contains(ip.trim())
    }

    /// Number of known IPs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<String> for KnownIps {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().map(|ip| ip.trim().to_string()).collect())
    }
}

/// Grade second-round records: `KnownIp` for IPs in the snapshot, `NewIp`
/// otherwise.
pub fn assign_round_two_trust(records: &mut [AssetRecord], known: &KnownIps) {
    for record in records {
        record.trust_level = if known.contains(&record.ip) {
            TrustLevel::KnownIp
        } else {
            TrustLevel::NewIp
        };
    }
}

//! Query orchestrator for one collection round.
//!
//! Every enabled source gets its own worker that walks the full target list
//! sequentially, pausing after each successful query. Workers run
//! concurrently and hand back their batch as a value; the coordinator
//! concatenates the batches once all of them have finished.

use crate::error::{Result, ScanError};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use surveyor_core::config::QueryConfig;
use surveyor_core::{AssetRecord, Target};
use surveyor_sources::{query_with_retry, AssetSource, RetryPolicy};

/// Runs every enabled source across a target list.
#[derive(Debug, Clone)]
pub struct QueryOrchestrator {
    /// Pause after each successful query, per source
    interval: Duration,
    /// Backoff applied to rate-limited queries
    retry_policy: RetryPolicy,
}

impl QueryOrchestrator {
    /// Create an orchestrator with an explicit cadence and retry policy.
    #[must_use]
    pub fn new(interval: Duration, retry_policy: RetryPolicy) -> Self {
        Self {
            interval,
            retry_policy,
        }
    }

    /// Create an orchestrator using the configured interval and the default
    /// retry policy.
    #[must_use]
    pub fn from_config(query: &QueryConfig) -> Self {
        Self::new(query.query_interval(), RetryPolicy::default())
    }

    /// Query every source for every target and return the combined batch.
    ///
    /// Each record is stamped with the organization of the target that
    /// produced it. Within one source, records keep target order; the order
    /// across sources is unspecified.
    ///
    /// # Errors
    /// Returns `ScanError::Configuration` before any query when `sources` or
    /// `targets` is empty. Per-target failures are logged and skipped.
    pub async fn run(
        &self,
        targets: &[Target],
        sources: &[Arc<dyn AssetSource>],
    ) -> Result<Vec<AssetRecord>> {
        ensure_runnable(targets, sources)?;

        tracing::info!(
            sources = sources.len(),
            targets = targets.len(),
            "Starting query round"
        );

        let mut workers: FuturesUnordered<_> = sources
            .iter()
            .map(|source| async move {
                let batch = self.run_worker(source.as_ref(), targets).await;
                (source.source_id(), batch)
            })
            .collect();

        let mut records = Vec::new();
        while let Some((source_id, batch)) = workers.next().await {
            tracing::info!(source = source_id, records = batch.len(), "Source finished");
            records.extend(batch);
        }

        tracing::info!(records = records.len(), "Query round finished");
        Ok(records)
    }

    /// Walk the target list for one source.
    async fn run_worker(&self, source: &dyn AssetSource, targets: &[Target]) -> Vec<AssetRecord> {
        let mut batch = Vec::new();

        for target in targets {
            match query_with_retry(source, target, &self.retry_policy).await {
                Ok(records) => {
                    tracing::debug!(
                        source = source.source_id(),
                        target = %target,
                        records = records.len(),
                        "Target queried"
                    );
                    batch.extend(records.into_iter().map(|mut record| {
                        record.organization.clone_from(&target.organization);
                        record
                    }));
                    tokio::time::sleep(self.interval).await;
                }
                Err(e) => {
                    tracing::error!(
                        source = source.source_id(),
                        target = %target,
                        "Query failed, skipping target: {}",
                        e
                    );
                }
            }
        }

        batch
    }
}

/// Reject a round that has nothing to do.
///
/// # Errors
/// Returns `ScanError::Configuration` for an empty source set or target list.
pub fn ensure_runnable(targets: &[Target], sources: &[Arc<dyn AssetSource>]) -> Result<()> {
    if sources.is_empty() {
        return Err(ScanError::Configuration(
            "no source enabled; configure at least one API key".to_string(),
        ));
    }
    if targets.is_empty() {
        return Err(ScanError::Configuration("no valid target to query".to_string()));
    }
    Ok(())
}

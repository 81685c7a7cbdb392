//! Two-round collection pipeline.
//!
//! Round one queries the user's targets, the density analysis turns crowded
//! /24 blocks into round-two targets, and the fan-out analysis flags IPs for
//! follow-up. Each stage is handed to an [`ExportSink`] as it completes and
//! the run is recorded in `scan_runs`.

use crate::analysis::{density, expansion, fanout, DenseBlock, IpFanout, KnownIps};
use crate::error::Result;
use crate::orchestrator::{ensure_runnable, QueryOrchestrator};
use std::fmt;
use std::sync::Arc;
use surveyor_core::config::QueryConfig;
use surveyor_core::{AssetRecord, Target};
use surveyor_db::{assets, scan_runs, Database, RunCounters};
use surveyor_sources::AssetSource;

/// Store snapshot being exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    /// All rows after round one
    RoundOne,
    /// All rows after round two
    RoundTwo,
}

impl ExportStage {
    /// Short name used in file names.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RoundOne => "step1",
            Self::RoundTwo => "step2",
        }
    }
}

impl fmt::Display for ExportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived result set handed to the sink.
#[derive(Debug, Clone, Copy)]
pub enum Report<'a> {
    /// Output of the density analysis
    DenseBlocks(&'a [DenseBlock]),
    /// Output of the fan-out analysis
    FlaggedIps(&'a [IpFanout]),
}

impl Report<'_> {
    /// Short name used in file names and logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::DenseBlocks(_) => "dense_blocks",
            Self::FlaggedIps(_) => "ip_need_scan",
        }
    }
}

/// Destination for stage snapshots and analysis reports.
pub trait ExportSink: Send + Sync {
    /// Write every current store row for `stage`.
    fn export_assets(&self, stage: ExportStage, rows: &[AssetRecord]) -> Result<()>;

    /// Write a derived report.
    fn export_report(&self, report: Report<'_>) -> Result<()>;
}

/// Thresholds driving the analyses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Distinct IPs a /24 needs; `None` disables density analysis and round two
    pub density_threshold: Option<usize>,
    /// Distinct URLs on one IP before it is flagged
    pub min_urls_per_ip: u32,
}

impl PipelineSettings {
    /// Settings from the `[query]` config section.
    #[must_use]
    pub fn from_config(query: &QueryConfig) -> Self {
        Self {
            density_threshold: query.density_threshold(),
            min_urls_per_ip: query.min_urls_per_ip_for_flag,
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    /// `scan_runs` row id
    pub run_id: String,
    /// Records returned by round one
    pub round_one_records: usize,
    /// Records returned by round two
    pub round_two_records: usize,
    /// URLs that were new to the store
    pub new_identities: usize,
    /// Dense blocks found after round one
    pub dense_blocks: Vec<DenseBlock>,
    /// Targets queried in round two
    pub round_two_targets: Vec<Target>,
    /// IPs flagged by the fan-out analysis
    pub flagged_ips: Vec<IpFanout>,
}

impl PipelineReport {
    /// Whether a second round was queried.
    #[must_use]
    pub fn second_round_ran(&self) -> bool {
        !self.round_two_targets.is_empty()
    }

    fn counters(&self) -> RunCounters {
        RunCounters {
            round_one_records: saturating_u32(self.round_one_records),
            round_two_records: saturating_u32(self.round_two_records),
            new_identities: saturating_u32(self.new_identities),
        }
    }
}

fn saturating_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// The full collect, merge, analyze and export flow.
pub struct Pipeline {
    db: Database,
    orchestrator: QueryOrchestrator,
    sources: Vec<Arc<dyn AssetSource>>,
    settings: PipelineSettings,
}

impl Pipeline {
    /// Create a pipeline over an opened, migrated database.
    #[must_use]
    pub fn new(
        db: Database,
        orchestrator: QueryOrchestrator,
        sources: Vec<Arc<dyn AssetSource>>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            db,
            orchestrator,
            sources,
            settings,
        }
    }

    /// Run both rounds and the analyses for `targets`.
    ///
    /// The run is recorded as `Completed` with its counters, or as `Failed`
    /// with the error message.
    ///
    /// # Errors
    /// Returns `ScanError::Configuration` before creating the run when there
    /// is no source or no target, and `ScanError::Database` when the store
    /// fails. Source and export failures are logged and skipped.
    pub async fn run(&self, targets: &[Target], sink: &dyn ExportSink) -> Result<PipelineReport> {
        ensure_runnable(targets, &self.sources)?;

        let run = scan_runs::create_scan_run(self.db.pool(), saturating_u32(targets.len())).await?;
        tracing::info!(run_id = %run.id, targets = targets.len(), "Pipeline started");

        let mut report = PipelineReport {
            run_id: run.id.clone(),
            ..PipelineReport::default()
        };

        match self.execute(targets, sink, &mut report).await {
            Ok(()) => {
                scan_runs::complete_scan_run(self.db.pool(), &run.id, report.counters()).await?;
                tracing::info!(
                    run_id = %run.id,
                    round_one = report.round_one_records,
                    round_two = report.round_two_records,
                    new_identities = report.new_identities,
                    flagged = report.flagged_ips.len(),
                    "Pipeline completed"
                );
                Ok(report)
            }
            Err(e) => {
                tracing::error!(run_id = %run.id, "Pipeline failed: {}", e);
                if let Err(mark_err) =
                    scan_runs::fail_scan_run(self.db.pool(), &run.id, &e.to_string()).await
                {
                    tracing::warn!(run_id = %run.id, "Failed to record run failure: {}", mark_err);
                }
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        targets: &[Target],
        sink: &dyn ExportSink,
        report: &mut PipelineReport,
    ) -> Result<()> {
        let pool = self.db.pool();

        // Round one
        let round_one = self.orchestrator.run(targets, &self.sources).await?;
        report.round_one_records = round_one.len();
        report.new_identities += assets::ingest(pool, &round_one).await?;
        self.export_stage(sink, ExportStage::RoundOne).await?;

        // Round two
        if let Some(threshold) = self.settings.density_threshold {
            report.dense_blocks = density::analyze(pool, threshold).await?;
            export_report(sink, Report::DenseBlocks(&report.dense_blocks));

            report.round_two_targets =
                expansion::second_round_targets(&report.dense_blocks, targets);
            if report.round_two_targets.is_empty() {
                tracing::info!("No new dense block, skipping second round");
            } else {
                let known = KnownIps::snapshot(pool).await?;
                tracing::info!(
                    targets = report.round_two_targets.len(),
                    known_ips = known.len(),
                    "Starting second round"
                );
                let mut round_two = self
                    .orchestrator
                    .run(&report.round_two_targets, &self.sources)
                    .await?;
                expansion::assign_round_two_trust(&mut round_two, &known);
                report.round_two_records = round_two.len();
                report.new_identities += assets::ingest(pool, &round_two).await?;
                self.export_stage(sink, ExportStage::RoundTwo).await?;
            }
        } else {
            tracing::info!("Density analysis disabled, skipping second round");
        }

        // Fan-out
        report.flagged_ips = fanout::analyze(pool, self.settings.min_urls_per_ip).await?;
        export_report(sink, Report::FlaggedIps(&report.flagged_ips));

        Ok(())
    }

    async fn export_stage(&self, sink: &dyn ExportSink, stage: ExportStage) -> Result<()> {
        let rows = assets::all_assets(self.db.pool()).await?;
        tracing::info!(%stage, rows = rows.len(), "Exporting store snapshot");
        if let Err(e) = sink.export_assets(stage, &rows) {
            tracing::error!(%stage, "Export failed: {}", e);
        }
        Ok(())
    }
}

fn export_report(sink: &dyn ExportSink, report: Report<'_>) {
    if let Err(e) = sink.export_report(report) {
        tracing::error!(report = report.name(), "Export failed: {}", e);
    }
}

//! Surveyor command-line shell.
//!
//! Loads configuration and targets, opens a per-run store and hands off to
//! the scanner pipeline. Collection and analysis logic lives in `crates/`.

mod export;
mod input;

use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use surveyor_core::{filter_valid, AppConfig, Bootstrap};
use surveyor_db::Database;
use surveyor_scanner::{Pipeline, PipelineSettings, QueryOrchestrator};
use tracing::info;

use crate::export::CsvExporter;

/// Aggregate asset-discovery results from Quake, FOFA and Hunter.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file; a commented default is written if missing
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Target CSV, overriding `input.target_file`
    #[arg(short, long)]
    targets: Option<PathBuf>,

    /// Output directory, overriding `output.base_dir`
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Initialize tracing subscriber for logging
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,surveyor=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    info!("Starting Surveyor v{}", env!("CARGO_PKG_VERSION"));

    if AppConfig::bootstrap(&args.config)? == Bootstrap::Created {
        info!(
            "Default configuration written to {}; add API keys and run again",
            args.config.display()
        );
        return Ok(());
    }

    let mut config = AppConfig::load_with_env(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    if let Some(targets) = args.targets {
        config.input.target_file = targets;
    }
    if let Some(output) = args.output {
        config.output.base_dir = output;
    }

    let target_file = &config.input.target_file;
    if input::ensure_target_file(target_file)? {
        info!(
            "Target file {} was missing and has been created; fill it with `organization,hosts` rows and run again",
            target_file.display()
        );
        return Ok(());
    }

    let targets = filter_valid(input::load_targets(target_file)?);
    if targets.is_empty() {
        bail!("no valid target in {}", target_file.display());
    }

    let sources =
        surveyor_sources::enabled_sources(&config.api_keys, config.query.request_timeout())?;
    if sources.is_empty() {
        bail!("no API key configured in {}", args.config.display());
    }

    let run_name = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let run_dir = config.output.base_dir.join(&run_name);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create {}", run_dir.display()))?;
    info!("Results will be written to {}", run_dir.display());

    let db = Database::new(run_dir.join("res.db")).await?;
    db.run_migrations().await?;

    let pipeline = Pipeline::new(
        db.clone(),
        QueryOrchestrator::from_config(&config.query),
        sources,
        PipelineSettings::from_config(&config.query),
    );
    let sink = CsvExporter::new(&run_dir, &run_name);
    let report = pipeline.run(&targets, &sink).await;
    db.close().await;
    let report = report?;

    info!(
        round_one = report.round_one_records,
        round_two = report.round_two_records,
        unique_urls = report.new_identities,
        dense_blocks = report.dense_blocks.len(),
        flagged_ips = report.flagged_ips.len(),
        "Run {} finished",
        report.run_id
    );
    Ok(())
}

//! Surveyor Scanner - collection rounds and derived analyses.
//!
//! This crate drives the external sources across the target list, merges
//! every round into the store, and runs the density and fan-out analyses
//! that decide the second round and flag hosts for follow-up.
//!
//! # Features
//!
//! - One concurrent worker per source, sequential targets with a fixed pause
//! - Rate-limit retries through `surveyor_sources::query_with_retry`
//! - /24 density clustering and second-round target generation
//! - Per-IP fan-out flagging
//! - Run bookkeeping in the `scan_runs` table
//!
//! # Example
//!
//! ```rust,ignore
//! use surveyor_scanner::{Pipeline, PipelineSettings, QueryOrchestrator};
//!
//! let pipeline = Pipeline::new(
//!     database,
//!     QueryOrchestrator::from_config(&config.query),
//!     sources,
//!     PipelineSettings::from_config(&config.query),
//! );
//!
//! let report = pipeline.run(&targets, &csv_sink).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod analysis;
#[allow(missing_docs)]
pub mod error;
pub mod orchestrator;
pub mod pipeline;

// Re-export commonly used types
pub use analysis::{DenseBlock, IpFanout, KnownIps};
pub use error::{Result, ScanError};
pub use orchestrator::QueryOrchestrator;
pub use pipeline::{ExportSink, ExportStage, Pipeline, PipelineReport, PipelineSettings, Report};

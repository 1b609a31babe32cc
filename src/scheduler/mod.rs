//! Batch orchestration and rate limiting
//!
//! The scheduling core of the pipeline: splits input into batches, drives
//! bounded concurrent per-product fan-out across the source fetchers, and
//! sequences the catalog → dependent-fetch data dependency.
//!
//! # Overview
//!
//! 1. **Ingest**: deduplicate the product list into a [`batch::Batch`]
//! 2. **Execution**: process the batch with [`executor::BatchScheduler`]
//! 3. **Rate Limiting**: per-source throttling via [`rate_limit::RateLimiter`]
//! 4. **Progress**: periodic updates via [`progress::ProgressReporter`]
//! 5. **Resume**: resolved products are skipped on re-runs via the
//!    checkpoint store
//!
//! # Components
//!
//! - [`executor`] - Batch execution engine with fan-out and deadlines
//! - [`batch`] - Batch ingest, status, and outcome structures
//! - [`rate_limit`] - Token-bucket rate limiting
//! - [`config`] - Tunables and backoff/fan-out defaults
//! - [`progress`] - Cadence-gated progress reporting
//!
//! # Error Handling
//!
//! Per-product fetch failures are folded into the merged records; a batch
//! run returns [`SchedulerError`] only for checkpoint store faults.

pub mod batch;
pub mod config;
pub mod executor;
pub mod progress;
pub mod rate_limit;

pub use batch::{Batch, BatchOutcome, BatchStatus, BatchSummary, ProductRow};
pub use config::{PipelineConfig, SourceTuning};
pub use executor::BatchScheduler;
pub use rate_limit::{RateLimitError, RateLimiter};

use crate::checkpoint::CheckpointError;

/// Batch-fatal errors.
///
/// Individual product failures never surface here; they degrade rows
/// instead. Only infrastructure faults abort a run.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Checkpoint store unreachable or corrupt
    #[error("checkpoint store failure: {0}")]
    Checkpoint(#[from] CheckpointError),
}

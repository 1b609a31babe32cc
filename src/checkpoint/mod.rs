//! Durable per-product progress for crash resumption
//!
//! The scheduler persists every product's terminal merged record through a
//! [`CheckpointStore`] so a re-run of the same batch skips already-resolved
//! products and re-emits their report rows from the stored state. Store
//! failures are the one fault class that fails a batch; a degraded source is
//! tolerated, losing progress durability is not.

pub mod state;
pub mod store;

pub use state::{BatchProgress, MAX_PROGRESS_FILE_SIZE};
pub use store::JsonCheckpointStore;

use crate::merge::MergedRecord;
use async_trait::async_trait;

/// Checkpoint persistence errors
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Batch id is empty or contains path-hostile characters
    #[error("invalid batch id: {0:?}")]
    InvalidBatchId(String),

    /// Progress file was written by an incompatible version
    #[error("schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch {
        /// Expected schema version
        expected: String,
        /// Found schema version
        found: String,
    },

    /// Progress file exceeds the size cap
    #[error("progress file too large: {size} bytes (max: {max} bytes)")]
    StateTooLarge {
        /// Actual file size
        size: u64,
        /// Maximum allowed size
        max: u64,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Lock error
    #[error("lock error: {0}")]
    Lock(String),
}

/// Durable storage for per-batch progress.
///
/// Implementations must make `save_progress` atomic per call: after it
/// returns, the record is either fully persisted or not recorded at all.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the progress recorded for a batch; a batch never seen before
    /// yields empty progress.
    async fn load_progress(&self, batch_id: &str) -> Result<BatchProgress, CheckpointError>;

    /// Persist one product's terminal merged record.
    async fn save_progress(
        &self,
        batch_id: &str,
        record: &MergedRecord,
    ) -> Result<(), CheckpointError>;
}

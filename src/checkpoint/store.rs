//! Filesystem-backed checkpoint store

use super::state::BatchProgress;
use super::{CheckpointError, CheckpointStore};
use crate::merge::MergedRecord;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

/// Checkpoint store writing one JSON progress file per batch.
///
/// Saves are read-modify-write under a process-level mutex; the file-level
/// fd lock in [`BatchProgress`] guards against concurrent processes.
pub struct JsonCheckpointStore {
    dir: PathBuf,
    write_guard: Mutex<()>,
}

impl JsonCheckpointStore {
    /// Create a store rooted at the given directory. The directory is
    /// created lazily on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_guard: Mutex::new(()),
        }
    }

    /// Path of the progress file for a batch
    pub fn progress_path(&self, batch_id: &str) -> PathBuf {
        self.dir.join(format!("{batch_id}.json"))
    }

    fn validate_batch_id(batch_id: &str) -> Result<(), CheckpointError> {
        let valid = !batch_id.is_empty()
            && batch_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
        if valid && !batch_id.starts_with('.') {
            Ok(())
        } else {
            Err(CheckpointError::InvalidBatchId(batch_id.to_string()))
        }
    }

    fn load_or_default(path: &Path, batch_id: &str) -> Result<BatchProgress, CheckpointError> {
        if path.exists() {
            BatchProgress::load(path)
        } else {
            Ok(BatchProgress::new(batch_id))
        }
    }
}

#[async_trait]
impl CheckpointStore for JsonCheckpointStore {
    async fn load_progress(&self, batch_id: &str) -> Result<BatchProgress, CheckpointError> {
        Self::validate_batch_id(batch_id)?;
        let path = self.progress_path(batch_id);
        let progress = Self::load_or_default(&path, batch_id)?;
        if !progress.is_empty() {
            info!(
                batch_id,
                resolved = progress.len(),
                "Resuming batch from existing progress"
            );
        }
        Ok(progress)
    }

    async fn save_progress(
        &self,
        batch_id: &str,
        record: &MergedRecord,
    ) -> Result<(), CheckpointError> {
        Self::validate_batch_id(batch_id)?;
        let path = self.progress_path(batch_id);

        let _guard = self
            .write_guard
            .lock()
            .map_err(|_| CheckpointError::Lock("progress write mutex poisoned".to_string()))?;
        let mut progress = Self::load_or_default(&path, batch_id)?;
        progress.record_resolved(record.clone());
        progress.save(&path)
    }
}

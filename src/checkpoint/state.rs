//! Batch progress persistence
//!
//! One JSON state file per batch, holding the full merged record of every
//! resolved product so a resumed run can re-emit report rows without
//! re-fetching. Writes are atomic (tempfile + rename + fsync) and guarded by
//! an fd lock so concurrent processes cannot interleave partial writes.

use super::CheckpointError;
use crate::identifier::JanCode;
use crate::merge::MergedRecord;
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

/// Current progress file schema version
const SCHEMA_VERSION: &str = "1.0.0";

/// Maximum allowed progress file size (10 MB) to prevent memory exhaustion
pub const MAX_PROGRESS_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Durable progress for one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchProgress {
    schema_version: String,
    batch_id: String,
    resolved: BTreeMap<JanCode, MergedRecord>,
    created_at: i64,
    updated_at: i64,
}

impl BatchProgress {
    /// Create empty progress for a batch.
    pub fn new(batch_id: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            batch_id: batch_id.into(),
            resolved: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The batch this progress belongs to
    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    /// All resolved records, keyed by JAN code
    pub fn resolved(&self) -> &BTreeMap<JanCode, MergedRecord> {
        &self.resolved
    }

    /// Resolved record for a product, if present
    pub fn get(&self, jan: &JanCode) -> Option<&MergedRecord> {
        self.resolved.get(jan)
    }

    /// Number of resolved products
    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    /// Whether no products have resolved yet
    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }

    /// Record a resolved product. Re-resolving the same JAN replaces the
    /// previous record, keeping the most recent terminal state.
    pub fn record_resolved(&mut self, record: MergedRecord) {
        debug!(
            batch_id = %self.batch_id,
            jan = %record.identifier.jan_code,
            resolved = self.resolved.len() + 1,
            "Recording resolved product in batch progress"
        );
        self.resolved
            .insert(record.identifier.jan_code.clone(), record);
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }

    /// Save progress to a file with an atomic write and file locking.
    pub fn save(&self, path: &Path) -> Result<(), CheckpointError> {
        debug!(
            path = %path.display(),
            resolved = self.resolved.len(),
            "Saving batch progress"
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CheckpointError::Io(e.to_string()))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?;

        let lock_path = path.with_extension("lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| CheckpointError::Lock(format!("Failed to create lock file: {e}")))?;

        let mut lock = RwLock::new(lock_file);
        let _guard = lock
            .write()
            .map_err(|e| CheckpointError::Lock(format!("Failed to acquire write lock: {e}")))?;

        let parent_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp_file = tempfile::NamedTempFile::new_in(parent_dir)
            .map_err(|e| CheckpointError::Io(format!("Failed to create temp file: {e}")))?;

        temp_file
            .write_all(json.as_bytes())
            .map_err(|e| CheckpointError::Io(format!("Failed to write to temp file: {e}")))?;

        // Flush and sync before the rename so a crash never leaves a
        // half-written progress file behind the target path
        temp_file
            .flush()
            .map_err(|e| CheckpointError::Io(format!("Failed to flush temp file: {e}")))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| CheckpointError::Io(format!("Failed to sync temp file: {e}")))?;

        temp_file
            .persist(path)
            .map_err(|e| CheckpointError::Io(format!("Failed to persist temp file: {e}")))?;

        // Fsync parent directory so the rename itself is durable
        if let Some(parent) = path.parent() {
            if let Ok(dir) = std::fs::File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        Ok(())
    }

    /// Load progress from a file with locking.
    pub fn load(path: &Path) -> Result<Self, CheckpointError> {
        debug!(path = %path.display(), "Loading batch progress");

        let lock_path = path.with_extension("lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| CheckpointError::Lock(format!("Failed to create lock file: {e}")))?;

        let lock = RwLock::new(lock_file);
        let _guard = lock
            .read()
            .map_err(|e| CheckpointError::Lock(format!("Failed to acquire read lock: {e}")))?;

        let metadata =
            std::fs::metadata(path).map_err(|e| CheckpointError::Io(e.to_string()))?;
        if metadata.len() > MAX_PROGRESS_FILE_SIZE {
            return Err(CheckpointError::StateTooLarge {
                size: metadata.len(),
                max: MAX_PROGRESS_FILE_SIZE,
            });
        }

        let contents =
            std::fs::read_to_string(path).map_err(|e| CheckpointError::Io(e.to_string()))?;

        let state: BatchProgress = serde_json::from_str(&contents).map_err(|e| {
            warn!(error = %e, "Failed to deserialize batch progress");
            CheckpointError::Deserialization(e.to_string())
        })?;

        if state.schema_version != SCHEMA_VERSION {
            warn!(
                found_version = %state.schema_version,
                expected_version = SCHEMA_VERSION,
                "Batch progress schema version mismatch"
            );
            return Err(CheckpointError::SchemaVersionMismatch {
                expected: SCHEMA_VERSION.to_string(),
                found: state.schema_version,
            });
        }

        debug!(
            resolved = state.resolved.len(),
            "Batch progress loaded successfully"
        );
        Ok(state)
    }
}

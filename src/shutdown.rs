//! Graceful cancellation coordination.
//!
//! Provides a lightweight [`CancelCoordinator`] shared across the batch
//! scheduler and CLI to detect Ctrl+C and stop a running batch without
//! corrupting checkpoint state. Products already resolved stay checkpointed;
//! the batch then reports a cancelled status.

use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Shared handle to a cancel coordinator.
pub type SharedCancel = Arc<CancelCoordinator>;

static GLOBAL_CANCEL: OnceCell<SharedCancel> = OnceCell::new();

/// Register a global cancel handle so subsystems can discover it lazily.
pub fn set_global_cancel(handle: SharedCancel) {
    let _ = GLOBAL_CANCEL.set(handle);
}

/// Retrieve the registered global cancel handle, if available.
pub fn get_global_cancel() -> Option<SharedCancel> {
    GLOBAL_CANCEL.get().cloned()
}

/// Coordinates batch cancellation across async tasks.
#[derive(Debug, Default)]
pub struct CancelCoordinator {
    is_cancelled: AtomicBool,
    notify: Notify,
}

impl CancelCoordinator {
    /// Create a new coordinator.
    pub fn new() -> Self {
        Self {
            is_cancelled: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Create a new shared coordinator wrapped in [`Arc`].
    pub fn shared() -> SharedCancel {
        Arc::new(Self::new())
    }

    /// Request cancellation. Notifies all registered waiters exactly once.
    pub fn request_cancel(&self) {
        if !self.is_cancelled.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    /// Whether cancellation has been requested.
    pub fn is_cancel_requested(&self) -> bool {
        self.is_cancelled.load(Ordering::SeqCst)
    }

    /// Wait until cancellation is requested. Returns immediately if already set.
    pub async fn wait_for_cancel(&self) {
        if self.is_cancel_requested() {
            return;
        }
        self.notify.notified().await;
    }
}

//! Progress reporting for long-running batches.
//!
//! Emits periodic user-facing log lines while a batch is in flight. Updates
//! are cadence-gated by elapsed time and percentage jumps so a large batch
//! produces a handful of informative lines rather than one per product.

use std::time::{Duration, Instant};

const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(30);
const MIN_RUN_DURATION: Duration = Duration::from_secs(10);
const DEFAULT_MIN_PERCENTAGE_STEP: f64 = 10.0;

/// Progress state for one batch run.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    total_products: usize,
    resolved: usize,
    start_time: Instant,
    last_update: Instant,
    update_interval: Duration,
    min_percentage_step: f64,
    last_reported_percentage: f64,
}

impl ProgressReporter {
    /// Create a reporter for a batch of the given size.
    pub fn new(total_products: usize) -> Self {
        let now = Instant::now();
        Self {
            total_products,
            resolved: 0,
            start_time: now,
            last_update: now,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            min_percentage_step: DEFAULT_MIN_PERCENTAGE_STEP,
            last_reported_percentage: 0.0,
        }
    }

    /// Record one product reaching a terminal state.
    pub fn record_resolved(&mut self) {
        self.resolved += 1;
    }

    /// Products resolved so far
    pub fn resolved(&self) -> usize {
        self.resolved
    }

    /// Products still outstanding
    pub fn pending(&self) -> usize {
        self.total_products.saturating_sub(self.resolved)
    }

    /// Completion percentage (0-100)
    pub fn percentage(&self) -> f64 {
        if self.total_products == 0 {
            100.0
        } else {
            (self.resolved as f64 / self.total_products as f64) * 100.0
        }
    }

    /// Whether an update should be emitted, based on time or percentage jump.
    pub fn should_emit_update(&self) -> bool {
        if self.resolved == 0 {
            return false;
        }

        if self.percentage() - self.last_reported_percentage >= self.min_percentage_step {
            return true;
        }

        self.start_time.elapsed() >= MIN_RUN_DURATION
            && self.last_update.elapsed() >= self.update_interval
    }

    /// Call after emitting a progress log to reset timers and cached percentage.
    pub fn mark_emitted(&mut self) {
        self.last_update = Instant::now();
        self.last_reported_percentage = self.percentage();
    }

    /// Estimate remaining time from the observed resolution rate.
    pub fn estimate_remaining(&self) -> Option<Duration> {
        if self.resolved == 0 {
            return None;
        }
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return None;
        }
        let rate = self.resolved as f64 / elapsed;
        let remaining = self.pending();
        if remaining == 0 || rate <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining as f64 / rate))
    }

    /// Human-readable progress string for logging.
    pub fn format_progress(&self) -> String {
        let mut parts = vec![format!(
            "[PROGRESS] Resolved {}/{} products - {:.1}% complete",
            self.resolved,
            self.total_products,
            self.percentage()
        )];

        if let Some(remaining) = self.estimate_remaining() {
            parts.push(format!("- ~{} remaining", format_duration(remaining)));
        }

        parts.join(" ")
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{:.1}h", secs as f64 / 3600.0)
    }
}

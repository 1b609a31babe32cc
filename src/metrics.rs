//! Observability metrics for batch analysis runs
//!
//! Collection goes through the `metrics` crate with a Prometheus scrape
//! endpoint for export. Recording is fire-and-forget: an uninitialized
//! exporter drops samples instead of blocking or erroring the pipeline.

use crate::fetch::{FetchErrorKind, Source};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Initialize the metrics system with a Prometheus exporter.
///
/// Called once at startup; idempotent on repeat calls.
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "source_fetch_attempts_total",
        Unit::Count,
        "Total fetch attempts per external source, including retries"
    );

    describe_counter!(
        "source_fetch_failures_total",
        Unit::Count,
        "Total terminal fetch failures per external source and failure kind"
    );

    describe_counter!(
        "products_resolved_total",
        Unit::Count,
        "Total products that reached a terminal merged state"
    );

    describe_counter!(
        "products_unmatched_total",
        Unit::Count,
        "Total products with no catalog match"
    );

    describe_counter!(
        "batches_completed_total",
        Unit::Count,
        "Total batch runs completed, labeled by final status"
    );

    describe_histogram!(
        "batch_duration_seconds",
        Unit::Seconds,
        "Wall-clock duration of a batch run"
    );

    describe_gauge!(
        "batch_products_pending",
        Unit::Count,
        "Products remaining in the currently running batch"
    );

    *initialized = true;
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Check if the metrics system is initialized
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}

/// Record the attempts a successful source fetch needed (1 = first try).
pub fn record_fetch_attempts(source: Source, attempts: u32) {
    counter!(
        "source_fetch_attempts_total",
        "source" => source.label(),
    )
    .increment(u64::from(attempts));
}

/// Record a terminal fetch failure for a source.
pub fn record_fetch_failure(source: Source, kind: FetchErrorKind) {
    counter!(
        "source_fetch_failures_total",
        "source" => source.label(),
        "kind" => kind.to_string(),
    )
    .increment(1);
}

/// Record a product reaching a terminal merged state.
pub fn record_product_resolved(matched: bool) {
    counter!("products_resolved_total").increment(1);
    if !matched {
        counter!("products_unmatched_total").increment(1);
    }
}

/// Update the pending-products gauge for the running batch.
pub fn set_products_pending(pending: usize) {
    gauge!("batch_products_pending").set(pending as f64);
}

/// Wall-clock tracking for one batch run.
pub struct BatchMetrics {
    batch_id: String,
    start_time: Instant,
}

impl BatchMetrics {
    /// Start tracking a batch run
    pub fn start(batch_id: impl Into<String>) -> Self {
        Self {
            batch_id: batch_id.into(),
            start_time: Instant::now(),
        }
    }

    /// Record batch completion with its final status label
    pub fn record_finished(&self, status: &str) {
        let duration = self.start_time.elapsed();

        counter!(
            "batches_completed_total",
            "status" => status.to_string(),
        )
        .increment(1);
        histogram!("batch_duration_seconds").record(duration.as_secs_f64());

        debug!(
            batch_id = %self.batch_id,
            status,
            duration_secs = duration.as_secs(),
            "Batch metrics recorded"
        );
    }
}

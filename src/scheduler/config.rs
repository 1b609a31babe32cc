//! Pipeline configuration tunables
//!
//! The configuration surface of the core: per-source rate limit and retry
//! tuning, the per-product deadline, and the batch fan-out width. No other
//! external configuration is consumed by the pipeline.

use std::time::Duration;

/// Default bounded fan-out: products processed concurrently within a batch.
/// The rate limiters, not unbounded concurrency, are the primary backpressure
/// mechanism, so this only needs to be wide enough to keep them saturated.
pub const DEFAULT_FAN_OUT_WIDTH: usize = 8;

/// Hard ceiling on fan-out width to prevent self-inflicted rate limiting.
pub const MAX_FAN_OUT_WIDTH: usize = 32;

/// Default per-product deadline covering the dependent parallel fetches.
/// Generous enough to absorb one full retry ladder on a slow source.
pub const DEFAULT_PER_PRODUCT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default maximum attempts per logical source call.
/// 4 attempts with exponential backoff recovers from transient blips while
/// bounding worst-case latency per source to a few seconds of backoff.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// Default initial backoff delay. Long enough for short rate-limit windows
/// to clear, short enough not to dominate per-product latency.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Cap on exponential backoff delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Default deadline for a single rate-limiter token acquisition.
pub const DEFAULT_RATE_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Tuning for one external source.
#[derive(Debug, Clone)]
pub struct SourceTuning {
    /// Token bucket capacity (maximum burst)
    pub rate_capacity: u32,
    /// Token refill rate, tokens per second
    pub refill_per_sec: f64,
    /// Maximum attempts per logical call
    pub max_attempts: u32,
    /// Initial backoff delay; doubles per attempt
    pub base_delay: Duration,
    /// Backoff delay ceiling
    pub max_delay: Duration,
    /// Deadline for acquiring a rate-limit token
    pub rate_acquire_timeout: Duration,
    /// Override for the source's base URL (tests, staging endpoints)
    pub base_url: Option<String>,
    /// API credential passed as a query parameter where the source needs one
    pub api_key: Option<String>,
}

impl SourceTuning {
    fn with_rate(rate_capacity: u32, refill_per_sec: f64) -> Self {
        Self {
            rate_capacity,
            refill_per_sec,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            rate_acquire_timeout: DEFAULT_RATE_ACQUIRE_TIMEOUT,
            base_url: None,
            api_key: None,
        }
    }
}

/// Complete tunable set for a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Catalog lookup tuning
    pub catalog: SourceTuning,
    /// Price history tuning
    pub price_history: SourceTuning,
    /// Competitor price search tuning
    pub competitor_price: SourceTuning,
    /// Deadline for one product's dependent parallel fetches
    pub per_product_timeout: Duration,
    /// Maximum products in flight concurrently within a batch
    pub fan_out_width: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            // Published limits: catalog API allows short bursts at ~2 req/s;
            // the history API is 1 req/s; the marketplace search APIs ask for
            // roughly one request every two seconds.
            catalog: SourceTuning::with_rate(5, 2.0),
            price_history: SourceTuning::with_rate(3, 1.0),
            competitor_price: SourceTuning::with_rate(2, 0.5),
            per_product_timeout: DEFAULT_PER_PRODUCT_TIMEOUT,
            fan_out_width: DEFAULT_FAN_OUT_WIDTH,
        }
    }
}

impl PipelineConfig {
    /// Clamp the fan-out width into `[1, MAX_FAN_OUT_WIDTH]`.
    pub fn effective_fan_out(&self) -> usize {
        self.fan_out_width.clamp(1, MAX_FAN_OUT_WIDTH)
    }
}

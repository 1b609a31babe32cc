//! Per-source token-bucket rate limiting
//!
//! Each external source gets its own bucket with capacity `C` and refill
//! rate `R` tokens/second, configured from the API's published limit.
//! `acquire` suspends the caller until a token is available or the supplied
//! deadline elapses. Admission is FIFO-ish only; starvation under sustained
//! overload surfaces as timeouts, never as a silent stall.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Token-bucket rate limiter, safe for concurrent use by many fetch attempts.
pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Create a rate limiter with the given capacity and refill rate.
    ///
    /// The bucket starts full, so the first `capacity` acquisitions are
    /// admitted without waiting.
    ///
    /// # Arguments
    /// * `capacity` - Maximum burst size (tokens)
    /// * `refill_per_sec` - Sustained admission rate (tokens per second)
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        let capacity = f64::from(capacity.max(1));
        Self {
            capacity,
            refill_per_sec: refill_per_sec.max(f64::MIN_POSITIVE),
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Bucket capacity (maximum burst size).
    pub fn capacity(&self) -> u32 {
        self.capacity as u32
    }

    /// Sustained refill rate in tokens per second.
    pub fn refill_per_sec(&self) -> f64 {
        self.refill_per_sec
    }

    /// Acquire one token, waiting at most `timeout`.
    ///
    /// Suspends until a token is available. Fails with
    /// [`RateLimitError::AcquireTimeout`] if the deadline elapses first.
    pub async fn acquire(&self, timeout: Duration) -> Result<(), RateLimitError> {
        let deadline = Instant::now() + timeout;

        loop {
            let wait = {
                let mut state = self.state.lock().await;
                self.refill(&mut state);

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return Ok(());
                }

                // Seconds until one token accrues at the sustained rate. For
                // a near-zero refill rate this can exceed what `Duration` can
                // represent, so it stays an f64 until clamped to the deadline.
                (1.0 - state.tokens) / self.refill_per_sec
            };

            let now = Instant::now();
            if now >= deadline {
                return Err(RateLimitError::AcquireTimeout { waited: timeout });
            }

            let sleep_until = Duration::try_from_secs_f64(wait)
                .ok()
                .and_then(|wait| now.checked_add(wait))
                .map_or(deadline, |ready| ready.min(deadline));
            tokio::time::sleep_until(sleep_until).await;

            if Instant::now() >= deadline {
                // One last attempt in case a token accrued exactly at the deadline.
                let mut state = self.state.lock().await;
                self.refill(&mut state);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return Ok(());
                }
                return Err(RateLimitError::AcquireTimeout { waited: timeout });
            }
        }
    }

    /// Credit tokens accrued since the last refill, capped at capacity.
    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
            state.last_refill = now;
        }
    }
}

/// Rate limiter errors
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// No token became available before the caller's deadline
    #[error("no rate limit token available within {waited:?}")]
    AcquireTimeout {
        /// How long the caller was willing to wait
        waited: Duration,
    },
}

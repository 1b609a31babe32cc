//! Retry with exponential backoff and jitter
//!
//! One logical source call is up to `max_attempts` attempts. Transient
//! failures (timeouts, 429/5xx, connection errors) retry with
//! `base_delay * 2^(attempt-1)` plus jitter so concurrently failing fetches
//! do not form synchronized retry storms. Non-transient failures fail
//! immediately. Every attempt first passes through the source's rate
//! limiter; the backoff delay and the rate-limit wait are independent —
//! a single attempt can wait on both.

use crate::scheduler::config::SourceTuning;
use crate::scheduler::rate_limit::RateLimiter;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::FetchErrorKind;

/// Backoff and attempt tuning for one source's retrying client.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum attempts per logical call (≥ 1)
    pub max_attempts: u32,
    /// Initial backoff delay; doubles per attempt
    pub base_delay: Duration,
    /// Backoff delay ceiling
    pub max_delay: Duration,
    /// Deadline for each rate-limiter token acquisition
    pub rate_acquire_timeout: Duration,
}

impl RetryPolicy {
    /// Build a policy from source tuning.
    pub fn from_tuning(tuning: &SourceTuning) -> Self {
        Self {
            max_attempts: tuning.max_attempts.max(1),
            base_delay: tuning.base_delay,
            max_delay: tuning.max_delay,
            rate_acquire_timeout: tuning.rate_acquire_timeout,
        }
    }

    /// Deterministic exponential delay before the retry following `attempt`
    /// (1-indexed): `base_delay * 2^(attempt-1)`, capped at `max_delay`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Backoff delay with uniform jitter in `[0, delay/4]` added.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let delay = self.backoff_delay(attempt);
        let spread = delay / 4;
        if spread.is_zero() {
            return delay;
        }
        let jitter_nanos = rand::thread_rng().gen_range(0..=spread.as_nanos() as u64);
        delay + Duration::from_nanos(jitter_nanos)
    }
}

/// Failure of a single attempt, classified by the caller.
#[derive(Debug, Clone)]
pub enum AttemptError {
    /// Worth retrying: timeout, 429, 5xx, connection error
    Transient(String),
    /// Not worth retrying: other 4xx, malformed response
    Permanent(String),
}

/// Successful call with its attempt count.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSuccess<T> {
    /// The deserialized value
    pub value: T,
    /// Attempt number that succeeded (1-indexed)
    pub attempts: u32,
}

/// Terminal failure of a logical call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RetryError {
    /// Non-transient failure; no retry was attempted
    #[error("permanent failure on attempt {attempts}: {message}")]
    Permanent {
        /// Attempt the failure occurred on
        attempts: u32,
        /// Underlying error text
        message: String,
    },

    /// All attempts failed transiently
    #[error("retries exhausted after {attempts} attempts: {last_message}")]
    Exhausted {
        /// Total attempts made
        attempts: u32,
        /// Error text of the final attempt
        last_message: String,
    },

    /// The rate limiter deadline elapsed before an attempt could be admitted.
    /// Not retried here — the source is overloaded and higher-level policy
    /// (a later batch run) owns any retry.
    #[error("rate limit timeout before attempt {attempts}")]
    RateLimitTimeout {
        /// Attempt that was waiting for admission
        attempts: u32,
    },
}

impl RetryError {
    /// Collapse into the per-source error kind captured in merged records.
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            RetryError::Permanent { .. } => FetchErrorKind::PermanentFetchError,
            RetryError::Exhausted { .. } => FetchErrorKind::RetriesExhausted,
            RetryError::RateLimitTimeout { .. } => FetchErrorKind::RateLimitTimeout,
        }
    }

    /// Attempts actually executed before the call failed. A rate limit
    /// timeout happens before its attempt is admitted, so that attempt
    /// does not count.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Permanent { attempts, .. } | RetryError::Exhausted { attempts, .. } => {
                *attempts
            }
            RetryError::RateLimitTimeout { attempts } => attempts.saturating_sub(1),
        }
    }
}

/// Drive one logical call through admission, attempts, and backoff.
///
/// `operation` is invoked with the 1-indexed attempt number. Each attempt is
/// admitted by `limiter` first; an admission timeout fails the whole call
/// with [`RetryError::RateLimitTimeout`].
pub async fn call_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    limiter: &RateLimiter,
    mut operation: F,
) -> Result<CallSuccess<T>, RetryError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let mut last_message = String::new();

    for attempt in 1..=policy.max_attempts {
        if limiter
            .acquire(policy.rate_acquire_timeout)
            .await
            .is_err()
        {
            warn!(attempt, "rate limiter admission timed out");
            return Err(RetryError::RateLimitTimeout { attempts: attempt });
        }

        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "call succeeded after retry");
                }
                return Ok(CallSuccess { value, attempts: attempt });
            }
            Err(AttemptError::Permanent(message)) => {
                return Err(RetryError::Permanent {
                    attempts: attempt,
                    message,
                });
            }
            Err(AttemptError::Transient(message)) => {
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %message,
                    "transient failure"
                );
                last_message = message;
                if attempt < policy.max_attempts {
                    let delay = policy.jittered_delay(attempt);
                    debug!(backoff_ms = delay.as_millis() as u64, "backing off before retry");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(RetryError::Exhausted {
        attempts: policy.max_attempts,
        last_message,
    })
}

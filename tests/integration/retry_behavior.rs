//! Integration tests for retry behavior under transient and permanent failures

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use wholesale_profit_analyzer::fetch::retry::{
    call_with_retry, AttemptError, RetryError, RetryPolicy,
};
use wholesale_profit_analyzer::fetch::FetchErrorKind;
use wholesale_profit_analyzer::scheduler::RateLimiter;

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(200),
        max_delay: Duration::from_secs(10),
        rate_acquire_timeout: Duration::from_secs(5),
    }
}

fn open_limiter() -> RateLimiter {
    RateLimiter::new(100, 100.0)
}

#[tokio::test(start_paused = true)]
async fn test_success_on_final_attempt_succeeds() {
    let calls = AtomicU32::new(0);
    let result = call_with_retry(&policy(3), &open_limiter(), |attempt| {
        calls.fetch_add(1, Ordering::SeqCst);
        async move {
            if attempt < 3 {
                Err(AttemptError::Transient("503 Service Unavailable".into()))
            } else {
                Ok("payload")
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(result.value, "payload");
    assert_eq!(result.attempts, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_persistent_transient_failure_exhausts_retries() {
    let calls = AtomicU32::new(0);
    let err = call_with_retry(&policy(3), &open_limiter(), |_attempt| {
        calls.fetch_add(1, Ordering::SeqCst);
        async move { Err::<(), _>(AttemptError::Transient("connection reset".into())) }
    })
    .await
    .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    match err {
        RetryError::Exhausted {
            attempts,
            last_message,
        } => {
            assert_eq!(attempts, 3);
            assert_eq!(last_message, "connection reset");
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_permanent_failure_is_not_retried() {
    let calls = AtomicU32::new(0);
    let err = call_with_retry(&policy(5), &open_limiter(), |_attempt| {
        calls.fetch_add(1, Ordering::SeqCst);
        async move { Err::<(), _>(AttemptError::Permanent("404 Not Found".into())) }
    })
    .await
    .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(matches!(err, RetryError::Permanent { attempts: 1, .. }));
    assert_eq!(err.kind(), FetchErrorKind::PermanentFetchError);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_timeout_fails_before_the_operation_runs() {
    // Drain the bucket and make refill far too slow for the admission
    // deadline, so the first attempt never gets a token.
    let limiter = RateLimiter::new(1, 0.001);
    limiter.acquire(Duration::from_millis(1)).await.unwrap();

    let calls = AtomicU32::new(0);
    let mut attempt_policy = policy(3);
    attempt_policy.rate_acquire_timeout = Duration::from_secs(2);

    let err = call_with_retry(&attempt_policy, &limiter, |_attempt| {
        calls.fetch_add(1, Ordering::SeqCst);
        async move { Ok::<_, AttemptError>(()) }
    })
    .await
    .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(matches!(err, RetryError::RateLimitTimeout { attempts: 1 }));
    assert_eq!(err.kind(), FetchErrorKind::RateLimitTimeout);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_delays_separate_attempts() {
    let start = tokio::time::Instant::now();
    let _ = call_with_retry(&policy(3), &open_limiter(), |_attempt| async move {
        Err::<(), _>(AttemptError::Transient("timeout".into()))
    })
    .await;

    // Two backoff sleeps: at least 200ms + 400ms deterministic delay.
    assert!(start.elapsed() >= Duration::from_millis(600));
}

//! Integration tests for per-source rate limiting

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use wholesale_profit_analyzer::scheduler::{RateLimitError, RateLimiter};

#[tokio::test(start_paused = true)]
async fn test_burst_up_to_capacity_is_not_throttled() {
    let limiter = RateLimiter::new(3, 1.0);

    let start = Instant::now();
    for _ in 0..3 {
        limiter.acquire(Duration::from_secs(10)).await.unwrap();
    }

    // The bucket starts full, so the whole burst is admitted immediately.
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_sustained_load_takes_at_least_deficit_over_rate() {
    // N = 5 acquisitions against capacity C = 2 at R = 1 token/s must take
    // at least (N - C) / R = 3 seconds.
    let limiter = RateLimiter::new(2, 1.0);

    let start = Instant::now();
    for _ in 0..5 {
        limiter.acquire(Duration::from_secs(30)).await.unwrap();
    }

    assert!(
        start.elapsed() >= Duration::from_secs(3) - Duration::from_millis(10),
        "5 acquisitions at capacity 2 / 1 per sec finished in {:?}",
        start.elapsed()
    );
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_acquirers_all_admitted_eventually() {
    let limiter = Arc::new(RateLimiter::new(2, 2.0));

    let start = Instant::now();
    let mut handles = Vec::new();
    for _ in 0..6 {
        let limiter = limiter.clone();
        handles.push(tokio::spawn(async move {
            limiter.acquire(Duration::from_secs(30)).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Deficit of 4 tokens at 2 tokens/s: no faster than 2 seconds.
    assert!(start.elapsed() >= Duration::from_secs(2) - Duration::from_millis(10));
}

#[tokio::test(start_paused = true)]
async fn test_starved_acquire_times_out_instead_of_stalling() {
    // Refill so slow that no token accrues within the caller's deadline.
    let limiter = RateLimiter::new(1, 0.01);
    limiter.acquire(Duration::from_millis(1)).await.unwrap();

    let start = Instant::now();
    let err = limiter.acquire(Duration::from_secs(5)).await.unwrap_err();

    assert!(matches!(err, RateLimitError::AcquireTimeout { .. }));
    // The failure arrives at the deadline, not arbitrarily later.
    assert!(start.elapsed() >= Duration::from_secs(5) - Duration::from_millis(10));
    assert!(start.elapsed() < Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn test_idle_bucket_refills_up_to_capacity_only() {
    let limiter = RateLimiter::new(2, 10.0);
    limiter.acquire(Duration::from_millis(1)).await.unwrap();
    limiter.acquire(Duration::from_millis(1)).await.unwrap();

    // A long idle period accrues at most `capacity` tokens.
    tokio::time::sleep(Duration::from_secs(60)).await;

    let start = Instant::now();
    limiter.acquire(Duration::from_secs(1)).await.unwrap();
    limiter.acquire(Duration::from_secs(1)).await.unwrap();
    assert_eq!(start.elapsed(), Duration::ZERO);

    // The third acquisition has to wait for a fresh token.
    limiter.acquire(Duration::from_secs(1)).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(90));
}

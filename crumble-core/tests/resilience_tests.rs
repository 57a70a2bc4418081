//! Retry timing under tokio's paused clock
//!
//! Run with: cargo test -p crumble-core --test resilience_tests

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crumble_addons::AddonClientError;
use crumble_core::config::RetryConfig;
use crumble_core::resilience::RetryPolicy;
use tokio::time::Instant;

fn policy() -> RetryPolicy {
    RetryPolicy::from(&RetryConfig {
        max_attempts: 4,
        initial_delay_ms: 1000,
        max_delay_ms: 10_000,
        factor: 2.0,
        jitter_ms: 0,
    })
}

fn transient() -> AddonClientError {
    AddonClientError::Network("connection reset".to_string())
}

#[tokio::test(start_paused = true)]
async fn test_succeeds_after_backoff() {
    let calls = AtomicU32::new(0);
    let started = Instant::now();

    let value = policy()
        .retry(|| async {
            if calls.fetch_add(1, Ordering::SeqCst) < 3 {
                Err(transient())
            } else {
                Ok("done")
            }
        })
        .await
        .unwrap();

    assert_eq!(value, "done");
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    // 1s + 2s + 4s
    assert_eq!(started.elapsed(), Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_attempts_return_last_error() {
    let calls = AtomicU32::new(0);

    let result: Result<(), _> = policy()
        .retry(|| async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Err(AddonClientError::Network(format!("attempt {n}")))
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    match result {
        Err(AddonClientError::Network(msg)) => assert_eq!(msg, "attempt 3"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_zero_attempts_still_tries_once() {
    let calls = AtomicU32::new(0);
    let policy = RetryPolicy::from(&RetryConfig {
        max_attempts: 0,
        ..RetryConfig::default()
    });

    let result: Result<(), _> = policy
        .retry(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(transient())
        })
        .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

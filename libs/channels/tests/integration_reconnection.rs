//! Integration tests for reconnection strategies
//!
//! These tests verify the backoff sequence and the retry budget.

use channels::traits::reconnect::{ExponentialBackoff, ReconnectionStrategy};
use std::time::Duration;

/// Macro for verbose test output
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

#[test]
fn test_exponential_backoff_full_sequence() {
    verbose_println!("Testing exponential backoff full sequence...");

    let strategy = ExponentialBackoff::new(
        Duration::from_millis(100),
        Duration::from_secs(10),
        Some(5),
    )
    .with_jitter(0.0);

    let expected_delays = [100, 200, 400, 800, 1600];

    for (attempt, &expected_ms) in expected_delays.iter().enumerate() {
        let delay = strategy.next_delay(attempt as u32).unwrap();
        verbose_println!("  Attempt {}: {:?}", attempt, delay);
        assert_eq!(
            delay.as_millis(),
            expected_ms,
            "Unexpected delay at attempt {}",
            attempt
        );
    }

    // Attempt 5 should return None (max_attempts = 5)
    assert!(
        strategy.next_delay(5).is_none(),
        "Should return None after max attempts"
    );
}

#[test]
fn test_exponential_backoff_with_capping() {
    verbose_println!("Testing exponential backoff with capping...");

    let strategy = ExponentialBackoff::new(
        Duration::from_millis(500),
        Duration::from_secs(2), // Cap at 2 seconds
        None,
    )
    .with_jitter(0.0);

    let delays: Vec<u64> = (0..6)
        .map(|i| strategy.next_delay(i).unwrap().as_millis() as u64)
        .collect();

    verbose_println!("  Delays: {:?}", delays);

    assert_eq!(delays[0], 500);
    assert_eq!(delays[1], 1000);
    assert_eq!(delays[2], 2000);
    assert_eq!(delays[3], 2000); // Capped
    assert_eq!(delays[4], 2000); // Capped
    assert_eq!(delays[5], 2000); // Capped
}

#[test]
fn test_default_reconnect_schedule() {
    // 1s base, 30s ceiling, 10 attempts
    let strategy = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(30), Some(10));

    for attempt in 0..10u32 {
        let delay = strategy.next_delay(attempt).unwrap();
        let floor = Duration::from_secs(1u64 << attempt).min(Duration::from_secs(30));
        let roof = Duration::from_millis((1300u64 << attempt).min(30_000));
        verbose_println!("  Attempt {}: {:?}", attempt, delay);
        assert!(delay >= floor && delay <= roof, "attempt {} out of band: {:?}", attempt, delay);
    }

    assert!(strategy.next_delay(10).is_none());
}

#[test]
fn test_jitter_ratio_is_clamped() {
    let strategy = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(60), None)
        .with_jitter(5.0);

    for _ in 0..100 {
        let delay = strategy.delay(0);
        assert!(delay <= Duration::from_millis(200));
    }
}

#[test]
fn test_unlimited_attempts() {
    let strategy = ExponentialBackoff::new(Duration::from_millis(10), Duration::from_secs(1), None);

    assert!(strategy.should_reconnect(0));
    assert!(strategy.should_reconnect(10_000));
    assert_eq!(strategy.next_delay(10_000), Some(Duration::from_secs(1)));
}

//! Latency tracking
//!
//! Stores the most recent probe round trip so readers never block the probe
//! task. Values are kept as microseconds in an atomic; zero means "no sample".

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Last measured round-trip latency of the push connection
#[derive(Debug, Default)]
pub struct LatencyTracker {
    last_us: AtomicU64,
    samples: AtomicU64,
}

impl LatencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful probe
    pub fn record(&self, latency: Duration) {
        // Clamp to 1us so a sub-microsecond loopback still counts as a sample
        let us = (latency.as_micros().min(u64::MAX as u128) as u64).max(1);
        self.last_us.store(us, Ordering::Release);
        self.samples.fetch_add(1, Ordering::AcqRel);
    }

    /// Latest latency, `None` before the first sample or after a reset
    pub fn last(&self) -> Option<Duration> {
        match self.last_us.load(Ordering::Acquire) {
            0 => None,
            us => Some(Duration::from_micros(us)),
        }
    }

    /// Total samples recorded since creation
    pub fn sample_count(&self) -> u64 {
        self.samples.load(Ordering::Acquire)
    }

    /// Forget the last sample (called when the connection drops)
    pub fn reset(&self) {
        self.last_us.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_before_first_sample() {
        let tracker = LatencyTracker::new();
        assert!(tracker.last().is_none());
        assert_eq!(tracker.sample_count(), 0);
    }

    #[test]
    fn test_record_and_reset() {
        let tracker = LatencyTracker::new();
        tracker.record(Duration::from_millis(42));
        assert_eq!(tracker.last(), Some(Duration::from_millis(42)));

        tracker.reset();
        assert!(tracker.last().is_none());
        assert_eq!(tracker.sample_count(), 1);
    }

    #[test]
    fn test_zero_latency_still_counts() {
        let tracker = LatencyTracker::new();
        tracker.record(Duration::ZERO);
        assert_eq!(tracker.last(), Some(Duration::from_micros(1)));
    }
}

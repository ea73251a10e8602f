use rand::Rng;
use std::time::Duration;

/// Default jitter ratio applied on top of the exponential delay
pub const DEFAULT_JITTER_RATIO: f64 = 0.3;

/// Trait for defining reconnection strategies
///
/// Implement this trait to control how long the channel manager waits
/// before each reconnection attempt and when it gives up.
pub trait ReconnectionStrategy: Send + Sync {
    /// Get the delay before the next reconnection attempt
    ///
    /// # Arguments
    /// * `attempt` - The reconnection attempt number (0-indexed)
    ///
    /// # Returns
    /// * `Some(duration)` - Wait this long before reconnecting
    /// * `None` - Stop reconnecting
    fn next_delay(&self, attempt: u32) -> Option<Duration>;

    /// Check if we should continue reconnecting
    fn should_reconnect(&self, attempt: u32) -> bool;
}

/// Exponential backoff with additive random jitter
///
/// `delay(n) = min(base * 2^n + uniform(0, jitter * base * 2^n), ceiling)`
///
/// The same formula drives the request executor's retries and the channel
/// manager's reconnects.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<u32>,
    jitter_ratio: f64,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff strategy
    ///
    /// # Arguments
    /// * `initial_delay` - The base delay for attempt 0
    /// * `max_delay` - The ceiling applied after jitter
    /// * `max_attempts` - Maximum number of attempts (None = unlimited)
    pub fn new(initial_delay: Duration, max_delay: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            initial_delay,
            max_delay,
            max_attempts,
            jitter_ratio: DEFAULT_JITTER_RATIO,
        }
    }

    /// Override the jitter ratio (clamped to 0.0..=1.0)
    pub fn with_jitter(mut self, ratio: f64) -> Self {
        self.jitter_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    /// Delay for `attempt` with a fresh random jitter sample
    pub fn delay(&self, attempt: u32) -> Duration {
        let sample: f64 = rand::thread_rng().gen_range(0.0..1.0);
        self.delay_with_sample(attempt, sample)
    }

    /// Delay for `attempt` with a caller-provided jitter sample in `[0, 1)`
    pub fn delay_with_sample(&self, attempt: u32, sample: f64) -> Duration {
        let base_ms = self.initial_delay.as_millis().min(u64::MAX as u128) as u64;
        let exponential = base_ms.saturating_mul(2u64.saturating_pow(attempt));
        let jitter = (exponential as f64 * self.jitter_ratio * sample.clamp(0.0, 1.0)) as u64;
        let ceiling = self.max_delay.as_millis().min(u64::MAX as u128) as u64;

        Duration::from_millis(exponential.saturating_add(jitter).min(ceiling))
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }
        Some(self.delay(attempt))
    }

    fn should_reconnect(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_within_jitter_band() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(3600), None);

        for attempt in 0..8 {
            let floor = 100u64 * 2u64.pow(attempt);
            for _ in 0..50 {
                let ms = backoff.delay(attempt).as_millis() as u64;
                assert!(ms >= floor, "attempt {}: {} < {}", attempt, ms, floor);
                assert!(ms <= floor * 13 / 10, "attempt {}: {} > {}", attempt, ms, floor * 13 / 10);
            }
        }
    }

    #[test]
    fn test_ceiling_applies_after_jitter() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(1000), Duration::from_millis(30_000), None);

        // 32000..=41600 before the cap
        assert_eq!(backoff.delay_with_sample(5, 0.0), Duration::from_millis(30_000));
        assert_eq!(backoff.delay_with_sample(5, 0.99), Duration::from_millis(30_000));
        assert_eq!(backoff.delay(5), Duration::from_millis(30_000));
    }

    #[test]
    fn test_non_decreasing_up_to_cap() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(250), Duration::from_secs(20), None);

        let mut previous = Duration::ZERO;
        for attempt in 0..12 {
            let delay = backoff.delay(attempt);
            assert!(delay >= previous, "attempt {} went backwards", attempt);
            previous = delay;
        }
    }

    #[test]
    fn test_max_attempts_stops_reconnecting() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(10), Duration::from_secs(1), Some(3));

        assert!(backoff.next_delay(2).is_some());
        assert!(backoff.next_delay(3).is_none());
        assert!(!backoff.should_reconnect(3));
    }

    #[test]
    fn test_overflow_is_saturated() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(60), None);

        assert_eq!(backoff.delay(200), Duration::from_secs(60));
    }
}

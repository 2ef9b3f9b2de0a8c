//! Exponential backoff with jitter for failed reconciliation passes.

use std::time::Duration;

use rand::Rng;

/// Tracks consecutive failures and yields growing retry delays.
#[derive(Debug, Clone)]
pub struct RetryBackoff {
    base: Duration,
    max: Duration,
    attempt: u32,
}

impl RetryBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            attempt: 0,
        }
    }

    /// Delay before the next retry; each call counts as one more failure.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);

        let factor = 2u32.saturating_pow(self.attempt - 1);
        let capped = self.base.saturating_mul(factor).min(self.max);

        // Up to 10% jitter, never past the cap.
        let jitter_range = capped.as_millis() as u64 / 10;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        };

        (capped + Duration::from_millis(jitter)).min(self.max)
    }

    /// Forget past failures after a successful pass.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let mut backoff = RetryBackoff::new(Duration::from_millis(100), Duration::from_millis(1000));

        let first = backoff.next_delay();
        assert!(first >= Duration::from_millis(100) && first < Duration::from_millis(110));

        let second = backoff.next_delay();
        assert!(second >= Duration::from_millis(200));

        for _ in 0..10 {
            assert!(backoff.next_delay() <= Duration::from_millis(1000));
        }
        assert_eq!(backoff.attempts(), 12);
    }

    #[test]
    fn test_reset_starts_over() {
        let mut backoff = RetryBackoff::new(Duration::from_millis(50), Duration::from_secs(5));
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();

        assert_eq!(backoff.attempts(), 0);
        assert!(backoff.next_delay() < Duration::from_millis(100));
    }
}

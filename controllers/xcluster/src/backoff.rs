//! # Fibonacci Backoff
//!
//! Retry delays for failed reconciliation passes. The delay grows along the
//! Fibonacci sequence, which backs off more gently than doubling while still
//! taking pressure off the metal-api and the API server.
//!
//! With the default bounds of 5s and 300s the sequence is
//! 5s, 5s, 10s, 15s, 25s, 40s, 65s, 105s, 170s, 275s, 300s (max).

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Each backoff is the sum of the previous two, capped at `max`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    /// Minimum backoff (for reset)
    min: Duration,
    prev: Duration,
    current: Duration,
    max: Duration,
}

impl FibonacciBackoff {
    /// Create a new Fibonacci backoff bounded by `min` (used for the first two
    /// values) and `max`.
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            prev: Duration::ZERO,
            current: min,
            max,
        }
    }

    /// Get the next backoff duration and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current;

        let next = self.prev.saturating_add(self.current);
        self.prev = self.current;
        self.current = std::cmp::min(next, self.max);

        result
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.prev = Duration::ZERO;
        self.current = self.min;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_fibonacci_backoff_sequence() {
        let mut backoff = FibonacciBackoff::new(secs(5), secs(300));

        let delays: Vec<u64> = (0..11).map(|_| backoff.next_backoff().as_secs()).collect();
        assert_eq!(delays, vec![5, 5, 10, 15, 25, 40, 65, 105, 170, 275, 300]);
    }

    #[test]
    fn test_fibonacci_backoff_max_cap() {
        let mut backoff = FibonacciBackoff::new(secs(1), secs(10));

        assert_eq!(backoff.next_backoff(), secs(1));
        assert_eq!(backoff.next_backoff(), secs(1));
        assert_eq!(backoff.next_backoff(), secs(2));
        assert_eq!(backoff.next_backoff(), secs(3));
        assert_eq!(backoff.next_backoff(), secs(5));
        assert_eq!(backoff.next_backoff(), secs(8));
        assert_eq!(backoff.next_backoff(), secs(10)); // 13 capped
        assert_eq!(backoff.next_backoff(), secs(10));
    }

    #[test]
    fn test_fibonacci_backoff_reset() {
        let mut backoff = FibonacciBackoff::new(secs(5), secs(300));

        backoff.next_backoff();
        backoff.next_backoff();
        assert_eq!(backoff.next_backoff(), secs(10));

        backoff.reset();

        // Should restart from beginning after success
        assert_eq!(backoff.next_backoff(), secs(5));
        assert_eq!(backoff.next_backoff(), secs(5));
        assert_eq!(backoff.next_backoff(), secs(10));
    }
}

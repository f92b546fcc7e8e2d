//! Retry policy with exponential backoff and bounded jitter.

use std::time::Duration;

/// Retry behavior for one logical contract call.
///
/// The legacy call sites passed a bare retry count; [`RetryPolicy`] keeps
/// that shorthand working through `From<u32>`, normalized once at the call
/// boundary instead of branched on per attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts. The engine always makes at least one.
    pub retries: u32,
    /// Initial backoff duration in milliseconds.
    pub base_delay_ms: u64,
    /// Per-attempt request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Lower bound of the uniform jitter factor.
    pub jitter_min: f64,
    /// Upper bound of the uniform jitter factor.
    pub jitter_max: f64,
    /// Cap applied to every computed delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            base_delay_ms: 400,
            timeout_ms: 10_000,
            jitter_min: 0.7,
            jitter_max: 1.3,
            max_delay_ms: 30_000,
        }
    }
}

impl From<u32> for RetryPolicy {
    fn from(retries: u32) -> Self {
        Self {
            retries,
            ..Self::default()
        }
    }
}

impl RetryPolicy {
    /// Effective attempt count: at least one attempt is always made.
    pub fn attempts(&self) -> u32 {
        self.retries.max(1)
    }

    /// Backoff delay before the attempt following `attempt` (1-based).
    ///
    /// `base * 2^(attempt-1)`, scaled by a jitter factor drawn uniformly
    /// from `[jitter_min, jitter_max]`, capped at `max_delay_ms`. The
    /// exponent depends only on the attempt index, not on prior delays.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let backoff = self.base_delay_ms as f64 * 2f64.powi(attempt.saturating_sub(1) as i32);
        let jitter = self.jitter_min + fastrand::f64() * (self.jitter_max - self.jitter_min);
        let delay_ms = (backoff * jitter).floor() as u64;
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }

    /// Per-attempt timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.retries, 3);
        assert_eq!(policy.base_delay_ms, 400);
        assert_eq!(policy.timeout_ms, 10_000);
        assert_eq!(policy.jitter_min, 0.7);
        assert_eq!(policy.jitter_max, 1.3);
        assert_eq!(policy.max_delay_ms, 30_000);
    }

    #[test]
    fn bare_integer_shorthand_keeps_other_defaults() {
        let policy = RetryPolicy::from(5);

        assert_eq!(policy.retries, 5);
        assert_eq!(policy.base_delay_ms, RetryPolicy::default().base_delay_ms);
        assert_eq!(policy.timeout_ms, RetryPolicy::default().timeout_ms);
    }

    #[test]
    fn zero_retries_still_yields_one_attempt() {
        assert_eq!(RetryPolicy::from(0).attempts(), 1);
        assert_eq!(RetryPolicy::from(4).attempts(), 4);
    }

    #[test]
    fn delay_stays_within_jitter_bounds() {
        let policy = RetryPolicy {
            base_delay_ms: 400,
            jitter_min: 0.7,
            jitter_max: 1.3,
            max_delay_ms: 30_000,
            ..RetryPolicy::default()
        };

        // Randomized jitter: sample repeatedly per attempt index.
        for _ in 0..20 {
            for attempt in 1..=4u32 {
                let expected = 400.0 * 2f64.powi(attempt as i32 - 1);
                let delay_ms = policy.delay_for_attempt(attempt).as_millis() as f64;
                assert!(
                    delay_ms >= (expected * 0.7).floor(),
                    "attempt={attempt} delay_ms={delay_ms}"
                );
                assert!(
                    delay_ms <= (expected * 1.3).ceil(),
                    "attempt={attempt} delay_ms={delay_ms}"
                );
            }
        }
    }

    #[test]
    fn delay_never_exceeds_cap() {
        let policy = RetryPolicy {
            base_delay_ms: 10_000,
            max_delay_ms: 15_000,
            ..RetryPolicy::default()
        };

        for _ in 0..20 {
            for attempt in 1..=8u32 {
                assert!(policy.delay_for_attempt(attempt) <= Duration::from_millis(15_000));
            }
        }
    }
}

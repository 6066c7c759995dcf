//! Exponential backoff with optional jitter.
//!
//! `delay = min(base * 2^attempt, max)`, then, with jitter enabled, a
//! uniform draw from `[0, delay)`.

use std::time::Duration;

/// HTTP statuses treated as transient by the provider client.
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Compute the backoff delay for a 0-based retry attempt.
///
/// Large attempts saturate at `max` before the jitter draw, so the
/// computation never overflows.
pub fn delay(attempt: u32, base: Duration, max: Duration, jitter: bool) -> Duration {
    let computed = 2u32
        .checked_pow(attempt)
        .and_then(|factor| base.checked_mul(factor))
        .map_or(max, |d| d.min(max));

    if !jitter {
        return computed;
    }

    let nanos = u64::try_from(computed.as_nanos()).unwrap_or(u64::MAX);
    if nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(fastrand::u64(0..nanos))
}

/// Backoff parameters, fixed per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(32),
            jitter: true,
        }
    }
}

impl BackoffPolicy {
    pub fn delay(&self, attempt: u32) -> Duration {
        delay(attempt, self.base, self.max, self.jitter)
    }
}

/// Retry policy for the provider fetch loop.
///
/// Total attempts = `max_retries + 1`. `timeout` applies to each attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: BackoffPolicy,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: BackoffPolicy::default(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn is_retryable_status(status: u16) -> bool {
        RETRYABLE_STATUSES.contains(&status)
    }

    /// Whether another attempt is allowed after the given 0-based attempt.
    pub fn can_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Upper bound on total latency of one fetch, ignoring jitter savings.
    pub fn worst_case_latency(&self) -> Duration {
        let attempts = self.max_retries.saturating_add(1);
        let timeouts = self.timeout.saturating_mul(attempts);
        (0..self.max_retries)
            .map(|a| delay(a, self.backoff.base, self.backoff.max, false))
            .fold(timeouts, Duration::saturating_add)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_millis(100);
    const MAX: Duration = Duration::from_secs(1);

    #[test]
    fn test_attempt_zero_yields_base() {
        assert_eq!(delay(0, BASE, MAX, false), BASE);
    }

    #[test]
    fn test_exponential_growth_and_cap() {
        assert_eq!(delay(1, BASE, MAX, false), Duration::from_millis(200));
        assert_eq!(delay(2, BASE, MAX, false), Duration::from_millis(400));
        assert_eq!(delay(3, BASE, MAX, false), Duration::from_millis(800));
        assert_eq!(delay(4, BASE, MAX, false), MAX);
    }

    #[test]
    fn test_formula_holds_without_jitter() {
        for attempt in 0..20 {
            let expected = (BASE * 2u32.pow(attempt)).min(MAX);
            assert_eq!(delay(attempt, BASE, MAX, false), expected, "attempt={attempt}");
        }
    }

    #[test]
    fn test_huge_attempt_clamps_without_overflow() {
        assert_eq!(delay(64, BASE, MAX, false), MAX);
        assert_eq!(delay(u32::MAX, BASE, MAX, false), MAX);
        assert!(delay(u32::MAX, BASE, MAX, true) < MAX);
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        for _ in 0..50 {
            for attempt in 0..8 {
                let cap = delay(attempt, BASE, MAX, false);
                let jittered = delay(attempt, BASE, MAX, true);
                assert!(jittered < cap, "attempt={attempt}, jittered={jittered:?}");
            }
        }
    }

    #[test]
    fn test_zero_base_with_jitter_is_zero() {
        assert_eq!(delay(3, Duration::ZERO, MAX, true), Duration::ZERO);
    }

    #[test]
    fn test_retryable_statuses() {
        for status in [429, 500, 502, 503, 504] {
            assert!(RetryPolicy::is_retryable_status(status));
        }
        for status in [200, 400, 401, 404, 501] {
            assert!(!RetryPolicy::is_retryable_status(status));
        }
    }

    #[test]
    fn test_worst_case_latency() {
        let policy = RetryPolicy {
            max_retries: 2,
            backoff: BackoffPolicy { base: BASE, max: MAX, jitter: true },
            timeout: Duration::from_secs(5),
        };
        // 3 timeouts + 100ms + 200ms
        assert_eq!(policy.worst_case_latency(), Duration::from_millis(15_300));
        assert!(policy.can_retry(1));
        assert!(!policy.can_retry(2));
    }
}

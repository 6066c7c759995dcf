//! Monotonic clock capability.
//!
//! The rate limiter and the provider client read time through this trait
//! so tests can drive the sliding window deterministically.

use std::time::Instant;

/// Source of monotonic timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock implementation backed by `std::time::Instant`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

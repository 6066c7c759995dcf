//! Resilience primitives wrapped around every upstream call.
//!
//! - `backoff`: exponential delay with optional full jitter
//! - `rate_limiter`: sliding-window admission control per provider

pub mod backoff;
pub mod rate_limiter;

pub use backoff::{BackoffPolicy, RetryPolicy};
pub use rate_limiter::{RateLimitExceeded, SlidingWindowLimiter};

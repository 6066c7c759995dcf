//! Sliding-window rate limiter.
//!
//! Keeps the timestamps of admitted calls within the trailing window.
//! A call is admitted iff fewer than `limit` timestamps survive pruning.
//! Rejected calls leave no trace in the window.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::clock::Clock;

/// Returned when the window is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("rate limit exceeded, resets in {:.1}s", .reset_in.as_secs_f64())]
pub struct RateLimitExceeded {
    pub remaining: u32,
    pub reset_in: Duration,
}

pub struct SlidingWindowLimiter {
    limit: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
    admitted: Mutex<VecDeque<Instant>>,
}

impl std::fmt::Debug for SlidingWindowLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlidingWindowLimiter")
            .field("limit", &self.limit)
            .field("window", &self.window)
            .finish()
    }
}

impl SlidingWindowLimiter {
    pub fn new(limit: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            limit,
            window,
            clock,
            admitted: Mutex::new(VecDeque::with_capacity(limit as usize)),
        }
    }

    /// Atomically check the window and record `now` on admission.
    ///
    /// `now` is read under the lock so the deque stays in admission order.
    pub fn try_acquire(&self) -> Result<(), RateLimitExceeded> {
        let mut admitted = self.lock();
        let now = self.clock.now();
        self.prune(&mut admitted, now);

        if (admitted.len() as u64) < u64::from(self.limit) {
            admitted.push_back(now);
            return Ok(());
        }

        Err(RateLimitExceeded {
            remaining: 0,
            reset_in: self.reset_in_locked(&admitted, now),
        })
    }

    /// Calls still admissible in the current window.
    pub fn remaining(&self) -> u32 {
        let mut admitted = self.lock();
        let now = self.clock.now();
        self.prune(&mut admitted, now);
        let used = u32::try_from(admitted.len()).unwrap_or(u32::MAX);
        self.limit.saturating_sub(used)
    }

    /// Time until the oldest in-window call falls out of the window.
    pub fn reset_in(&self) -> Duration {
        let mut admitted = self.lock();
        let now = self.clock.now();
        self.prune(&mut admitted, now);
        self.reset_in_locked(&admitted, now)
    }

    fn reset_in_locked(&self, admitted: &VecDeque<Instant>, now: Instant) -> Duration {
        admitted
            .front()
            .map(|oldest| (*oldest + self.window).saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Drop timestamps older than `now - window`.
    fn prune(&self, admitted: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = admitted.front() {
            if now.saturating_duration_since(*oldest) > self.window {
                admitted.pop_front();
            } else {
                break;
            }
        }
    }

    // Every mutation is a single push or pop, so a poisoned deque is still valid.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Instant>> {
        self.admitted.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

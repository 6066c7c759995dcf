//! Rate-limited, retrying fetch against one upstream provider.
//!
//! Every attempt, including retries, must first be admitted by the
//! provider's sliding-window limiter. Transient failures (429/5xx,
//! timeouts, connection errors) are retried with exponential backoff up
//! to `max_retries`; only the final outcome is returned.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::transport::{Transport, TransportError, TransportResponse};
use crate::clock::Clock;
use crate::resilience::{RateLimitExceeded, RetryPolicy, SlidingWindowLimiter};
use crate::types::UpstreamResult;

/// Status reported when retries run out on a timeout.
const TIMEOUT_STATUS: u16 = 504;
/// Status reported for connection failures or unparseable bodies.
const BAD_GATEWAY_STATUS: u16 = 502;

pub struct ProviderClient {
    provider: String,
    transport: Arc<dyn Transport>,
    limiter: SlidingWindowLimiter,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl ProviderClient {
    pub fn new(
        provider: impl Into<String>,
        transport: Arc<dyn Transport>,
        limiter: SlidingWindowLimiter,
        policy: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { provider: provider.into(), transport, limiter, policy, clock }
    }

    pub fn limiter(&self) -> &SlidingWindowLimiter {
        &self.limiter
    }

    /// Fetch `url`, retrying transient failures.
    ///
    /// Returns `Err` only when the limiter denies an attempt; that check is
    /// fail-fast and does not consume a retry. Every upstream outcome,
    /// including final failures, comes back as an `UpstreamResult`.
    pub async fn fetch(&self, url: &str) -> Result<UpstreamResult, RateLimitExceeded> {
        let mut attempt: u32 = 0;

        loop {
            if let Err(denied) = self.limiter.try_acquire() {
                warn!(
                    provider = %self.provider,
                    remaining = denied.remaining,
                    reset_time_sec = denied.reset_in.as_secs_f64(),
                    "rate_limit_exceeded"
                );
                return Err(denied);
            }

            let started = self.clock.now();
            let outcome = self.transport.get(url, self.policy.timeout).await;
            let latency_ms = self.elapsed_ms(started);

            let delay = match outcome {
                Ok(resp) if resp.status == 200 => {
                    debug!(provider = %self.provider, url, latency_ms, attempt, "upstream_ok");
                    return Ok(self.decode_success(url, resp, latency_ms));
                }
                Ok(resp)
                    if RetryPolicy::is_retryable_status(resp.status) && self.policy.can_retry(attempt) =>
                {
                    let delay = self.policy.backoff.delay(attempt);
                    info!(
                        provider = %self.provider,
                        status_code = resp.status,
                        retry_count = attempt,
                        delay_ms = duration_ms(delay),
                        "upstream_error_retry"
                    );
                    delay
                }
                Ok(resp) => {
                    return Ok(self.failure(
                        url,
                        resp.status,
                        format!("API error: {}", resp.status),
                        latency_ms,
                    ));
                }
                Err(err) if self.policy.can_retry(attempt) => {
                    let delay = self.policy.backoff.delay(attempt);
                    info!(
                        provider = %self.provider,
                        retry_count = attempt,
                        delay_ms = duration_ms(delay),
                        error = %err,
                        "upstream_timeout_retry"
                    );
                    delay
                }
                Err(TransportError::Timeout(_)) => {
                    return Ok(self.failure(
                        url,
                        TIMEOUT_STATUS,
                        "Request timeout".to_string(),
                        duration_ms(self.policy.timeout),
                    ));
                }
                Err(TransportError::Connect(reason)) => {
                    return Ok(self.failure(
                        url,
                        BAD_GATEWAY_STATUS,
                        format!("Connection failed: {reason}"),
                        latency_ms,
                    ));
                }
            };

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Release the transport's connection pool.
    pub fn shutdown(&self) {
        self.transport.close();
    }

    fn decode_success(&self, url: &str, resp: TransportResponse, latency_ms: u64) -> UpstreamResult {
        match serde_json::from_str::<Value>(&resp.body) {
            Ok(data) => UpstreamResult {
                data,
                status_code: resp.status,
                latency_ms,
                upstream_url: url.to_string(),
            },
            Err(e) => {
                warn!(provider = %self.provider, url, error = %e, "upstream_invalid_json");
                self.failure(url, BAD_GATEWAY_STATUS, "Invalid JSON from upstream".to_string(), latency_ms)
            }
        }
    }

    fn failure(&self, url: &str, status: u16, message: String, latency_ms: u64) -> UpstreamResult {
        UpstreamResult {
            data: json!({ "error": message }),
            status_code: status,
            latency_ms,
            upstream_url: url.to_string(),
        }
    }

    fn elapsed_ms(&self, started: Instant) -> u64 {
        duration_ms(self.clock.now().saturating_duration_since(started))
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

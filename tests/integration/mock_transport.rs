//! Scripted transport for integration testing.
//!
//! Replays a fixed list of outcomes (repeating the last one forever) and
//! records every URL it was asked for.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use openliga_proxy::clock::SystemClock;
use openliga_proxy::config::AppConfig;
use openliga_proxy::engine::Pipeline;
use openliga_proxy::providers::build_provider_with;
use openliga_proxy::providers::transport::{Transport, TransportError, TransportResponse};
use openliga_proxy::server::{build_router, ProxyState};

pub type Outcome = Result<TransportResponse, TransportError>;

pub struct MockTransport {
    script: Mutex<VecDeque<Outcome>>,
    urls: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new(script: Vec<Outcome>) -> Arc<Self> {
        Arc::new(Self { script: Mutex::new(script.into()), urls: Mutex::new(Vec::new()) })
    }

    /// Always answer 200 with `body`.
    pub fn ok(body: &str) -> Arc<Self> {
        Self::new(vec![Ok(TransportResponse { status: 200, body: body.to_string() })])
    }

    pub fn calls(&self) -> usize {
        self.urls.lock().unwrap().len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &str, _timeout: Duration) -> Outcome {
        self.urls.lock().unwrap().push(url.to_string());
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap()
        }
    }
}

/// Config with deterministic backoff and the given retry and rate limits.
pub fn test_config(max_retries: u32, limit: u32) -> AppConfig {
    let toml = format!(
        r#"
        [provider]
        base_url = "https://api.openligadb.de"
        timeout_secs = 5

        [rate_limits.openliga]
        limit = {limit}
        window_secs = 60

        [backoff]
        base_delay_secs = 0.1
        max_delay_secs = 1.0
        max_retries = {max_retries}
        jitter = false
        "#
    );
    AppConfig::from_toml_str(&toml).unwrap()
}

pub fn pipeline(cfg: &AppConfig, transport: Arc<MockTransport>) -> Arc<Pipeline> {
    let provider = build_provider_with(cfg, transport, Arc::new(SystemClock));
    Arc::new(Pipeline::new(provider).unwrap())
}

pub fn router(cfg: &AppConfig, transport: Arc<MockTransport>) -> axum::Router {
    let state = Arc::new(ProxyState::new(pipeline(cfg, transport), cfg.logging.body_limit));
    build_router(state)
}

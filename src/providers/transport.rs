//! Outbound HTTP transport.
//!
//! The provider client only needs `get(url, timeout)`. The default
//! implementation wraps one lazily built `reqwest::Client`, i.e. one
//! connection pool per provider.

use async_trait::async_trait;
use reqwest::Client;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// Raw upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),
}

/// Minimal HTTP GET capability.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> Result<TransportResponse, TransportError>;

    /// Release pooled connections. Later calls may rebuild the pool.
    fn close(&self) {}
}

// ---------------------------------------------------------------------------
// reqwest implementation
// ---------------------------------------------------------------------------

pub struct ReqwestTransport {
    user_agent: String,
    client: Mutex<Option<Client>>,
}

impl ReqwestTransport {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self { user_agent: user_agent.into(), client: Mutex::new(None) }
    }

    /// Whether the pool has been built.
    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    /// Get or build the shared client. `Client` is an `Arc` internally,
    /// so the clone shares the same pool.
    fn client(&self) -> Result<Client, TransportError> {
        let mut slot = self.lock();
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }

        debug!(user_agent = %self.user_agent, "Building upstream HTTP client");
        let client = Client::builder()
            .user_agent(self.user_agent.clone())
            .build()
            .map_err(|e| TransportError::Connect(format!("failed to build HTTP client: {e}")))?;
        *slot = Some(client.clone());
        Ok(client)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Client>> {
        self.client.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str, timeout: Duration) -> Result<TransportResponse, TransportError> {
        let client = self.client()?;

        let resp = client.get(url).timeout(timeout).send().await.map_err(|e| classify(e, timeout))?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| classify(e, timeout))?;

        Ok(TransportResponse { status, body })
    }

    fn close(&self) {
        if self.lock().take().is_some() {
            debug!("Upstream HTTP client released");
        }
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout)
    } else {
        TransportError::Connect(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

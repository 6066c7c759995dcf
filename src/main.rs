//! openliga-proxy entry point.
//!
//! Loads configuration, initialises structured logging, builds the
//! provider and pipeline once, and serves HTTP until Ctrl-C.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use openliga_proxy::clock::SystemClock;
use openliga_proxy::config::{AppConfig, LogFormat};
use openliga_proxy::engine::Pipeline;
use openliga_proxy::server::{self, ProxyState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = AppConfig::load_default()?;
    init_logging(&cfg);

    let policy = cfg.retry_policy();
    info!(
        provider = ?cfg.provider.kind,
        base_url = %cfg.provider.base_url,
        max_retries = policy.max_retries,
        timeout_secs = cfg.provider.timeout_secs,
        worst_case_latency_secs = policy.worst_case_latency().as_secs_f64(),
        "openliga-proxy starting up"
    );

    let pipeline = Pipeline::from_config(&cfg, Arc::new(SystemClock))
        .context("Failed to build operation registry")?;
    let pipeline = Arc::new(pipeline);
    let state = Arc::new(ProxyState::new(pipeline.clone(), cfg.logging.body_limit));

    let served = server::serve(&cfg.bind_addr(), state).await;

    pipeline.shutdown();
    info!("openliga-proxy shut down");
    served
}

/// JSON output when `logging.format = "json"` or `PROXY_LOG_JSON` is set.
/// `RUST_LOG` overrides `logging.level`.
fn init_logging(cfg: &AppConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.logging.level));

    let json_logging =
        cfg.logging.format == LogFormat::Json || std::env::var("PROXY_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}

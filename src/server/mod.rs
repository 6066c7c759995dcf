//! HTTP surface: axum router, audit middleware and server startup.
//!
//! `POST /proxy/execute` runs the pipeline; `GET /health` is a liveness
//! probe. CORS is permissive for browser callers.

pub mod audit;
pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::engine::Pipeline;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct ProxyState {
    pub pipeline: Arc<Pipeline>,
    /// Max body bytes echoed into `inbound_request` logs.
    pub body_limit: usize,
}

impl ProxyState {
    pub fn new(pipeline: Arc<Pipeline>, body_limit: usize) -> Self {
        Self { pipeline, body_limit }
    }
}

pub type AppState = Arc<ProxyState>;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/proxy/execute", post(routes::execute))
        .route("/health", get(routes::health))
        .layer(middleware::from_fn_with_state(state.clone(), audit::audit))
        .layer(cors)
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(addr: &str, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr, "openliga-proxy listening on http://{addr}");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "Could not install Ctrl-C handler, running until killed");
            std::future::pending::<()>().await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

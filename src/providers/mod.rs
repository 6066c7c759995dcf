//! Upstream sports-data providers.
//!
//! Defines the `SportsProvider` trait (one method per upstream
//! capability) and the fetch machinery every provider shares:
//! - `transport`: HTTP GET capability (reqwest by default)
//! - `client`: rate-limited, retrying fetch loop
//! - `openligadb`: the OpenLigaDB adapter

pub mod client;
pub mod openligadb;
pub mod transport;

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::resilience::RateLimitExceeded;
use crate::types::UpstreamResult;

use openligadb::OpenLigaDbProvider;
use transport::{ReqwestTransport, Transport};

/// Every upstream outcome is an `UpstreamResult`; only admission denial
/// is an error at this layer.
pub type ProviderResult = Result<UpstreamResult, RateLimitExceeded>;

/// Abstraction over sports-data providers.
///
/// Parameters a caller leaves out are passed as `None`; the provider
/// decides what that means (e.g. "current season").
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SportsProvider: Send + Sync {
    /// Provider identifier, used for rate-limit config and response metadata.
    fn name(&self) -> &'static str;

    async fn list_leagues(&self) -> ProviderResult;

    async fn get_league_matches(&self, league_id: u64, season: Option<u64>) -> ProviderResult;

    async fn get_team(&self, team_id: u64) -> ProviderResult;

    async fn get_matches_between_teams(&self, team_id1: u64, team_id2: u64) -> ProviderResult;

    /// Release pooled connections.
    fn shutdown(&self);
}

/// Known provider implementations, selected in `[provider] kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenLigaDb,
}

/// Build the configured provider with the default reqwest transport.
pub fn build_provider(cfg: &AppConfig, clock: Arc<dyn Clock>) -> Arc<dyn SportsProvider> {
    let user_agent = format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(user_agent));
    build_provider_with(cfg, transport, clock)
}

/// Build the configured provider over an explicit transport.
pub fn build_provider_with(
    cfg: &AppConfig,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
) -> Arc<dyn SportsProvider> {
    match cfg.provider.kind {
        ProviderKind::OpenLigaDb => Arc::new(OpenLigaDbProvider::from_config(cfg, transport, clock)),
    }
}

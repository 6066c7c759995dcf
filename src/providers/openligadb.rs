//! OpenLigaDB adapter.
//!
//! API: `https://api.openligadb.de/` (public, no auth).
//! - `GET /api/getavailableleagues`
//! - `GET /api/getmatchdata/{leagueId}[/{season}]`
//! - `GET /api/getteam/{teamId}`
//! - `GET /api/getmatchdata/{teamId1}/{teamId2}`
//!
//! All calls go through one `ProviderClient`, so they share the
//! provider's rate-limit window and connection pool.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::client::ProviderClient;
use super::transport::Transport;
use super::{ProviderResult, SportsProvider};
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::resilience::SlidingWindowLimiter;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const PROVIDER_NAME: &str = "openliga";
pub const DEFAULT_BASE_URL: &str = "https://api.openligadb.de";

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

pub struct OpenLigaDbProvider {
    base_url: String,
    client: ProviderClient,
}

impl OpenLigaDbProvider {
    pub fn new(base_url: &str, client: ProviderClient) -> Self {
        Self { base_url: base_url.trim_end_matches('/').to_string(), client }
    }

    pub fn from_config(cfg: &AppConfig, transport: Arc<dyn Transport>, clock: Arc<dyn Clock>) -> Self {
        let limits = cfg.rate_limit_for(PROVIDER_NAME);
        let limiter = SlidingWindowLimiter::new(
            limits.limit,
            Duration::from_secs(limits.window_secs),
            clock.clone(),
        );
        let client = ProviderClient::new(PROVIDER_NAME, transport, limiter, cfg.retry_policy(), clock);
        Self::new(&cfg.provider.base_url, client)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{path}", self.base_url)
    }

    async fn fetch(&self, path: &str) -> ProviderResult {
        let url = self.url(path);
        debug!(url = %url, "Fetching OpenLigaDB");
        self.client.fetch(&url).await
    }
}

#[async_trait]
impl SportsProvider for OpenLigaDbProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn list_leagues(&self) -> ProviderResult {
        self.fetch("getavailableleagues").await
    }

    /// Without a season, OpenLigaDB returns the league's current season.
    async fn get_league_matches(&self, league_id: u64, season: Option<u64>) -> ProviderResult {
        match season {
            Some(season) => self.fetch(&format!("getmatchdata/{league_id}/{season}")).await,
            None => self.fetch(&format!("getmatchdata/{league_id}")).await,
        }
    }

    async fn get_team(&self, team_id: u64) -> ProviderResult {
        self.fetch(&format!("getteam/{team_id}")).await
    }

    async fn get_matches_between_teams(&self, team_id1: u64, team_id2: u64) -> ProviderResult {
        self.fetch(&format!("getmatchdata/{team_id1}/{team_id2}")).await
    }

    fn shutdown(&self) {
        self.client.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Configuration loading from TOML.
//!
//! Reads `config.toml` (or the file named by `PROXY_CONFIG`) and
//! deserializes into strongly-typed structs. Every section has defaults,
//! so a partial file is valid. Retry and rate-limit parameters are fixed
//! for the life of the process.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::time::Duration;
use tracing::warn;

use crate::providers::openligadb::DEFAULT_BASE_URL;
use crate::providers::ProviderKind;
use crate::resilience::{BackoffPolicy, RetryPolicy};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "PROXY_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    /// Keyed by provider name, e.g. `[rate_limits.openliga]`.
    pub rate_limits: HashMap<String, RateLimitConfig>,
    pub backoff: BackoffConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8000 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub base_url: String,
    /// Per-attempt upstream timeout.
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::OpenLigaDb,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub limit: u32,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { limit: 60, window_secs: 60 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BackoffConfig {
    pub base_delay_secs: f64,
    pub max_delay_secs: f64,
    pub max_retries: u32,
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self { base_delay_secs: 1.0, max_delay_secs: 32.0, max_retries: 3, jitter: true }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
    /// Max bytes of request body echoed into audit logs.
    pub body_limit: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Pretty, body_limit: 1024 }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml_str(&contents).with_context(|| format!("Invalid config file: {path}"))
    }

    /// Load from the path in `PROXY_CONFIG`, falling back to `config.toml`.
    pub fn load_default() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(&path)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the proxy misbehave at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            bail!("server.port must be non-zero");
        }
        if self.provider.base_url.trim().is_empty() {
            bail!("provider.base_url must not be empty");
        }
        if self.provider.timeout_secs == 0 {
            bail!("provider.timeout_secs must be greater than zero");
        }
        let b = &self.backoff;
        if !b.base_delay_secs.is_finite() || b.base_delay_secs < 0.0 {
            bail!("backoff.base_delay_secs must be a non-negative number");
        }
        if !b.max_delay_secs.is_finite() || b.max_delay_secs < b.base_delay_secs {
            bail!("backoff.max_delay_secs must be >= backoff.base_delay_secs");
        }
        for (name, secs) in [("base_delay_secs", b.base_delay_secs), ("max_delay_secs", b.max_delay_secs)] {
            if let Err(e) = Duration::try_from_secs_f64(secs) {
                bail!("backoff.{name} is out of range: {e}");
            }
        }
        for (name, limits) in &self.rate_limits {
            if limits.window_secs == 0 {
                bail!("rate_limits.{name}.window_secs must be greater than zero");
            }
        }
        Ok(())
    }

    /// Rate-limit settings for a provider, with a logged fallback.
    pub fn rate_limit_for(&self, provider: &str) -> RateLimitConfig {
        match self.rate_limits.get(provider) {
            Some(limits) => *limits,
            None => {
                let fallback = RateLimitConfig::default();
                warn!(
                    provider,
                    limit = fallback.limit,
                    window_secs = fallback.window_secs,
                    "No rate limit configured for provider, using default"
                );
                fallback
            }
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.backoff.max_retries,
            backoff: BackoffPolicy {
                base: Duration::from_secs_f64(self.backoff.base_delay_secs),
                max: Duration::from_secs_f64(self.backoff.max_delay_secs),
                jitter: self.backoff.jitter,
            },
            timeout: Duration::from_secs(self.provider.timeout_secs),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [server]
        host = "127.0.0.1"
        port = 9000

        [provider]
        kind = "openligadb"
        base_url = "https://api.openligadb.de"
        timeout_secs = 5

        [rate_limits.openliga]
        limit = 30
        window_secs = 60

        [backoff]
        base_delay_secs = 0.5
        max_delay_secs = 8.0
        max_retries = 2
        jitter = false

        [logging]
        level = "debug"
        format = "json"
        body_limit = 256
    "#;

    #[test]
    fn test_parse_full_config() {
        let cfg = AppConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(cfg.bind_addr(), "127.0.0.1:9000");
        assert_eq!(cfg.provider.timeout_secs, 5);
        assert_eq!(cfg.rate_limit_for("openliga"), RateLimitConfig { limit: 30, window_secs: 60 });
        assert_eq!(cfg.logging.format, LogFormat::Json);
        assert_eq!(cfg.logging.body_limit, 256);

        let policy = cfg.retry_policy();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.backoff.base, Duration::from_millis(500));
        assert_eq!(policy.backoff.max, Duration::from_secs(8));
        assert!(!policy.backoff.jitter);
        assert_eq!(policy.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let cfg = AppConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.server.port, 8000);
        assert_eq!(cfg.provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.backoff.max_retries, 3);
        assert_eq!(cfg.rate_limit_for("openliga"), RateLimitConfig::default());
    }

    #[test]
    fn test_rejects_inverted_backoff() {
        let err = AppConfig::from_toml_str("[backoff]\nbase_delay_secs = 4.0\nmax_delay_secs = 1.0\n")
            .unwrap_err();
        assert!(format!("{err:#}").contains("max_delay_secs"));
    }

    #[test]
    fn test_rejects_out_of_range_delay() {
        let err = AppConfig::from_toml_str("[backoff]\nbase_delay_secs = 1.0\nmax_delay_secs = 1e20\n")
            .unwrap_err();
        assert!(format!("{err:#}").contains("max_delay_secs"));

        let cfg = AppConfig::from_toml_str("[backoff]\nbase_delay_secs = 1.0\nmax_delay_secs = 1e9\n").unwrap();
        assert_eq!(cfg.retry_policy().backoff.max, Duration::from_secs(1_000_000_000));
    }

    #[test]
    fn test_rejects_zero_window() {
        let toml = "[rate_limits.openliga]\nlimit = 5\nwindow_secs = 0\n";
        assert!(AppConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_rejects_zero_timeout() {
        assert!(AppConfig::from_toml_str("[provider]\ntimeout_secs = 0\n").is_err());
    }

    #[test]
    fn test_load_missing_file_has_context() {
        let err = AppConfig::load("does-not-exist.toml").unwrap_err();
        assert!(err.to_string().contains("does-not-exist.toml"));
    }

    #[test]
    fn test_load_repo_config() {
        // config.toml lives at the crate root; cargo runs tests from there.
        if let Ok(cfg) = AppConfig::load(DEFAULT_CONFIG_PATH) {
            assert!(cfg.rate_limits.contains_key("openliga"));
            assert!(cfg.backoff.max_delay_secs >= cfg.backoff.base_delay_secs);
        }
    }
}

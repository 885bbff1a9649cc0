use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::aggregator::AggregateOptions;

/// Configuration for the playlist timer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API client settings
    pub api: ApiConfig,

    /// Duration resolution settings
    pub resolver: ResolverConfig,

    /// Retry/backoff settings shared by pagination and batch resolution
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// YouTube Data API key; the YOUTUBE_API_KEY environment variable
    /// overrides the file value
    pub api_key: Option<String>,

    /// Per-request HTTP timeout in seconds
    pub request_timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            request_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Maximum video ids per metadata request
    pub batch_size: usize,

    /// Concurrent metadata batches in flight (1 = sequential)
    pub concurrency: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total tries per page/batch before giving up
    pub attempts: u32,

    /// Initial backoff delay in milliseconds, doubled per failed attempt
    pub base_delay_ms: u64,

    /// Backoff delay ceiling in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 8000,
        }
    }
}

impl Config {
    /// Load configuration from the first readable file among the usual
    /// locations, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "playlist-timer.toml",
            "config/playlist-timer.toml",
            "/etc/playlist-timer/config.toml",
        ];

        for path in &config_paths {
            if Path::new(path).exists() {
                let mut config = Self::load_from(Path::new(path))?;
                config.apply_env();
                tracing::info!("📄 Loaded configuration from: {}", path);
                return Ok(config);
            }
        }

        let mut config = Self::default();
        config.apply_env();
        if config.api.api_key.is_some() {
            return Ok(config);
        }
        Err(anyhow!("no configuration file found"))
    }

    /// Load configuration from a specific TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read {}: {}", path.display(), e))?;
        toml::from_str(&raw).map_err(|e| anyhow!("failed to parse {}: {}", path.display(), e))
    }

    fn apply_env(&mut self) {
        self.apply_api_key_override(std::env::var("YOUTUBE_API_KEY").ok());
    }

    /// Environment value wins over the file value; empty values are ignored.
    fn apply_api_key_override(&mut self, key: Option<String>) {
        if let Some(key) = key {
            if !key.is_empty() {
                self.api.api_key = Some(key);
            }
        }
    }

    /// Project the file-level settings onto one aggregation run.
    pub fn aggregate_options(&self, timeout: Option<Duration>) -> AggregateOptions {
        AggregateOptions {
            batch_size: self.resolver.batch_size,
            resolver_concurrency: self.resolver.concurrency,
            retry_attempts: self.retry.attempts,
            retry_base_delay: Duration::from_millis(self.retry.base_delay_ms),
            retry_max_delay: Duration::from_millis(self.retry.max_delay_ms),
            timeout,
        }
    }
}

//! Configuration types for kumo
//!
//! The configuration is a TOML file loaded once at startup. Its path comes
//! from the `KUMO_CONFIG_FILE` environment variable and defaults to
//! `config.toml` in the working directory.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path, time::Duration};

/// Environment variable overriding the configuration file path
pub const CONFIG_FILE_ENV: &str = "KUMO_CONFIG_FILE";

/// Configuration file used when [`CONFIG_FILE_ENV`] is unset
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Main configuration for kumo
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Concurrency and HTTP settings
    pub app: AppConfig,

    /// YouTube Data API access
    pub youtube: YouTubeConfig,

    /// Roster, archive search and queue endpoints
    pub archive: ArchiveConfig,

    /// In-memory cache policy
    #[serde(default)]
    pub cache: CacheConfig,

    /// Named cron schedules; each channel is processed on firings of its preset
    #[serde(default)]
    pub cron_presets: HashMap<String, String>,
}

/// Concurrency and HTTP settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Maximum channels processed at once
    pub max_concurrency: usize,

    /// Maximum enqueue requests in flight at once (default: `max_concurrency`)
    #[serde(default)]
    pub item_concurrency: Option<usize>,

    /// Per-request HTTP timeout in seconds (default: 30)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

/// YouTube Data API access
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct YouTubeConfig {
    /// API key sent with every playlist request
    pub api_key: String,

    /// Base URL of the Data API (default: "https://www.googleapis.com/youtube/v3")
    #[serde(default = "default_youtube_api_base_url")]
    pub api_base_url: String,
}

/// Roster, archive search and queue endpoints
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Tab-separated channel roster
    pub channels_list_url: String,

    /// Archive base URL; searches go to `{archive_url}/api/v1/search`
    pub archive_url: String,

    /// Enqueue sink receiving one PUT per missing video
    pub queue_url: String,
}

/// In-memory cache policy
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long a fetched roster is reused, in seconds (default: 300)
    #[serde(default = "default_roster_ttl", with = "duration_serde")]
    pub roster_ttl: Duration,

    /// Maximum age of a playlist's last full walk before another one is
    /// required, in seconds (default: 72 hours)
    #[serde(default = "default_full_fetch_interval", with = "duration_serde")]
    pub full_fetch_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            roster_ttl: default_roster_ttl(),
            full_fetch_interval: default_full_fetch_interval(),
        }
    }
}

impl AppConfig {
    /// Size of the item-level permit pool
    pub fn item_concurrency(&self) -> usize {
        self.item_concurrency.unwrap_or(self.max_concurrency)
    }
}

impl Config {
    /// Load the configuration from `KUMO_CONFIG_FILE`, or `config.toml` when unset
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_FILE_ENV)
            .ok()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());
        Self::from_file(path)
    }

    /// Load and validate the configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {e}", path.display()),
            key: None,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate the configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).map_err(|e| Error::Config {
            message: e.to_string(),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the settings the scheduler cannot run without
    pub fn validate(&self) -> Result<()> {
        if self.app.max_concurrency == 0 {
            return Err(Error::config(
                "must be greater than zero",
                "app.max_concurrency",
            ));
        }
        if self.app.item_concurrency == Some(0) {
            return Err(Error::config(
                "must be greater than zero",
                "app.item_concurrency",
            ));
        }
        if self.youtube.api_key.trim().is_empty() {
            return Err(Error::config("must not be empty", "youtube.api_key"));
        }

        for (key, value) in [
            ("youtube.api_base_url", &self.youtube.api_base_url),
            ("archive.channels_list_url", &self.archive.channels_list_url),
            ("archive.archive_url", &self.archive.archive_url),
            ("archive.queue_url", &self.archive.queue_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| Error::config(format!("invalid URL {value:?}: {e}"), key))?;
        }

        if self.cron_presets.is_empty() {
            return Err(Error::config(
                "at least one preset is required",
                "cron_presets",
            ));
        }
        for (name, expression) in &self.cron_presets {
            if expression.trim().is_empty() {
                return Err(Error::config(
                    "schedule expression must not be empty",
                    format!("cron_presets.{name}"),
                ));
            }
        }

        Ok(())
    }
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_youtube_api_base_url() -> String {
    "https://www.googleapis.com/youtube/v3".to_string()
}

fn default_roster_ttl() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_full_fetch_interval() -> Duration {
    Duration::from_secs(72 * 60 * 60)
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

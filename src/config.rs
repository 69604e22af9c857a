//! Runtime configuration.
//!
//! Values come from an optional TOML file, then environment overrides. The
//! catalog credential may be absent at load time: every catalog call then
//! fails with a configuration error instead of the process refusing to start.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::retry::RetryPolicy;
use crate::error::{CatalogError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
    pub retry: RetryConfig,
    pub hydration: HydrationConfig,
    pub curation: CurationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub language: String,
    pub region: String,
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            language: "en-US".to_string(),
            region: "US".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub interval_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 20,
            interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 200 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 4000,
            max_jitter_ms: 250,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            max_jitter: Duration::from_millis(self.max_jitter_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HydrationConfig {
    pub concurrency: usize,
}

impl Default for HydrationConfig {
    fn default() -> Self {
        Self { concurrency: 8 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurationConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub synopsis_limit: usize,
    pub max_candidates: usize,
    pub timeout_secs: u64,
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            synopsis_limit: 280,
            max_candidates: 60,
            timeout_secs: 10,
        }
    }
}

impl Config {
    /// Default config file location: `<config dir>/cinescout/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cinescout").join("config.toml"))
    }

    /// Load configuration.
    ///
    /// Path resolution: explicit `path`, then `CINESCOUT_CONFIG`, then
    /// [`Config::default_path`]. A missing file yields defaults; a present
    /// but malformed file is an error. Environment overrides always apply.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("CINESCOUT_CONFIG").ok().map(PathBuf::from))
            .or_else(Self::default_path);

        let mut config = match path {
            Some(ref p) if p.exists() => Self::from_file(p)?,
            Some(ref p) => {
                debug!("No config file at {}, using defaults", p.display());
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CatalogError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Config = toml::from_str(&text).map_err(|e| {
            CatalogError::Config(format!("invalid config {}: {e}", path.display()))
        })?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply environment overrides through `lookup` (blank values ignored).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("TMDB_API_KEY") {
            self.catalog.api_key = Some(key);
        }
        if let Some(url) = get("TMDB_BASE_URL") {
            self.catalog.base_url = url;
        }
        if let Some(url) = get("CINESCOUT_CURATION_URL") {
            self.curation.endpoint = Some(url);
        }
        if let Some(key) = get("CINESCOUT_CURATION_KEY") {
            self.curation.api_key = Some(key);
        }
    }

    pub fn rate_limit_interval(&self) -> Duration {
        Duration::from_millis(self.rate_limit.interval_ms)
    }
}

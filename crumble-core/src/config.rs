use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub addons: AddonsConfig,
    pub cache: CacheConfig,
    pub retry: RetryConfig,
    pub progress: ProgressConfig,
    pub tmdb: TmdbConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

/// Addon registry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AddonsConfig {
    /// Path of the `addons.json` list
    pub config_path: String,
    /// Addons whose id (or any dot-separated id segment) starts with this
    /// prefix are the primary metadata source
    pub primary_prefix: String,
    pub request_timeout_seconds: u64,
    /// Serve the built-in sample catalog when every addon comes back empty
    pub fallback_enabled: bool,
}

impl Default for AddonsConfig {
    fn default() -> Self {
        Self {
            config_path: "./addons.json".to_string(),
            primary_prefix: "tmdb".to_string(),
            request_timeout_seconds: 15,
            fallback_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_seconds: u64,
    pub max_entries: usize,
    pub sweep_interval_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 3600, // 1 hour
            max_entries: 1024,
            sweep_interval_seconds: 300,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

/// Exponential backoff settings for addon requests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub factor: f32,
    /// Upper bound (exclusive) of the random jitter added to each delay
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay_ms: 1000,
            max_delay_ms: 10_000,
            factor: 2.0,
            jitter_ms: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    pub path: String,
    /// Fraction watched above which an entry counts as completed
    pub completion_threshold: f64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            path: "./progress.json".to_string(),
            completion_threshold: 0.9,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbConfig {
    /// Sent as `apikey` to the primary addon
    pub api_key: Option<String>,
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        // Load config file if provided
        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // Override with environment variables (CRUMBLE_CACHE__TTL_SECONDS, etc.)
        builder = builder.add_source(
            Environment::with_prefix("CRUMBLE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Check the configuration for values that would make the engine misbehave.
    ///
    /// Returns every problem found rather than stopping at the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            errors.push(format!(
                "logging.format must be 'json' or 'pretty', got '{}'",
                self.logging.format
            ));
        }
        if self.addons.config_path.trim().is_empty() {
            errors.push("addons.config_path must not be empty".to_string());
        }
        if self.addons.request_timeout_seconds == 0 {
            errors.push("addons.request_timeout_seconds must be greater than 0".to_string());
        }
        if self.cache.max_entries == 0 {
            errors.push("cache.max_entries must be greater than 0".to_string());
        }
        if self.cache.sweep_interval_seconds == 0 {
            errors.push("cache.sweep_interval_seconds must be greater than 0".to_string());
        }
        if self.retry.max_attempts == 0 {
            errors.push("retry.max_attempts must be at least 1".to_string());
        }
        if !(self.retry.factor.is_finite() && self.retry.factor >= 1.0) {
            errors.push(format!("retry.factor must be >= 1.0, got {}", self.retry.factor));
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            errors.push("retry.initial_delay_ms must not exceed retry.max_delay_ms".to_string());
        }
        let threshold = self.progress.completion_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            errors.push(format!(
                "progress.completion_threshold must be in (0, 1], got {threshold}"
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Request timeout for addon HTTP calls
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.addons.request_timeout_seconds)
    }

    /// TMDB API key, ignoring blank values
    #[must_use]
    pub fn tmdb_api_key(&self) -> Option<&str> {
        self.tmdb
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

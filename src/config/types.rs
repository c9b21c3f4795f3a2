use serde::Deserialize;
use std::time::Duration;

/// Base URL of the hosted crawl service
pub const DEFAULT_API_URL: &str = "https://api.firecrawl.dev";

/// Main configuration structure for Crawl-Conductor
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Remote service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the crawl service (scheme + host, no trailing path)
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// Bearer token; usually supplied on the command line instead
    #[serde(rename = "api-key", default)]
    pub api_key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_API_URL.to_string()
}

/// Retry policy for transient upstream failures (HTTP 502)
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts per request
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay; attempt `n` sleeps `base * 2^n`
    #[serde(rename = "backoff-base-ms", default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

/// Status polling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    /// Seconds between status polls (never less than 2 at runtime)
    #[serde(rename = "interval-secs", default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    2
}

/// Content store configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database; documents are not persisted when unset
    #[serde(rename = "database-path", default)]
    pub database_path: Option<String>,
}

/// Resolved settings used to construct a client
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl ClientSettings {
    /// Settings for the hosted service with the default retry policy
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::from(&Config::default())
        }
    }

    /// Points the client at a different service
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_backoff_base(mut self, backoff_base: Duration) -> Self {
        self.backoff_base = backoff_base;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

impl From<&Config> for ClientSettings {
    fn from(config: &Config) -> Self {
        Self {
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            api_key: config.api.api_key.clone(),
            max_retries: config.retry.max_retries,
            backoff_base: Duration::from_millis(config.retry.backoff_base_ms),
        }
    }
}

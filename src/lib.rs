//! Crawl-Conductor: a client for long-running remote crawl jobs
//!
//! This crate submits crawl jobs to a remote crawl service and tracks them to
//! completion, either by polling the job status (with a pagination sweep once
//! the job completes) or by watching the job's event stream.

pub mod client;
pub mod config;
pub mod job;
pub mod storage;
pub mod transport;
pub mod watcher;

use thiserror::Error;

/// Main error type for Crawl-Conductor operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Api(#[from] transport::ApiError),

    #[error("Crawl job {job_id} failed: {error}")]
    JobFailed { job_id: String, error: String },

    #[error("Protocol violation during {context}: {detail}")]
    Protocol { context: String, detail: String },

    #[error("Event stream terminated: {0}")]
    StreamTerminated(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for CrawlError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

/// Broad failure classes used for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// HTTP 502 that survived every retry
    TransientUpstream,
    /// Non-2xx response classified with action context
    ClientClassified,
    /// The remote job reached the `failed` state
    JobFailed,
    /// The service answered with something the client cannot interpret
    ProtocolViolation,
    /// The event stream reported an error or closed
    StreamTerminated,
    /// Network level failure below HTTP
    Transport,
    Configuration,
    Storage,
}

impl CrawlError {
    /// Returns the failure class of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Api(api) if api.status == 502 => ErrorKind::TransientUpstream,
            Self::Api(_) => ErrorKind::ClientClassified,
            Self::JobFailed { .. } => ErrorKind::JobFailed,
            Self::Protocol { .. } | Self::Json(_) => ErrorKind::ProtocolViolation,
            Self::StreamTerminated(_) | Self::WebSocket(_) => ErrorKind::StreamTerminated,
            Self::Http(_) | Self::UrlParse(_) | Self::Io(_) => ErrorKind::Transport,
            Self::Config(_) => ErrorKind::Configuration,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn protocol(job_id: &str, detail: impl Into<String>) -> Self {
        Self::Protocol {
            context: format!("job {}", job_id),
            detail: detail.into(),
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("No API key provided")]
    MissingApiKey,
}

/// Result type alias for Crawl-Conductor operations
pub type Result<T> = std::result::Result<T, CrawlError>;

// Re-export commonly used types
pub use client::{CrawlClient, CrawlOptions, MapOptions, ScrapeOptions};
pub use config::{ClientSettings, Config};
pub use job::{CrawlResult, Document, JobHandle, JobState, JobStatusSnapshot};
pub use watcher::{CrawlWatcher, EventKind, WatchEvent, WatchHandle};

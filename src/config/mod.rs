//! Configuration module for Crawl-Conductor
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and resolving them into the settings a [`crate::CrawlClient`] is built from.
//!
//! # Example
//!
//! ```no_run
//! use crawl_conductor::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawl.toml")).unwrap();
//! println!("Talking to: {}", config.api.base_url);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ApiConfig, ClientSettings, Config, PollConfig, RetryConfig, StoreConfig, DEFAULT_API_URL,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;

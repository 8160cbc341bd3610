//! Crawl-Relay: a resumable site crawler that relays what it finds to a publisher
//!
//! This crate crawls a single website (its host plus the `www.` variant),
//! discovers pages, images and redirects, optionally rewrites self-referential
//! links, and hands every artifact to a [`publish::Publisher`]. Crawl state is
//! snapshotted to a per-project resume file so an interrupted crawl can pick
//! up where it stopped.

pub mod config;
pub mod crawler;
pub mod detect;
pub mod filter;
pub mod output;
pub mod publish;
pub mod redirect;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Crawl-Relay operations
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Detector {detector} failed: {message}")]
    Detector {
        detector: &'static str,
        message: String,
    },

    #[error("Filter {filter} failed: {message}")]
    Filter {
        filter: &'static str,
        message: String,
    },

    #[error("Publish error: {0}")]
    Publish(#[from] publish::PublishError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::FetchStatus,
        to: state::FetchStatus,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
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
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Crawl-Relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Engine, EngineSettings};
pub use publish::Publisher;
pub use redirect::{resolve_redirect, RedirectRecord};
pub use state::{CrawlFailure, CrawlSession, FetchStatus, QueueItem};
pub use url::Whitelist;

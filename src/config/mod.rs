//! Configuration module for Crawl-Relay
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, and merging command-line overrides into them.
//!
//! # Example
//!
//! ```no_run
//! use crawl_relay::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawl-relay.toml")).unwrap();
//! println!("Concurrency: {}", config.crawler.concurrency);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, ConfigOverrides, CrawlerConfig, FilterConfig, OutputConfig, ProjectConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;

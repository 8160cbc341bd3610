//! URL handling module for Crawl-Relay
//!
//! This module derives the crawl-facing parts of a URL (path, host, protocol),
//! resolves references found in fetched content, and decides which hosts are
//! inside the crawl scope.

mod domain;
mod normalize;
mod whitelist;

pub use domain::{extract_host, www_counterpart};
pub use normalize::{item_path, parse_crawl_url, resolve_reference};
pub use whitelist::Whitelist;

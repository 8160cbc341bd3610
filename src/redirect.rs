//! Redirect resolution
//!
//! Decides how a redirect observed during the crawl is represented to the
//! publisher. [`resolve_redirect`] is a pure function of the two items.

use crate::state::QueueItem;
use serde::{Deserialize, Serialize};

/// Author tag attached to every redirect the crawler records
pub const REDIRECT_AUTHOR: &str = "crawl-relay";

/// Status used when the relevant item has no observed status code
pub const DEFAULT_REDIRECT_STATUS: u16 = 301;

/// A publish-ready redirect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectRecord {
    /// Source path on the crawled site
    pub from: String,

    /// Relative path for same-host targets, absolute URL otherwise
    pub to: String,

    pub author: String,

    pub status_code: u16,
}

impl RedirectRecord {
    fn new(from: &str, to: &str, status_code: Option<u16>) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            author: REDIRECT_AUTHOR.to_string(),
            status_code: status_code.unwrap_or(DEFAULT_REDIRECT_STATUS),
        }
    }
}

/// Strips a single trailing slash, leaving the root path alone
fn normalize_path(path: &str) -> &str {
    if path == "/" {
        return path;
    }
    path.strip_suffix('/').unwrap_or(path)
}

/// Maps an observed redirect to the record the publisher should receive
///
/// Returns `None` when both items share the same path, since publishing that
/// redirect would loop.
///
/// # Examples
///
/// ```
/// use crawl_relay::state::QueueItem;
/// use crawl_relay::resolve_redirect;
///
/// let original = QueueItem::parse("https://example.com/old", None).unwrap();
/// let destination = QueueItem::parse("https://example.com/new", None).unwrap();
///
/// let record = resolve_redirect(&original, &destination).unwrap();
/// assert_eq!(record.from, "/old");
/// assert_eq!(record.to, "/new");
/// assert_eq!(record.status_code, 301);
/// ```
pub fn resolve_redirect(original: &QueueItem, destination: &QueueItem) -> Option<RedirectRecord> {
    if original.path == destination.path {
        return None;
    }

    let normalized = normalize_path(&original.path);
    if normalized != original.path {
        return Some(RedirectRecord::new(
            &original.path,
            normalized,
            original.status_code(),
        ));
    }

    let to = if original.host == destination.host {
        destination.path.as_str()
    } else {
        destination.url.as_str()
    };
    Some(RedirectRecord::new(normalized, to, destination.status_code()))
}

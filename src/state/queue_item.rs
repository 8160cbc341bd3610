//! Queue item definitions for tracking crawl progress
//!
//! A [`QueueItem`] is one crawl task. Its path, host and protocol are derived
//! once from the URL when the item is created and are never recomputed.

use crate::url::{item_path, parse_crawl_url};
use crate::{RelayError, UrlError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// Fetch status of a queue item
///
/// Statuses only move forward:
///
/// ```text
/// queued -> fetching -> { fetched | failed | redirected }
/// ```
///
/// The single exception is an interrupted run, where an item that was
/// `fetching` but never completed is put back to `queued`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    Queued,
    Fetching,
    Fetched,
    Failed,
    Redirected,
}

impl FetchStatus {
    /// Returns true if moving from `self` to `next` is a forward transition
    pub fn can_advance_to(&self, next: FetchStatus) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Fetching)
                | (Self::Fetching, Self::Fetched)
                | (Self::Fetching, Self::Failed)
                | (Self::Fetching, Self::Redirected)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Fetching => "fetching",
            Self::Fetched => "fetched",
            Self::Failed => "failed",
            Self::Redirected => "redirected",
        }
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response metadata recorded once an item has been fetched
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResponseMeta {
    /// HTTP status code
    pub status_code: u16,

    /// Content-Type header value, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Response headers, lowercase names
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl ResponseMeta {
    /// Returns the media type without parameters, lowercased
    ///
    /// `text/html; charset=utf-8` becomes `text/html`.
    pub fn media_type(&self) -> Option<String> {
        self.content_type.as_deref().map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }

    /// Returns true if the response is an HTML document
    pub fn is_html(&self) -> bool {
        matches!(
            self.media_type().as_deref(),
            Some("text/html") | Some("application/xhtml+xml")
        )
    }

    /// Looks up a header by name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// One crawl task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Absolute URL, without fragment
    pub url: String,

    /// Path plus query string, as published
    pub path: String,

    /// Host with the port when it isn't the scheme default
    pub host: String,

    /// URL scheme (`http` or `https`)
    pub protocol: String,

    /// Current fetch status
    pub status: FetchStatus,

    /// URL of the item this one was discovered on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,

    /// Response metadata, once fetched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseMeta>,
}

impl QueueItem {
    /// Creates a queued item from an already validated URL
    pub fn new(url: &Url, referrer: Option<&str>) -> Result<Self, UrlError> {
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(UrlError::InvalidScheme(url.scheme().to_string()));
        }
        let hostname = url.host_str().ok_or(UrlError::MissingHost)?.to_lowercase();
        let host = match url.port() {
            Some(port) => format!("{}:{}", hostname, port),
            None => hostname,
        };

        let mut clean = url.clone();
        clean.set_fragment(None);

        Ok(Self {
            url: clean.to_string(),
            path: item_path(&clean),
            host,
            protocol: clean.scheme().to_string(),
            status: FetchStatus::Queued,
            referrer: referrer.map(str::to_string),
            response: None,
        })
    }

    /// Parses a URL string and creates a queued item from it
    ///
    /// # Examples
    ///
    /// ```
    /// use crawl_relay::state::{FetchStatus, QueueItem};
    ///
    /// let item = QueueItem::parse("https://example.com:8443/a?b=1", None).unwrap();
    /// assert_eq!(item.path, "/a?b=1");
    /// assert_eq!(item.host, "example.com:8443");
    /// assert_eq!(item.protocol, "https");
    /// assert_eq!(item.status, FetchStatus::Queued);
    /// ```
    pub fn parse(url: &str, referrer: Option<&str>) -> Result<Self, UrlError> {
        let parsed = parse_crawl_url(url)?;
        Self::new(&parsed, referrer)
    }

    /// Parses the stored URL
    pub fn parsed_url(&self) -> Result<Url, UrlError> {
        Url::parse(&self.url).map_err(|e| UrlError::Parse(e.to_string()))
    }

    /// Host without the port, used for whitelist and filter matching
    pub fn hostname(&self) -> &str {
        self.host
            .rsplit_once(':')
            .filter(|(_, port)| port.chars().all(|c| c.is_ascii_digit()))
            .map(|(name, _)| name)
            .unwrap_or(&self.host)
    }

    /// Observed HTTP status code, if the item has been fetched
    pub fn status_code(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status_code)
    }

    /// Moves the item to the next status, rejecting backward moves
    pub fn advance(&mut self, next: FetchStatus) -> Result<(), RelayError> {
        if !self.status.can_advance_to(next) {
            return Err(RelayError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Puts an interrupted item back to `queued`
    ///
    /// Returns true if the item was `fetching` and has been reset.
    pub fn requeue_interrupted(&mut self) -> bool {
        if self.status == FetchStatus::Fetching {
            self.status = FetchStatus::Queued;
            self.response = None;
            true
        } else {
            false
        }
    }
}

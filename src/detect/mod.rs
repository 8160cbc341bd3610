//! Detector pipeline
//!
//! Detectors find embeddable resources (background images, responsive image
//! candidates) that ordinary link extraction misses. Each detector decides
//! from the response metadata whether it applies, then scans the body.
//!
//! Detectors are assembled into a [`DetectorRegistry`] at startup. A failing
//! detector counts as "no discoveries" and never aborts the item.

mod image;
mod responsive;

pub use image::ImageDetector;
pub use responsive::ResponsiveImageDetector;

use crate::state::ResponseMeta;
use crate::RelayError;
use std::collections::HashSet;
use url::Url;

/// A capability that extracts resource URLs from fetched content
pub trait Detector: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Returns true if this detector should scan the response
    fn applies(&self, response: &ResponseMeta) -> bool;

    /// Extracts resource URLs from a body
    ///
    /// When `host` is given, results are qualified as
    /// `{protocol}://{host}/...`; otherwise they are returned as extracted.
    fn detect(
        &self,
        body: &str,
        host: Option<&str>,
        protocol: &str,
    ) -> Result<Vec<String>, RelayError>;
}

/// Ordered set of detectors run against every fetched item
pub struct DetectorRegistry {
    detectors: Vec<Box<dyn Detector>>,
}

impl DetectorRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self {
            detectors: Vec::new(),
        }
    }

    /// Creates the registry with the built-in detectors
    pub fn standard() -> Result<Self, RelayError> {
        Ok(Self::new()
            .with(ImageDetector::new()?)
            .with(ResponsiveImageDetector::new()?))
    }

    pub fn with(mut self, detector: impl Detector + 'static) -> Self {
        self.detectors.push(Box::new(detector));
        self
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Returns true if at least one detector applies to the response
    pub fn any_applies(&self, response: &ResponseMeta) -> bool {
        self.detectors.iter().any(|d| d.applies(response))
    }

    /// Runs every applicable detector and merges their results
    ///
    /// Output is de-duplicated across detectors. Detector errors are logged
    /// and treated as zero discoveries.
    pub fn run(
        &self,
        response: &ResponseMeta,
        body: &str,
        host: Option<&str>,
        protocol: &str,
    ) -> Vec<String> {
        let mut found = Vec::new();
        for detector in self.detectors.iter().filter(|d| d.applies(response)) {
            match detector.detect(body, host, protocol) {
                Ok(urls) => {
                    tracing::trace!("Detector {} found {} urls", detector.name(), urls.len());
                    found.extend(urls);
                }
                Err(e) => {
                    tracing::warn!("Detector {} failed: {}", detector.name(), e);
                }
            }
        }
        dedupe(found)
    }
}

impl Default for DetectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Qualifies an extracted reference with protocol and host
///
/// - Without a host the reference is returned trimmed, as extracted
/// - Fully-qualified references are kept as they are
/// - Protocol-relative references (`//cdn/x.png`) get the protocol
/// - Anything else has its leading `/` stripped and is placed under
///   `{protocol}://{host}/`
///
/// # Examples
///
/// ```
/// use crawl_relay::detect::qualify;
///
/// assert_eq!(qualify("/img/a.png", Some("example.com"), "https"), "https://example.com/img/a.png");
/// assert_eq!(qualify("https://cdn.net/a.png", Some("example.com"), "https"), "https://cdn.net/a.png");
/// assert_eq!(qualify("/img/a.png", None, "https"), "/img/a.png");
/// ```
pub fn qualify(reference: &str, host: Option<&str>, protocol: &str) -> String {
    let reference = reference.trim();
    let host = match host {
        Some(host) if !host.is_empty() => host,
        _ => return reference.to_string(),
    };

    let lowered = reference.to_ascii_lowercase();
    if lowered.starts_with("http://") || lowered.starts_with("https://") {
        return reference.to_string();
    }
    if let Some(rest) = reference.strip_prefix("//") {
        return format!("{}://{}", protocol, rest);
    }

    let root = format!("{}://{}/", protocol, host);
    let relative = reference.trim_start_matches('/');
    Url::parse(&root)
        .and_then(|base| base.join(relative))
        .map(|url| url.to_string())
        .unwrap_or_else(|_| format!("{}{}", root, relative))
}

/// Removes duplicates, keeping first occurrences in order
pub(crate) fn dedupe(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Returns true if an extracted reference can never be fetched
pub(crate) fn is_inline(reference: &str) -> bool {
    let lowered = reference.trim().to_ascii_lowercase();
    lowered.is_empty() || lowered.starts_with("data:") || lowered.starts_with("about:")
}

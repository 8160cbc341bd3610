use crate::UrlError;
use url::Url;

/// Schemes that never point at a crawlable resource
const SKIPPED_PREFIXES: &[&str] = &["javascript:", "mailto:", "tel:", "data:"];

/// Parses a URL the crawler is allowed to queue
///
/// # Rules
///
/// 1. The URL must parse and use the `http` or `https` scheme
/// 2. It must have a host
/// 3. The fragment is dropped (it never changes what the server returns)
///
/// # Examples
///
/// ```
/// use crawl_relay::url::parse_crawl_url;
///
/// let url = parse_crawl_url("https://example.com/about#team").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/about");
/// ```
pub fn parse_crawl_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);
    Ok(url)
}

/// Returns the path a queue item is published under
///
/// This is the URL path plus the query string when one is present, so
/// `/search?q=rust` and `/search` are distinct items.
pub fn item_path(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

/// Resolves a reference found in fetched content against the page URL
///
/// Returns `None` if the reference should be ignored:
/// - empty or fragment-only references
/// - `javascript:`, `mailto:`, `tel:` and `data:` references
/// - references that don't resolve to an HTTP(S) URL
pub fn resolve_reference(base_url: &Url, href: &str) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if SKIPPED_PREFIXES
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
    {
        return None;
    }

    let mut absolute = base_url.join(href).ok()?;
    if absolute.scheme() != "http" && absolute.scheme() != "https" {
        return None;
    }
    absolute.set_fragment(None);
    Some(absolute)
}

use url::Url;

/// Extracts the lowercase host from a URL
///
/// Returns `None` for URLs without a host (which shouldn't happen for
/// valid HTTP(S) URLs).
///
/// # Examples
///
/// ```
/// use url::Url;
/// use crawl_relay::url::extract_host;
///
/// let url = Url::parse("https://EXAMPLE.COM:8080/path").unwrap();
/// assert_eq!(extract_host(&url), Some("example.com".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the `www.` counterpart of a host
///
/// `www.example.com` maps to `example.com` and `example.com` maps to
/// `www.example.com`. The input is lowercased first.
pub fn www_counterpart(host: &str) -> String {
    let host = host.to_lowercase();
    match host.strip_prefix("www.") {
        Some(bare) => bare.to_string(),
        None => format!("www.{}", host),
    }
}

use crate::url::domain::{extract_host, www_counterpart};
use crate::UrlError;
use url::Url;

/// The set of hosts the crawler may fetch from
///
/// A whitelist always holds exactly two hosts: the primary host of the seed
/// URL and its `www.` counterpart. Everything else is an external reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Whitelist {
    primary: String,
    counterpart: String,
}

impl Whitelist {
    /// Creates a whitelist for a host
    ///
    /// # Examples
    ///
    /// ```
    /// use crawl_relay::url::Whitelist;
    ///
    /// let whitelist = Whitelist::new("example.com");
    /// assert!(whitelist.contains("www.example.com"));
    /// assert!(!whitelist.contains("other.com"));
    /// ```
    pub fn new(host: &str) -> Self {
        let primary = host.to_lowercase();
        let counterpart = www_counterpart(&primary);
        Self {
            primary,
            counterpart,
        }
    }

    /// Creates a whitelist from the host of a seed URL
    pub fn from_url(url: &Url) -> Result<Self, UrlError> {
        extract_host(url)
            .map(|host| Self::new(&host))
            .ok_or(UrlError::MissingHost)
    }

    /// The host the crawl was started on
    pub fn primary(&self) -> &str {
        &self.primary
    }

    /// Both whitelisted hosts, primary first
    pub fn hosts(&self) -> [&str; 2] {
        [&self.primary, &self.counterpart]
    }

    /// Returns true if the host may be fetched (case-insensitive)
    pub fn contains(&self, host: &str) -> bool {
        host.eq_ignore_ascii_case(&self.primary) || host.eq_ignore_ascii_case(&self.counterpart)
    }

    /// Returns true if the URL's host may be fetched
    pub fn allows(&self, url: &Url) -> bool {
        url.host_str().map(|h| self.contains(h)).unwrap_or(false)
    }
}

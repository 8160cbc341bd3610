use std::fmt;

/// Why an item ended up in the failure list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCode {
    /// Non-2xx, non-redirect HTTP status
    Http(u16),
    /// Request timed out
    Timeout,
    /// Connection, DNS or TLS failure
    Network,
    /// Body exceeded the configured size limit
    TooLarge,
    /// Disallowed by robots.txt
    Robots,
    /// The publisher rejected the artifact
    Publish,
    /// The item's task panicked or was aborted
    Aborted,
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(code) => write!(f, "{}", code),
            Self::Timeout => f.write_str("timeout"),
            Self::Network => f.write_str("network"),
            Self::TooLarge => f.write_str("too_large"),
            Self::Robots => f.write_str("robots"),
            Self::Publish => f.write_str("publish"),
            Self::Aborted => f.write_str("aborted"),
        }
    }
}

/// A failed item, kept in memory for the end-of-run report
///
/// Failures are never written to the resume file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlFailure {
    pub code: FailureCode,
    pub url: String,
}

impl CrawlFailure {
    pub fn new(code: FailureCode, url: impl Into<String>) -> Self {
        Self {
            code,
            url: url.into(),
        }
    }
}

impl fmt::Display for CrawlFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let failure = CrawlFailure::new(FailureCode::Http(404), "https://example.com/gone");
        assert_eq!(failure.to_string(), "[404] https://example.com/gone");
        assert_eq!(FailureCode::TooLarge.to_string(), "too_large");
    }
}

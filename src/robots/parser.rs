use robotstxt::DefaultMatcher;

/// The robots.txt rules of one host
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    /// Raw robots.txt body; `None` allows everything
    content: Option<String>,
}

impl RobotsRules {
    pub fn from_content(content: &str) -> Self {
        Self {
            content: Some(content.to_string()),
        }
    }

    /// Rules used when robots.txt is missing or unreachable
    pub fn allow_all() -> Self {
        Self { content: None }
    }

    /// Checks an absolute URL against the rules for `user_agent`
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        match self.content.as_deref() {
            None | Some("") => true,
            Some(content) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(content, product_token(user_agent), url)
            }
        }
    }
}

/// Reduces a full user agent to the product token matched in robots.txt
///
/// `crawl-relay/0.1 (+https://example.com)` matches groups for `crawl-relay`.
fn product_token(user_agent: &str) -> &str {
    user_agent
        .split(['/', ' '])
        .next()
        .filter(|token| !token.is_empty())
        .unwrap_or(user_agent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_all() {
        let robots = RobotsRules::allow_all();
        assert!(robots.is_allowed("https://example.com/admin", "crawl-relay"));
    }

    #[test]
    fn test_disallow_prefix() {
        let robots = RobotsRules::from_content("User-agent: *\nDisallow: /private");
        assert!(robots.is_allowed("https://example.com/", "crawl-relay"));
        assert!(!robots.is_allowed("https://example.com/private/a", "crawl-relay"));
    }

    #[test]
    fn test_agent_specific_group() {
        let content = "User-agent: crawl-relay\nDisallow: /\n\nUser-agent: *\nAllow: /";
        let robots = RobotsRules::from_content(content);
        assert!(!robots.is_allowed("https://example.com/page", "crawl-relay/0.1"));
        assert!(robots.is_allowed("https://example.com/page", "OtherBot"));
    }

    #[test]
    fn test_product_token() {
        assert_eq!(product_token("crawl-relay/0.1 (+https://x)"), "crawl-relay");
        assert_eq!(product_token("Bot"), "Bot");
    }
}

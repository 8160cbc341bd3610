use crate::robots::{fetch_robots, RobotsRules};
use reqwest::Client;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Per-host robots.txt rules, fetched on first use
pub struct RobotsCache {
    user_agent: String,
    rules: Mutex<HashMap<String, RobotsRules>>,
}

impl RobotsCache {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            rules: Mutex::new(HashMap::new()),
        }
    }

    /// Checks whether `url` may be fetched, loading the host's rules if needed
    ///
    /// The lock is held across the fetch so each host's robots.txt is
    /// requested at most once.
    pub async fn is_allowed(&self, client: &Client, protocol: &str, host: &str, url: &str) -> bool {
        let mut rules = self.rules.lock().await;
        let key = format!("{}://{}", protocol, host);
        if !rules.contains_key(&key) {
            let fetched = fetch_robots(client, protocol, host).await;
            rules.insert(key.clone(), fetched);
        }
        rules
            .get(&key)
            .map(|r| r.is_allowed(url, &self.user_agent))
            .unwrap_or(true)
    }

    /// Seeds the cache with known rules
    pub async fn insert(&self, protocol: &str, host: &str, rules: RobotsRules) {
        self.rules
            .lock()
            .await
            .insert(format!("{}://{}", protocol, host), rules);
    }

    pub async fn len(&self) -> usize {
        self.rules.lock().await.len()
    }
}

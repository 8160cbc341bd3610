//! Robots.txt handling
//!
//! Only consulted when the crawl is started with robots support enabled.
//! Rules are fetched once per host and cached for the rest of the run.

mod cache;
mod parser;

pub use cache::RobotsCache;
pub use parser::RobotsRules;

use reqwest::Client;

/// Fetches and parses `/robots.txt` for a host
///
/// Any failure to fetch (network error, non-2xx status) yields allow-all
/// rules, so a missing robots.txt never blocks the crawl.
pub async fn fetch_robots(client: &Client, protocol: &str, host: &str) -> RobotsRules {
    let url = format!("{}://{}/robots.txt", protocol, host);

    let response = match client.get(&url).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!("Could not fetch {}: {}", url, e);
            return RobotsRules::allow_all();
        }
    };

    if !response.status().is_success() {
        tracing::debug!("{} returned {}, allowing all", url, response.status());
        return RobotsRules::allow_all();
    }

    match response.text().await {
        Ok(body) => {
            tracing::debug!("Loaded robots.txt for {}", host);
            RobotsRules::from_content(&body)
        }
        Err(e) => {
            tracing::debug!("Could not read {}: {}", url, e);
            RobotsRules::allow_all()
        }
    }
}

//! HTTP fetcher
//!
//! Performs the single GET each crawl item gets. Redirects are not followed
//! by the client; a 3xx with a `Location` header is reported back so the
//! engine can resolve it and queue the destination itself.

use crate::state::ResponseMeta;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::{redirect::Policy, Client, Response};
use std::collections::BTreeMap;
use std::time::Duration;

/// Default user agent sent with every request
pub const DEFAULT_USER_AGENT: &str = concat!("crawl-relay/", env!("CARGO_PKG_VERSION"));

/// Outcome of fetching one item
#[derive(Debug)]
pub enum FetchOutcome {
    /// 2xx response with its full body
    Fetched { meta: ResponseMeta, body: Vec<u8> },

    /// 3xx response carrying a `Location` header
    Redirected { meta: ResponseMeta, location: String },

    /// Any other non-success status
    HttpError { status_code: u16 },

    /// The request timed out
    Timeout,

    /// Connection, DNS, TLS or body read failure
    Network { message: String },

    /// Body exceeded the size limit
    TooLarge { limit: u64 },
}

/// Builds the HTTP client used for the whole crawl
///
/// # Example
///
/// ```no_run
/// use crawl_relay::crawler::build_http_client;
///
/// let client = build_http_client("crawl-relay/0.1", false).unwrap();
/// ```
pub fn build_http_client(user_agent: &str, accept_cookies: bool) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::none())
        .cookie_store(accept_cookies)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Copies the response headers the engine keeps, with lowercase names
fn response_meta(status_code: u16, headers: &HeaderMap) -> ResponseMeta {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let headers: BTreeMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect();

    ResponseMeta {
        status_code,
        content_type,
        headers,
    }
}

/// Fetches a URL, enforcing `max_size` on the body
pub async fn fetch_url(client: &Client, url: &str, max_size: u64) -> FetchOutcome {
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => return classify_error(&e),
    };

    let status = response.status();
    let meta = response_meta(status.as_u16(), response.headers());

    if status.is_redirection() {
        if let Some(location) = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
        {
            return FetchOutcome::Redirected {
                location: location.to_string(),
                meta,
            };
        }
    }

    if !status.is_success() {
        return FetchOutcome::HttpError {
            status_code: status.as_u16(),
        };
    }

    let declared = response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|len| len > max_size) {
        return FetchOutcome::TooLarge { limit: max_size };
    }

    match read_body(response, max_size).await {
        Ok(Some(body)) => FetchOutcome::Fetched { meta, body },
        Ok(None) => FetchOutcome::TooLarge { limit: max_size },
        Err(e) => classify_error(&e),
    }
}

/// Reads the body chunk by chunk; `None` if it grows past `max_size`
async fn read_body(mut response: Response, max_size: u64) -> Result<Option<Vec<u8>>, reqwest::Error> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if body.len() as u64 + chunk.len() as u64 > max_size {
            return Ok(None);
        }
        body.extend_from_slice(&chunk);
    }
    Ok(Some(body))
}

fn classify_error(e: &reqwest::Error) -> FetchOutcome {
    if e.is_timeout() {
        FetchOutcome::Timeout
    } else {
        FetchOutcome::Network {
            message: e.to_string(),
        }
    }
}

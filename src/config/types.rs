use crate::crawler::EngineSettings;
use crate::state::{
    SessionSettings, DEFAULT_CONCURRENCY, DEFAULT_INTERVAL_MS, DEFAULT_MAX_RESOURCE_SIZE,
};
use crate::storage::resume_filename;
use crate::url::parse_crawl_url;
use crate::ConfigError;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Main configuration structure for Crawl-Relay
///
/// Every section is optional; missing values take their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Identity of the crawled project
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Client identifier, first half of the resume filename
    #[serde(rename = "client-id", default = "default_client_id")]
    pub client_id: String,

    /// Project name, second half of the resume filename
    #[serde(default = "default_project_name")]
    pub name: String,

    /// Seed URL; its host defines the whitelist
    #[serde(default)]
    pub url: Option<String>,

    /// Directory holding resume files
    #[serde(rename = "config-dir", default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Publish artifacts as live rather than draft
    #[serde(default = "default_true")]
    pub published: bool,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of concurrent fetches
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Minimum delay between dispatch ticks (milliseconds)
    #[serde(default = "default_interval")]
    pub interval: u64,

    /// Bodies larger than this many bytes are dropped
    #[serde(rename = "max-resource-size", default = "default_max_resource_size")]
    pub max_resource_size: u64,

    #[serde(rename = "respect-robots", default)]
    pub respect_robots: bool,

    #[serde(rename = "accept-cookies", default)]
    pub accept_cookies: bool,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

/// Filter pipeline configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterConfig {
    /// Comma-separated domains the relative-domain filter also rewrites
    #[serde(rename = "extra-domains", default)]
    pub extra_domains: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Root of the directory publisher
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,

    /// Path to the markdown report, if one should be written
    #[serde(rename = "report-path", default)]
    pub report_path: Option<PathBuf>,
}

/// Values given on the command line, overriding the file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub url: Option<String>,
    pub interval: Option<u64>,
    pub concurrency: Option<usize>,
    pub max_resource_size: Option<u64>,
    pub accept_cookies: bool,
    pub respect_robots: bool,
}

fn default_client_id() -> String {
    "local".to_string()
}

fn default_project_name() -> String {
    "site".to_string()
}

fn default_config_dir() -> PathBuf {
    PathBuf::from(".crawl-relay")
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_MS
}

fn default_max_resource_size() -> u64 {
    DEFAULT_MAX_RESOURCE_SIZE
}

fn default_user_agent() -> String {
    crate::crawler::DEFAULT_USER_AGENT.to_string()
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("published")
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            client_id: default_client_id(),
            name: default_project_name(),
            url: None,
            config_dir: default_config_dir(),
            published: true,
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            interval: default_interval(),
            max_resource_size: default_max_resource_size(),
            respect_robots: false,
            accept_cookies: false,
            user_agent: default_user_agent(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            report_path: None,
        }
    }
}

impl Config {
    /// Applies command-line values on top of the file
    ///
    /// Boolean flags can only switch a feature on.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(url) = &overrides.url {
            self.project.url = Some(url.clone());
        }
        if let Some(interval) = overrides.interval {
            self.crawler.interval = interval;
        }
        if let Some(concurrency) = overrides.concurrency {
            self.crawler.concurrency = concurrency;
        }
        if let Some(size) = overrides.max_resource_size {
            self.crawler.max_resource_size = size;
        }
        self.crawler.accept_cookies |= overrides.accept_cookies;
        self.crawler.respect_robots |= overrides.respect_robots;
    }

    /// The seed URL, required to start a crawl
    pub fn seed_url(&self) -> Result<Url, ConfigError> {
        let raw = self.project.url.as_deref().ok_or_else(|| {
            ConfigError::Validation("no seed URL: set project.url or pass --url".to_string())
        })?;
        parse_crawl_url(raw).map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", raw, e)))
    }

    /// Name of this project's resume file
    pub fn resume_filename(&self) -> String {
        resume_filename(&self.project.client_id, &self.project.name)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            concurrency: self.crawler.concurrency,
            interval: Duration::from_millis(self.crawler.interval),
            max_resource_size: self.crawler.max_resource_size,
            respect_robots: self.crawler.respect_robots,
            accept_cookies: self.crawler.accept_cookies,
        }
    }

    /// Engine options for this configuration
    ///
    /// `rewrite` and `attachments` are per-run switches and only exist on
    /// the command line.
    pub fn engine_settings(&self, rewrite: bool, attachments: bool) -> EngineSettings {
        EngineSettings {
            session: self.session_settings(),
            rewrite,
            attachments,
            extra_domains: self.filters.extra_domains.clone(),
            published: self.project.published,
            user_agent: self.crawler.user_agent.clone(),
        }
    }
}

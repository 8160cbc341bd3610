use crate::config::types::{Config, CrawlerConfig, ProjectConfig};
use crate::url::parse_crawl_url;
use crate::ConfigError;

/// Validates the entire configuration
///
/// The seed URL is optional here since it can come from the command line;
/// [`Config::seed_url`] enforces its presence.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_project_config(&config.project)?;
    validate_crawler_config(&config.crawler)?;
    Ok(())
}

fn validate_project_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    validate_name_part("client-id", &config.client_id)?;
    validate_name_part("name", &config.name)?;

    if let Some(url) = &config.url {
        parse_crawl_url(url).map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", url, e)))?;
    }

    Ok(())
}

/// client-id and name make up the resume filename
fn validate_name_part(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{} cannot be empty", field)));
    }

    if value.contains(['/', '\\']) || value == "." || value == ".." {
        return Err(ConfigError::Validation(format!(
            "{} must not contain path separators, got '{}'",
            field, value
        )));
    }

    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be >= 1, got {}",
            config.concurrency
        )));
    }

    if config.max_resource_size < 1 {
        return Err(ConfigError::Validation(format!(
            "max-resource-size must be >= 1, got {}",
            config.max_resource_size
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

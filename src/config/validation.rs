use crate::config::types::{BrowserConfig, Config, DownloadConfig, HarvestConfig, PlatformConfig};
use crate::ConfigError;
use url::Url;

/// Placeholder creator name shipped in the sample configuration
const PLACEHOLDER_CREATOR: &str = "johndoe";

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_harvest_config(&config.harvest)?;
    validate_browser_config(&config.browser)?;
    validate_platform_config(&config.platform)?;
    validate_download_config(&config.download)?;

    if config.output.root.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output root cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the harvest target and limits
fn validate_harvest_config(config: &HarvestConfig) -> Result<(), ConfigError> {
    validate_creator(&config.creator)?;

    if config.posts_per_partition < 1 {
        return Err(ConfigError::Validation(format!(
            "posts-per-partition must be >= 1, got {}",
            config.posts_per_partition
        )));
    }

    if config.partitions.iter().any(|p| p.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "partitions cannot contain empty labels".to_string(),
        ));
    }

    Ok(())
}

/// The creator name becomes a URL path segment and a directory name
fn validate_creator(creator: &str) -> Result<(), ConfigError> {
    if creator.is_empty() || creator == PLACEHOLDER_CREATOR {
        return Err(ConfigError::Validation(
            "Please set the creator's name in the config file".to_string(),
        ));
    }

    if !creator
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
        || creator.starts_with('.')
    {
        return Err(ConfigError::Validation(format!(
            "creator must contain only alphanumeric characters, '-', '_' or '.', got '{}'",
            creator
        )));
    }

    Ok(())
}

fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    if config.poll_interval_ms < 1 {
        return Err(ConfigError::Validation(
            "poll-interval-ms must be >= 1".to_string(),
        ));
    }

    if config.event_buffer < 1 {
        return Err(ConfigError::Validation(
            "event-buffer must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_platform_config(config: &PlatformConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' must use HTTP(S)",
            config.base_url
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' has no host",
            config.base_url
        )));
    }

    if config.user_content_host.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-content-host cannot be empty".to_string(),
        ));
    }

    if config.video_hosts.iter().any(|h| h.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "video-hosts cannot contain empty entries".to_string(),
        ));
    }

    Ok(())
}

fn validate_download_config(config: &DownloadConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "connect-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

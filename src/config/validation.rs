use crate::config::types::{
    Config, CrawlerConfig, DelayRange, FeedConfig, OutputConfig, RateLimitConfig, RendererConfig,
};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_feed_config(&config.feed)?;
    validate_crawler_config(&config.crawler)?;
    validate_rate_limit_config(&config.rate_limit)?;
    validate_renderer_config(&config.renderer)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the feed location and fragment selector
fn validate_feed_config(config: &FeedConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid feed url '{}': {}", config.url, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "Feed url '{}' must use http or https",
            config.url
        )));
    }

    if config.fragment_selector.trim().is_empty() {
        return Err(ConfigError::InvalidSelector(
            "fragment_selector cannot be empty".to_string(),
        ));
    }

    Selector::parse(&config.fragment_selector).map_err(|e| {
        ConfigError::InvalidSelector(format!("'{}': {}", config.fragment_selector, e))
    })?;

    Ok(())
}

/// Validates crawl loop configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.stall_threshold < 1 {
        return Err(ConfigError::Validation(format!(
            "stall_threshold must be >= 1, got {}",
            config.stall_threshold
        )));
    }

    if config.scroll_increment < 1 {
        return Err(ConfigError::Validation(format!(
            "scroll_increment must be >= 1, got {}",
            config.scroll_increment
        )));
    }

    if config.presence_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "presence_timeout_secs must be >= 1, got {}",
            config.presence_timeout_secs
        )));
    }

    Ok(())
}

/// Validates pacing configuration
fn validate_rate_limit_config(config: &RateLimitConfig) -> Result<(), ConfigError> {
    if config.request_threshold < 1 {
        return Err(ConfigError::Validation(format!(
            "request_threshold must be >= 1, got {}",
            config.request_threshold
        )));
    }

    validate_delay_range("short_delay_secs", &config.short_delay)?;
    validate_delay_range("long_delay_secs", &config.long_delay)?;

    Ok(())
}

fn validate_delay_range(name: &str, range: &DelayRange) -> Result<(), ConfigError> {
    if !range.min.is_finite() || !range.max.is_finite() {
        return Err(ConfigError::Validation(format!(
            "{} must contain finite numbers, got [{}, {}]",
            name, range.min, range.max
        )));
    }

    if range.min < 0.0 || range.min > range.max {
        return Err(ConfigError::Validation(format!(
            "{} must satisfy 0 <= min <= max, got [{}, {}]",
            name, range.min, range.max
        )));
    }

    Ok(())
}

/// Validates the WebDriver endpoint settings
fn validate_renderer_config(config: &RendererConfig) -> Result<(), ConfigError> {
    Url::parse(&config.webdriver_url).map_err(|e| {
        ConfigError::InvalidUrl(format!(
            "Invalid webdriver_url '{}': {}",
            config.webdriver_url, e
        ))
    })?;

    if config.browser.is_empty() {
        return Err(ConfigError::Validation("browser cannot be empty".to_string()));
    }

    if config.command_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "command_timeout_secs must be >= 1, got {}",
            config.command_timeout_secs
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.dataset_path.is_empty() {
        return Err(ConfigError::Validation(
            "dataset_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

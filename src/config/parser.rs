use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so a dataset can be matched to the settings that
/// produced it.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DelayRange;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[feed]
url = "https://feed.example.com/foryou"
fragment-selector = "div.item"

[crawler]
target-count = 40
stall-threshold = 5
settle-wait-ms = 250

[rate-limit]
request-threshold = 4
short-delay-secs = [1.0, 2.5]
long-delay-secs = [10.0, 20.0]

[renderer]
webdriver-url = "http://127.0.0.1:4444"
headless = false

[output]
dataset-path = "./out/feed.parquet"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.feed.url, "https://feed.example.com/foryou");
        assert_eq!(config.crawler.target(), Some(40));
        assert_eq!(config.crawler.stall_threshold, 5);
        assert_eq!(config.rate_limit.request_threshold, 4);
        assert_eq!(config.rate_limit.short_delay, DelayRange::new(1.0, 2.5));
        assert!(!config.renderer.headless);
        assert_eq!(config.output.dataset_path, "./out/feed.parquet");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();

        assert_eq!(config.crawler.target(), Some(25));
        assert_eq!(config.crawler.scroll_increment, 500);
        assert_eq!(config.crawler.stall_threshold, 3);
        assert_eq!(config.rate_limit.request_threshold, 10);
        assert_eq!(config.rate_limit.short_delay, DelayRange::new(6.0, 15.0));
        assert_eq!(config.rate_limit.long_delay, DelayRange::new(30.0, 60.0));
    }

    #[test]
    fn test_zero_target_means_unbounded() {
        let config = parse_config("[crawler]\ntarget-count = 0\n").unwrap();
        assert_eq!(config.crawler.target(), None);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/harvester.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let file = create_temp_config("[rate-limit]\nrequest-threshold = 0\n");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}

//! Feed-Harvester: a paced infinite-scroll engagement crawler
//!
//! This crate scrolls a remotely rendered feed, deduplicates the content
//! fragments it sees, extracts engagement records (hashtags and like/comment/share
//! counts) from them, and merges every run's harvest into a Parquet dataset.

pub mod config;
pub mod crawler;
pub mod output;
pub mod record;
pub mod renderer;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Feed-Harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Renderer error: {0}")]
    Render(#[from] renderer::RenderError),

    #[error("Crawl failed: {0}")]
    Crawl(#[from] crawler::CrawlError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] storage::PersistenceError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector in config: {0}")]
    InvalidSelector(String),
}

/// Result type alias for Feed-Harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use record::Record;
pub use state::CrawlPhase;

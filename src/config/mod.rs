//! Configuration module for Feed-Harvester
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key has a default, so running without a file is equivalent to loading
//! an empty one.
//!
//! # Example
//!
//! ```no_run
//! use feed_harvester::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvester.toml")).unwrap();
//! println!("Stall threshold: {}", config.crawler.stall_threshold);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, DelayRange, FeedConfig, OutputConfig, RateLimitConfig, RendererConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;

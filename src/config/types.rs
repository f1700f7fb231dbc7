use serde::Deserialize;
use std::ops::RangeInclusive;
use std::time::Duration;

/// Main configuration structure for Feed-Harvester
///
/// Every section and key is optional; missing values fall back to the
/// defaults documented on each field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feed: FeedConfig,
    pub crawler: CrawlerConfig,
    #[serde(rename = "rate-limit")]
    pub rate_limit: RateLimitConfig,
    pub renderer: RendererConfig,
    pub output: OutputConfig,
}

/// Which page to scroll and how its items are recognised
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Feed root URL loaded at the start of every run
    pub url: String,

    /// CSS selector matching one content fragment (one feed item)
    #[serde(rename = "fragment-selector")]
    pub fragment_selector: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: "https://www.tiktok.com/foryou".to_string(),
            fragment_selector: "div[data-e2e='recommend-list-item-container']".to_string(),
        }
    }
}

/// Crawl loop behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Records to collect per run; 0 runs until the feed is exhausted
    #[serde(rename = "target-count")]
    pub target_count: usize,

    /// How long to wait for the first fragment after navigation (seconds)
    #[serde(rename = "presence-timeout-secs")]
    pub presence_timeout_secs: u64,

    /// Distance added to the last measured extent on every scroll
    #[serde(rename = "scroll-increment")]
    pub scroll_increment: u64,

    /// Consecutive no-growth measurements that mark the end of the feed
    #[serde(rename = "stall-threshold")]
    pub stall_threshold: u32,

    /// Settle time between a scroll command and the next measurement (milliseconds)
    #[serde(rename = "settle-wait-ms")]
    pub settle_wait_ms: u64,

    /// Pause between two runs (seconds)
    #[serde(rename = "inter-iteration-delay-secs")]
    pub inter_iteration_delay_secs: u64,
}

impl CrawlerConfig {
    /// Target record count, or `None` for an unbounded run
    pub fn target(&self) -> Option<usize> {
        (self.target_count > 0).then_some(self.target_count)
    }

    pub fn presence_timeout(&self) -> Duration {
        Duration::from_secs(self.presence_timeout_secs)
    }

    pub fn settle_wait(&self) -> Duration {
        Duration::from_millis(self.settle_wait_ms)
    }

    pub fn inter_iteration_delay(&self) -> Duration {
        Duration::from_secs(self.inter_iteration_delay_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            target_count: 25,
            presence_timeout_secs: 45,
            scroll_increment: 500,
            stall_threshold: 3,
            settle_wait_ms: 1500,
            inter_iteration_delay_secs: 300,
        }
    }
}

/// A closed delay interval in seconds, written as `[min, max]` in TOML
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "[f64; 2]")]
pub struct DelayRange {
    pub min: f64,
    pub max: f64,
}

impl DelayRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn as_range(&self) -> RangeInclusive<f64> {
        self.min..=self.max
    }

    pub fn contains(&self, delay: Duration) -> bool {
        self.as_range().contains(&delay.as_secs_f64())
    }
}

impl From<[f64; 2]> for DelayRange {
    fn from([min, max]: [f64; 2]) -> Self {
        Self::new(min, max)
    }
}

/// Request pacing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Every Nth paced request takes the long cooldown
    #[serde(rename = "request-threshold")]
    pub request_threshold: u32,

    /// Delay range for ordinary requests
    #[serde(rename = "short-delay-secs")]
    pub short_delay: DelayRange,

    /// Delay range for the periodic extended cooldown
    #[serde(rename = "long-delay-secs")]
    pub long_delay: DelayRange,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            request_threshold: 10,
            short_delay: DelayRange::new(6.0, 15.0),
            long_delay: DelayRange::new(30.0, 60.0),
        }
    }
}

/// Remote rendering engine (a running WebDriver endpoint)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Base URL of the WebDriver server
    #[serde(rename = "webdriver-url")]
    pub webdriver_url: String,

    /// Browser name requested in the session capabilities
    pub browser: String,

    /// Run the browser without a window
    pub headless: bool,

    /// Fixed user agent passed to the browser, if any
    #[serde(rename = "user-agent")]
    pub user_agent: Option<String>,

    /// Timeout for a single WebDriver command (seconds)
    #[serde(rename = "command-timeout-secs")]
    pub command_timeout_secs: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            browser: "chrome".to_string(),
            headless: true,
            user_agent: None,
            command_timeout_secs: 60,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the Parquet dataset merged after every run
    #[serde(rename = "dataset-path")]
    pub dataset_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dataset_path: "./data/engagement.parquet".to_string(),
        }
    }
}

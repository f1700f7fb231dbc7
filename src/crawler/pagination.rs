//! Scroll-driven pagination with stall detection
//!
//! An infinite feed has no "next page" link. The driver moves the viewport
//! down by a fixed increment, waits for lazy content to load, and compares the
//! document's scroll extent before and after. A feed whose extent stops
//! growing for `stall_threshold` consecutive polls is considered exhausted.

use crate::config::CrawlerConfig;
use crate::renderer::{RenderError, RenderResult, Renderer};
use serde_json::Value;
use std::time::Duration;

/// Script returning the total scrollable height of the document
pub const MEASURE_SCRIPT: &str =
    "return Math.max(document.body.scrollHeight, document.documentElement.scrollHeight);";

/// Builds the script that scrolls the window to an absolute offset
pub fn scroll_script(target: u64) -> String {
    format!("window.scrollTo(0, {});", target)
}

/// Result of one pagination step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollOutcome {
    /// The feed may still have more content
    Progressed,

    /// The extent has not grown for `stall_threshold` consecutive polls
    Stalled,
}

/// Tracks scroll extent across polls of a single run
#[derive(Debug, Clone)]
pub struct PaginationDriver {
    increment: u64,
    stall_threshold: u32,
    settle: Duration,
    last_height: Option<u64>,
    stall_count: u32,
}

impl PaginationDriver {
    /// Creates a driver with no baseline
    ///
    /// # Arguments
    ///
    /// * `increment` - Pixels added to the last measured extent on each scroll
    /// * `stall_threshold` - Consecutive flat polls that mean the feed is done
    /// * `settle` - Wait after scrolling before re-measuring
    pub fn new(increment: u64, stall_threshold: u32, settle: Duration) -> Self {
        Self {
            increment,
            stall_threshold,
            settle,
            last_height: None,
            stall_count: 0,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            config.scroll_increment,
            config.stall_threshold,
            config.settle_wait(),
        )
    }

    /// Last measured extent, if any poll has happened
    pub fn last_height(&self) -> Option<u64> {
        self.last_height
    }

    /// Current run of consecutive polls without growth
    pub fn stall_count(&self) -> u32 {
        self.stall_count
    }

    /// Scrolls once and reports whether the feed is still growing
    ///
    /// The first call measures a baseline before scrolling, so it takes two
    /// measurements; every later call takes one.
    pub async fn advance(&mut self, renderer: &mut dyn Renderer) -> RenderResult<ScrollOutcome> {
        let baseline = match self.last_height {
            Some(height) => height,
            None => {
                let height = measure_extent(renderer).await?;
                self.last_height = Some(height);
                height
            }
        };

        let target = baseline.saturating_add(self.increment);
        renderer.script_eval(&scroll_script(target)).await?;
        tokio::time::sleep(self.settle).await;

        let height = measure_extent(renderer).await?;
        if height == baseline {
            self.stall_count += 1;
            tracing::debug!(
                "Scroll extent unchanged at {} ({} of {})",
                height,
                self.stall_count,
                self.stall_threshold
            );
        } else {
            self.stall_count = 0;
        }
        self.last_height = Some(height);

        if self.stall_count >= self.stall_threshold {
            tracing::info!(
                "Feed stalled at extent {} after {} flat polls",
                height,
                self.stall_count
            );
            Ok(ScrollOutcome::Stalled)
        } else {
            Ok(ScrollOutcome::Progressed)
        }
    }
}

/// Reads the document's scroll extent
async fn measure_extent(renderer: &mut dyn Renderer) -> RenderResult<u64> {
    let value = renderer.script_eval(MEASURE_SCRIPT).await?;
    extent_from_value(&value).ok_or_else(|| RenderError::UnexpectedResponse {
        command: "measure extent".to_string(),
        detail: format!("expected a non-negative number, got {}", value),
    })
}

fn extent_from_value(value: &Value) -> Option<u64> {
    if let Some(height) = value.as_u64() {
        return Some(height);
    }
    match value.as_f64() {
        Some(height) if height.is_finite() && height >= 0.0 => Some(height.round() as u64),
        _ => None,
    }
}

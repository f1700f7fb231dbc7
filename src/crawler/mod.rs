//! Crawler module for paced infinite-scroll harvesting
//!
//! This module contains the core crawling logic, including:
//! - Fragment selection and record extraction
//! - Scroll-driven pagination with stall detection
//! - Per-run fragment deduplication
//! - Randomized request pacing
//! - The single-run crawl loop and the repeating run scheduler

mod coordinator;
mod dedup;
mod pacing;
mod pagination;
mod parser;
mod scheduler;

pub use coordinator::{Coordinator, CrawlOutcome, CrawlReport};
pub use dedup::{Deduplicator, FragmentIdentity, Observation};
pub use pacing::{sample_delay, select_regime, DelayRegime, Pacer};
pub use pagination::{PaginationDriver, ScrollOutcome, MEASURE_SCRIPT};
pub use parser::{
    trailing_segment, EngagementExtractor, Fragment, FragmentSelector, RecordExtractor,
};
pub use scheduler::{IterationReport, RunScheduler, SchedulerSummary};

use crate::renderer::RenderError;
use crate::state::InvalidTransition;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors that end a crawl run early
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("No content fragment appeared within {waited:?}")]
    RenderTimeout { waited: Duration },

    #[error("Renderer failure: {0}")]
    RenderFailure(#[from] RenderError),

    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

/// Errors raised while mapping a fragment to a record
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Element {element} is missing required attribute '{attribute}'")]
    MissingAttribute { element: String, attribute: String },
}

/// Sleeps for `duration` unless the token fires first
///
/// # Returns
///
/// * `true` - The full duration elapsed
/// * `false` - Cancellation was requested
pub(crate) async fn sleep_unless_cancelled(duration: Duration, token: &CancellationToken) -> bool {
    if token.is_cancelled() {
        return false;
    }

    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

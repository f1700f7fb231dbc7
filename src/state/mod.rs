//! State module for tracking crawl progress
//!
//! A crawl run moves through a small, explicit state machine:
//!
//! ```text
//! Starting -> Loading -> Polling -> Finished(Exhausted | TargetReached | Interrupted | Failed)
//! ```
//!
//! `Starting` and `Loading` may also jump straight to `Finished` when the
//! session cannot be opened, the first fragment never appears, or shutdown is
//! requested.

mod crawl_phase;

pub use crawl_phase::{CrawlPhase, EndReason, InvalidTransition};

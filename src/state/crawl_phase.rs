/// Crawl phase definitions for a single harvesting run
///
/// This module defines every phase a run can be in and which moves between
/// them are legal.
use std::fmt;
use thiserror::Error;

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndReason {
    /// Pagination stalled: the feed has no more content
    Exhausted,

    /// The configured record target was reached
    TargetReached,

    /// Shutdown was requested while the run was in progress
    Interrupted,

    /// A renderer failure or timeout ended the run early
    Failed,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exhausted => "exhausted",
            Self::TargetReached => "target_reached",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    /// Returns true if the run finished on its own terms
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Exhausted | Self::TargetReached)
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents the current phase of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    // ===== Active Phases =====
    /// Run created, renderer session not yet open
    Starting,

    /// Session open, waiting for the feed to render its first fragment
    Loading,

    /// Scrolling, extracting and pacing
    Polling,

    // ===== Terminal Phase =====
    /// Run is over
    Finished(EndReason),
}

/// Raised when a run attempts an illegal phase change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid crawl transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: CrawlPhase,
    pub to: CrawlPhase,
}

impl CrawlPhase {
    /// Returns true if this is the terminal phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished(_))
    }

    /// Returns the end reason once finished
    pub fn end_reason(&self) -> Option<EndReason> {
        match self {
            Self::Finished(reason) => Some(*reason),
            _ => None,
        }
    }

    /// Checks whether moving from `self` to `next` is legal
    ///
    /// `Exhausted` and `TargetReached` can only be reached from `Polling`;
    /// failure and interruption can end any active phase.
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        use CrawlPhase::*;
        use EndReason::*;

        match (self, next) {
            (Starting, Loading) => true,
            (Loading, Polling) => true,
            (Starting | Loading | Polling, Finished(Failed | Interrupted)) => true,
            (Polling, Finished(Exhausted | TargetReached)) => true,
            _ => false,
        }
    }

    /// Performs the transition, returning the new phase
    pub fn transition(self, next: CrawlPhase) -> Result<CrawlPhase, InvalidTransition> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => f.write_str("starting"),
            Self::Loading => f.write_str("loading"),
            Self::Polling => f.write_str("polling"),
            Self::Finished(reason) => write!(f, "finished({})", reason),
        }
    }
}

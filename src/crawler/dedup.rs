//! Fragment deduplication
//!
//! A feed re-renders the items already on screen every time it grows, so each
//! poll sees most fragments again. The deduplicator derives a stable identity
//! for each fragment and remembers every identity accepted during the current
//! run. It is consulted before extraction, so a repeat is never turned into a
//! second record.

use crate::crawler::parser::Fragment;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;

/// Key used to decide whether a fragment was already processed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FragmentIdentity {
    /// Trailing path segment of the fragment's first hyperlink (the content id)
    Link(String),

    /// SHA-256 of the fragment's text outside engagement buttons plus its link
    /// targets
    ///
    /// Weak: two distinct items with the same caption collide, and an edited
    /// caption hashes differently. Only used when no link is present.
    Digest(String),
}

impl FragmentIdentity {
    /// Derives the identity of a fragment
    pub fn of(fragment: &Fragment<'_>) -> Self {
        if let Some(segment) = fragment.link_segment() {
            return Self::Link(segment);
        }

        let mut basis = fragment.stable_text();
        for href in fragment.hrefs() {
            basis.push('\n');
            basis.push_str(href.trim());
        }
        if basis.is_empty() {
            basis = fragment.tag_signature();
        }
        Self::Digest(content_digest(&basis))
    }

    /// Returns true for link-derived identities
    pub fn is_strong(&self) -> bool {
        matches!(self, Self::Link(_))
    }
}

impl fmt::Display for FragmentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link(id) => write!(f, "link:{}", id),
            Self::Digest(hash) => write!(f, "digest:{}", &hash[..hash.len().min(12)]),
        }
    }
}

/// Result of observing one fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// First sighting this run; extract it
    Accept(FragmentIdentity),

    /// Already processed this run; skip it
    Reject(FragmentIdentity),
}

impl Observation {
    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept(_))
    }

    pub fn identity(&self) -> &FragmentIdentity {
        match self {
            Self::Accept(identity) | Self::Reject(identity) => identity,
        }
    }
}

/// Per-run set of seen fragment identities
///
/// Grows monotonically; a new deduplicator is created for every run.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<FragmentIdentity>,
    rejected: usize,
    weak_accepted: usize,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives the fragment's identity and checks it against the seen set
    pub fn observe(&mut self, fragment: &Fragment<'_>) -> Observation {
        self.observe_identity(FragmentIdentity::of(fragment))
    }

    /// Checks an already derived identity against the seen set
    pub fn observe_identity(&mut self, identity: FragmentIdentity) -> Observation {
        if self.seen.contains(&identity) {
            self.rejected += 1;
            return Observation::Reject(identity);
        }

        if !identity.is_strong() {
            self.weak_accepted += 1;
            tracing::debug!("Accepted fragment with weak identity {}", identity);
        }

        self.seen.insert(identity.clone());
        Observation::Accept(identity)
    }

    pub fn contains(&self, identity: &FragmentIdentity) -> bool {
        self.seen.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Number of repeat sightings rejected so far
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Number of accepted fragments that only had a digest identity
    pub fn weak_accepted(&self) -> usize {
        self.weak_accepted
    }
}

fn content_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

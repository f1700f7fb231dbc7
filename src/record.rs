//! Engagement record harvested from a single feed fragment

use serde::{Deserialize, Serialize};

/// Sentinel stored when the source fragment has no value for a count
pub const MISSING: &str = "N/A";

/// One harvested engagement observation
///
/// Counts are kept exactly as the page displays them (`"1.2M"`, `"834"`);
/// nothing in the crawler parses or validates them. A record carries no id of
/// its own: identity belongs to the fragment it came from and is tracked by the
/// deduplicator.
///
/// Records are immutable once built; fields are only reachable through
/// accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    hashtags: Vec<String>,
    likes: String,
    comments: String,
    shares: String,
}

impl Record {
    pub fn new(
        hashtags: Vec<String>,
        likes: impl Into<String>,
        comments: impl Into<String>,
        shares: impl Into<String>,
    ) -> Self {
        Self {
            hashtags,
            likes: likes.into(),
            comments: comments.into(),
            shares: shares.into(),
        }
    }

    pub fn hashtags(&self) -> &[String] {
        &self.hashtags
    }

    pub fn likes(&self) -> &str {
        &self.likes
    }

    pub fn comments(&self) -> &str {
        &self.comments
    }

    pub fn shares(&self) -> &str {
        &self.shares
    }

    /// Returns true if any of the three counts is the `N/A` sentinel
    pub fn has_missing_counts(&self) -> bool {
        [&self.likes, &self.comments, &self.shares]
            .iter()
            .any(|count| count.as_str() == MISSING)
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new(Vec::new(), MISSING, MISSING, MISSING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_record_is_all_missing() {
        let record = Record::default();
        assert!(record.hashtags().is_empty());
        assert_eq!(record.likes(), MISSING);
        assert_eq!(record.comments(), MISSING);
        assert_eq!(record.shares(), MISSING);
        assert!(record.has_missing_counts());
    }

    #[test]
    fn test_complete_record_has_no_missing_counts() {
        let record = Record::new(vec!["fyp".to_string()], "1.2M", "4021", "88");
        assert!(!record.has_missing_counts());
        assert_eq!(record.hashtags(), ["fyp".to_string()]);
    }

    #[test]
    fn test_record_serializes_field_names() {
        let record = Record::new(vec!["cats".to_string()], "10", "2", MISSING);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["hashtags"][0], "cats");
        assert_eq!(json["shares"], "N/A");
    }
}

//! Statistics over the harvested dataset
//!
//! This module provides functionality for summarising a stored dataset and
//! displaying the summary.

use crate::record::Record;
use crate::storage::{PersistenceResult, RecordStore};
use std::collections::HashMap;

/// Number of hashtags listed in the ranking
pub const TOP_HASHTAGS: usize = 10;

/// Dataset statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetStatistics {
    /// Total number of stored records
    pub total_records: usize,

    /// Records where at least one count is `N/A`
    pub records_with_missing_counts: usize,

    /// Records carrying no hashtag at all
    pub records_without_hashtags: usize,

    /// Number of distinct hashtags across all records
    pub distinct_hashtags: usize,

    /// Most frequent hashtags, most frequent first (ties by name)
    pub top_hashtags: Vec<(String, usize)>,
}

impl DatasetStatistics {
    pub fn from_records(records: &[Record]) -> Self {
        let mut frequency: HashMap<&str, usize> = HashMap::new();
        let mut records_with_missing_counts = 0;
        let mut records_without_hashtags = 0;

        for record in records {
            if record.has_missing_counts() {
                records_with_missing_counts += 1;
            }
            if record.hashtags().is_empty() {
                records_without_hashtags += 1;
            }
            for tag in record.hashtags() {
                *frequency.entry(tag.as_str()).or_default() += 1;
            }
        }

        let distinct_hashtags = frequency.len();
        let mut ranked: Vec<_> = frequency.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        Self {
            total_records: records.len(),
            records_with_missing_counts,
            records_without_hashtags,
            distinct_hashtags,
            top_hashtags: ranked
                .into_iter()
                .take(TOP_HASHTAGS)
                .map(|(tag, count)| (tag.to_string(), count))
                .collect(),
        }
    }
}

/// Loads statistics from a store
///
/// # Arguments
///
/// * `store` - The dataset to summarise
///
/// # Returns
///
/// * `Ok(DatasetStatistics)` - Successfully computed statistics
/// * `Err(PersistenceError)` - The dataset could not be read
pub fn load_statistics(store: &dyn RecordStore) -> PersistenceResult<DatasetStatistics> {
    let records = store.load()?;
    Ok(DatasetStatistics::from_records(&records))
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &DatasetStatistics) {
    println!("=== Dataset Statistics ===\n");

    println!("Overview:");
    println!("  Total records: {}", stats.total_records);
    let missing_share = if stats.total_records > 0 {
        (stats.records_with_missing_counts as f64 / stats.total_records as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "  Records with missing counts: {} ({:.1}%)",
        stats.records_with_missing_counts, missing_share
    );
    println!(
        "  Records without hashtags: {}",
        stats.records_without_hashtags
    );
    println!("  Distinct hashtags: {}", stats.distinct_hashtags);
    println!();

    if !stats.top_hashtags.is_empty() {
        println!("Top Hashtags:");
        for (rank, (tag, count)) in stats.top_hashtags.iter().enumerate() {
            println!("  {:>2}. #{} ({})", rank + 1, tag, count);
        }
    }
}

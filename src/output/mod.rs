//! Output module for presenting harvested records
//!
//! This module handles:
//! - Printing a run's records the way they were collected
//! - Recording dataset statistics for `--show`

pub mod stats;

pub use stats::{load_statistics, print_statistics, DatasetStatistics};

use crate::record::Record;
use std::fmt::Write;

/// Formats one record as a labelled block
pub fn format_record(record: &Record) -> String {
    let mut out = String::new();
    let hashtags = if record.hashtags().is_empty() {
        "-".to_string()
    } else {
        record
            .hashtags()
            .iter()
            .map(|tag| format!("#{}", tag))
            .collect::<Vec<_>>()
            .join(" ")
    };

    let _ = writeln!(out, "Hashtags: {}", hashtags);
    let _ = writeln!(out, "Likes: {}", record.likes());
    let _ = writeln!(out, "Comments: {}", record.comments());
    let _ = writeln!(out, "Shares: {}", record.shares());
    out
}

/// Prints every record to stdout, separated by blank lines
pub fn print_records(records: &[Record]) {
    for record in records {
        println!("{}", format_record(record));
    }
}

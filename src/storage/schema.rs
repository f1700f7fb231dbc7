//! Dataset schema and Arrow conversions
//!
//! The dataset has one row per record:
//!
//! | column     | type          |
//! |------------|---------------|
//! | `hashtags` | `List<Utf8>`  |
//! | `likes`    | `Utf8`        |
//! | `comments` | `Utf8`        |
//! | `shares`   | `Utf8`        |
//!
//! Counts stay strings so display values like `1.2M` survive untouched.

use crate::record::{Record, MISSING};
use crate::storage::{PersistenceError, PersistenceResult};
use arrow_array::builder::{ListBuilder, StringBuilder};
use arrow_array::cast::AsArray;
use arrow_array::{Array, ArrayRef, GenericStringArray, RecordBatch, StringArray};
use arrow_schema::{ArrowError, DataType, Field, Schema, SchemaRef};
use std::sync::Arc;

pub const HASHTAGS_COLUMN: &str = "hashtags";
pub const LIKES_COLUMN: &str = "likes";
pub const COMMENTS_COLUMN: &str = "comments";
pub const SHARES_COLUMN: &str = "shares";

/// Arrow schema of the dataset
pub fn dataset_schema() -> SchemaRef {
    let hashtag_item = Field::new("item", DataType::Utf8, true);
    Arc::new(Schema::new(vec![
        Field::new(HASHTAGS_COLUMN, DataType::List(Arc::new(hashtag_item)), true),
        Field::new(LIKES_COLUMN, DataType::Utf8, true),
        Field::new(COMMENTS_COLUMN, DataType::Utf8, true),
        Field::new(SHARES_COLUMN, DataType::Utf8, true),
    ]))
}

/// Builds one record batch holding every record in order
pub fn records_to_batch(records: &[Record]) -> Result<RecordBatch, ArrowError> {
    let mut hashtags = ListBuilder::new(StringBuilder::new());
    for record in records {
        for tag in record.hashtags() {
            hashtags.values().append_value(tag);
        }
        hashtags.append(true);
    }

    let likes = StringArray::from_iter_values(records.iter().map(Record::likes));
    let comments = StringArray::from_iter_values(records.iter().map(Record::comments));
    let shares = StringArray::from_iter_values(records.iter().map(Record::shares));

    let columns: Vec<ArrayRef> = vec![
        Arc::new(hashtags.finish()),
        Arc::new(likes),
        Arc::new(comments),
        Arc::new(shares),
    ];
    RecordBatch::try_new(dataset_schema(), columns)
}

/// Reads records back out of a batch
///
/// Columns are looked up by name. Null counts read back as `N/A` and a null
/// hashtag list as an empty one.
pub fn batch_to_records(batch: &RecordBatch) -> PersistenceResult<Vec<Record>> {
    let hashtags = batch
        .column_by_name(HASHTAGS_COLUMN)
        .ok_or_else(|| missing_column(HASHTAGS_COLUMN))?
        .as_list_opt::<i32>()
        .ok_or_else(|| wrong_type(HASHTAGS_COLUMN, "List<Utf8>"))?;
    let likes = string_column(batch, LIKES_COLUMN)?;
    let comments = string_column(batch, COMMENTS_COLUMN)?;
    let shares = string_column(batch, SHARES_COLUMN)?;

    let mut records = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let tags = if hashtags.is_null(row) {
            Vec::new()
        } else {
            let values = hashtags.value(row);
            let values = values
                .as_string_opt::<i32>()
                .ok_or_else(|| wrong_type(HASHTAGS_COLUMN, "List<Utf8>"))?;
            values
                .iter()
                .flatten()
                .map(str::to_string)
                .collect()
        };

        records.push(Record::new(
            tags,
            string_at(likes, row),
            string_at(comments, row),
            string_at(shares, row),
        ));
    }

    Ok(records)
}

fn string_column<'a>(
    batch: &'a RecordBatch,
    name: &str,
) -> PersistenceResult<&'a GenericStringArray<i32>> {
    batch
        .column_by_name(name)
        .ok_or_else(|| missing_column(name))?
        .as_string_opt::<i32>()
        .ok_or_else(|| wrong_type(name, "Utf8"))
}

fn string_at(array: &GenericStringArray<i32>, row: usize) -> String {
    if array.is_null(row) {
        MISSING.to_string()
    } else {
        array.value(row).to_string()
    }
}

fn missing_column(name: &str) -> PersistenceError {
    PersistenceError::Schema(format!("missing column '{}'", name))
}

fn wrong_type(name: &str, expected: &str) -> PersistenceError {
    PersistenceError::Schema(format!("column '{}' is not {}", name, expected))
}

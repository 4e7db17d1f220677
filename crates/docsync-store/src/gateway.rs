//! Store gateway contract
//!
//! The minimal surface the sync engine requires from a document store.
//! Filters are structured BSON predicate trees supporting equality,
//! membership (`$in`), and comparison (`$gt`/`$gte`/`$lt`/`$lte`) over
//! field paths.

use async_trait::async_trait;
use bson::{Bson, Document};
use docsync_common::Record;
use serde_json::Value;
use thiserror::Error;

/// Result type for gateway operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Per-operation store failures.
///
/// Each variant is recoverable at the per-record granularity; the sync
/// engine turns them into itemized outcome errors instead of aborting
/// the batch.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("store operation timed out")]
    Timeout,

    #[error("query error: {0}")]
    Query(String),
}

/// Minimal contract the sync engine consumes from the document store
#[async_trait]
pub trait StoreGateway: Send + Sync {
    /// Return the first document matching `filter`, or None
    async fn find_one(&self, filter: Document) -> StoreResult<Option<Document>>;

    /// Insert one document, returning the store-assigned identifier.
    ///
    /// A uniqueness violation surfaces as [`StoreError::Duplicate`].
    async fn insert_one(&self, doc: Document) -> StoreResult<Bson>;

    /// `$set`-style update of `fields` on documents matching `filter`.
    ///
    /// `upsert` creates a new document on no-match; `multi` widens the
    /// update to every matching document. Returns the number of
    /// documents written (modified or upserted).
    async fn update_one(
        &self,
        filter: Document,
        fields: Document,
        upsert: bool,
        multi: bool,
    ) -> StoreResult<u64>;

    /// Count documents matching `filter`
    async fn count(&self, filter: Document) -> StoreResult<u64>;

    /// Create a single-field index, optionally unique
    async fn create_index(&self, field: &str, unique: bool) -> StoreResult<()>;

    /// Release the underlying connection. Idempotent.
    async fn close(&self) -> StoreResult<()>;
}

/// Convert a canonicalized record into a BSON document
pub fn record_to_document(record: &Record) -> StoreResult<Document> {
    bson::to_document(record).map_err(|e| StoreError::Query(e.to_string()))
}

/// Convert a stored document back into a record.
///
/// Non-JSON BSON types (object ids, dates) come back in their relaxed
/// extended-JSON rendering; callers canonicalize before fingerprinting.
pub fn document_to_record(doc: &Document) -> Record {
    match Bson::Document(doc.clone()).into_relaxed_extjson() {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

/// Build an equality filter for one field
pub fn field_filter(field: &str, value: Bson) -> Document {
    let mut filter = Document::new();
    filter.insert(field, value);
    filter
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_round_trips_through_bson() {
        let mut record = Record::new();
        record.insert("npi".to_string(), json!(1003000126i64));
        record.insert("name".to_string(), json!("Alice"));
        record.insert("score".to_string(), json!(2.5));

        let doc = record_to_document(&record).unwrap();
        assert_eq!(doc.get_i64("npi").unwrap(), 1003000126);

        let back = document_to_record(&doc);
        assert_eq!(back.get("name"), Some(&json!("Alice")));
        assert_eq!(back.get("score"), Some(&json!(2.5)));
    }
}

//! Core data types shared across docsync

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One canonicalized logical row of source data.
///
/// Keys are canonical field names, values are store-safe canonical
/// values (null, bool, number, string, array, object). The backing map
/// keeps keys in a stable sorted order, so serializing a record is
/// deterministic.
pub type Record = serde_json::Map<String, Value>;

/// A soft, recoverable row-level failure.
///
/// Recorded on the batch that contained the row; never aborts the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    /// 1-based line number in the source, when known
    pub line: Option<u64>,
    pub reason: String,
}

impl RowError {
    pub fn new(line: Option<u64>, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "row {}: {}", line, self.reason),
            None => write!(f, "row ?: {}", self.reason),
        }
    }
}

/// A bounded, ordered group of records materialized together.
///
/// Produced by the stream reader one chunk at a time and discarded after
/// processing; peak memory is bounded by the configured chunk size.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Batch {
    /// Column identifiers in source order
    pub columns: Vec<String>,
    /// Records in source order
    pub records: Vec<Record>,
    /// Rows that failed to parse and were skipped
    pub errors: Vec<RowError>,
}

impl Batch {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            records: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Number of successfully parsed records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

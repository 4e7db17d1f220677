//! Error types for docsync

use thiserror::Error;

/// Result type alias for docsync operations
pub type Result<T> = std::result::Result<T, DocsyncError>;

/// Main error type for docsync
///
/// Fatal errors only. Per-row and per-record failures are recovered at
/// their boundary and surfaced as structured outcomes instead
/// (see [`crate::types::RowError`] and the sync report error list).
#[derive(Error, Debug)]
pub enum DocsyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("store error: {0}")]
    Store(String),
}

/// Fatal source-level failures, raised before any batch is produced
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("source not found: {0}")]
    NotFound(String),

    #[error("unsupported source format: {0}")]
    UnsupportedFormat(String),

    #[error("no archive entry matches prefix '{prefix}'")]
    NoMatchingEntry { prefix: String },

    #[error("archive prefix '{prefix}' is ambiguous, matches {matches:?}")]
    AmbiguousEntry { prefix: String, matches: Vec<String> },

    #[error("unsupported archive compression for entry '{entry}'")]
    UnsupportedCompression { entry: String },

    #[error("invalid archive: {0}")]
    InvalidArchive(String),

    #[error("missing header row in {0}")]
    MissingHeader(String),
}

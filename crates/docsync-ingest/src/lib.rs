//! Docsync Ingest Library
//!
//! Bounded-memory streaming decode of delimited tabular sources, schema
//! discovery, and the pure transforms applied to every row before it is
//! synchronized into the document store.
//!
//! # Pipeline
//!
//! Stream Reader -> Schema Normalizer -> Canonicalizer -> Fingerprinter
//!
//! # Example
//!
//! ```no_run
//! use docsync_ingest::reader::TabularReader;
//! use docsync_ingest::schema::normalize_columns;
//!
//! fn main() -> docsync_common::Result<()> {
//!     let reader = TabularReader::open("providers.zip", Some("npidata"))?;
//!     for batch in reader.read_chunks(1_000)? {
//!         let batch = normalize_columns(batch);
//!         println!("{} rows", batch.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod canonical;
pub mod fingerprint;
pub mod reader;
pub mod schema;
pub mod source;

pub use reader::TabularReader;
pub use source::{FileInfo, SourceKind, TabularSource};

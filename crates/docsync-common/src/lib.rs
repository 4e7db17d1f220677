//! Docsync Common Library
//!
//! Shared types, error handling, and logging for the docsync workspace.
//!
//! # Overview
//!
//! This crate provides common functionality used across all docsync
//! workspace members:
//!
//! - **Error Handling**: The error taxonomy shared by the reader, the
//!   sync engine, and the CLI
//! - **Types**: Records, batches, and soft row errors
//! - **Logging**: Centralized tracing setup
//!
//! # Example
//!
//! ```no_run
//! use docsync_common::{Result, Record};
//! use serde_json::Value;
//!
//! fn describe(record: &Record) -> Result<()> {
//!     for (field, value) in record {
//!         println!("{field} = {value}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{DocsyncError, Result, SourceError};
pub use types::{Batch, Record, RowError};

//! Docsync Store Library
//!
//! The document-store side of the pipeline: the minimal gateway contract
//! the sync engine needs, a MongoDB-backed implementation, an in-memory
//! implementation for tests and local development, and the
//! fingerprint-based synchronization engine itself.
//!
//! # Example
//!
//! ```no_run
//! use docsync_store::memory::MemoryGateway;
//! use docsync_store::sync::{SyncEngine, SyncOptions};
//! use std::sync::Arc;
//!
//! # async fn run() -> docsync_common::Result<()> {
//! let gateway = Arc::new(MemoryGateway::new());
//! let options = SyncOptions::new("npi", ["npi", "provider_first_name"]);
//! let engine = SyncEngine::new(gateway, options);
//! engine.ensure_unique_index().await?;
//! # Ok(())
//! # }
//! ```

pub mod gateway;
pub mod lookup;
pub mod memory;
pub mod mongo;
pub mod sync;

pub use gateway::{StoreError, StoreGateway, StoreResult};
pub use sync::{CancelFlag, SyncEngine, SyncOptions, SyncOutcome, SyncReport};

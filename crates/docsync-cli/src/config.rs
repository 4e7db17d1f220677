//! CLI configuration
//!
//! Settings come from a `.env` file and `DOCSYNC_*` environment
//! variables layered over the defaults below; flags on individual
//! subcommands override the resolved values.

use anyhow::{Context, Result};
use serde::Deserialize;

/// Resolved runtime configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Document store endpoint (e.g., "mongodb://localhost:27017")
    pub connection_string: String,
    /// Database name
    pub database: String,
    /// Collection name
    pub collection: String,
    /// Rows per batch during chunked reads
    pub chunk_size: usize,
    /// Rows consulted for schema inference
    pub sample_size: usize,
    /// Per-operation store timeout in seconds
    pub op_timeout_secs: u64,
}

impl AppConfig {
    /// Load configuration from the environment.
    ///
    /// Recognized variables: `DOCSYNC_CONNECTION_STRING`,
    /// `DOCSYNC_DATABASE`, `DOCSYNC_COLLECTION`, `DOCSYNC_CHUNK_SIZE`,
    /// `DOCSYNC_SAMPLE_SIZE`, `DOCSYNC_OP_TIMEOUT_SECS`.
    pub fn load() -> Result<Self> {
        // A missing .env file is fine; explicit variables still apply
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .set_default("connection_string", "mongodb://localhost:27017")?
            .set_default("database", "docsync")?
            .set_default("collection", "records")?
            .set_default("chunk_size", 1_000i64)?
            .set_default("sample_size", 100i64)?
            .set_default("op_timeout_secs", 30i64)?
            .add_source(config::Environment::with_prefix("DOCSYNC").try_parsing(true))
            .build()
            .context("Failed to assemble configuration")?;

        settings
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

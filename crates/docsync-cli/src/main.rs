//! Docsync - tabular-to-document-store synchronization tool

mod config;

use anyhow::Result;
use clap::Parser;
use config::AppConfig;
use docsync_common::logging::{init_logging, LogConfig, LogLevel};
use docsync_common::Batch;
use docsync_ingest::fingerprint::parse_field_list;
use docsync_ingest::schema::normalize_columns;
use docsync_ingest::TabularReader;
use docsync_store::lookup::find_by_identifier;
use docsync_store::mongo::MongoGateway;
use docsync_store::{CancelFlag, StoreGateway, SyncEngine, SyncOptions, SyncReport};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "docsync")]
#[command(author, version, about = "Synchronize tabular datasets into a document store")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Show resolved source information
    Info {
        /// Path to a CSV file or a ZIP archive
        source: PathBuf,

        /// Entry name prefix, for archives
        #[arg(short, long)]
        prefix: Option<String>,
    },

    /// Preview the first rows of a source
    Head {
        source: PathBuf,

        #[arg(short, long)]
        prefix: Option<String>,

        /// Number of rows to preview
        #[arg(short = 'n', long, default_value_t = 10)]
        rows: usize,
    },

    /// Infer column names and types from a sample
    Schema {
        source: PathBuf,

        #[arg(short, long)]
        prefix: Option<String>,

        /// Rows to sample
        #[arg(short, long)]
        sample_size: Option<usize>,
    },

    /// Synchronize a source into the document store
    Load {
        source: PathBuf,

        #[arg(short, long)]
        prefix: Option<String>,

        /// Field identifying a record in the store
        #[arg(short, long, default_value = "npi")]
        key_field: String,

        /// Comma-separated ordered field list the fingerprint covers
        /// (default: every field)
        #[arg(short, long)]
        fingerprint_fields: Option<String>,

        /// Rows per batch
        #[arg(short, long)]
        chunk_size: Option<usize>,

        /// Create new documents when an update matches nothing
        #[arg(long)]
        upsert: bool,

        /// Stop after this many rows
        #[arg(short, long)]
        limit: Option<u64>,
    },

    /// Find one document by identifier value
    Lookup {
        /// Identifier value (string or numeric)
        key: String,

        /// Base identifier field name
        #[arg(short, long, default_value = "npi")]
        field: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let log_config = LogConfig::from_env().unwrap_or_default().with_level(log_level);
    init_logging(&log_config)?;

    let config = AppConfig::load()?;

    match cli.command {
        Command::Info { source, prefix } => {
            let reader = TabularReader::open(&source, prefix.as_deref())?;
            let info = reader.file_info()?;
            println!("path:       {}", info.path.display());
            println!("kind:       {}", info.kind);
            println!("size:       {} bytes", info.size_bytes);
            if let Some(entry) = &info.entry_name {
                println!("entry:      {entry}");
            }
            if let (Some(compressed), Some(uncompressed)) =
                (info.compressed_size, info.uncompressed_size)
            {
                println!("compressed: {compressed} -> {uncompressed} bytes");
            }
        },
        Command::Head { source, prefix, rows } => {
            let reader = TabularReader::open(&source, prefix.as_deref())?;
            let batch = normalize_columns(reader.read_head(rows)?);
            for record in &batch.records {
                println!("{}", serde_json::to_string(record)?);
            }
        },
        Command::Schema {
            source,
            prefix,
            sample_size,
        } => {
            let reader = TabularReader::open(&source, prefix.as_deref())?;
            let sample_size = sample_size.unwrap_or(config.sample_size);
            let schema = reader.schema_sample(sample_size)?;
            info!(rows = schema.sampled_rows, "Schema inferred from sample");
            for (column, column_type) in &schema.columns {
                println!("{column}: {column_type}");
            }
        },
        Command::Load {
            source,
            prefix,
            key_field,
            fingerprint_fields,
            chunk_size,
            upsert,
            limit,
        } => {
            let reader = TabularReader::open(&source, prefix.as_deref())?;
            let info = reader.file_info()?;
            info!(path = %info.path.display(), kind = %info.kind, "Loading source");

            let options = SyncOptions::new(
                key_field,
                fingerprint_fields
                    .as_deref()
                    .map(parse_field_list)
                    .unwrap_or_default(),
            )
            .with_upsert(upsert)
            .with_timeout(Duration::from_secs(config.op_timeout_secs));

            let gateway = Arc::new(
                MongoGateway::connect(
                    &config.connection_string,
                    &config.database,
                    &config.collection,
                )
                .await?,
            );
            let engine = SyncEngine::new(gateway, options);

            // Run the load, then release the connection on every path
            let outcome = run_load(
                &engine,
                &reader,
                chunk_size.unwrap_or(config.chunk_size),
                limit,
            )
            .await;
            if let Err(close_error) = engine.close().await {
                warn!(error = %close_error, "Failed to release store connection");
            }

            let report = outcome?;
            print_report(&report);
            if !report.success() {
                warn!(errors = report.errors.len(), "Run completed with errors");
            }
        },
        Command::Lookup { key, field } => {
            let gateway = MongoGateway::connect(
                &config.connection_string,
                &config.database,
                &config.collection,
            )
            .await?;

            let result = find_by_identifier(&gateway, &field, &key).await;
            if let Err(close_error) = gateway.close().await {
                warn!(error = %close_error, "Failed to release store connection");
            }

            match result? {
                Some(doc) => {
                    let value = bson::Bson::Document(doc).into_relaxed_extjson();
                    println!("{}", serde_json::to_string_pretty(&value)?);
                },
                None => println!("not found"),
            }
        },
    }

    Ok(())
}

/// Drive the chunked read-normalize-sync loop
async fn run_load(
    engine: &SyncEngine,
    reader: &TabularReader,
    chunk_size: usize,
    limit: Option<u64>,
) -> Result<SyncReport> {
    engine.ensure_unique_index().await?;

    let cancel = CancelFlag::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping after the current batch");
            ctrl_c_cancel.cancel();
        }
    });

    let chunks = reader.read_chunks(chunk_size)?.map(normalize_columns);
    let chunks: Box<dyn Iterator<Item = Batch>> = match limit {
        Some(limit) => Box::new(chunks.scan(limit, |remaining, mut batch| {
            if *remaining == 0 {
                return None;
            }
            if batch.records.len() as u64 > *remaining {
                batch.records.truncate(*remaining as usize);
            }
            *remaining -= batch.records.len() as u64;
            Some(batch)
        })),
        None => Box::new(chunks),
    };

    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );

    let report = engine
        .sync_chunks(chunks, &cancel, |totals| {
            progress.set_message(format!(
                "{} processed ({} inserted, {} updated, {} skipped, {} failed)",
                totals.total_processed,
                totals.inserted,
                totals.updated,
                totals.skipped,
                totals.failed
            ));
            progress.tick();
        })
        .await;

    progress.finish_and_clear();
    Ok(report)
}

fn print_report(report: &SyncReport) {
    println!("processed: {}", report.total_processed);
    println!("inserted:  {}", report.inserted);
    println!("updated:   {}", report.updated);
    println!("skipped:   {}", report.skipped);
    println!("failed:    {}", report.failed);
    for error in &report.errors {
        match (&error.row, &error.key) {
            (_, Some(key)) => println!("  error [{key}]: {}", error.reason),
            (Some(row), None) => println!("  error [row {row}]: {}", error.reason),
            (None, None) => println!("  error: {}", error.reason),
        }
    }
}

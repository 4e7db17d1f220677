//! Fingerprint-based synchronization engine
//!
//! Per record: look up by key field, compare content fingerprints,
//! then insert, update only the provided fields, or skip. Every
//! per-record failure is caught and itemized; a batch of N records with
//! K failing records still yields N-K successful outcomes.

use crate::gateway::{
    document_to_record, field_filter, record_to_document, StoreError, StoreGateway, StoreResult,
};
use bson::Document;
use docsync_common::{Batch, DocsyncError, Record, Result};
use docsync_ingest::canonical::canonicalize_record;
use docsync_ingest::fingerprint::fingerprint;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Field on stored documents holding the last-synchronized fingerprint
pub const FINGERPRINT_FIELD: &str = "_fingerprint";

/// Terminal state of one record's synchronization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Inserted,
    Updated,
    /// Fingerprints matched, no write performed
    Skipped,
    Failed(String),
}

/// One itemized per-record failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncErrorEntry {
    /// Index of the record within its batch, when applicable
    pub row: Option<usize>,
    /// Key-field value, when the record had one
    pub key: Option<String>,
    pub reason: String,
}

/// Aggregate counts over a batch or a full run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
    pub inserted: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
    pub total_processed: u64,
    pub errors: Vec<SyncErrorEntry>,
}

impl SyncReport {
    /// True when no per-record errors were recorded
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    fn observe(&mut self, row: usize, key: Option<String>, outcome: &SyncOutcome) {
        self.total_processed += 1;
        match outcome {
            SyncOutcome::Inserted => self.inserted += 1,
            SyncOutcome::Updated => self.updated += 1,
            SyncOutcome::Skipped => self.skipped += 1,
            SyncOutcome::Failed(reason) => {
                self.failed += 1;
                self.errors.push(SyncErrorEntry {
                    row: Some(row),
                    key,
                    reason: reason.clone(),
                });
            },
        }
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: SyncReport) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.total_processed += other.total_processed;
        self.errors.extend(other.errors);
    }
}

/// Cooperative stop signal, honored between batches (never mid-record)
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Synchronization policy
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Field whose value identifies a record in the store
    pub key_field: String,
    /// Ordered field subset the fingerprint covers; empty means every
    /// field of the incoming record
    pub fingerprint_fields: Vec<String>,
    /// Create a new document when an update matches nothing
    pub upsert: bool,
    /// Update every matching document instead of the first
    pub multi: bool,
    /// Per-operation store timeout
    pub op_timeout: Duration,
    /// Embed the fingerprint on stored documents for fast comparison
    pub store_fingerprint: bool,
}

impl SyncOptions {
    pub fn new(
        key_field: impl Into<String>,
        fingerprint_fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            key_field: key_field.into(),
            fingerprint_fields: fingerprint_fields.into_iter().map(Into::into).collect(),
            upsert: false,
            multi: false,
            op_timeout: Duration::from_secs(30),
            store_fingerprint: true,
        }
    }

    pub fn with_upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    pub fn with_multi(mut self, multi: bool) -> Self {
        self.multi = multi;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    pub fn with_store_fingerprint(mut self, store: bool) -> Self {
        self.store_fingerprint = store;
        self
    }
}

/// Orchestrates lookup, fingerprint comparison, and writes
pub struct SyncEngine {
    gateway: Arc<dyn StoreGateway>,
    options: SyncOptions,
}

impl SyncEngine {
    pub fn new(gateway: Arc<dyn StoreGateway>, options: SyncOptions) -> Self {
        Self { gateway, options }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Ensure the unique index backing the key field exists
    pub async fn ensure_unique_index(&self) -> Result<()> {
        self.gateway
            .create_index(&self.options.key_field, true)
            .await
            .map_err(|e| DocsyncError::Store(e.to_string()))
    }

    /// Release the store connection
    pub async fn close(&self) -> Result<()> {
        self.gateway
            .close()
            .await
            .map_err(|e| DocsyncError::Store(e.to_string()))
    }

    async fn call<T, F>(&self, operation: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match tokio::time::timeout(self.options.op_timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout),
        }
    }

    fn fingerprint_fields(&self, record: &Record) -> Vec<String> {
        if self.options.fingerprint_fields.is_empty() {
            record.keys().cloned().collect()
        } else {
            self.options.fingerprint_fields.clone()
        }
    }

    fn key_of(&self, record: &Record) -> Option<Value> {
        record
            .get(&self.options.key_field)
            .filter(|v| !v.is_null())
            .cloned()
    }

    /// Fingerprint of a stored document over `fields`.
    ///
    /// Uses the embedded fingerprint when present, otherwise recomputes
    /// from the stored fields after canonicalization.
    fn stored_fingerprint(&self, stored: &Document, fields: &[String]) -> String {
        if let Ok(embedded) = stored.get_str(FINGERPRINT_FIELD) {
            return embedded.to_string();
        }
        let record = canonicalize_record(document_to_record(stored));
        fingerprint(&record, fields)
    }

    /// Synchronize one canonicalized record, returning its terminal state.
    ///
    /// Never returns an error; every failure is folded into
    /// [`SyncOutcome::Failed`].
    pub async fn sync_record(&self, record: &Record) -> SyncOutcome {
        let Some(key) = self.key_of(record) else {
            return SyncOutcome::Failed(format!(
                "missing key field '{}'",
                self.options.key_field
            ));
        };

        let key_bson = match bson::to_bson(&key) {
            Ok(b) => b,
            Err(e) => return SyncOutcome::Failed(format!("unrepresentable key: {e}")),
        };
        let filter = field_filter(&self.options.key_field, key_bson);

        let existing = match self.call(self.gateway.find_one(filter.clone())).await {
            Ok(existing) => existing,
            Err(e) => return SyncOutcome::Failed(e.to_string()),
        };

        let fields = self.fingerprint_fields(record);
        let incoming = fingerprint(record, &fields);

        match existing {
            Some(stored) => {
                if self.stored_fingerprint(&stored, &fields) == incoming {
                    debug!(key = %key, "Fingerprints match, skipping");
                    return SyncOutcome::Skipped;
                }
                let mut set_fields = match record_to_document(record) {
                    Ok(doc) => doc,
                    Err(e) => return SyncOutcome::Failed(e.to_string()),
                };
                if self.options.store_fingerprint {
                    set_fields.insert(FINGERPRINT_FIELD, incoming);
                }
                match self
                    .call(self.gateway.update_one(
                        filter,
                        set_fields,
                        self.options.upsert,
                        self.options.multi,
                    ))
                    .await
                {
                    Ok(_) => SyncOutcome::Updated,
                    Err(e) => SyncOutcome::Failed(e.to_string()),
                }
            },
            None => {
                let mut doc = match record_to_document(record) {
                    Ok(doc) => doc,
                    Err(e) => return SyncOutcome::Failed(e.to_string()),
                };
                if self.options.store_fingerprint {
                    doc.insert(FINGERPRINT_FIELD, incoming);
                }
                match self.call(self.gateway.insert_one(doc)).await {
                    Ok(_) => SyncOutcome::Inserted,
                    // Lost an insert race; the caller may retry as update
                    Err(StoreError::Duplicate(reason)) => {
                        warn!(key = %key, "Insert rejected as duplicate");
                        SyncOutcome::Failed(format!("duplicate: {reason}"))
                    },
                    Err(e) => SyncOutcome::Failed(e.to_string()),
                }
            },
        }
    }

    /// Synchronize every record of a batch, isolating per-record
    /// failures. Soft row errors carried by the batch are folded into
    /// the report's error list.
    pub async fn sync_batch(&self, batch: &Batch) -> SyncReport {
        let mut report = SyncReport::default();

        for row_error in &batch.errors {
            report.failed += 1;
            report.total_processed += 1;
            report.errors.push(SyncErrorEntry {
                row: row_error.line.map(|l| l as usize),
                key: None,
                reason: row_error.reason.clone(),
            });
        }

        for (row, record) in batch.records.iter().enumerate() {
            let key = self.key_of(record).map(|v| value_to_key_string(&v));
            let outcome = self.sync_record(record).await;
            report.observe(row, key, &outcome);
        }

        report
    }

    /// Drive a whole run: pull batches, synchronize each, merge reports.
    ///
    /// Cancellation is honored between batches; the report always covers
    /// everything processed so far.
    pub async fn sync_chunks<I>(
        &self,
        chunks: I,
        cancel: &CancelFlag,
        mut on_batch: impl FnMut(&SyncReport),
    ) -> SyncReport
    where
        I: IntoIterator<Item = Batch>,
    {
        let run_id = Uuid::new_v4();
        let mut totals = SyncReport::default();

        for (index, batch) in chunks.into_iter().enumerate() {
            if cancel.is_cancelled() {
                info!(%run_id, batches = index, "Run cancelled, reporting partial counts");
                break;
            }
            let report = self.sync_batch(&batch).await;
            debug!(
                %run_id,
                batch = index,
                inserted = report.inserted,
                updated = report.updated,
                skipped = report.skipped,
                failed = report.failed,
                "Batch synchronized"
            );
            totals.merge(report);
            on_batch(&totals);
        }

        info!(
            %run_id,
            inserted = totals.inserted,
            updated = totals.updated,
            skipped = totals.skipped,
            failed = totals.failed,
            total = totals.total_processed,
            "Run complete"
        );
        totals
    }

    /// Apply a field-map update to documents matching the key value.
    ///
    /// `fields` may come from a single-row batch flattened with
    /// [`single_row_fields`]; honors the engine's upsert/multi flags.
    pub async fn update_fields(&self, key: &Value, fields: Record) -> SyncOutcome {
        let key_bson = match bson::to_bson(key) {
            Ok(b) => b,
            Err(e) => return SyncOutcome::Failed(format!("unrepresentable key: {e}")),
        };
        let filter = field_filter(&self.options.key_field, key_bson);
        let canonical = canonicalize_record(fields);
        let mut set_fields = match record_to_document(&canonical) {
            Ok(doc) => doc,
            Err(e) => return SyncOutcome::Failed(e.to_string()),
        };
        // Refresh the embedded fingerprint only when every covered field
        // is part of this update; a partial update keeps none at all.
        if self.options.store_fingerprint {
            let fp_fields = self.fingerprint_fields(&canonical);
            if fp_fields.iter().all(|f| canonical.contains_key(f)) {
                set_fields.insert(FINGERPRINT_FIELD, fingerprint(&canonical, &fp_fields));
            }
        }
        match self
            .call(self.gateway.update_one(
                filter,
                set_fields,
                self.options.upsert,
                self.options.multi,
            ))
            .await
        {
            Ok(0) => SyncOutcome::Skipped,
            Ok(_) => SyncOutcome::Updated,
            Err(e) => SyncOutcome::Failed(e.to_string()),
        }
    }
}

/// Flatten a single-row tabular structure into a field map.
///
/// Returns None unless the batch holds exactly one record.
pub fn single_row_fields(batch: &Batch) -> Option<Record> {
    match batch.records.as_slice() {
        [only] => Some(only.clone()),
        _ => None,
    }
}

fn value_to_key_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

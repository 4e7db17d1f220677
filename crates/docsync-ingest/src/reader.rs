//! Streaming tabular reader
//!
//! One interface over plain and archive-packaged delimited sources:
//! head-preview, schema sampling, and bounded-memory chunked reads.
//! Every cell is canonicalized as it is parsed, so downstream components
//! only ever see store-safe values.

use crate::canonical::canonicalize_cell;
use crate::schema::{infer_schema, SchemaSample};
use crate::source::{FileInfo, TabularSource};
use docsync_common::{Batch, DocsyncError, Record, Result, RowError, SourceError};
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Streaming reader over a resolved tabular source
#[derive(Debug, Clone)]
pub struct TabularReader {
    source: TabularSource,
}

impl TabularReader {
    /// Resolve and open a source reference.
    ///
    /// See [`TabularSource::open`] for prefix semantics on archives.
    pub fn open(path: impl AsRef<Path>, prefix: Option<&str>) -> Result<Self> {
        Ok(Self {
            source: TabularSource::open(path, prefix)?,
        })
    }

    pub fn from_source(source: TabularSource) -> Self {
        Self { source }
    }

    /// Resolved size, kind, and archive entry details
    pub fn file_info(&self) -> Result<FileInfo> {
        self.source.file_info()
    }

    fn csv_reader(&self) -> Result<csv::Reader<Box<dyn Read + Send>>> {
        Ok(csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(self.source.open_stream()?))
    }

    fn headers(reader: &mut csv::Reader<Box<dyn Read + Send>>, path: &Path) -> Result<Vec<String>> {
        let headers = reader
            .headers()
            .map_err(|_| SourceError::MissingHeader(path.display().to_string()))?;
        if headers.is_empty() {
            return Err(SourceError::MissingHeader(path.display().to_string()).into());
        }
        Ok(headers.iter().map(String::from).collect())
    }

    /// Materialize the first `n` rows eagerly, for inspection.
    ///
    /// Reads from a fresh stream; later chunked reads are unaffected.
    pub fn read_head(&self, n: usize) -> Result<Batch> {
        if n == 0 {
            let mut reader = self.csv_reader()?;
            let columns = Self::headers(&mut reader, self.source.path())?;
            return Ok(Batch::new(columns));
        }
        let mut chunks = self.read_chunks(n)?;
        Ok(chunks.next().unwrap_or_else(|| Batch::new(chunks.columns().to_vec())))
    }

    /// Infer column names and best-effort types from the first
    /// `sample_size` rows. Never scans the full source.
    pub fn schema_sample(&self, sample_size: usize) -> Result<SchemaSample> {
        let head = self.read_head(sample_size)?;
        Ok(infer_schema(&head))
    }

    /// Produce a lazy, finite, non-restartable sequence of batches of at
    /// most `chunk_size` rows each, in source order, covering the source
    /// exactly once. Peak memory is bounded by `chunk_size` regardless of
    /// total source size.
    pub fn read_chunks(&self, chunk_size: usize) -> Result<Chunks> {
        if chunk_size == 0 {
            return Err(DocsyncError::Config(
                "chunk size must be at least 1".to_string(),
            ));
        }
        let mut reader = self.csv_reader()?;
        let columns = Self::headers(&mut reader, self.source.path())?;
        debug!(columns = columns.len(), chunk_size, "Starting chunked read");
        Ok(Chunks {
            columns,
            records: reader.into_records(),
            chunk_size,
            done: false,
        })
    }
}

/// Iterator of bounded batches produced by [`TabularReader::read_chunks`]
pub struct Chunks {
    columns: Vec<String>,
    records: csv::StringRecordsIntoIter<Box<dyn Read + Send>>,
    chunk_size: usize,
    done: bool,
}

impl Chunks {
    /// Column identifiers from the header row, in source order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn row_to_record(&self, row: &csv::StringRecord) -> Record {
        self.columns
            .iter()
            .zip(row.iter())
            .map(|(column, cell)| (column.clone(), canonicalize_cell(cell)))
            .collect()
    }
}

impl Iterator for Chunks {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.done {
            return None;
        }

        let mut batch = Batch::new(self.columns.clone());
        while batch.len() < self.chunk_size {
            match self.records.next() {
                Some(Ok(row)) => batch.records.push(self.row_to_record(&row)),
                Some(Err(err)) => {
                    // Malformed rows are soft errors; a broken underlying
                    // stream ends the sequence after being recorded.
                    let line = err.position().map(|p| p.line());
                    warn!(line, error = %err, "Skipping malformed row");
                    batch.errors.push(RowError::new(line, err.to_string()));
                    if matches!(err.kind(), csv::ErrorKind::Io(_)) {
                        self.done = true;
                        break;
                    }
                },
                None => {
                    self.done = true;
                    break;
                },
            }
        }

        if batch.is_empty() && batch.errors.is_empty() {
            None
        } else {
            Some(batch)
        }
    }
}

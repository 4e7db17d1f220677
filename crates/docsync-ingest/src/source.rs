//! Tabular source resolution
//!
//! A source reference is either a plain delimited-text file or a ZIP
//! archive plus a name prefix selecting exactly one contained `.csv`
//! entry. Both variants resolve at construction time; reading is done
//! through fresh streams so head-previews never disturb chunked reads.
//!
//! Archive entries are streamed straight out of the archive (stored or
//! deflate) instead of being materialized, keeping memory bounded even
//! for multi-gigabyte exports.

use docsync_common::{DocsyncError, Result, SourceError};
use flate2::read::DeflateDecoder;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::{CompressionMethod, ZipArchive};

/// Detected source kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Plain delimited-text file
    Plain,
    /// Delimited-text entry inside a ZIP archive
    Zipped,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Plain => write!(f, "plain"),
            SourceKind::Zipped => write!(f, "zipped"),
        }
    }
}

/// Resolved information about a source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: PathBuf,
    pub kind: SourceKind,
    /// On-disk size of the file or archive
    pub size_bytes: u64,
    /// Selected entry name, for archives
    pub entry_name: Option<String>,
    /// Compressed entry size, for archives
    pub compressed_size: Option<u64>,
    /// Uncompressed entry size, for archives
    pub uncompressed_size: Option<u64>,
}

/// How the selected archive entry is compressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryCompression {
    Stored,
    Deflated,
}

/// Location of the selected entry's data within the archive
#[derive(Debug, Clone)]
struct ZipEntry {
    name: String,
    data_start: u64,
    compressed_size: u64,
    uncompressed_size: u64,
    compression: EntryCompression,
}

/// A resolved tabular source, ready to produce fresh byte streams
#[derive(Debug, Clone)]
pub struct TabularSource {
    path: PathBuf,
    kind: SourceKind,
    entry: Option<ZipEntry>,
}

impl TabularSource {
    /// Resolve a source reference.
    ///
    /// `prefix` is required for archives and ignored for plain files; it
    /// must match exactly one `.csv` entry (case-insensitive name-prefix
    /// match) or resolution fails loudly.
    pub fn open(path: impl AsRef<Path>, prefix: Option<&str>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(SourceError::NotFound(path.display().to_string()).into());
        }

        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "csv" | "tsv" | "txt" => Ok(Self {
                path,
                kind: SourceKind::Plain,
                entry: None,
            }),
            "zip" => {
                let entry = select_entry(&path, prefix.unwrap_or(""))?;
                debug!(
                    entry = %entry.name,
                    compressed = entry.compressed_size,
                    uncompressed = entry.uncompressed_size,
                    "Resolved archive entry"
                );
                Ok(Self {
                    path,
                    kind: SourceKind::Zipped,
                    entry: Some(entry),
                })
            },
            other => Err(SourceError::UnsupportedFormat(other.to_string()).into()),
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolved size, kind, and entry details
    pub fn file_info(&self) -> Result<FileInfo> {
        let size_bytes = std::fs::metadata(&self.path)?.len();
        Ok(FileInfo {
            path: self.path.clone(),
            kind: self.kind,
            size_bytes,
            entry_name: self.entry.as_ref().map(|e| e.name.clone()),
            compressed_size: self.entry.as_ref().map(|e| e.compressed_size),
            uncompressed_size: self.entry.as_ref().map(|e| e.uncompressed_size),
        })
    }

    /// Open a fresh byte stream over the source contents.
    ///
    /// Each call returns an independent stream starting at the first
    /// byte; concurrent or repeated reads never interfere.
    pub fn open_stream(&self) -> Result<Box<dyn Read + Send>> {
        let mut file = File::open(&self.path)?;
        match &self.entry {
            None => Ok(Box::new(file)),
            Some(entry) => {
                file.seek(SeekFrom::Start(entry.data_start))?;
                let limited = file.take(entry.compressed_size);
                match entry.compression {
                    EntryCompression::Stored => Ok(Box::new(limited)),
                    EntryCompression::Deflated => {
                        Ok(Box::new(DeflateDecoder::new(limited)))
                    },
                }
            },
        }
    }
}

/// Select exactly one `.csv` entry by case-insensitive name prefix
fn select_entry(path: &Path, prefix: &str) -> Result<ZipEntry> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| SourceError::InvalidArchive(e.to_string()))?;

    let wanted = prefix.to_lowercase();
    let matches: Vec<String> = archive
        .file_names()
        .filter(|name| {
            let lower = name.to_lowercase();
            lower.starts_with(&wanted) && lower.ends_with(".csv")
        })
        .map(String::from)
        .collect();

    let name = match matches.as_slice() {
        [] => {
            return Err(SourceError::NoMatchingEntry {
                prefix: prefix.to_string(),
            }
            .into())
        },
        [only] => only.clone(),
        _ => {
            return Err(SourceError::AmbiguousEntry {
                prefix: prefix.to_string(),
                matches,
            }
            .into())
        },
    };

    let entry = archive
        .by_name(&name)
        .map_err(|e| SourceError::InvalidArchive(e.to_string()))?;

    let compression = match entry.compression() {
        CompressionMethod::Stored => EntryCompression::Stored,
        CompressionMethod::Deflated => EntryCompression::Deflated,
        _ => {
            return Err(DocsyncError::Source(SourceError::UnsupportedCompression {
                entry: name,
            }))
        },
    };

    Ok(ZipEntry {
        name: entry.name().to_string(),
        data_start: entry.data_start(),
        compressed_size: entry.compressed_size(),
        uncompressed_size: entry.size(),
        compression,
    })
}

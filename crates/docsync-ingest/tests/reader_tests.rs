//! Integration tests for the streaming tabular reader

use docsync_common::{DocsyncError, SourceError};
use docsync_ingest::reader::TabularReader;
use docsync_ingest::schema::{normalize_columns, ColumnType};
use docsync_ingest::source::SourceKind;
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

const SAMPLE_CSV: &str = "\
NPI,Provider First Name,Provider Age,Score
1003000126,Alice,25,0.5
1003000127,Bob,31,1.25
1003000128,Carol,47,
";

fn write_csv(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn write_zip(dir: &TempDir, name: &str, entries: &[(&str, &str)]) -> PathBuf {
    let path = dir.path().join(name);
    let file = std::fs::File::create(&path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default();
    for (entry_name, contents) in entries {
        zip.start_file(*entry_name, options).unwrap();
        zip.write_all(contents.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
    path
}

#[test]
fn plain_csv_head_and_info() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir, "providers.csv", SAMPLE_CSV);
    let reader = TabularReader::open(&path, None).unwrap();

    let info = reader.file_info().unwrap();
    assert_eq!(info.kind, SourceKind::Plain);
    assert!(info.size_bytes > 0);
    assert!(info.entry_name.is_none());

    let head = reader.read_head(2).unwrap();
    assert_eq!(head.len(), 2);
    assert_eq!(head.columns[0], "NPI");
    assert_eq!(head.records[0].get("Provider First Name"), Some(&json!("Alice")));
    assert_eq!(head.records[0].get("Provider Age"), Some(&json!(25)));
}

#[test]
fn cells_are_canonicalized_during_parse() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir, "providers.csv", SAMPLE_CSV);
    let reader = TabularReader::open(&path, None).unwrap();

    let head = reader.read_head(3).unwrap();
    assert_eq!(head.records[1].get("Score"), Some(&json!(1.25)));
    // Empty trailing cell becomes an explicit null
    assert_eq!(head.records[2].get("Score"), Some(&serde_json::Value::Null));
}

#[test]
fn schema_sample_infers_types() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir, "providers.csv", SAMPLE_CSV);
    let reader = TabularReader::open(&path, None).unwrap();

    let schema = reader.schema_sample(100).unwrap();
    assert_eq!(schema.sampled_rows, 3);
    let types: Vec<_> = schema.columns.iter().map(|(_, t)| *t).collect();
    assert_eq!(
        types,
        vec![
            ColumnType::Integer,
            ColumnType::Text,
            ColumnType::Integer,
            ColumnType::Float
        ]
    );
}

#[test]
fn chunks_cover_source_exactly_once_with_bounded_size() {
    let dir = TempDir::new().unwrap();
    let mut contents = String::from("id,name\n");
    for i in 0..10_000 {
        contents.push_str(&format!("{i},row-{i}\n"));
    }
    let path = write_csv(&dir, "large.csv", &contents);
    let reader = TabularReader::open(&path, None).unwrap();

    let mut total = 0usize;
    let mut next_expected = 0i64;
    for batch in reader.read_chunks(64).unwrap() {
        assert!(batch.len() <= 64, "batch exceeded chunk size");
        for record in &batch.records {
            assert_eq!(record.get("id"), Some(&json!(next_expected)));
            next_expected += 1;
        }
        total += batch.len();
    }
    assert_eq!(total, 10_000);
}

#[test]
fn head_preview_does_not_disturb_chunked_reads() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir, "providers.csv", SAMPLE_CSV);
    let reader = TabularReader::open(&path, None).unwrap();

    let _ = reader.read_head(2).unwrap();
    let total: usize = reader.read_chunks(2).unwrap().map(|b| b.len()).sum();
    assert_eq!(total, 3);
}

#[test]
fn malformed_rows_become_soft_errors() {
    let dir = TempDir::new().unwrap();
    let contents = "id,name\n1,Alice\n2,Bob,EXTRA\n3,Carol\n";
    let path = write_csv(&dir, "ragged.csv", contents);
    let reader = TabularReader::open(&path, None).unwrap();

    let batches: Vec<_> = reader.read_chunks(10).unwrap().collect();
    assert_eq!(batches.len(), 1);
    let batch = &batches[0];
    assert_eq!(batch.len(), 2);
    assert_eq!(batch.errors.len(), 1);
    assert_eq!(batch.errors[0].line, Some(3));
    // Well-formed rows keep their order
    assert_eq!(batch.records[0].get("name"), Some(&json!("Alice")));
    assert_eq!(batch.records[1].get("name"), Some(&json!("Carol")));
}

#[test]
fn zip_source_streams_single_matching_entry() {
    let dir = TempDir::new().unwrap();
    let path = write_zip(
        &dir,
        "providers.zip",
        &[
            ("npidata_pfile_20240101.csv", SAMPLE_CSV),
            ("readme.txt", "not a csv"),
        ],
    );
    let reader = TabularReader::open(&path, Some("npidata")).unwrap();

    let info = reader.file_info().unwrap();
    assert_eq!(info.kind, SourceKind::Zipped);
    assert_eq!(info.entry_name.as_deref(), Some("npidata_pfile_20240101.csv"));
    assert_eq!(info.uncompressed_size, Some(SAMPLE_CSV.len() as u64));

    let total: usize = reader.read_chunks(2).unwrap().map(|b| b.len()).sum();
    assert_eq!(total, 3);
}

#[test]
fn zip_prefix_match_is_case_insensitive() {
    let dir = TempDir::new().unwrap();
    let path = write_zip(&dir, "providers.zip", &[("NPIDATA_PFILE.csv", SAMPLE_CSV)]);
    let reader = TabularReader::open(&path, Some("npidata")).unwrap();
    assert_eq!(reader.read_head(10).unwrap().len(), 3);
}

#[test]
fn ambiguous_zip_prefix_fails_loudly() {
    let dir = TempDir::new().unwrap();
    let path = write_zip(
        &dir,
        "providers.zip",
        &[("npidata_a.csv", SAMPLE_CSV), ("npidata_b.csv", SAMPLE_CSV)],
    );
    let err = TabularReader::open(&path, Some("npidata")).unwrap_err();
    assert!(matches!(
        err,
        DocsyncError::Source(SourceError::AmbiguousEntry { .. })
    ));
}

#[test]
fn zero_matches_in_zip_fails_loudly() {
    let dir = TempDir::new().unwrap();
    let path = write_zip(&dir, "providers.zip", &[("other.csv", SAMPLE_CSV)]);
    let err = TabularReader::open(&path, Some("npidata")).unwrap_err();
    assert!(matches!(
        err,
        DocsyncError::Source(SourceError::NoMatchingEntry { .. })
    ));
}

#[test]
fn missing_source_fails_before_any_batch() {
    let err = TabularReader::open("/nonexistent/providers.csv", None).unwrap_err();
    assert!(matches!(
        err,
        DocsyncError::Source(SourceError::NotFound(_))
    ));
}

#[test]
fn unsupported_extension_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir, "providers.parquet", "not really");
    let err = TabularReader::open(&path, None).unwrap_err();
    assert!(matches!(
        err,
        DocsyncError::Source(SourceError::UnsupportedFormat(_))
    ));
}

#[test]
fn normalize_columns_is_a_noop_on_normalized_batches() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir, "providers.csv", SAMPLE_CSV);
    let reader = TabularReader::open(&path, None).unwrap();

    let batch = normalize_columns(reader.read_head(3).unwrap());
    assert_eq!(
        batch.columns,
        vec!["npi", "provider_first_name", "provider_age", "score"]
    );
    let again = normalize_columns(batch.clone());
    assert_eq!(again.columns, batch.columns);
    assert_eq!(again.records, batch.records);
}

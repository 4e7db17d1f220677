//! Column naming and schema discovery
//!
//! Column identifiers from real-world exports arrive with mixed case,
//! whitespace, and punctuation ("Provider First Name", "Postal Code
//! (If Outside U.S.)"). They are rewritten to a canonical lower-case,
//! underscore-delimited convention before anything downstream sees them.

use docsync_common::{Batch, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Best-effort column type inferred from a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Only nulls seen so far
    #[default]
    Unknown,
    Boolean,
    Integer,
    Float,
    Text,
}

impl ColumnType {
    fn of(value: &Value) -> Self {
        match value {
            Value::Null => ColumnType::Unknown,
            Value::Bool(_) => ColumnType::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => ColumnType::Integer,
            Value::Number(_) => ColumnType::Float,
            _ => ColumnType::Text,
        }
    }

    /// Widen to the narrowest type covering both operands
    fn widen(self, other: Self) -> Self {
        use ColumnType::*;
        match (self, other) {
            (Unknown, t) | (t, Unknown) => t,
            (a, b) if a == b => a,
            (Integer, Float) | (Float, Integer) => Float,
            _ => Text,
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::Unknown => write!(f, "unknown"),
            ColumnType::Boolean => write!(f, "boolean"),
            ColumnType::Integer => write!(f, "integer"),
            ColumnType::Float => write!(f, "float"),
            ColumnType::Text => write!(f, "text"),
        }
    }
}

/// Schema inferred from the head of a source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSample {
    /// (canonical column name, inferred type) in source column order
    pub columns: Vec<(String, ColumnType)>,
    /// Number of rows the inference saw
    pub sampled_rows: usize,
}

/// Rewrite one column identifier to the canonical convention.
///
/// Lowercase, every run of non-alphanumeric characters collapsed to a
/// single underscore, leading/trailing underscores trimmed. Idempotent.
pub fn normalize_column(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for ch in name.chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Rewrite all column identifiers and record keys in a batch.
///
/// A no-op on batches that are already normalized.
pub fn normalize_columns(batch: Batch) -> Batch {
    let columns: Vec<String> = batch.columns.iter().map(|c| normalize_column(c)).collect();
    let records = batch
        .records
        .into_iter()
        .map(|record| {
            record
                .into_iter()
                .map(|(k, v)| (normalize_column(&k), v))
                .collect::<Record>()
        })
        .collect();
    Batch {
        columns,
        records,
        errors: batch.errors,
    }
}

/// Infer a best-effort schema from already-parsed sample rows
pub fn infer_schema(batch: &Batch) -> SchemaSample {
    let mut types = vec![ColumnType::Unknown; batch.columns.len()];
    for record in &batch.records {
        for (i, column) in batch.columns.iter().enumerate() {
            if let Some(value) = record.get(column) {
                types[i] = types[i].widen(ColumnType::of(value));
            }
        }
    }
    SchemaSample {
        columns: batch
            .columns
            .iter()
            .cloned()
            .zip(types)
            .collect(),
        sampled_rows: batch.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_collapses_punctuation_and_case() {
        assert_eq!(normalize_column("Provider First Name"), "provider_first_name");
        assert_eq!(
            normalize_column("Postal Code (If Outside U.S.)"),
            "postal_code_if_outside_u_s"
        );
        assert_eq!(normalize_column("  NPI  "), "npi");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize_column("Healthcare Provider Taxonomy Code_1");
        assert_eq!(normalize_column(&once), once);
    }

    #[test]
    fn normalize_columns_rewrites_keys() {
        let mut batch = Batch::new(vec!["Provider NPI".to_string()]);
        let mut record = docsync_common::Record::new();
        record.insert("Provider NPI".to_string(), json!(1003000126i64));
        batch.records.push(record);

        let batch = normalize_columns(batch);
        assert_eq!(batch.columns, vec!["provider_npi"]);
        assert_eq!(batch.records[0].get("provider_npi"), Some(&json!(1003000126i64)));
    }

    #[test]
    fn widening_lattice() {
        use ColumnType::*;
        assert_eq!(Unknown.widen(Integer), Integer);
        assert_eq!(Integer.widen(Float), Float);
        assert_eq!(Integer.widen(Text), Text);
        assert_eq!(Boolean.widen(Integer), Text);
    }

    #[test]
    fn infer_schema_from_mixed_sample() {
        let mut batch = Batch::new(vec![
            "id".to_string(),
            "score".to_string(),
            "name".to_string(),
            "empty".to_string(),
        ]);
        for (id, score, name) in [(1, json!(0.5), "a"), (2, json!(2), "b")] {
            let mut record = docsync_common::Record::new();
            record.insert("id".to_string(), json!(id));
            record.insert("score".to_string(), score);
            record.insert("name".to_string(), json!(name));
            record.insert("empty".to_string(), serde_json::Value::Null);
            batch.records.push(record);
        }

        let schema = infer_schema(&batch);
        assert_eq!(schema.sampled_rows, 2);
        assert_eq!(schema.columns[0], ("id".to_string(), ColumnType::Integer));
        assert_eq!(schema.columns[1], ("score".to_string(), ColumnType::Float));
        assert_eq!(schema.columns[2], ("name".to_string(), ColumnType::Text));
        assert_eq!(schema.columns[3], ("empty".to_string(), ColumnType::Unknown));
    }
}

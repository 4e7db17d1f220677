//! Content fingerprints
//!
//! Derives a deterministic MD5 hex token over a caller-selected, ordered
//! subset of a record's fields. Two records with identical canonical
//! values for the selected fields always hash to the same token, across
//! calls and across process restarts; nested objects serialize with
//! sorted keys so field order inside a document never leaks into the
//! token.

use docsync_common::Record;
use serde_json::Value;

/// Separator between field tokens in the pre-hash serialization.
///
/// The ASCII unit separator cannot appear in canonical numeric or
/// boolean tokens and is vanishingly rare in text, so adjacent fields
/// cannot collide by concatenation.
const FIELD_SEPARATOR: char = '\u{1F}';

/// Parse the documented comma-separated field list form.
///
/// `"id,name,age"` becomes `["id", "name", "age"]`; order is preserved
/// and blank segments are dropped.
pub fn parse_field_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Deterministic text rendering of one canonical value.
///
/// Nulls and missing fields render as the empty token, scalars use their
/// canonical formatting, nested values use compact JSON with sorted keys.
pub fn canonical_token(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string(value).unwrap_or_default()
        },
    }
}

/// Compute the fingerprint of `record` over `fields`, in order.
///
/// Fields absent from the record contribute the empty token, so the
/// fingerprint is defined even over partially-overlapping schemas.
pub fn fingerprint(record: &Record, fields: &[String]) -> String {
    let mut buf = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            buf.push(FIELD_SEPARATOR);
        }
        if let Some(value) = record.get(field) {
            buf.push_str(&canonical_token(value));
        }
    }
    format!("{:x}", md5::compute(buf.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn fields(list: &str) -> Vec<String> {
        parse_field_list(list)
    }

    #[test]
    fn parse_field_list_preserves_order() {
        assert_eq!(fields("id,name,age"), vec!["id", "name", "age"]);
        assert_eq!(fields(" id , ,name "), vec!["id", "name"]);
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let r = record(&[("id", json!(1)), ("name", json!("Alice")), ("age", json!(25))]);
        let f = fields("id,name,age");
        assert_eq!(fingerprint(&r, &f), fingerprint(&r, &f));
        // Fixed-length lowercase hex token
        let token = fingerprint(&r, &f);
        assert_eq!(token.len(), 32);
        assert!(token.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn unrelated_field_drift_does_not_change_fingerprint() {
        let a = record(&[("id", json!(1)), ("name", json!("Alice")), ("extra", json!("x"))]);
        let b = record(&[("id", json!(1)), ("name", json!("Alice")), ("extra", json!("y"))]);
        let f = fields("id,name");
        assert_eq!(fingerprint(&a, &f), fingerprint(&b, &f));
    }

    #[test]
    fn changing_a_selected_field_changes_fingerprint() {
        let a = record(&[("id", json!(1)), ("age", json!(25))]);
        let b = record(&[("id", json!(1)), ("age", json!(26))]);
        let f = fields("id,age");
        assert_ne!(fingerprint(&a, &f), fingerprint(&b, &f));
    }

    #[test]
    fn field_order_is_significant() {
        let r = record(&[("a", json!("x")), ("b", json!("y"))]);
        assert_ne!(fingerprint(&r, &fields("a,b")), fingerprint(&r, &fields("b,a")));
    }

    #[test]
    fn missing_fields_hash_like_nulls() {
        let with_null = record(&[("id", json!(1)), ("name", Value::Null)]);
        let without = record(&[("id", json!(1))]);
        let f = fields("id,name");
        assert_eq!(fingerprint(&with_null, &f), fingerprint(&without, &f));
    }

    #[test]
    fn adjacent_fields_cannot_collide_by_concatenation() {
        let a = record(&[("x", json!("ab")), ("y", json!("c"))]);
        let b = record(&[("x", json!("a")), ("y", json!("bc"))]);
        let f = fields("x,y");
        assert_ne!(fingerprint(&a, &f), fingerprint(&b, &f));
    }

    #[test]
    fn nested_objects_hash_with_sorted_keys() {
        let a = record(&[("meta", json!({ "b": 2, "a": 1 }))]);
        let b = record(&[("meta", json!({ "a": 1, "b": 2 }))]);
        let f = fields("meta");
        assert_eq!(fingerprint(&a, &f), fingerprint(&b, &f));
    }

    #[test]
    fn sensitivity_over_ten_thousand_records() {
        let f = fields("id,name,age");
        let mut seen = std::collections::HashSet::new();
        for i in 0..10_000i64 {
            let r = record(&[
                ("id", json!(i)),
                ("name", json!(format!("provider-{i}"))),
                ("age", json!(i % 97)),
            ]);
            assert!(seen.insert(fingerprint(&r, &f)), "collision at record {i}");
        }
        assert_eq!(seen.len(), 10_000);
    }
}

//! Value canonicalization
//!
//! Converts heterogeneous source values into store-safe canonical values:
//! missing-value sentinels become explicit nulls, numeric text becomes the
//! narrowest native number that preserves the value, and nested structures
//! are canonicalized element-wise. All transforms are pure and never fail;
//! a value that cannot be represented is kept as its string rendering so a
//! single malformed cell cannot abort the pipeline.

use docsync_common::Record;
use serde_json::Value;

/// Largest magnitude at which every integral f64 is exactly representable
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0; // 2^53

/// Sentinel spellings that mean "no value" in delimited exports
fn is_missing_sentinel(s: &str) -> bool {
    matches!(
        s.to_ascii_lowercase().as_str(),
        "" | "na" | "n/a" | "nan" | "null" | "none" | "nil"
    )
}

/// Canonicalize one raw delimited-text cell.
///
/// Numeric text with a leading zero (postal codes, identifiers) keeps its
/// text form so no digits are lost.
pub fn canonicalize_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    if is_missing_sentinel(trimmed) {
        return Value::Null;
    }

    if trimmed.len() > 1
        && trimmed.starts_with('0')
        && trimmed.bytes().all(|b| b.is_ascii_digit())
    {
        return Value::String(trimmed.to_string());
    }

    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::from(int);
    }

    if let Ok(float) = trimmed.parse::<f64>() {
        return canonicalize_f64(float);
    }

    match trimmed.to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(trimmed.to_string()),
    }
}

/// Narrow an f64 to the canonical numeric representation.
///
/// Integral values become i64, non-finite values become null.
pub fn canonicalize_f64(value: f64) -> Value {
    if !value.is_finite() {
        return Value::Null;
    }
    if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
        return Value::from(value as i64);
    }
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Recursively canonicalize an already-typed value.
///
/// Arrays and objects keep their structure; only the leaves change.
pub fn canonicalize_value(value: Value) -> Value {
    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => value,
        Value::Number(n) => {
            if let Some(int) = n.as_i64() {
                Value::from(int)
            } else if let Some(uint) = n.as_u64() {
                Value::from(uint)
            } else if let Some(float) = n.as_f64() {
                canonicalize_f64(float)
            } else {
                // Unreachable with the default serde_json number model
                Value::String(n.to_string())
            }
        },
        Value::Array(items) => {
            Value::Array(items.into_iter().map(canonicalize_value).collect())
        },
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, canonicalize_value(v)))
                .collect(),
        ),
    }
}

/// Canonicalize every field of a record
pub fn canonicalize_record(record: Record) -> Record {
    record
        .into_iter()
        .map(|(k, v)| (k, canonicalize_value(v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sentinels_become_null() {
        for raw in ["", "  ", "NA", "n/a", "NaN", "null", "NONE"] {
            assert_eq!(canonicalize_cell(raw), Value::Null, "raw = {raw:?}");
        }
    }

    #[test]
    fn integers_stay_integral() {
        assert_eq!(canonicalize_cell("42"), json!(42));
        assert_eq!(canonicalize_cell("-7"), json!(-7));
        assert_eq!(canonicalize_cell("25.0"), json!(25));
        assert_eq!(canonicalize_cell("1e3"), json!(1000));
    }

    #[test]
    fn non_integral_values_become_floats() {
        assert_eq!(canonicalize_cell("2.5"), json!(2.5));
        assert_eq!(canonicalize_cell("-0.125"), json!(-0.125));
    }

    #[test]
    fn leading_zero_identifiers_keep_text_form() {
        assert_eq!(canonicalize_cell("007"), json!("007"));
        assert_eq!(canonicalize_cell("02115"), json!("02115"));
        // A bare zero is still numeric
        assert_eq!(canonicalize_cell("0"), json!(0));
    }

    #[test]
    fn booleans_parse() {
        assert_eq!(canonicalize_cell("true"), json!(true));
        assert_eq!(canonicalize_cell("FALSE"), json!(false));
    }

    #[test]
    fn everything_else_is_text() {
        assert_eq!(canonicalize_cell(" Alice "), json!("Alice"));
        assert_eq!(canonicalize_cell("1003000126x"), json!("1003000126x"));
    }

    #[test]
    fn non_finite_floats_become_null() {
        assert_eq!(canonicalize_f64(f64::NAN), Value::Null);
        assert_eq!(canonicalize_f64(f64::INFINITY), Value::Null);
    }

    #[test]
    fn nested_structures_are_canonicalized_elementwise() {
        let input = json!({
            "scores": [1.0, 2.5, null],
            "meta": { "count": 3.0 }
        });
        let expected = json!({
            "scores": [1, 2.5, null],
            "meta": { "count": 3 }
        });
        assert_eq!(canonicalize_value(input), expected);
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let input = json!({ "a": [1, "x", { "b": 2.25 }], "c": true });
        let once = canonicalize_value(input);
        let twice = canonicalize_value(once.clone());
        assert_eq!(once, twice);
    }
}

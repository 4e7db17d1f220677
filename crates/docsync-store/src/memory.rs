//! In-memory store gateway
//!
//! Interprets the same filter subset as the MongoDB backend (equality,
//! `$in`, `$gt`/`$gte`/`$lt`/`$lte`) over an in-process document list,
//! with unique-index emulation. Used by tests and local development;
//! numeric comparisons coerce across Int32/Int64/Double the way the real
//! store does.

use crate::gateway::{StoreError, StoreGateway, StoreResult};
use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Inner {
    docs: Vec<Document>,
    unique_fields: HashSet<String>,
}

/// In-process store gateway
#[derive(Debug, Default)]
pub struct MemoryGateway {
    inner: Mutex<Inner>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents, for test assertions
    pub fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn numeric(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

/// Weak ordering across comparable BSON values, numeric types coerced
fn bson_ord(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (numeric(a), numeric(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn bson_eq(a: &Bson, b: &Bson) -> bool {
    bson_ord(a, b) == Some(Ordering::Equal) || a == b
}

fn condition_matches(value: Option<&Bson>, condition: &Bson) -> bool {
    // An operator document applies each operator; anything else is equality
    if let Bson::Document(ops) = condition {
        if ops.keys().any(|k| k.starts_with('$')) {
            return ops.iter().all(|(op, operand)| {
                let Some(actual) = value else { return false };
                match op.as_str() {
                    "$eq" => bson_eq(actual, operand),
                    "$ne" => !bson_eq(actual, operand),
                    "$in" => match operand {
                        Bson::Array(items) => items.iter().any(|item| bson_eq(actual, item)),
                        _ => false,
                    },
                    "$gt" => bson_ord(actual, operand) == Some(Ordering::Greater),
                    "$gte" => matches!(
                        bson_ord(actual, operand),
                        Some(Ordering::Greater | Ordering::Equal)
                    ),
                    "$lt" => bson_ord(actual, operand) == Some(Ordering::Less),
                    "$lte" => matches!(
                        bson_ord(actual, operand),
                        Some(Ordering::Less | Ordering::Equal)
                    ),
                    _ => false,
                }
            });
        }
    }
    match value {
        Some(actual) => bson_eq(actual, condition),
        None => matches!(condition, Bson::Null),
    }
}

/// Evaluate a filter document against a stored document
fn matches(filter: &Document, doc: &Document) -> bool {
    filter
        .iter()
        .all(|(field, condition)| condition_matches(doc.get(field), condition))
}

fn apply_set(doc: &mut Document, fields: &Document) {
    for (key, value) in fields {
        doc.insert(key.clone(), value.clone());
    }
}

#[async_trait]
impl StoreGateway for MemoryGateway {
    async fn find_one(&self, filter: Document) -> StoreResult<Option<Document>> {
        let inner = self
            .inner
            .lock()
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(inner.docs.iter().find(|doc| matches(&filter, doc)).cloned())
    }

    async fn insert_one(&self, mut doc: Document) -> StoreResult<Bson> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|e| StoreError::Query(e.to_string()))?;

        for field in &inner.unique_fields {
            if let Some(value) = doc.get(field) {
                let clash = inner
                    .docs
                    .iter()
                    .any(|existing| existing.get(field).is_some_and(|v| bson_eq(v, value)));
                if clash {
                    return Err(StoreError::Duplicate(format!(
                        "E11000 duplicate key on field '{field}'"
                    )));
                }
            }
        }

        let id = doc
            .get("_id")
            .cloned()
            .unwrap_or_else(|| Bson::ObjectId(ObjectId::new()));
        doc.insert("_id", id.clone());
        inner.docs.push(doc);
        Ok(id)
    }

    async fn update_one(
        &self,
        filter: Document,
        fields: Document,
        upsert: bool,
        multi: bool,
    ) -> StoreResult<u64> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let mut written = 0u64;
        for doc in inner.docs.iter_mut().filter(|doc| matches(&filter, doc)) {
            apply_set(doc, &fields);
            written += 1;
            if !multi {
                break;
            }
        }

        if written == 0 && upsert {
            // Seed the new document from the filter's equality terms
            let mut doc = Document::new();
            for (field, condition) in &filter {
                if !matches!(condition, Bson::Document(_)) {
                    doc.insert(field.clone(), condition.clone());
                }
            }
            apply_set(&mut doc, &fields);
            doc.insert("_id", Bson::ObjectId(ObjectId::new()));
            inner.docs.push(doc);
            written = 1;
        }

        Ok(written)
    }

    async fn count(&self, filter: Document) -> StoreResult<u64> {
        let inner = self
            .inner
            .lock()
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(inner.docs.iter().filter(|doc| matches(&filter, doc)).count() as u64)
    }

    async fn create_index(&self, field: &str, unique: bool) -> StoreResult<()> {
        if unique {
            let mut inner = self
                .inner
                .lock()
                .map_err(|e| StoreError::Query(e.to_string()))?;
            inner.unique_fields.insert(field.to_string());
        }
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[tokio::test]
    async fn equality_and_comparison_filters() {
        let gateway = MemoryGateway::new();
        gateway
            .insert_one(doc! { "id": 1i64, "age": 25i64 })
            .await
            .unwrap();
        gateway
            .insert_one(doc! { "id": 2i64, "age": 31i64 })
            .await
            .unwrap();

        assert!(gateway
            .find_one(doc! { "id": 1i64 })
            .await
            .unwrap()
            .is_some());
        assert_eq!(gateway.count(doc! { "age": doc! { "$gte": 26i64 } }).await.unwrap(), 1);
        assert_eq!(
            gateway
                .count(doc! { "id": doc! { "$in": [1i64, 2i64, 3i64] } })
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn numeric_comparison_coerces_types() {
        let gateway = MemoryGateway::new();
        gateway.insert_one(doc! { "n": 25i64 }).await.unwrap();
        // Int32 filter value matches Int64 stored value
        assert!(gateway
            .find_one(doc! { "n": Bson::Int32(25) })
            .await
            .unwrap()
            .is_some());
        assert!(gateway
            .find_one(doc! { "n": Bson::Double(25.0) })
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn unique_index_rejects_duplicates() {
        let gateway = MemoryGateway::new();
        gateway.create_index("npi", true).await.unwrap();
        gateway
            .insert_one(doc! { "npi": 1003000126i64 })
            .await
            .unwrap();
        let err = gateway
            .insert_one(doc! { "npi": 1003000126i64 })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn upsert_creates_on_no_match() {
        let gateway = MemoryGateway::new();
        let written = gateway
            .update_one(doc! { "id": 9i64 }, doc! { "name": "new" }, true, false)
            .await
            .unwrap();
        assert_eq!(written, 1);
        let doc = gateway.find_one(doc! { "id": 9i64 }).await.unwrap().unwrap();
        assert_eq!(doc.get_str("name").unwrap(), "new");
    }

    #[tokio::test]
    async fn multi_widens_update() {
        let gateway = MemoryGateway::new();
        gateway.insert_one(doc! { "g": 1i64, "v": 0i64 }).await.unwrap();
        gateway.insert_one(doc! { "g": 1i64, "v": 0i64 }).await.unwrap();
        let written = gateway
            .update_one(doc! { "g": 1i64 }, doc! { "v": 1i64 }, false, true)
            .await
            .unwrap();
        assert_eq!(written, 2);
    }
}

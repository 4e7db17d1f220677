//! Identifier lookup helper
//!
//! Read-only convenience over the gateway's generic query capability:
//! probes a small fixed set of field-name variants of an identifier
//! field, with both string and integer renderings of the supplied key,
//! and returns the first matching document. Mirrors how provider
//! registries store the same NPI under "npi", "NPI", or "number"
//! depending on which export produced the document.

use crate::gateway::{field_filter, StoreGateway, StoreResult};
use bson::{Bson, Document};
use tracing::debug;

/// Field-name variants probed for a base identifier field
fn candidate_fields(base: &str) -> Vec<String> {
    let mut fields = vec![
        base.to_lowercase(),
        base.to_uppercase(),
        "number".to_string(),
    ];
    fields.dedup();
    fields
}

/// Value renderings probed for a key
fn candidate_values(key: &str) -> Vec<Bson> {
    let mut values = vec![Bson::String(key.to_string())];
    if let Ok(int) = key.parse::<i64>() {
        values.push(Bson::Int64(int));
    }
    values
}

/// Find the first document whose identifier matches `key` under any
/// probed field/value combination, or None.
pub async fn find_by_identifier(
    gateway: &dyn StoreGateway,
    base_field: &str,
    key: &str,
) -> StoreResult<Option<Document>> {
    for field in candidate_fields(base_field) {
        for value in candidate_values(key) {
            if let Some(doc) = gateway.find_one(field_filter(&field, value)).await? {
                debug!(field, key, "Identifier matched");
                return Ok(Some(doc));
            }
        }
    }
    debug!(base_field, key, "Identifier not found");
    Ok(None)
}

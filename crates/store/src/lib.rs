//! Document store abstraction.
//!
//! Documents are JSON objects addressed by `(collection, key)`. Collections
//! are flat strings; sub-collections use slash-separated paths such as
//! `events/<id>/attendees`.
//!
//! Two implementations are provided:
//!
//! - [`MemoryStore`] — process-local, used by tests and local runs.
//! - [`PgStore`] — one JSONB table in PostgreSQL.

pub mod memory;
pub mod postgres;
pub mod query;

use async_trait::async_trait;
use serde_json::Value;

pub use confernet_common::error::StoreError;
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use query::{Direction, Filter, FilterOp, Query};

/// A document together with its key.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub key: String,
    pub data: Value,
}

/// One step of a [`DocumentStore::delete_batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deletion {
    Document { collection: String, key: String },
    Collection(String),
}

impl Deletion {
    pub fn document(collection: &str, key: &str) -> Self {
        Deletion::Document {
            collection: collection.to_string(),
            key: key.to_string(),
        }
    }

    pub fn collection(collection: &str) -> Self {
        Deletion::Collection(collection.to_string())
    }
}

/// Keyed document storage with merge and array-set semantics.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch one document. `Ok(None)` when the key does not exist.
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError>;

    /// Insert a document under a freshly generated key and return the key.
    async fn add(&self, collection: &str, data: Value) -> Result<String, StoreError>;

    /// Create or replace a document.
    async fn set(&self, collection: &str, key: &str, data: Value) -> Result<(), StoreError>;

    /// Create a document or deep-merge `data` into the existing one.
    /// Fields not present in `data` are preserved.
    async fn merge(&self, collection: &str, key: &str, data: Value) -> Result<(), StoreError>;

    /// Append `values` to the array at `field`, skipping values already present.
    /// Fails with [`StoreError::NotFound`] when the document does not exist.
    async fn array_union(
        &self,
        collection: &str,
        key: &str,
        field: &str,
        values: &[Value],
    ) -> Result<(), StoreError>;

    /// Remove every occurrence of `values` from the array at `field`.
    /// Fails with [`StoreError::NotFound`] when the document does not exist.
    async fn array_remove(
        &self,
        collection: &str,
        key: &str,
        field: &str,
        values: &[Value],
    ) -> Result<(), StoreError>;

    /// Delete one document. Returns whether it existed.
    async fn delete(&self, collection: &str, key: &str) -> Result<bool, StoreError>;

    /// Delete every document of a collection. Returns the number removed.
    async fn delete_collection(&self, collection: &str) -> Result<u64, StoreError>;

    /// Apply every deletion as one unit: either all take effect or none do.
    /// Returns the number of documents removed.
    async fn delete_batch(&self, deletions: &[Deletion]) -> Result<u64, StoreError>;

    /// All documents of a collection, ordered by key.
    async fn list(&self, collection: &str) -> Result<Vec<StoredDocument>, StoreError>;

    /// Documents matching `query`.
    async fn query(&self, collection: &str, query: &Query)
    -> Result<Vec<StoredDocument>, StoreError>;
}

/// Deep-merge `patch` into `target`: objects merge key by key, anything else replaces.
pub fn merge_values(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

/// Apply an array-union to one field of a document object.
///
/// A missing or non-array field is replaced by a new array.
pub fn apply_array_union(doc: &mut Value, field: &str, values: &[Value]) -> Result<(), StoreError> {
    let obj = doc
        .as_object_mut()
        .ok_or_else(|| StoreError::InvalidDocument("document is not an object".to_string()))?;
    let entry = obj
        .entry(field.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !entry.is_array() {
        *entry = Value::Array(Vec::new());
    }
    if let Value::Array(items) = entry {
        for value in values {
            if !items.contains(value) {
                items.push(value.clone());
            }
        }
    }
    Ok(())
}

/// Apply an array-remove to one field of a document object.
///
/// A missing or non-array field becomes an empty array.
pub fn apply_array_remove(
    doc: &mut Value,
    field: &str,
    values: &[Value],
) -> Result<(), StoreError> {
    let obj = doc
        .as_object_mut()
        .ok_or_else(|| StoreError::InvalidDocument("document is not an object".to_string()))?;
    let entry = obj
        .entry(field.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    match entry {
        Value::Array(items) => items.retain(|item| !values.contains(item)),
        other => *other = Value::Array(Vec::new()),
    }
    Ok(())
}

/// Ensure a document body is a JSON object.
pub(crate) fn require_object(data: &Value) -> Result<(), StoreError> {
    if data.is_object() {
        Ok(())
    } else {
        Err(StoreError::InvalidDocument(
            "document body must be a JSON object".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_is_deep() {
        let mut doc = json!({ "users": { "u1": { "name": "Ada" } }, "count": 1 });
        merge_values(&mut doc, json!({ "users": { "u2": { "name": "Linus" } } }));
        assert_eq!(
            doc,
            json!({
                "users": { "u1": { "name": "Ada" }, "u2": { "name": "Linus" } },
                "count": 1
            })
        );
    }

    #[test]
    fn test_merge_replaces_non_objects() {
        let mut doc = json!({ "tags": ["a"], "venue": "Hall A" });
        merge_values(&mut doc, json!({ "tags": ["b"], "venue": null }));
        assert_eq!(doc, json!({ "tags": ["b"], "venue": null }));
    }

    #[test]
    fn test_array_union_skips_duplicates() {
        let mut doc = json!({ "savedEvents": ["e1"] });
        apply_array_union(&mut doc, "savedEvents", &[json!("e1"), json!("e2")]).unwrap();
        assert_eq!(doc["savedEvents"], json!(["e1", "e2"]));
    }

    #[test]
    fn test_array_union_creates_field() {
        let mut doc = json!({});
        apply_array_union(&mut doc, "moderators", &[json!("u1")]).unwrap();
        assert_eq!(doc["moderators"], json!(["u1"]));
    }

    #[test]
    fn test_array_remove() {
        let mut doc = json!({ "registeredEvents": ["e1", "e2", "e1"] });
        apply_array_remove(&mut doc, "registeredEvents", &[json!("e1")]).unwrap();
        assert_eq!(doc["registeredEvents"], json!(["e2"]));
    }
}

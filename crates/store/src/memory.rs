//! In-process document store.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    Deletion, DocumentStore, Query, StoreError, StoredDocument, apply_array_remove,
    apply_array_union, merge_values, require_object,
};

/// Document store held in memory, keyed by collection then document key.
///
/// Counts single-document reads so callers can assert how many lookups an
/// operation performed.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Value>>>,
    reads: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of [`DocumentStore::get`] calls served so far.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    async fn update_existing<F>(&self, collection: &str, key: &str, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Value) -> Result<(), StoreError>,
    {
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(key))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                key: key.to_string(),
            })?;
        f(doc)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(key))
            .cloned())
    }

    async fn add(&self, collection: &str, data: Value) -> Result<String, StoreError> {
        require_object(&data)?;
        let key = Uuid::new_v4().simple().to_string();
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(key.clone(), data);
        Ok(key)
    }

    async fn set(&self, collection: &str, key: &str, data: Value) -> Result<(), StoreError> {
        require_object(&data)?;
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), data);
        Ok(())
    }

    async fn merge(&self, collection: &str, key: &str, data: Value) -> Result<(), StoreError> {
        require_object(&data)?;
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        match docs.get_mut(key) {
            Some(existing) => merge_values(existing, data),
            None => {
                docs.insert(key.to_string(), data);
            }
        }
        Ok(())
    }

    async fn array_union(
        &self,
        collection: &str,
        key: &str,
        field: &str,
        values: &[Value],
    ) -> Result<(), StoreError> {
        self.update_existing(collection, key, |doc| {
            apply_array_union(doc, field, values)
        })
        .await
    }

    async fn array_remove(
        &self,
        collection: &str,
        key: &str,
        field: &str,
        values: &[Value],
    ) -> Result<(), StoreError> {
        self.update_existing(collection, key, |doc| {
            apply_array_remove(doc, field, values)
        })
        .await
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(collection)
            .map(|docs| docs.remove(key).is_some())
            .unwrap_or(false))
    }

    async fn delete_collection(&self, collection: &str) -> Result<u64, StoreError> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .remove(collection)
            .map(|docs| docs.len() as u64)
            .unwrap_or(0))
    }

    async fn delete_batch(&self, deletions: &[Deletion]) -> Result<u64, StoreError> {
        let mut collections = self.collections.write().await;
        let mut removed = 0;
        for deletion in deletions {
            removed += match deletion {
                Deletion::Document { collection, key } => collections
                    .get_mut(collection)
                    .map(|docs| u64::from(docs.remove(key).is_some()))
                    .unwrap_or(0),
                Deletion::Collection(collection) => collections
                    .remove(collection)
                    .map(|docs| docs.len() as u64)
                    .unwrap_or(0),
            };
        }
        Ok(removed)
    }

    async fn list(&self, collection: &str) -> Result<Vec<StoredDocument>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(key, data)| StoredDocument {
                        key: key.clone(),
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn query(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let docs = self.list(collection).await?;
        Ok(query.apply(docs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Direction, FilterOp};
    use serde_json::json;

    #[tokio::test]
    async fn test_add_then_get() {
        let store = MemoryStore::new();
        let key = store.add("events", json!({ "name": "RustConf" })).await.unwrap();
        let doc = store.get("events", &key).await.unwrap().unwrap();
        assert_eq!(doc["name"], "RustConf");
        assert!(store.get("events", "missing").await.unwrap().is_none());
        assert_eq!(store.reads(), 2);
    }

    #[tokio::test]
    async fn test_rejects_non_object_documents() {
        let store = MemoryStore::new();
        let err = store.set("users", "u1", json!("plain string")).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidDocument(_)));
    }

    #[tokio::test]
    async fn test_merge_preserves_unspecified_fields() {
        let store = MemoryStore::new();
        store
            .set("users", "u1", json!({ "name": "Ada", "email": "ada@example.com" }))
            .await
            .unwrap();
        store
            .merge("users", "u1", json!({ "name": "Ada L." }))
            .await
            .unwrap();
        let doc = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(doc, json!({ "name": "Ada L.", "email": "ada@example.com" }));
    }

    #[tokio::test]
    async fn test_array_union_requires_existing_document() {
        let store = MemoryStore::new();
        let err = store
            .array_union("users", "ghost", "registeredEvents", &[json!("e1")])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_sub_collections_are_independent() {
        let store = MemoryStore::new();
        store
            .set("events/e1/attendees", "u1", json!({ "userId": "u1" }))
            .await
            .unwrap();
        store
            .set("events/e2/attendees", "u2", json!({ "userId": "u2" }))
            .await
            .unwrap();

        assert_eq!(store.delete_collection("events/e1/attendees").await.unwrap(), 1);
        assert!(store.list("events/e1/attendees").await.unwrap().is_empty());
        assert_eq!(store.list("events/e2/attendees").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_batch_removes_event_with_sub_collections() {
        let store = MemoryStore::new();
        store.set("events", "e1", json!({ "name": "RustConf" })).await.unwrap();
        store.set("events", "e2", json!({ "name": "Other" })).await.unwrap();
        store
            .set("events/e1/sessions", "s1", json!({ "title": "Intro" }))
            .await
            .unwrap();
        store
            .set("events/e1/attendees", "u1", json!({ "userId": "u1" }))
            .await
            .unwrap();
        store
            .set("events/e1/attendees", "u2", json!({ "userId": "u2" }))
            .await
            .unwrap();

        let removed = store
            .delete_batch(&[
                Deletion::collection("events/e1/sessions"),
                Deletion::collection("events/e1/attendees"),
                Deletion::document("events", "e1"),
                Deletion::document("events", "missing"),
            ])
            .await
            .unwrap();

        assert_eq!(removed, 4);
        assert!(store.get("events", "e1").await.unwrap().is_none());
        assert!(store.get("events", "e2").await.unwrap().is_some());
        assert!(store.list("events/e1/attendees").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_query_orders_results() {
        let store = MemoryStore::new();
        store.set("users", "a", json!({ "role": 3, "name": "b" })).await.unwrap();
        store.set("users", "b", json!({ "role": 3, "name": "a" })).await.unwrap();
        store.set("users", "c", json!({ "role": 1, "name": "c" })).await.unwrap();

        let query = Query::new()
            .filter("role", FilterOp::Eq, json!(3))
            .order_by("name", Direction::Ascending);
        let keys: Vec<_> = store
            .query("users", &query)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.key)
            .collect();
        assert_eq!(keys, vec!["b", "a"]);
    }
}

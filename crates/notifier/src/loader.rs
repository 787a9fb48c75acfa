//! Batch loading of recipient user documents.

use futures::future::join_all;

use confernet_common::types::{User, collections};
use confernet_store::DocumentStore;

use crate::recipients::RecipientSet;

/// Fetch the user document of every recipient concurrently.
///
/// One lookup per key, all in flight at once; there is no batching limit, so
/// very large recipient sets produce as many concurrent lookups. Keys without
/// a document are left out. A failed lookup or an undecodable document is
/// logged and left out as well. Users without an email address are kept.
/// The result has no particular order.
pub async fn load_existing(store: &dyn DocumentStore, ids: &RecipientSet) -> Vec<User> {
    let lookups = ids.iter().map(|id| async move {
        (id, store.get(collections::USERS, id).await)
    });

    let mut users = Vec::with_capacity(ids.len());
    for (id, result) in join_all(lookups).await {
        match result {
            Ok(Some(data)) => match User::from_document(id, data) {
                Ok(user) => users.push(user),
                Err(e) => {
                    tracing::warn!(user_id = id, error = %e, "Skipping undecodable user document");
                }
            },
            Ok(None) => {
                tracing::debug!(user_id = id, "Recipient has no user document");
            }
            Err(e) => {
                tracing::warn!(user_id = id, error = %e, "User lookup failed");
            }
        }
    }

    users
}

#[cfg(test)]
mod tests {
    use super::*;
    use confernet_store::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_missing_users_are_excluded() {
        let store = MemoryStore::new();
        store
            .set("users", "u1", json!({ "name": "Ada", "email": "ada@example.com" }))
            .await
            .unwrap();
        store.set("users", "u3", json!({ "name": "Grace" })).await.unwrap();

        let ids: RecipientSet = ["u1", "u2", "u3"].into_iter().collect();
        let mut users = load_existing(&store, &ids).await;
        users.sort_by(|a, b| a.id.cmp(&b.id));

        assert_eq!(store.reads(), 3);
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].id, "u1");
        assert_eq!(users[1].id, "u3");
        assert!(users[1].email.is_none());
    }

    #[tokio::test]
    async fn test_empty_set_performs_no_lookups() {
        let store = MemoryStore::new();
        let users = load_existing(&store, &RecipientSet::new()).await;
        assert!(users.is_empty());
        assert_eq!(store.reads(), 0);
    }
}

//! Recipient set resolution.
//!
//! The recipients of an event notification are the union of its keynote
//! speakers, moderators and attendees, deduplicated by user key. Entries that
//! are not non-empty strings are dropped and reported so the upstream data
//! can be fixed.

use std::collections::BTreeSet;

use confernet_common::error::StoreError;
use confernet_common::types::{RelationEntry, collections};
use confernet_store::DocumentStore;

/// Deduplicated set of user keys eligible for one notification batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientSet {
    ids: BTreeSet<String>,
}

impl RecipientSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a candidate key. Returns `false` when the key is empty after
    /// trimming and was therefore rejected.
    pub fn insert(&mut self, id: &str) -> bool {
        let id = id.trim();
        if id.is_empty() {
            return false;
        }
        self.ids.insert(id.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

impl<'a> FromIterator<&'a str> for RecipientSet {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        let mut set = RecipientSet::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

/// Add every valid user key from `entries` to `set`. Returns how many entries
/// were dropped as malformed.
pub fn extend_from_relations<'a, I>(set: &mut RecipientSet, entries: I) -> usize
where
    I: IntoIterator<Item = &'a RelationEntry>,
{
    let mut dropped = 0;
    for entry in entries {
        let accepted = entry.user_id().map(|id| set.insert(id)).unwrap_or(false);
        if !accepted {
            dropped += 1;
        }
    }
    dropped
}

/// Resolve the recipient set of one event.
///
/// Speaker and moderator lists come from the event document; attendees are
/// read live from `events/<id>/attendees`. A missing attendee collection is
/// simply empty. Store failures while listing attendees are returned.
pub async fn resolve_recipients(
    store: &dyn DocumentStore,
    event_id: &str,
    speakers: &[RelationEntry],
    moderators: &[RelationEntry],
) -> Result<RecipientSet, StoreError> {
    let attendees = store.list(&collections::attendees(event_id)).await?;

    let mut set = RecipientSet::new();
    let mut dropped = extend_from_relations(&mut set, speakers);
    dropped += extend_from_relations(&mut set, moderators);
    for attendee in &attendees {
        if !set.insert(&attendee.key) {
            dropped += 1;
        }
    }

    if dropped > 0 {
        tracing::warn!(
            event_id,
            dropped,
            "Event references malformed user keys; upstream data needs cleanup"
        );
    }

    tracing::debug!(
        event_id,
        speakers = speakers.len(),
        moderators = moderators.len(),
        attendees = attendees.len(),
        recipients = set.len(),
        "Resolved recipient set"
    );

    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use confernet_store::MemoryStore;
    use serde_json::json;

    fn ids(list: &[&str]) -> Vec<RelationEntry> {
        list.iter().map(|id| RelationEntry::from(*id)).collect()
    }

    #[test]
    fn test_set_deduplicates_and_trims() {
        let set: RecipientSet = ["u1", " u1 ", "u2", "", "   "].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert!(set.contains("u1"));
        assert!(set.contains("u2"));
    }

    #[test]
    fn test_malformed_entries_are_counted() {
        let entries = vec![
            RelationEntry::from("u1"),
            RelationEntry::Malformed(json!(null)),
            RelationEntry::Malformed(json!({ "speakerId": "u2" })),
            RelationEntry::from(""),
        ];
        let mut set = RecipientSet::new();
        assert_eq!(extend_from_relations(&mut set, &entries), 3);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["u1"]);
    }

    #[tokio::test]
    async fn test_resolve_overlapping_relations() {
        let store = MemoryStore::new();
        for user in ["u2", "u3"] {
            store
                .set(&collections::attendees("E1"), user, json!({ "userId": user }))
                .await
                .unwrap();
        }

        let set = resolve_recipients(&store, "E1", &ids(&["u1"]), &ids(&["u1", "u2"]))
            .await
            .unwrap();

        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["u1", "u2", "u3"]);
    }

    #[tokio::test]
    async fn test_resolve_empty_event() {
        let store = MemoryStore::new();
        let set = resolve_recipients(&store, "E0", &[], &[]).await.unwrap();
        assert!(set.is_empty());
        assert_eq!(store.reads(), 0);
    }
}

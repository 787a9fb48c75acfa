use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::time::parse_timestamp;

/// Collection names used by the document store.
pub mod collections {
    pub const USERS: &str = "users";
    pub const EVENTS: &str = "events";
    pub const USER_ROLES: &str = "userRoles";
    pub const SESSIONS: &str = "sessions";
    pub const CONVERSATIONS: &str = "conversations";

    /// Attendee sub-collection of one event.
    pub fn attendees(event_id: &str) -> String {
        format!("{EVENTS}/{event_id}/attendees")
    }

    /// Session sub-collection of one event.
    pub fn event_sessions(event_id: &str) -> String {
        format!("{EVENTS}/{event_id}/sessions")
    }

    /// Message sub-collection of one conversation.
    pub fn messages(conversation_id: &str) -> String {
        format!("{CONVERSATIONS}/{conversation_id}/messages")
    }
}

/// Platform role stored on a user document as a small integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Role {
    Organizer,
    KeynoteSpeaker,
    Attendee,
    /// Role given on registration when none is supplied.
    Unassigned,
    Other(i64),
}

impl Role {
    pub const DEFAULT: Role = Role::Unassigned;
}

impl From<i64> for Role {
    fn from(value: i64) -> Self {
        match value {
            1 => Role::Organizer,
            2 => Role::KeynoteSpeaker,
            3 => Role::Attendee,
            5 => Role::Unassigned,
            other => Role::Other(other),
        }
    }
}

impl From<Role> for i64 {
    fn from(role: Role) -> Self {
        match role {
            Role::Organizer => 1,
            Role::KeynoteSpeaker => 2,
            Role::Attendee => 3,
            Role::Unassigned => 5,
            Role::Other(n) => n,
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::DEFAULT
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Organizer => write!(f, "organizer"),
            Role::KeynoteSpeaker => write!(f, "keynote_speaker"),
            Role::Attendee => write!(f, "attendee"),
            Role::Unassigned => write!(f, "unassigned"),
            Role::Other(n) => write!(f, "role_{}", n),
        }
    }
}

/// A user document decoded at the store boundary.
///
/// Every field except the key is optional: documents written by older
/// clients may lack any of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(skip)]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient::role")]
    pub role: Role,
    #[serde(default, deserialize_with = "lenient::string")]
    pub profile_picture: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub registered_events: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub saved_sessions: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub saved_events: Vec<String>,
}

impl User {
    /// Decode a stored user document.
    pub fn from_document(id: &str, data: Value) -> Result<Self, serde_json::Error> {
        let mut user: User = serde_json::from_value(data)?;
        user.id = id.to_string();
        Ok(user)
    }
}

/// One entry of an event's `keynoteSpeakers` / `moderators` list.
///
/// Lists are expected to hold plain user keys, but older documents carry
/// speaker objects or nulls. Those are kept as `Malformed` so the
/// recipient resolver can drop and report them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationEntry {
    Id(String),
    Malformed(Value),
}

impl RelationEntry {
    /// The user key, if this entry is a non-empty string.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            RelationEntry::Id(id) => {
                let id = id.trim();
                (!id.is_empty()).then_some(id)
            }
            RelationEntry::Malformed(_) => None,
        }
    }
}

impl From<&str> for RelationEntry {
    fn from(id: &str) -> Self {
        RelationEntry::Id(id.to_string())
    }
}

/// An event document decoded at the store boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(skip)]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub venue: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub contact_email: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub organizer_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::relations")]
    pub keynote_speakers: Vec<RelationEntry>,
    #[serde(default, deserialize_with = "lenient::relations")]
    pub moderators: Vec<RelationEntry>,
}

impl Event {
    /// Decode a stored event document.
    pub fn from_document(id: &str, data: Value) -> Result<Self, serde_json::Error> {
        let mut event: Event = serde_json::from_value(data)?;
        event.id = id.to_string();
        Ok(event)
    }
}

/// Role a user can be assigned on a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventRole {
    KeynoteSpeaker,
    Moderator,
}

impl EventRole {
    /// Event document field holding the assigned user keys.
    pub fn field(&self) -> &'static str {
        match self {
            EventRole::KeynoteSpeaker => "keynoteSpeakers",
            EventRole::Moderator => "moderators",
        }
    }

    /// Wording used in notification text.
    pub fn label(&self) -> &'static str {
        match self {
            EventRole::KeynoteSpeaker => "keynote speaker",
            EventRole::Moderator => "moderator",
        }
    }

    fn tag(&self) -> &'static str {
        match self {
            EventRole::KeynoteSpeaker => "keynote-speaker",
            EventRole::Moderator => "moderator",
        }
    }
}

/// Why a notification batch is sent. Selects the message template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationCause {
    Created,
    Updated,
    Cancelled,
    AddedAs(EventRole),
    /// Day-before reminder.
    Reminder,
}

impl fmt::Display for NotificationCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationCause::Created => write!(f, "created"),
            NotificationCause::Updated => write!(f, "updated"),
            NotificationCause::Cancelled => write!(f, "cancelled"),
            NotificationCause::AddedAs(role) => write!(f, "added-as-{}", role.tag()),
            NotificationCause::Reminder => write!(f, "reminder"),
        }
    }
}

/// Field deserializers that map wrongly-typed values to "absent" instead of failing.
mod lenient {
    use super::*;

    pub fn string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) if !s.trim().is_empty() => Some(s),
            _ => None,
        })
    }

    pub fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        })
    }

    pub fn relations<'de, D>(deserializer: D) -> Result<Vec<RelationEntry>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => items
                .into_iter()
                .map(|v| match v {
                    Value::String(s) => RelationEntry::Id(s),
                    other => RelationEntry::Malformed(other),
                })
                .collect(),
            _ => Vec::new(),
        })
    }

    pub fn timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(parse_timestamp(&Value::deserialize(deserializer)?))
    }

    pub fn role<'de, D>(deserializer: D) -> Result<Role, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let number = match &value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        Ok(number.map(Role::from).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_from_loose_document() {
        let event = Event::from_document(
            "e1",
            json!({
                "name": "RustConf",
                "startDate": "2025-10-15",
                "endDate": "not a date",
                "venue": 42,
                "keynoteSpeakers": ["u1", null, { "speakerId": "u9" }, ""],
                "moderators": "u2",
                "sessions": ["s1"]
            }),
        )
        .unwrap();

        assert_eq!(event.id, "e1");
        assert_eq!(event.name.as_deref(), Some("RustConf"));
        assert!(event.start_date.is_some());
        assert!(event.end_date.is_none());
        assert!(event.venue.is_none());
        assert_eq!(event.keynote_speakers.len(), 4);
        let ids: Vec<_> = event
            .keynote_speakers
            .iter()
            .filter_map(RelationEntry::user_id)
            .collect();
        assert_eq!(ids, vec!["u1"]);
        assert!(event.moderators.is_empty());
    }

    #[test]
    fn test_user_without_email() {
        let user = User::from_document("u1", json!({ "name": "Ada", "role": 2 })).unwrap();
        assert_eq!(user.id, "u1");
        assert!(user.email.is_none());
        assert_eq!(user.role, Role::KeynoteSpeaker);
    }

    #[test]
    fn test_user_role_leniency() {
        let user = User::from_document("u1", json!({ "role": "3" })).unwrap();
        assert_eq!(user.role, Role::Attendee);
        let user = User::from_document("u1", json!({ "role": [1] })).unwrap();
        assert_eq!(user.role, Role::Unassigned);
        let user = User::from_document("u1", json!({ "role": 9 })).unwrap();
        assert_eq!(user.role, Role::Other(9));
    }

    #[test]
    fn test_role_round_trips_through_integer() {
        assert_eq!(serde_json::to_value(Role::Organizer).unwrap(), json!(1));
        assert_eq!(i64::from(Role::Other(7)), 7);
    }

    #[test]
    fn test_cause_tags() {
        let tags: Vec<String> = [
            NotificationCause::Created,
            NotificationCause::Updated,
            NotificationCause::Cancelled,
            NotificationCause::Reminder,
            NotificationCause::AddedAs(EventRole::KeynoteSpeaker),
            NotificationCause::AddedAs(EventRole::Moderator),
        ]
        .iter()
        .map(ToString::to_string)
        .collect();
        assert_eq!(
            tags,
            vec![
                "created",
                "updated",
                "cancelled",
                "reminder",
                "added-as-keynote-speaker",
                "added-as-moderator"
            ]
        );
    }

    #[test]
    fn test_user_bookmarks() {
        let user = User::from_document(
            "u1",
            json!({ "savedSessions": ["s1", 4], "savedEvents": "e1" }),
        )
        .unwrap();
        assert_eq!(user.saved_sessions, vec!["s1"]);
        assert!(user.saved_events.is_empty());
    }
}

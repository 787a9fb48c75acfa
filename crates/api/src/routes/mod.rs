pub mod events;
pub mod health;
pub mod messages;
pub mod register;
pub mod roles;
pub mod users;

use axum::Router;
use serde_json::{Map, Value};

use confernet_common::error::AppError;

use crate::state::AppState;

/// Build the complete API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(register::router())
        .merge(users::router())
        .merge(roles::router())
        .merge(events::router())
        .merge(messages::router())
        .with_state(state)
}

/// Response shape of a stored document: its key under `key_field`, followed
/// by the document's own fields.
pub(crate) fn with_key(key_field: &str, key: &str, data: Value) -> Value {
    let mut out = Map::new();
    out.insert(key_field.to_string(), Value::String(key.to_string()));
    if let Value::Object(fields) = data {
        for (name, value) in fields {
            out.entry(name).or_insert(value);
        }
    }
    Value::Object(out)
}

/// Whether a request field carries a usable value. Missing, `null`, `false`
/// and blank strings all count as absent.
pub(crate) fn is_present(body: &Value, field: &str) -> bool {
    match body.get(field) {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

/// Reject the request unless every field in `fields` is present.
pub(crate) fn require_fields(body: &Value, fields: &[&str]) -> Result<(), AppError> {
    let missing: Vec<&str> = fields
        .iter()
        .copied()
        .filter(|f| !is_present(body, f))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )))
    }
}

/// Non-empty list of string ids from a `{userIds: [...]}` body.
pub(crate) fn user_ids(body: &Value) -> Result<Vec<String>, AppError> {
    let ids: Vec<String> = match body.get("userIds") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };
    if ids.is_empty() {
        return Err(AppError::Validation(
            "userIds array is required".to_string(),
        ));
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_with_key_puts_key_first() {
        let out = with_key("eventId", "e1", json!({ "name": "RustConf", "eventId": "spoof" }));
        assert_eq!(out["eventId"], "e1");
        assert_eq!(out["name"], "RustConf");
    }

    #[test]
    fn test_require_fields() {
        let body = json!({ "name": "RustConf", "startDate": "", "organizerId": null });
        let err = require_fields(&body, &["name", "startDate", "endDate", "organizerId"]);
        match err {
            Err(AppError::Validation(msg)) => {
                assert_eq!(msg, "Missing required fields: startDate, endDate, organizerId")
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(require_fields(&body, &["name"]).is_ok());
    }

    #[test]
    fn test_user_ids() {
        assert_eq!(
            user_ids(&json!({ "userIds": ["u1", 7, " ", "u2"] })).unwrap(),
            vec!["u1", "u2"]
        );
        assert!(user_ids(&json!({ "userIds": [] })).is_err());
        assert!(user_ids(&json!({})).is_err());
    }
}

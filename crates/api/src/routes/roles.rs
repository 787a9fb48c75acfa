//! Users grouped by platform role.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use confernet_common::error::AppError;
use confernet_common::types::collections;
use confernet_store::{FilterOp, Query};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/users-by-roleid/role/{role_id}", get(users_by_role))
}

/// Role path segment as the JSON number stored on user documents.
fn role_value(raw: &str) -> Option<Value> {
    let raw = raw.trim();
    if let Ok(code) = raw.parse::<i64>() {
        return Some(json!(code));
    }
    raw.parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .map(|n| json!(n))
}

/// GET /users-by-roleid/role/:role_id — Users holding the given role.
async fn users_by_role(
    State(state): State<AppState>,
    Path(role_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let role = role_value(&role_id)
        .ok_or_else(|| AppError::Validation("Invalid role ID. Must be a number.".to_string()))?;

    let docs = state
        .store
        .query(collections::USERS, &Query::new().filter("role", FilterOp::Eq, role))
        .await?;
    if docs.is_empty() {
        return Err(AppError::NotFound(
            "No users found for this role.".to_string(),
        ));
    }

    let users: Vec<Value> = docs
        .into_iter()
        .map(|doc| {
            json!({
                "userId": doc.key,
                "name": doc.data.get("name").cloned().unwrap_or(Value::Null),
                "email": doc.data.get("email").cloned().unwrap_or(Value::Null),
                "profilePicture": doc.data.get("profilePicture").cloned().unwrap_or(Value::Null),
            })
        })
        .collect();
    Ok(Json(json!({ "users": users })))
}

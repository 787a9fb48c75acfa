//! User registration.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};

use confernet_common::error::AppError;
use confernet_common::time::to_storage;
use confernet_common::types::{Role, collections};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/register", post(register))
}

/// Registration payload. Only `userId`, `name`, `email` and `dob` are required.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub dob: Option<String>,
    pub role: Option<Value>,
    pub phone_number: Option<String>,
    pub organization: Option<String>,
    pub job_title: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Integer role code from a number or numeric string; unassigned when absent.
fn parse_role(value: Option<&Value>) -> Result<Role, AppError> {
    let code = match value {
        None | Some(Value::Null) => return Ok(Role::default()),
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(_) => None,
    };
    code.map(Role::from)
        .ok_or_else(|| AppError::Validation("role must be an integer".to_string()))
}

/// POST /register — Create or refresh a user and file them under their role.
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let (Some(user_id), Some(name), Some(email), Some(dob)) = (
        required(req.user_id),
        required(req.name),
        required(req.email),
        required(req.dob),
    ) else {
        return Err(AppError::Validation(
            "Missing required fields: userId, name, email, or dob".to_string(),
        ));
    };
    let role = parse_role(req.role.as_ref())?;
    let now = to_storage(&Utc::now());

    let user = json!({
        "name": name,
        "email": email,
        "dob": dob,
        "role": i64::from(role),
        "phoneNumber": req.phone_number,
        "organization": req.organization,
        "jobTitle": req.job_title,
        "country": req.country,
        "city": req.city,
        "bio": req.bio,
        "profilePicture": req.profile_picture,
        "registeredEvents": [],
        "sessionsBooked": [],
        "notificationsEnabled": true,
        "createdAt": now,
        "updatedAt": now,
    });

    state
        .store
        .merge(collections::USERS, &user_id, user.clone())
        .await?;

    let mut members = serde_json::Map::new();
    members.insert(user_id.clone(), json!({ "name": name }));
    state
        .store
        .merge(
            collections::USER_ROLES,
            &i64::from(role).to_string(),
            json!({ "users": members }),
        )
        .await?;

    tracing::info!(user_id = %user_id, role = %role, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully and added to userRoles.",
            "user": user,
        })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role() {
        assert_eq!(parse_role(None).unwrap(), Role::Unassigned);
        assert_eq!(parse_role(Some(&json!(1))).unwrap(), Role::Organizer);
        assert_eq!(parse_role(Some(&json!("3"))).unwrap(), Role::Attendee);
        assert_eq!(parse_role(Some(&json!(9))).unwrap(), Role::Other(9));
        assert!(parse_role(Some(&json!("admin"))).is_err());
    }
}

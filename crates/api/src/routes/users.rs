//! User listing, event membership and bookmark routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use futures::future::try_join_all;
use serde_json::{Value, json};

use confernet_common::error::AppError;
use confernet_common::time::to_storage;
use confernet_common::types::{User, collections};

use crate::routes::{user_ids, with_key};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).delete(delete_all_users))
        .route("/users/multiple-users/by-ids", post(users_by_ids))
        .route("/users/{user_id}", get(get_user))
        .route("/users/{user_id}/join-event/{event_id}", post(join_event))
        .route("/users/{user_id}/leave-event/{event_id}", delete(leave_event))
        .route(
            "/users/{user_id}/registered-events",
            get(registered_events),
        )
        .route(
            "/users/{user_id}/bookmark/{session_id}",
            post(bookmark_session).delete(unbookmark_session),
        )
        .route("/users/{user_id}/bookmarks", get(bookmarked_sessions))
        .route(
            "/users/{user_id}/bookmark-event/{event_id}",
            post(bookmark_event).delete(unbookmark_event),
        )
        .route("/users/{user_id}/bookmarked-events", get(bookmarked_events))
}

/// What a user can bookmark.
#[derive(Debug, Clone, Copy)]
enum Bookmark {
    Session,
    Event,
}

impl Bookmark {
    /// User document field holding the bookmarked keys.
    fn field(self) -> &'static str {
        match self {
            Bookmark::Session => "savedSessions",
            Bookmark::Event => "savedEvents",
        }
    }

    fn collection(self) -> &'static str {
        match self {
            Bookmark::Session => collections::SESSIONS,
            Bookmark::Event => collections::EVENTS,
        }
    }

    fn key_field(self) -> &'static str {
        match self {
            Bookmark::Session => "sessionId",
            Bookmark::Event => "eventId",
        }
    }

    fn noun(self) -> &'static str {
        match self {
            Bookmark::Session => "Session",
            Bookmark::Event => "Event",
        }
    }

    fn saved(self, user: &User) -> &[String] {
        match self {
            Bookmark::Session => &user.saved_sessions,
            Bookmark::Event => &user.saved_events,
        }
    }
}

/// Load a user document or fail with 404.
async fn load_user(state: &AppState, user_id: &str) -> Result<(Value, User), AppError> {
    let data = state
        .store
        .get(collections::USERS, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    let user = User::from_document(user_id, data.clone())
        .map_err(|e| AppError::Internal(format!("Malformed user document: {}", e)))?;
    Ok((data, user))
}

/// GET /users — List every user.
async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<Value>>, AppError> {
    let docs = state.store.list(collections::USERS).await?;
    if docs.is_empty() {
        return Err(AppError::NotFound("No users found".to_string()));
    }
    Ok(Json(
        docs.into_iter()
            .map(|doc| with_key("id", &doc.key, doc.data))
            .collect(),
    ))
}

/// GET /users/:user_id — Fetch one user.
async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let (data, _) = load_user(&state, &user_id).await?;
    Ok(Json(with_key("id", &user_id, data)))
}

/// POST /users/multiple-users/by-ids — Fetch the existing users among `userIds`.
async fn users_by_ids(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let ids = user_ids(&body)?;
    let users = fetch_existing(&state, collections::USERS, &ids, "id").await?;
    Ok(Json(json!({ "users": users })))
}

/// POST /users/:user_id/join-event/:event_id — Register a user as an event attendee.
async fn join_event(
    State(state): State<AppState>,
    Path((user_id, event_id)): Path<(String, String)>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let (_, user) = load_user(&state, &user_id).await?;
    if state.store.get(collections::EVENTS, &event_id).await?.is_none() {
        return Err(AppError::NotFound("Event not found".to_string()));
    }
    if user.registered_events.contains(&event_id) {
        return Err(AppError::Conflict(
            "User already joined this event".to_string(),
        ));
    }

    let now = to_storage(&Utc::now());
    state
        .store
        .array_union(
            collections::USERS,
            &user_id,
            "registeredEvents",
            &[json!(event_id)],
        )
        .await?;
    state
        .store
        .merge(collections::USERS, &user_id, json!({ "updatedAt": now }))
        .await?;
    state
        .store
        .set(
            &collections::attendees(&event_id),
            &user_id,
            json!({ "userId": user_id, "joinedAt": now }),
        )
        .await?;

    tracing::info!(user_id = %user_id, event_id = %event_id, "User joined event");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User joined the event successfully" })),
    ))
}

/// DELETE /users/:user_id/leave-event/:event_id — Remove a user from an event's attendees.
async fn leave_event(
    State(state): State<AppState>,
    Path((user_id, event_id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let (_, user) = load_user(&state, &user_id).await?;
    if !user.registered_events.contains(&event_id) {
        return Err(AppError::Conflict(
            "User has not joined this event".to_string(),
        ));
    }

    state
        .store
        .array_remove(
            collections::USERS,
            &user_id,
            "registeredEvents",
            &[json!(event_id)],
        )
        .await?;
    state
        .store
        .merge(
            collections::USERS,
            &user_id,
            json!({ "updatedAt": to_storage(&Utc::now()) }),
        )
        .await?;
    state
        .store
        .delete(&collections::attendees(&event_id), &user_id)
        .await?;

    tracing::info!(user_id = %user_id, event_id = %event_id, "User left event");
    Ok(Json(json!({ "message": "User left the event successfully" })))
}

/// GET /users/:user_id/registered-events — Events the user joined that still exist.
async fn registered_events(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let (_, user) = load_user(&state, &user_id).await?;
    let events = fetch_existing(
        &state,
        collections::EVENTS,
        &user.registered_events,
        "eventId",
    )
    .await?;
    Ok(Json(json!({ "events": events })))
}

/// Look up `ids` concurrently and return the documents that exist, keyed
/// under `key_field`, in the order of `ids`.
async fn fetch_existing(
    state: &AppState,
    collection: &str,
    ids: &[String],
    key_field: &str,
) -> Result<Vec<Value>, AppError> {
    let docs = try_join_all(ids.iter().map(|id| state.store.get(collection, id))).await?;
    Ok(ids
        .iter()
        .zip(docs)
        .filter_map(|(id, doc)| doc.map(|data| with_key(key_field, id, data)))
        .collect())
}

/// DELETE /users — Remove every user.
async fn delete_all_users(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let removed = state.store.delete_collection(collections::USERS).await?;
    if removed == 0 {
        return Err(AppError::NotFound("No users found".to_string()));
    }
    tracing::warn!(removed, "All users deleted");
    Ok(Json(json!({ "message": "All users deleted successfully." })))
}

async fn add_bookmark(
    state: &AppState,
    user_id: &str,
    item_id: &str,
    kind: Bookmark,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let (_, user) = load_user(state, user_id).await?;
    if kind.saved(&user).iter().any(|id| id == item_id) {
        return Err(AppError::Conflict(format!(
            "{} already bookmarked",
            kind.noun()
        )));
    }

    state
        .store
        .array_union(collections::USERS, user_id, kind.field(), &[json!(item_id)])
        .await?;
    tracing::debug!(user_id, item_id, field = kind.field(), "Bookmark added");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": format!("{} bookmarked successfully.", kind.noun()) })),
    ))
}

async fn remove_bookmark(
    state: &AppState,
    user_id: &str,
    item_id: &str,
    kind: Bookmark,
) -> Result<Json<Value>, AppError> {
    let (_, user) = load_user(state, user_id).await?;
    if !kind.saved(&user).iter().any(|id| id == item_id) {
        return Err(AppError::NotFound(format!("{} not bookmarked", kind.noun())));
    }

    state
        .store
        .array_remove(collections::USERS, user_id, kind.field(), &[json!(item_id)])
        .await?;
    tracing::debug!(user_id, item_id, field = kind.field(), "Bookmark removed");
    Ok(Json(json!({
        "message": format!("{} removed from bookmarks.", kind.noun())
    })))
}

async fn list_bookmarks(
    state: &AppState,
    user_id: &str,
    kind: Bookmark,
) -> Result<Vec<Value>, AppError> {
    let (_, user) = load_user(state, user_id).await?;
    fetch_existing(state, kind.collection(), kind.saved(&user), kind.key_field()).await
}

/// POST /users/:user_id/bookmark/:session_id — Bookmark a session.
async fn bookmark_session(
    State(state): State<AppState>,
    Path((user_id, session_id)): Path<(String, String)>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    add_bookmark(&state, &user_id, &session_id, Bookmark::Session).await
}

/// DELETE /users/:user_id/bookmark/:session_id — Remove a session bookmark.
async fn unbookmark_session(
    State(state): State<AppState>,
    Path((user_id, session_id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    remove_bookmark(&state, &user_id, &session_id, Bookmark::Session).await
}

/// GET /users/:user_id/bookmarks — Bookmarked sessions that still exist.
async fn bookmarked_sessions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let sessions = list_bookmarks(&state, &user_id, Bookmark::Session).await?;
    Ok(Json(json!({ "sessions": sessions })))
}

/// POST /users/:user_id/bookmark-event/:event_id — Bookmark an event.
async fn bookmark_event(
    State(state): State<AppState>,
    Path((user_id, event_id)): Path<(String, String)>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    add_bookmark(&state, &user_id, &event_id, Bookmark::Event).await
}

/// DELETE /users/:user_id/bookmark-event/:event_id — Remove an event bookmark.
async fn unbookmark_event(
    State(state): State<AppState>,
    Path((user_id, event_id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    remove_bookmark(&state, &user_id, &event_id, Bookmark::Event).await
}

/// GET /users/:user_id/bookmarked-events — Bookmarked events that still exist.
async fn bookmarked_events(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let events = list_bookmarks(&state, &user_id, Bookmark::Event).await?;
    Ok(Json(json!({ "events": events })))
}

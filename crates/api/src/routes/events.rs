//! Event CRUD and role assignment routes.
//!
//! Every write that changes what attendees should know about triggers a
//! notification batch once the write has completed. Notification problems
//! are logged and never change the response.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde_json::{Map, Value, json};

use confernet_common::error::AppError;
use confernet_common::time::{parse_timestamp, to_storage};
use confernet_common::types::{Event, EventRole, NotificationCause, collections};
use confernet_store::{Deletion, Direction, FilterOp, Query, merge_values};

use crate::routes::{require_fields, user_ids, with_key};
use crate::state::AppState;

const DATE_FIELDS: [&str; 2] = ["startDate", "endDate"];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events", post(create_event).get(list_events))
        .route("/events/upcoming", get(upcoming_events))
        .route(
            "/events/{event_id}",
            get(get_event).put(update_event).delete(delete_event),
        )
        .route("/events/{event_id}/speakers", post(add_speakers))
        .route("/events/{event_id}/moderators", post(add_moderators))
}

/// Rewrite the date fields present in `fields` to the stored timestamp form.
fn normalize_dates(fields: &mut Map<String, Value>) -> Result<(), AppError> {
    for field in DATE_FIELDS {
        let Some(raw) = fields.get(field) else {
            continue;
        };
        let ts = parse_timestamp(raw)
            .ok_or_else(|| AppError::Validation(format!("Invalid {}", field)))?;
        fields.insert(field.to_string(), json!(to_storage(&ts)));
    }
    Ok(())
}

fn into_object(body: Value) -> Result<Map<String, Value>, AppError> {
    match body {
        Value::Object(fields) => Ok(fields),
        _ => Err(AppError::Validation(
            "Request body must be a JSON object".to_string(),
        )),
    }
}

async fn load_event(state: &AppState, event_id: &str) -> Result<Event, AppError> {
    let data = state
        .store
        .get(collections::EVENTS, event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
    Event::from_document(event_id, data)
        .map_err(|e| AppError::Internal(format!("Malformed event document: {}", e)))
}

async fn notify(state: &AppState, event: &Event, cause: NotificationCause) {
    if let Err(e) = state.notifier.notify_event_users(event, cause).await {
        tracing::error!(
            event_id = %event.id,
            cause = %cause,
            error = %e,
            "Failed to notify event users"
        );
    }
}

/// POST /events — Create an event and notify its participants.
async fn create_event(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_fields(&body, &["name", "startDate", "endDate", "organizerId"])?;
    let mut fields = into_object(body)?;
    normalize_dates(&mut fields)?;
    fields.insert("createdAt".to_string(), json!(to_storage(&Utc::now())));

    let data = Value::Object(fields);
    let event_id = state.store.add(collections::EVENTS, data.clone()).await?;
    tracing::info!(event_id = %event_id, "Event created");

    match Event::from_document(&event_id, data) {
        Ok(event) => notify(&state, &event, NotificationCause::Created).await,
        Err(e) => tracing::warn!(event_id = %event_id, error = %e, "Created event is not decodable"),
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Event created successfully", "eventId": event_id })),
    ))
}

/// GET /events — All events, earliest first.
async fn list_events(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let query = Query::new().order_by("startDate", Direction::Ascending);
    let docs = state.store.query(collections::EVENTS, &query).await?;
    let events: Vec<Value> = docs
        .into_iter()
        .map(|doc| with_key("eventId", &doc.key, doc.data))
        .collect();
    Ok(Json(json!({ "events": events })))
}

/// GET /events/upcoming — Events starting from 24 hours ago onwards.
async fn upcoming_events(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let since = Utc::now() - Duration::hours(24);
    let query = Query::new()
        .filter("startDate", FilterOp::Gte, json!(to_storage(&since)))
        .order_by("startDate", Direction::Ascending);
    let docs = state.store.query(collections::EVENTS, &query).await?;
    let events: Vec<Value> = docs
        .into_iter()
        .map(|doc| with_key("eventId", &doc.key, doc.data))
        .collect();
    Ok(Json(json!({ "events": events })))
}

/// GET /events/:event_id — Fetch one event.
async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let data = state
        .store
        .get(collections::EVENTS, &event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
    Ok(Json(with_key("eventId", &event_id, data)))
}

/// PUT /events/:event_id — Merge fields into an event and notify its participants.
async fn update_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let mut fields = into_object(body)?;
    if fields.is_empty() {
        return Err(AppError::Validation("No fields to update".to_string()));
    }
    let mut stored = state
        .store
        .get(collections::EVENTS, &event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
    normalize_dates(&mut fields)?;
    fields.insert("lastUpdated".to_string(), json!(to_storage(&Utc::now())));

    let patch = Value::Object(fields);
    state
        .store
        .merge(collections::EVENTS, &event_id, patch.clone())
        .await?;
    tracing::info!(event_id = %event_id, "Event updated");

    // The update is committed; from here on nothing may fail the request.
    merge_values(&mut stored, patch);
    match Event::from_document(&event_id, stored) {
        Ok(event) => notify(&state, &event, NotificationCause::Updated).await,
        Err(e) => tracing::warn!(event_id = %event_id, error = %e, "Updated event is not decodable"),
    }

    Ok(Json(json!({ "message": "Event updated successfully" })))
}

/// DELETE /events/:event_id — Delete an event with its sessions and attendees,
/// then tell everyone it was cancelled.
async fn delete_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let event = load_event(&state, &event_id).await?;

    // Recipients must be resolved while the attendee list still exists.
    let job = match state
        .notifier
        .prepare(&event, NotificationCause::Cancelled)
        .await
    {
        Ok(job) => Some(job),
        Err(e) => {
            tracing::error!(event_id = %event_id, error = %e, "Failed to resolve cancellation recipients");
            None
        }
    };

    let removed = state
        .store
        .delete_batch(&[
            Deletion::collection(&collections::event_sessions(&event_id)),
            Deletion::collection(&collections::attendees(&event_id)),
            Deletion::document(collections::EVENTS, &event_id),
        ])
        .await?;
    tracing::info!(event_id = %event_id, removed, "Event deleted");

    if let Some(job) = job {
        state.notifier.dispatch(job).await;
    }

    Ok(Json(json!({ "message": "Event and related data deleted successfully" })))
}

/// POST /events/:event_id/speakers — Add keynote speakers.
async fn add_speakers(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    assign_role(&state, &event_id, &body, EventRole::KeynoteSpeaker).await
}

/// POST /events/:event_id/moderators — Add moderators.
async fn add_moderators(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    assign_role(&state, &event_id, &body, EventRole::Moderator).await
}

/// Add `userIds` to the event's list for `role` and email only the users
/// that were not already on it.
async fn assign_role(
    state: &AppState,
    event_id: &str,
    body: &Value,
    role: EventRole,
) -> Result<Json<Value>, AppError> {
    let ids = user_ids(body)?;
    let event = load_event(state, event_id).await?;

    let current = match role {
        EventRole::KeynoteSpeaker => &event.keynote_speakers,
        EventRole::Moderator => &event.moderators,
    };
    let mut added: Vec<String> = Vec::new();
    for id in ids {
        let assigned = current.iter().any(|entry| entry.user_id() == Some(id.as_str()));
        if !assigned && !added.contains(&id) {
            added.push(id);
        }
    }

    if !added.is_empty() {
        let values: Vec<Value> = added.iter().map(|id| json!(id)).collect();
        state
            .store
            .array_union(collections::EVENTS, event_id, role.field(), &values)
            .await?;
        tracing::info!(event_id = %event_id, role = role.label(), added = added.len(), "Event roles assigned");

        let report = state
            .notifier
            .notify_role_assignment(&added, role, &event)
            .await;
        tracing::debug!(event_id = %event_id, sent = report.sent(), "Role assignment emails sent");
    }

    Ok(Json(json!({
        "message": format!("{} list updated", role.field()),
        "added": added,
    })))
}

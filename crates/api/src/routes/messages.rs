//! Direct messages between two users.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};

use confernet_common::error::AppError;
use confernet_common::time::to_storage;
use confernet_common::types::collections;
use confernet_store::{Direction, FilterOp, Query};

use crate::routes::with_key;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/messages", post(send_message))
        .route(
            "/messages/{user_id}/conversations",
            get(list_conversations),
        )
        .route("/messages/{user_id}/{other_id}/history", get(history))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub sender_id: Option<String>,
    pub receiver_id: Option<String>,
    pub message: Option<String>,
}

/// Both directions of a chat share one conversation: the two ids sorted
/// and joined with `_`.
fn conversation_id(a: &str, b: &str) -> String {
    if a <= b {
        format!("{}_{}", a, b)
    } else {
        format!("{}_{}", b, a)
    }
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// POST /messages — Append a message and refresh the conversation summary.
async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let (Some(sender_id), Some(receiver_id), Some(message)) = (
        required(req.sender_id),
        required(req.receiver_id),
        required(req.message),
    ) else {
        return Err(AppError::Validation("All fields are required.".to_string()));
    };

    let conversation = conversation_id(&sender_id, &receiver_id);
    let timestamp = to_storage(&Utc::now());
    let data = json!({
        "senderId": sender_id,
        "receiverId": receiver_id,
        "message": message,
        "timestamp": timestamp,
    });

    let message_id = state
        .store
        .add(&collections::messages(&conversation), data.clone())
        .await?;
    state
        .store
        .merge(
            collections::CONVERSATIONS,
            &conversation,
            json!({
                "participants": [sender_id, receiver_id],
                "lastMessage": message,
                "lastSender": sender_id,
                "timestamp": timestamp,
            }),
        )
        .await?;

    tracing::debug!(conversation = %conversation, message_id = %message_id, "Message sent");
    Ok((StatusCode::CREATED, Json(with_key("id", &message_id, data))))
}

/// GET /messages/:user_id/conversations — The user's conversations, newest first.
async fn list_conversations(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Value>>, AppError> {
    let query = Query::new()
        .filter("participants", FilterOp::ArrayContains, json!(user_id))
        .order_by("timestamp", Direction::Descending);
    let docs = state
        .store
        .query(collections::CONVERSATIONS, &query)
        .await?;
    if docs.is_empty() {
        return Err(AppError::NotFound("No conversations found.".to_string()));
    }

    let conversations = docs
        .into_iter()
        .map(|doc| {
            let other = doc.data["participants"]
                .as_array()
                .and_then(|ids| {
                    ids.iter()
                        .filter_map(Value::as_str)
                        .find(|id| *id != user_id)
                })
                .map(str::to_string);
            json!({
                "id": doc.key,
                "otherUserId": other,
                "lastMessage": doc.data.get("lastMessage"),
                "lastSender": doc.data.get("lastSender"),
                "timestamp": doc.data.get("timestamp"),
            })
        })
        .collect();
    Ok(Json(conversations))
}

/// GET /messages/:user_id/:other_id/history — Messages between two users, oldest first.
async fn history(
    State(state): State<AppState>,
    Path((user_id, other_id)): Path<(String, String)>,
) -> Result<Json<Vec<Value>>, AppError> {
    let conversation = conversation_id(&user_id, &other_id);
    let query = Query::new().order_by("timestamp", Direction::Ascending);
    let docs = state
        .store
        .query(&collections::messages(&conversation), &query)
        .await?;
    if docs.is_empty() {
        return Err(AppError::NotFound("No messages found.".to_string()));
    }
    Ok(Json(
        docs.into_iter()
            .map(|doc| with_key("id", &doc.key, doc.data))
            .collect(),
    ))
}

// SPDX-License-Identifier: MIT

//! Message routes: group chat history and posting.
//!
//! Messages are persisted first, then broadcast to the group's realtime
//! channel; a subscriber that misses the broadcast still sees the message on
//! the next history fetch.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Message, SYSTEM_SENDER};
use crate::retry::RetryPolicy;
use crate::routes::groups::require_membership;
use crate::services::ChannelEvent;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/groups/{id}/messages",
        get(list_messages).post(post_message),
    )
}

#[derive(Deserialize)]
pub struct MessagesQuery {
    /// Pagination: items per page
    #[serde(default = "default_limit")]
    limit: u32,
    /// Pagination: offset into the newest-first ordering
    #[serde(default)]
    offset: u32,
}

fn default_limit() -> u32 {
    50
}

const MAX_LIMIT: u32 = 100;

/// Get messages for a group, newest first (members only).
async fn list_messages(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(group_id): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<Vec<Message>>> {
    require_membership(&state, &group_id, &user.account_id).await?;

    let limit = query.limit.min(MAX_LIMIT).max(1);
    let messages = state
        .db
        .list_messages(&group_id, limit, query.offset)
        .await?;

    Ok(Json(messages))
}

#[derive(Deserialize, Validate)]
pub struct PostMessageRequest {
    #[validate(length(min = 1, max = 2000))]
    pub text: String,
}

/// Append a message and broadcast it to the group channel.
async fn post_message(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(group_id): Path<String>,
    Json(payload): Json<PostMessageRequest>,
) -> Result<Json<Message>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    require_membership(&state, &group_id, &user.account_id).await?;

    let message = Message {
        id: Uuid::new_v4().to_string(),
        group_id: group_id.clone(),
        sender_id: user.account_id.clone(),
        text: payload.text,
        created_at: chrono::Utc::now().to_rfc3339(),
    };

    persist_and_broadcast(&state, message.clone()).await?;

    Ok(Json(message))
}

/// Post a message from the system itself (join/leave notices).
pub(crate) async fn post_system_message(
    state: &Arc<AppState>,
    group_id: &str,
    text: &str,
) -> Result<Message> {
    let message = Message {
        id: Uuid::new_v4().to_string(),
        group_id: group_id.to_string(),
        sender_id: SYSTEM_SENDER.to_string(),
        text: text.to_string(),
        created_at: chrono::Utc::now().to_rfc3339(),
    };

    persist_and_broadcast(state, message.clone()).await?;

    Ok(message)
}

/// Store a message with retry, then publish it to the group channel.
async fn persist_and_broadcast(state: &Arc<AppState>, message: Message) -> Result<()> {
    let db = &state.db;
    let msg = &message;

    RetryPolicy::default()
        .run_with_probe(
            || state.realtime.is_connected(),
            || async move { db.insert_message(msg).await },
        )
        .await?;

    let reached = state.realtime.publish(
        &message.group_id,
        ChannelEvent::MessageCreated {
            message: message.clone(),
        },
    );

    tracing::debug!(
        group_id = %message.group_id,
        message_id = %message.id,
        subscribers = reached,
        "Message broadcast"
    );

    Ok(())
}

// SPDX-License-Identifier: MIT

//! Meeting routes: schedule, list, cancel.

use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::Meeting;
use crate::routes::groups::require_membership;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/groups/{id}/meetings",
            get(list_meetings).post(create_meeting),
        )
        .route(
            "/api/groups/{id}/meetings/{meeting_id}",
            delete(delete_meeting),
        )
}

#[derive(Deserialize, Validate)]
pub struct CreateMeetingRequest {
    #[validate(length(min = 1, max = 120))]
    pub topic: String,
    #[validate(url)]
    pub meeting_url: String,
    /// Scheduled start time (RFC 3339)
    pub scheduled_at: String,
}

/// Schedule a meeting for a group (members only).
async fn create_meeting(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(group_id): Path<String>,
    Json(payload): Json<CreateMeetingRequest>,
) -> Result<Json<Meeting>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    require_membership(&state, &group_id, &user.account_id).await?;

    // Normalize the scheduled time so list ordering is well-defined
    let scheduled_at = chrono::DateTime::parse_from_rfc3339(&payload.scheduled_at)
        .map_err(|_| {
            AppError::BadRequest("scheduled_at must be an RFC 3339 datetime".to_string())
        })?
        .with_timezone(&chrono::Utc)
        .to_rfc3339();

    let meeting = Meeting {
        id: Uuid::new_v4().to_string(),
        group_id: group_id.clone(),
        topic: payload.topic,
        meeting_url: payload.meeting_url,
        scheduled_at,
        created_by: user.account_id.clone(),
        created_at: chrono::Utc::now().to_rfc3339(),
    };

    state.db.insert_meeting(&meeting).await?;

    tracing::info!(group_id = %group_id, meeting_id = %meeting.id, "Meeting scheduled");

    Ok(Json(meeting))
}

/// List a group's meetings, soonest first (members only).
async fn list_meetings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(group_id): Path<String>,
) -> Result<Json<Vec<Meeting>>> {
    require_membership(&state, &group_id, &user.account_id).await?;

    let meetings = state.db.list_meetings(&group_id).await?;
    Ok(Json(meetings))
}

/// Cancel a meeting. Allowed for the meeting's creator or the group creator.
async fn delete_meeting(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((group_id, meeting_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>> {
    let membership = require_membership(&state, &group_id, &user.account_id).await?;

    let meeting = state
        .db
        .get_meeting(&meeting_id)
        .await?
        .filter(|m| m.group_id == group_id)
        .ok_or_else(|| AppError::NotFound(format!("Meeting {} not found", meeting_id)))?;

    if meeting.created_by != user.account_id && !membership.is_creator {
        return Err(AppError::Unauthorized);
    }

    state.db.delete_meeting(&meeting_id).await?;

    tracing::info!(group_id = %group_id, meeting_id = %meeting_id, "Meeting cancelled");

    Ok(Json(serde_json::json!({ "success": true })))
}

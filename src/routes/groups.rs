// SPDX-License-Identifier: MIT

//! Group routes: create, list, detail, join via invite code, leave, delete.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Group, GroupMember, UserProfile};
use crate::routes::messages::post_system_message;
use crate::services::codes::unique_invite_code;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/groups", get(list_groups).post(create_group))
        .route("/api/groups/join", post(join_group))
        .route("/api/groups/{id}", get(get_group).delete(delete_group))
        .route("/api/groups/{id}/leave", post(leave_group))
}

/// Check that the caller belongs to a group; used by every member-only route.
pub(crate) async fn require_membership(
    state: &Arc<AppState>,
    group_id: &str,
    user_id: &str,
) -> Result<GroupMember> {
    state
        .db
        .get_membership(group_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Not a member of group {}", group_id)))
}

// ─── Create / List ───────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 80))]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[validate(length(max = 20))]
    pub topics: Option<Vec<String>>,
    #[validate(range(min = 2, max = 100))]
    pub max_members: Option<u32>,
}

const DEFAULT_MAX_MEMBERS: u32 = 10;

/// Create a group with a fresh unique invite code and a creator
/// membership row, atomically.
async fn create_group(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateGroupRequest>,
) -> Result<Json<Group>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let invite_code = unique_invite_code(&state.db).await?;
    let now = chrono::Utc::now().to_rfc3339();

    let group = Group {
        id: Uuid::new_v4().to_string(),
        name: payload.name,
        description: payload.description.unwrap_or_default(),
        topics: payload.topics.unwrap_or_default(),
        max_members: payload.max_members.unwrap_or(DEFAULT_MAX_MEMBERS),
        invite_code,
        created_by: user.account_id.clone(),
        created_at: now.clone(),
    };

    let creator = GroupMember {
        group_id: group.id.clone(),
        user_id: user.account_id.clone(),
        is_creator: true,
        joined_at: now,
    };

    state.db.create_group_with_creator(&group, &creator).await?;

    Ok(Json(group))
}

/// List the groups the caller belongs to.
async fn list_groups(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Group>>> {
    let memberships = state.db.list_memberships_for_user(&user.account_id).await?;
    let group_ids: Vec<String> = memberships.into_iter().map(|m| m.group_id).collect();
    let groups = state.db.get_groups_by_ids(&group_ids).await?;
    Ok(Json(groups))
}

// ─── Detail ──────────────────────────────────────────────────

/// Group detail with resolved member profiles.
#[derive(Serialize)]
pub struct GroupDetailResponse {
    #[serde(flatten)]
    pub group: Group,
    pub members: Vec<GroupMemberDetail>,
}

#[derive(Serialize)]
pub struct GroupMemberDetail {
    pub profile: UserProfile,
    pub is_creator: bool,
    pub joined_at: String,
}

/// Get group detail (members only).
async fn get_group(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(group_id): Path<String>,
) -> Result<Json<GroupDetailResponse>> {
    require_membership(&state, &group_id, &user.account_id).await?;

    let group = state
        .db
        .get_group(&group_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Group {} not found", group_id)))?;

    let members = state.db.list_members(&group_id).await?;
    let member_ids: Vec<String> = members.iter().map(|m| m.user_id.clone()).collect();
    let profiles = state.db.get_profiles_by_ids(&member_ids).await?;

    let details = members
        .into_iter()
        .filter_map(|m| {
            profiles
                .iter()
                .find(|p| p.id == m.user_id)
                .cloned()
                .map(|profile| GroupMemberDetail {
                    profile,
                    is_creator: m.is_creator,
                    joined_at: m.joined_at,
                })
        })
        .collect();

    Ok(Json(GroupDetailResponse {
        group,
        members: details,
    }))
}

// ─── Join / Leave ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct JoinGroupRequest {
    pub invite_code: String,
}

#[derive(Serialize)]
pub struct JoinGroupResponse {
    pub group: Group,
    /// False when the caller was already a member (repeat join is a no-op)
    pub joined: bool,
}

/// Join a group by invite code. Idempotent on repeat attempts.
async fn join_group(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<JoinGroupRequest>,
) -> Result<Json<JoinGroupResponse>> {
    let code = payload.invite_code.trim().to_uppercase();
    if code.is_empty() {
        return Err(AppError::BadRequest("Invite code is required".to_string()));
    }

    let group = state
        .db
        .find_group_by_invite_code(&code)
        .await?
        .ok_or_else(|| AppError::NotFound("No group with that invite code".to_string()))?;

    // Repeat join: same membership row, no duplicate, no system message
    if state
        .db
        .get_membership(&group.id, &user.account_id)
        .await?
        .is_some()
    {
        return Ok(Json(JoinGroupResponse {
            group,
            joined: false,
        }));
    }

    let member = GroupMember {
        group_id: group.id.clone(),
        user_id: user.account_id.clone(),
        is_creator: false,
        joined_at: chrono::Utc::now().to_rfc3339(),
    };
    state.db.add_member_capped(&member, group.max_members).await?;

    tracing::info!(group_id = %group.id, user_id = %user.account_id, "Member joined");

    let display_name = member_display_name(&state, &user.account_id).await;
    notify_group(&state, &group.id, &format!("{} joined the group", display_name)).await;

    Ok(Json(JoinGroupResponse {
        group,
        joined: true,
    }))
}

/// Leave a group. The creator deletes the group instead.
async fn leave_group(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(group_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let membership = require_membership(&state, &group_id, &user.account_id).await?;

    if membership.is_creator {
        return Err(AppError::BadRequest(
            "The creator cannot leave; delete the group instead".to_string(),
        ));
    }

    state
        .db
        .delete_membership(&group_id, &user.account_id)
        .await?;

    tracing::info!(group_id = %group_id, user_id = %user.account_id, "Member left");

    let display_name = member_display_name(&state, &user.account_id).await;
    notify_group(&state, &group_id, &format!("{} left the group", display_name)).await;

    Ok(Json(serde_json::json!({ "success": true })))
}

/// Post a join/leave notice to the group channel.
///
/// The membership change has already committed by the time the notice is
/// posted, so a failure here is logged rather than failing the request.
async fn notify_group(state: &Arc<AppState>, group_id: &str, text: &str) {
    if let Err(err) = post_system_message(state, group_id, text).await {
        tracing::warn!(group_id = %group_id, error = %err, "Failed to post group notice");
    }
}

/// Display name for system messages; falls back to a neutral label rather
/// than failing the join/leave.
async fn member_display_name(state: &Arc<AppState>, account_id: &str) -> String {
    match state.db.get_profile(account_id).await {
        Ok(Some(profile)) => profile.display_name,
        _ => "A member".to_string(),
    }
}

// ─── Delete ──────────────────────────────────────────────────

#[derive(Serialize)]
pub struct DeleteGroupResponse {
    pub success: bool,
    pub deleted_documents: usize,
}

/// Delete a group and cascade to its messages, memberships, and meetings.
/// Creator only.
async fn delete_group(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(group_id): Path<String>,
) -> Result<Json<DeleteGroupResponse>> {
    let group = state
        .db
        .get_group(&group_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Group {} not found", group_id)))?;

    if group.created_by != user.account_id {
        return Err(AppError::Unauthorized);
    }

    let deleted_documents = state.db.delete_group_cascade(&group_id).await?;

    tracing::info!(
        group_id = %group_id,
        deleted_documents,
        "Group deleted by creator"
    );

    Ok(Json(DeleteGroupResponse {
        success: true,
        deleted_documents,
    }))
}

// SPDX-License-Identifier: MIT

//! Profile routes: own profile, profile updates, person finder.

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::db::Db;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Gender, Group, UserProfile};
use crate::services::codes::unique_view_code;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me).put(update_me))
        .route("/api/people/{view_code}", get(find_person))
        .route("/api/me/theme", put(update_theme))
}

/// Get or create the caller's profile.
///
/// A missing profile is not an error: it is created with defaults, so
/// accounts provisioned through any path always resolve to a profile.
pub(crate) async fn ensure_profile(
    db: &Db,
    account_id: &str,
    fallback_name: &str,
) -> Result<UserProfile> {
    if let Some(profile) = db.get_profile(account_id).await? {
        return Ok(profile);
    }

    let view_code = unique_view_code(db).await?;
    let now = chrono::Utc::now().to_rfc3339();
    let profile = UserProfile::new_default(account_id, fallback_name, view_code, &now);
    db.upsert_profile(&profile).await?;

    tracing::info!(account_id, "Created default profile");

    Ok(profile)
}

// ─── Own Profile ─────────────────────────────────────────────

/// Get the caller's profile, creating a default one if missing.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserProfile>> {
    // Fall back to the email local part for accounts that somehow lost
    // their profile (or were provisioned before profiles existed).
    let fallback_name = match state.db.get_account(&user.account_id).await? {
        Some(account) => account
            .email
            .split('@')
            .next()
            .unwrap_or("member")
            .to_string(),
        None => "member".to_string(),
    };

    let profile = ensure_profile(&state.db, &user.account_id, &fallback_name).await?;
    Ok(Json(profile))
}

#[derive(Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 60))]
    pub display_name: Option<String>,
    #[validate(length(max = 500))]
    pub bio: Option<String>,
    #[validate(length(max = 20))]
    pub topics: Option<Vec<String>>,
    pub theme: Option<String>,
    pub gender: Option<Gender>,
}

/// Update the caller's profile. Owner-only by construction.
async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let mut profile = state
        .db
        .get_profile(&user.account_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    if let Some(display_name) = payload.display_name {
        profile.display_name = display_name;
    }
    if let Some(bio) = payload.bio {
        profile.bio = bio;
    }
    if let Some(topics) = payload.topics {
        profile.topics = topics;
    }
    if let Some(theme) = payload.theme {
        profile.theme = theme;
    }
    if let Some(gender) = payload.gender {
        profile.gender = gender;
    }
    profile.updated_at = chrono::Utc::now().to_rfc3339();

    state.db.upsert_profile(&profile).await?;

    Ok(Json(profile))
}

#[derive(Deserialize)]
pub struct UpdateThemeRequest {
    pub theme: String,
}

/// Theme-only update; the UI saves this on every toggle.
async fn update_theme(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<UpdateThemeRequest>,
) -> Result<Json<UserProfile>> {
    let mut profile = state
        .db
        .get_profile(&user.account_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    profile.theme = payload.theme;
    profile.updated_at = chrono::Utc::now().to_rfc3339();
    state.db.upsert_profile(&profile).await?;

    Ok(Json(profile))
}

// ─── Person Finder ───────────────────────────────────────────

/// Person-finder response: the matched profile and its groups.
#[derive(Serialize)]
pub struct PersonResponse {
    pub profile: UserProfile,
    pub groups: Vec<Group>,
}

/// Look up a profile by its view code.
async fn find_person(
    State(state): State<Arc<AppState>>,
    Path(view_code): Path<String>,
) -> Result<Json<PersonResponse>> {
    let code = view_code.trim().to_uppercase();

    let profile = state
        .db
        .find_profile_by_view_code(&code)
        .await?
        .ok_or_else(|| AppError::NotFound("No profile with that view code".to_string()))?;

    let memberships = state.db.list_memberships_for_user(&profile.id).await?;
    let group_ids: Vec<String> = memberships.into_iter().map(|m| m.group_id).collect();
    let groups = state.db.get_groups_by_ids(&group_ids).await?;

    Ok(Json(PersonResponse { profile, groups }))
}

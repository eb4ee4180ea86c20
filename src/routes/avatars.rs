// SPDX-License-Identifier: MIT

//! Avatar upload route.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Extension, Json, Router,
};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::UserProfile;
use crate::services::storage::{process_avatar, AVATAR_MAX_BYTES};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/me/avatar",
        post(upload_avatar)
            // Multipart framing overhead on top of the avatar cap
            .layer(DefaultBodyLimit::max(AVATAR_MAX_BYTES + 64 * 1024)),
    )
}

/// Upload a new avatar: validate, normalize to 1000x1000, store in the
/// avatars bucket, and save the public URL on the profile.
async fn upload_avatar(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<Json<UserProfile>> {
    let mut file_bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed upload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        if let Some(content_type) = field.content_type() {
            if !content_type.starts_with("image/") {
                return Err(AppError::BadRequest(
                    "Avatar must be an image file".to_string(),
                ));
            }
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Upload read failed: {}", e)))?;
        file_bytes = Some(bytes.to_vec());
        break;
    }

    let bytes = file_bytes
        .ok_or_else(|| AppError::BadRequest("Missing 'file' field in upload".to_string()))?;

    if bytes.len() > AVATAR_MAX_BYTES {
        return Err(AppError::BadRequest(format!(
            "Avatar exceeds the {} MB limit",
            AVATAR_MAX_BYTES / (1024 * 1024)
        )));
    }

    // Image decode/resize is CPU-bound; keep it off the async workers
    let png = tokio::task::spawn_blocking(move || process_avatar(&bytes))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Avatar processing panicked: {}", e)))??;

    let url = state.storage.upload_avatar(&user.account_id, png).await?;

    let mut profile = state
        .db
        .get_profile(&user.account_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    profile.avatar_url = url;
    profile.updated_at = chrono::Utc::now().to_rfc3339();
    state.db.upsert_profile(&profile).await?;

    tracing::info!(account_id = %user.account_id, "Avatar updated");

    Ok(Json(profile))
}

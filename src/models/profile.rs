// SPDX-License-Identifier: MIT

//! User profile model for storage and API.

use serde::{Deserialize, Serialize};

/// Gender selection on a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    #[default]
    Unspecified,
    Female,
    Male,
    Other,
}

/// User profile stored in Firestore, keyed by account ID.
///
/// Created automatically on signup and updated by the owning user only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// Account ID (also used as document ID)
    pub id: String,
    /// Display name shown in groups and messages
    pub display_name: String,
    /// Free-form bio
    pub bio: String,
    /// Study topics the user is interested in
    pub topics: Vec<String>,
    /// UI theme preference (opaque to the backend)
    pub theme: String,
    pub gender: Gender,
    /// Generated default avatar or uploaded image URL
    pub avatar_url: String,
    /// Unique lookup code for the person finder
    pub view_code: String,
    /// When the profile was created (ISO 8601)
    pub created_at: String,
    /// Last profile update (ISO 8601)
    pub updated_at: String,
}

impl UserProfile {
    /// Build the default profile created at signup.
    pub fn new_default(id: &str, display_name: &str, view_code: String, now: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            bio: String::new(),
            topics: Vec::new(),
            theme: "light".to_string(),
            gender: Gender::Unspecified,
            avatar_url: default_avatar_url(display_name),
            view_code,
            created_at: now.to_string(),
            updated_at: now.to_string(),
        }
    }
}

/// Deterministic initials-based avatar for users who never upload one.
pub fn default_avatar_url(display_name: &str) -> String {
    format!(
        "https://ui-avatars.com/api/?size=256&name={}",
        urlencoding::encode(display_name)
    )
}

// SPDX-License-Identifier: MIT

//! Study group and membership models.

use serde::{Deserialize, Serialize};

/// Study group stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    /// Group ID (uuid string, also used as document ID)
    pub id: String,
    pub name: String,
    pub description: String,
    /// Study topics the group covers
    pub topics: Vec<String>,
    /// Maximum member count; joins are rejected once reached
    pub max_members: u32,
    /// Unique invite code granting join access
    pub invite_code: String,
    /// Account ID of the creator
    pub created_by: String,
    /// When the group was created (ISO 8601)
    pub created_at: String,
}

/// Membership record.
///
/// Document ID is `{group_id}_{user_id}`, which makes repeat joins an
/// idempotent overwrite rather than a duplicate row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMember {
    pub group_id: String,
    pub user_id: String,
    /// True for the member who created the group
    pub is_creator: bool,
    /// When the user joined (ISO 8601)
    pub joined_at: String,
}

impl GroupMember {
    /// Composite document ID for a membership record.
    pub fn doc_id(group_id: &str, user_id: &str) -> String {
        format!("{}_{}", group_id, user_id)
    }
}

// SPDX-License-Identifier: MIT

//! Scheduled meeting model.

use serde::{Deserialize, Serialize};

/// Scheduled study session for a group.
///
/// The meeting itself happens on an external video-conference service; we
/// only store the link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    /// Meeting ID (uuid string, also used as document ID)
    pub id: String,
    /// Group the meeting belongs to
    pub group_id: String,
    pub topic: String,
    /// External video-conference link
    pub meeting_url: String,
    /// Scheduled start time (ISO 8601)
    pub scheduled_at: String,
    /// Account ID of the member who scheduled it
    pub created_by: String,
    /// When the meeting was created (ISO 8601)
    pub created_at: String,
}

// SPDX-License-Identifier: MIT

//! Chat message model.

use serde::{Deserialize, Serialize};

/// Sender ID used for messages posted by the system itself
/// (join/leave notices and similar).
pub const SYSTEM_SENDER: &str = "system";

/// Chat message stored in Firestore. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Message ID (uuid string, also used as document ID)
    pub id: String,
    /// Group the message belongs to
    pub group_id: String,
    /// Account ID of the sender, or [`SYSTEM_SENDER`]
    pub sender_id: String,
    pub text: String,
    /// When the message was sent (ISO 8601)
    pub created_at: String,
}

impl Message {
    pub fn is_system(&self) -> bool {
        self.sender_id == SYSTEM_SENDER
    }
}

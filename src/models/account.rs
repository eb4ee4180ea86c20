// SPDX-License-Identifier: MIT

//! Account model (auth layer).

use serde::{Deserialize, Serialize};

/// Account record stored in Firestore.
///
/// Holds credentials only; everything user-facing lives on the profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Account ID (uuid string, also used as document ID)
    pub id: String,
    /// Email address (unique by query)
    pub email: String,
    /// Argon2 password hash; None for OAuth-only accounts
    pub password_hash: Option<String>,
    /// OAuth provider subject, when the account was created via OAuth
    pub oauth_subject: Option<String>,
    /// When the account was created (ISO 8601)
    pub created_at: String,
}

/// Password-reset token record, keyed by the token itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetToken {
    /// Account the token belongs to
    pub account_id: String,
    /// Expiry (ISO 8601); tokens past this are rejected and deleted
    pub expires_at: String,
}

// SPDX-License-Identifier: MIT

//! Database layer (Firestore).

pub mod firestore;

pub use firestore::Db;

/// Collection names as constants.
pub mod collections {
    pub const ACCOUNTS: &str = "accounts";
    pub const PROFILES: &str = "profiles";
    pub const GROUPS: &str = "groups";
    pub const GROUP_MEMBERS: &str = "group_members";
    pub const MESSAGES: &str = "messages";
    pub const MEETINGS: &str = "meetings";
    /// Password-reset tokens (keyed by token)
    pub const RESET_TOKENS: &str = "reset_tokens";
}

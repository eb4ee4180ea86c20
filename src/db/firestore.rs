// SPDX-License-Identifier: MIT

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Accounts (credentials) and password-reset tokens
//! - Profiles (view-code lookup)
//! - Groups and memberships (invite-code lookup, cascade delete)
//! - Messages (append-only chat history)
//! - Meetings (scheduled study sessions)

use crate::db::collections;
use crate::error::AppError;
use crate::models::{Account, Group, GroupMember, Meeting, Message, ResetToken, UserProfile};
use futures_util::{stream, StreamExt};

const MAX_CONCURRENT_DB_OPS: usize = 50;
// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Firestore database client.
#[derive(Clone)]
pub struct Db {
    client: Option<firestore::FirestoreDb>,
}

impl Db {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Account Operations ──────────────────────────────────────

    /// Get an account by ID.
    pub async fn get_account(&self, account_id: &str) -> Result<Option<Account>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ACCOUNTS)
            .obj()
            .one(account_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find an account by email (unique by convention).
    pub async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        let email = email.to_string();
        let matches: Vec<Account> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ACCOUNTS)
            .filter(move |q| q.field("email").eq(email.clone()))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(matches.into_iter().next())
    }

    /// Create or update an account.
    pub async fn upsert_account(&self, account: &Account) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ACCOUNTS)
            .document_id(&account.id)
            .object(account)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Password Reset Tokens ───────────────────────────────────

    /// Store a reset token (keyed by the token itself).
    pub async fn set_reset_token(&self, token: &str, record: &ResetToken) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::RESET_TOKENS)
            .document_id(token)
            .object(record)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Look up a reset token.
    pub async fn get_reset_token(&self, token: &str) -> Result<Option<ResetToken>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::RESET_TOKENS)
            .obj()
            .one(token)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a reset token (after use or expiry).
    pub async fn delete_reset_token(&self, token: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::RESET_TOKENS)
            .document_id(token)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Profile Operations ──────────────────────────────────────

    /// Get a profile by account ID.
    pub async fn get_profile(&self, account_id: &str) -> Result<Option<UserProfile>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PROFILES)
            .obj()
            .one(account_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a profile.
    pub async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::PROFILES)
            .document_id(&profile.id)
            .object(profile)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Find a profile by its view code (unique by construction).
    pub async fn find_profile_by_view_code(
        &self,
        view_code: &str,
    ) -> Result<Option<UserProfile>, AppError> {
        let view_code = view_code.to_string();
        let matches: Vec<UserProfile> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::PROFILES)
            .filter(move |q| q.field("view_code").eq(view_code.clone()))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(matches.into_iter().next())
    }

    /// Fetch profiles for a set of account IDs.
    ///
    /// Uses concurrent point reads with a limit to avoid overloading Firestore.
    pub async fn get_profiles_by_ids(&self, ids: &[String]) -> Result<Vec<UserProfile>, AppError> {
        let client = self.get_client()?;

        let profiles = stream::iter(ids.to_vec())
            .map(|id| async move {
                client
                    .fluent()
                    .select()
                    .by_id_in(collections::PROFILES)
                    .obj::<UserProfile>()
                    .one(&id)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<Option<UserProfile>, AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<Option<UserProfile>>, AppError>>()?;

        Ok(profiles.into_iter().flatten().collect())
    }

    // ─── Group Operations ────────────────────────────────────────

    /// Get a group by ID.
    pub async fn get_group(&self, group_id: &str) -> Result<Option<Group>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::GROUPS)
            .obj()
            .one(group_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a group by its invite code (unique by construction).
    pub async fn find_group_by_invite_code(
        &self,
        invite_code: &str,
    ) -> Result<Option<Group>, AppError> {
        let invite_code = invite_code.to_string();
        let matches: Vec<Group> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::GROUPS)
            .filter(move |q| q.field("invite_code").eq(invite_code.clone()))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(matches.into_iter().next())
    }

    /// Fetch groups for a set of IDs.
    pub async fn get_groups_by_ids(&self, ids: &[String]) -> Result<Vec<Group>, AppError> {
        let client = self.get_client()?;

        let groups = stream::iter(ids.to_vec())
            .map(|id| async move {
                client
                    .fluent()
                    .select()
                    .by_id_in(collections::GROUPS)
                    .obj::<Group>()
                    .one(&id)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<Option<Group>, AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<Option<Group>>, AppError>>()?;

        Ok(groups.into_iter().flatten().collect())
    }

    /// Atomically create a group together with its creator membership row.
    ///
    /// Uses a Firestore transaction so a group can never exist without the
    /// membership row that marks its creator.
    pub async fn create_group_with_creator(
        &self,
        group: &Group,
        creator: &GroupMember,
    ) -> Result<(), AppError> {
        let mut transaction = self
            .get_client()?
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::GROUPS)
            .document_id(&group.id)
            .object(group)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add group to transaction: {}", e)))?;

        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::GROUP_MEMBERS)
            .document_id(GroupMember::doc_id(&creator.group_id, &creator.user_id))
            .object(creator)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add membership to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(
            group_id = %group.id,
            created_by = %group.created_by,
            "Group created with creator membership"
        );

        Ok(())
    }

    // ─── Membership Operations ───────────────────────────────────

    /// Get a membership row, if the user belongs to the group.
    pub async fn get_membership(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> Result<Option<GroupMember>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::GROUP_MEMBERS)
            .obj()
            .one(&GroupMember::doc_id(group_id, user_id))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or overwrite a membership row.
    ///
    /// The composite document ID makes repeat joins idempotent.
    pub async fn upsert_membership(&self, member: &GroupMember) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::GROUP_MEMBERS)
            .document_id(GroupMember::doc_id(&member.group_id, &member.user_id))
            .object(member)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Add a membership row only if the group has a free seat.
    ///
    /// Firestore queries cannot lock the member count, so the row is written
    /// first and then re-checked: a joiner that observes the group over
    /// capacity after its own write removes its row again. Firestore reads
    /// are strongly consistent, so the last join to commit always observes
    /// the overflow; the member count can therefore never settle above
    /// `max_members`. Joins racing for the last seat may all be rejected and
    /// have to retry.
    pub async fn add_member_capped(
        &self,
        member: &GroupMember,
        max_members: u32,
    ) -> Result<(), AppError> {
        let full = || AppError::Conflict("Group is full".to_string());

        // Fast path: already at capacity, nothing to write.
        if self.list_members(&member.group_id).await?.len() as u32 >= max_members {
            return Err(full());
        }

        self.upsert_membership(member).await?;

        if self.list_members(&member.group_id).await?.len() as u32 <= max_members {
            return Ok(());
        }

        self.delete_membership(&member.group_id, &member.user_id)
            .await?;
        tracing::warn!(
            group_id = %member.group_id,
            user_id = %member.user_id,
            "Join lost the race for the last seat, membership rolled back"
        );
        Err(full())
    }

    /// Remove a membership row.
    pub async fn delete_membership(&self, group_id: &str, user_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::GROUP_MEMBERS)
            .document_id(GroupMember::doc_id(group_id, user_id))
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// List all members of a group.
    pub async fn list_members(&self, group_id: &str) -> Result<Vec<GroupMember>, AppError> {
        let group_id = group_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::GROUP_MEMBERS)
            .filter(move |q| q.field("group_id").eq(group_id.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List all memberships for a user (their groups).
    pub async fn list_memberships_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<GroupMember>, AppError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::GROUP_MEMBERS)
            .filter(move |q| q.field("user_id").eq(user_id.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Message Operations ──────────────────────────────────────

    /// Append a message to a group's history.
    pub async fn insert_message(&self, message: &Message) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::MESSAGES)
            .document_id(&message.id)
            .object(message)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Get messages for a group with pagination, newest first.
    pub async fn list_messages(
        &self,
        group_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Message>, AppError> {
        let group_id = group_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::MESSAGES)
            .filter(move |q| q.field("group_id").eq(group_id.clone()))
            .order_by([(
                "created_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .limit(limit)
            .offset(offset)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Meeting Operations ──────────────────────────────────────

    /// Store a scheduled meeting.
    pub async fn insert_meeting(&self, meeting: &Meeting) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::MEETINGS)
            .document_id(&meeting.id)
            .object(meeting)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Get a meeting by ID.
    pub async fn get_meeting(&self, meeting_id: &str) -> Result<Option<Meeting>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::MEETINGS)
            .obj()
            .one(meeting_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List meetings for a group, soonest first.
    pub async fn list_meetings(&self, group_id: &str) -> Result<Vec<Meeting>, AppError> {
        let group_id = group_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::MEETINGS)
            .filter(move |q| q.field("group_id").eq(group_id.clone()))
            .order_by([(
                "scheduled_at",
                firestore::FirestoreQueryDirection::Ascending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a meeting.
    pub async fn delete_meeting(&self, meeting_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::MEETINGS)
            .document_id(meeting_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Helper Methods ──────────────────────────────────────────

    /// Helper to batch delete documents using transactions.
    async fn batch_delete<T, F>(
        &self,
        items: &[T],
        collection: &str,
        id_extractor: F,
    ) -> Result<(), AppError>
    where
        F: Fn(&T) -> String,
    {
        let client = self.get_client()?;

        for chunk in items.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for item in chunk {
                let doc_id = id_extractor(item);
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(&doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }

    // ─── Group Cascade Deletion ──────────────────────────────────

    /// Delete a group and everything under it.
    ///
    /// Firestore has no foreign keys, so the cascade is explicit:
    /// - `messages` (query by group_id)
    /// - `group_members` (query by group_id)
    /// - `meetings` (query by group_id)
    /// - `groups/{group_id}`
    ///
    /// Returns the number of documents deleted.
    pub async fn delete_group_cascade(&self, group_id: &str) -> Result<usize, AppError> {
        let mut deleted_count = 0;

        // 1. Delete all messages
        let messages = self.list_all_messages(group_id).await?;
        let count = messages.len();
        self.batch_delete(&messages, collections::MESSAGES, |m: &Message| m.id.clone())
            .await?;
        deleted_count += count;
        tracing::debug!(group_id, count, "Deleted messages");

        // 2. Delete all membership rows
        let members = self.list_members(group_id).await?;
        let count = members.len();
        self.batch_delete(&members, collections::GROUP_MEMBERS, |m: &GroupMember| {
            GroupMember::doc_id(&m.group_id, &m.user_id)
        })
        .await?;
        deleted_count += count;
        tracing::debug!(group_id, count, "Deleted memberships");

        // 3. Delete all meetings
        let meetings = self.list_meetings(group_id).await?;
        let count = meetings.len();
        self.batch_delete(&meetings, collections::MEETINGS, |m: &Meeting| m.id.clone())
            .await?;
        deleted_count += count;
        tracing::debug!(group_id, count, "Deleted meetings");

        // 4. Delete the group document itself
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::GROUPS)
            .document_id(group_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        deleted_count += 1;

        tracing::info!(group_id, deleted_count, "Group cascade deletion complete");

        Ok(deleted_count)
    }

    /// All messages for a group, unpaginated (cascade deletion only).
    async fn list_all_messages(&self, group_id: &str) -> Result<Vec<Message>, AppError> {
        let group_id = group_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::MESSAGES)
            .filter(move |q| q.field("group_id").eq(group_id.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

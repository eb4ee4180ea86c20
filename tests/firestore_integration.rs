// SPDX-License-Identifier: MIT

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running; set
//! FIRESTORE_EMULATOR_HOST to enable them. The emulator provides a clean
//! state for each test run.

use studyhall::error::AppError;
use studyhall::models::{Account, Group, GroupMember, Meeting, Message, UserProfile, SYSTEM_SENDER};
use studyhall::services::codes::{unique_invite_code, unique_view_code};

mod common;
use common::test_db;

/// Unique suffix for test isolation within a shared emulator.
fn unique_suffix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    format!(
        "{:x}",
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    )
}

fn test_account(suffix: &str) -> Account {
    Account {
        id: format!("acc-{}", suffix),
        email: format!("user-{}@example.com", suffix),
        password_hash: Some("$argon2id$fake$hash".to_string()),
        oauth_subject: None,
        created_at: chrono::Utc::now().to_rfc3339(),
    }
}

fn test_profile(account_id: &str, view_code: &str) -> UserProfile {
    UserProfile::new_default(
        account_id,
        "Test User",
        view_code.to_string(),
        &chrono::Utc::now().to_rfc3339(),
    )
}

fn test_group(suffix: &str, creator: &str, invite_code: &str) -> Group {
    Group {
        id: format!("grp-{}", suffix),
        name: "Linear Algebra".to_string(),
        description: "Weekly problem sets".to_string(),
        topics: vec!["math".to_string()],
        max_members: 3,
        invite_code: invite_code.to_string(),
        created_by: creator.to_string(),
        created_at: chrono::Utc::now().to_rfc3339(),
    }
}

fn member(group_id: &str, user_id: &str, is_creator: bool) -> GroupMember {
    GroupMember {
        group_id: group_id.to_string(),
        user_id: user_id.to_string(),
        is_creator,
        joined_at: chrono::Utc::now().to_rfc3339(),
    }
}

fn test_message(id: &str, group_id: &str, sender: &str, text: &str, created_at: &str) -> Message {
    Message {
        id: id.to_string(),
        group_id: group_id.to_string(),
        sender_id: sender.to_string(),
        text: text.to_string(),
        created_at: created_at.to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ACCOUNT & PROFILE TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_account_lookup_by_email() {
    require_emulator!();

    let db = test_db().await;
    let suffix = unique_suffix();
    let account = test_account(&suffix);

    assert!(db
        .find_account_by_email(&account.email)
        .await
        .unwrap()
        .is_none());

    db.upsert_account(&account).await.unwrap();

    let fetched = db
        .find_account_by_email(&account.email)
        .await
        .unwrap()
        .expect("account should be found by email");
    assert_eq!(fetched.id, account.id);
}

#[tokio::test]
async fn test_view_code_lookup_finds_exact_profile() {
    require_emulator!();

    let db = test_db().await;
    let suffix = unique_suffix();

    let view_code = unique_view_code(&db).await.unwrap();
    assert!(!view_code.is_empty());

    let profile = test_profile(&format!("acc-{}", suffix), &view_code);
    db.upsert_profile(&profile).await.unwrap();

    let found = db
        .find_profile_by_view_code(&view_code)
        .await
        .unwrap()
        .expect("profile should be found by view code");
    assert_eq!(found.id, profile.id);

    // Unknown code returns nothing
    assert!(db
        .find_profile_by_view_code("NOPENOPE")
        .await
        .unwrap()
        .is_none());
}

// ═══════════════════════════════════════════════════════════════════════════
// GROUP TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_group_creation_includes_creator_membership() {
    require_emulator!();

    let db = test_db().await;
    let suffix = unique_suffix();
    let creator_id = format!("acc-{}", suffix);

    let invite_code = unique_invite_code(&db).await.unwrap();
    assert!(!invite_code.is_empty());

    let group = test_group(&suffix, &creator_id, &invite_code);
    let creator = member(&group.id, &creator_id, true);
    db.create_group_with_creator(&group, &creator)
        .await
        .unwrap();

    // Group is findable by invite code
    let found = db
        .find_group_by_invite_code(&invite_code)
        .await
        .unwrap()
        .expect("group should be found by invite code");
    assert_eq!(found.id, group.id);

    // Exactly one membership row, flagged as creator
    let members = db.list_members(&group.id).await.unwrap();
    assert_eq!(members.len(), 1);
    assert!(members[0].is_creator);
    assert_eq!(members[0].user_id, creator_id);
}

#[tokio::test]
async fn test_repeat_join_does_not_duplicate_membership() {
    require_emulator!();

    let db = test_db().await;
    let suffix = unique_suffix();
    let creator_id = format!("acc-{}", suffix);
    let joiner_id = format!("acc-{}-joiner", suffix);

    let invite_code = unique_invite_code(&db).await.unwrap();
    let group = test_group(&suffix, &creator_id, &invite_code);
    db.create_group_with_creator(&group, &member(&group.id, &creator_id, true))
        .await
        .unwrap();

    // Join twice with the same user
    db.upsert_membership(&member(&group.id, &joiner_id, false))
        .await
        .unwrap();
    db.upsert_membership(&member(&group.id, &joiner_id, false))
        .await
        .unwrap();

    let members = db.list_members(&group.id).await.unwrap();
    assert_eq!(members.len(), 2, "repeat join must not add a row");
}

#[tokio::test]
async fn test_join_rejects_when_group_full() {
    require_emulator!();

    let db = test_db().await;
    let suffix = unique_suffix();
    let creator_id = format!("acc-{}", suffix);

    let invite_code = unique_invite_code(&db).await.unwrap();
    let mut group = test_group(&suffix, &creator_id, &invite_code);
    group.max_members = 2;
    db.create_group_with_creator(&group, &member(&group.id, &creator_id, true))
        .await
        .unwrap();

    // Second member takes the last seat
    db.add_member_capped(
        &member(&group.id, &format!("acc-{}-b", suffix), false),
        group.max_members,
    )
    .await
    .unwrap();

    // Third member is rejected and leaves no row behind
    let err = db
        .add_member_capped(
            &member(&group.id, &format!("acc-{}-c", suffix), false),
            group.max_members,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(db.list_members(&group.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_racing_joins_never_exceed_capacity() {
    require_emulator!();

    let db = test_db().await;
    let suffix = unique_suffix();
    let creator_id = format!("acc-{}", suffix);

    // One free seat, two simultaneous joiners
    let invite_code = unique_invite_code(&db).await.unwrap();
    let mut group = test_group(&suffix, &creator_id, &invite_code);
    group.max_members = 2;
    db.create_group_with_creator(&group, &member(&group.id, &creator_id, true))
        .await
        .unwrap();

    let joiner_a = member(&group.id, &format!("acc-{}-a", suffix), false);
    let joiner_b = member(&group.id, &format!("acc-{}-bb", suffix), false);
    let (result_a, result_b) = tokio::join!(
        db.add_member_capped(&joiner_a, group.max_members),
        db.add_member_capped(&joiner_b, group.max_members),
    );

    // Both joins racing for the last seat must never both land; they may
    // both be rejected, in which case the seat stays open for a retry.
    assert!(!(result_a.is_ok() && result_b.is_ok()));

    let members = db.list_members(&group.id).await.unwrap();
    assert!(
        members.len() as u32 <= group.max_members,
        "group over capacity: {} members",
        members.len()
    );
}

#[tokio::test]
async fn test_group_cascade_delete() {
    require_emulator!();

    let db = test_db().await;
    let suffix = unique_suffix();
    let creator_id = format!("acc-{}", suffix);

    let invite_code = unique_invite_code(&db).await.unwrap();
    let group = test_group(&suffix, &creator_id, &invite_code);
    db.create_group_with_creator(&group, &member(&group.id, &creator_id, true))
        .await
        .unwrap();

    // Populate messages, a second member, and a meeting
    db.upsert_membership(&member(&group.id, &format!("acc-{}-b", suffix), false))
        .await
        .unwrap();
    for i in 0..3 {
        db.insert_message(&test_message(
            &format!("msg-{}-{}", suffix, i),
            &group.id,
            &creator_id,
            "hello",
            &chrono::Utc::now().to_rfc3339(),
        ))
        .await
        .unwrap();
    }
    db.insert_meeting(&Meeting {
        id: format!("meet-{}", suffix),
        group_id: group.id.clone(),
        topic: "Midterm review".to_string(),
        meeting_url: "https://meet.example.com/abc".to_string(),
        scheduled_at: chrono::Utc::now().to_rfc3339(),
        created_by: creator_id.clone(),
        created_at: chrono::Utc::now().to_rfc3339(),
    })
    .await
    .unwrap();

    // 3 messages + 2 members + 1 meeting + 1 group doc
    let deleted = db.delete_group_cascade(&group.id).await.unwrap();
    assert_eq!(deleted, 7);

    assert!(db.get_group(&group.id).await.unwrap().is_none());
    assert!(db.list_members(&group.id).await.unwrap().is_empty());
    assert!(db.list_messages(&group.id, 10, 0).await.unwrap().is_empty());
    assert!(db.list_meetings(&group.id).await.unwrap().is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
// MESSAGE TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_messages_are_listed_newest_first() {
    require_emulator!();

    let db = test_db().await;
    let suffix = unique_suffix();
    let group_id = format!("grp-{}", suffix);

    db.insert_message(&test_message(
        &format!("m1-{}", suffix),
        &group_id,
        "acc-a",
        "first",
        "2026-01-01T10:00:00Z",
    ))
    .await
    .unwrap();
    db.insert_message(&test_message(
        &format!("m2-{}", suffix),
        &group_id,
        SYSTEM_SENDER,
        "second",
        "2026-01-01T11:00:00Z",
    ))
    .await
    .unwrap();
    db.insert_message(&test_message(
        &format!("m3-{}", suffix),
        &group_id,
        "acc-b",
        "third",
        "2026-01-01T12:00:00Z",
    ))
    .await
    .unwrap();

    let messages = db.list_messages(&group_id, 10, 0).await.unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].text, "third");
    assert_eq!(messages[2].text, "first");
    assert!(messages[1].is_system());

    // Pagination: limit 1, offset 1 lands on the middle message
    let page = db.list_messages(&group_id, 1, 1).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].text, "second");
}

// ═══════════════════════════════════════════════════════════════════════════
// RESET TOKEN TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_reset_token_roundtrip() {
    require_emulator!();

    let db = test_db().await;
    let suffix = unique_suffix();
    let token = format!("tok-{}", suffix);

    let record = studyhall::models::ResetToken {
        account_id: format!("acc-{}", suffix),
        expires_at: chrono::Utc::now().to_rfc3339(),
    };
    db.set_reset_token(&token, &record).await.unwrap();

    let fetched = db.get_reset_token(&token).await.unwrap().unwrap();
    assert_eq!(fetched.account_id, record.account_id);

    db.delete_reset_token(&token).await.unwrap();
    assert!(db.get_reset_token(&token).await.unwrap().is_none());
}

// ═══════════════════════════════════════════════════════════════════════════
// LEAVE TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_creator_cannot_leave_group() {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use studyhall::middleware::auth::create_jwt;
    use tower::ServiceExt;

    require_emulator!();

    let (app, state) = common::create_emulator_app().await;
    let suffix = unique_suffix();
    let creator_id = format!("acc-{}", suffix);
    let token = create_jwt(&creator_id, &state.config.jwt_signing_key).unwrap();

    // Create a group through the API so the creator membership row exists
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/groups")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::from(r#"{"name":"Graph Theory"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let group: Group = serde_json::from_slice(&bytes).unwrap();

    // The creator must delete the group, not leave it
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/groups/{}/leave", group.id))
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // The membership row is untouched
    let members = state.db.list_members(&group.id).await.unwrap();
    assert_eq!(members.len(), 1);
    assert!(members[0].is_creator);
}

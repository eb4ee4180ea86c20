// SPDX-License-Identifier: MIT

use std::sync::Arc;
use studyhall::config::Config;
use studyhall::db::Db;
use studyhall::routes::create_router;
use studyhall::services::{AvatarStorage, RealtimeHub};
use studyhall::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> Db {
    Db::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> Db {
    Db::new_mock()
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let state = Arc::new(AppState {
        storage: AvatarStorage::new_mock(&config.avatar_bucket, &config.avatar_public_base),
        db: test_db_offline(),
        realtime: Arc::new(RealtimeHub::new()),
        config,
    });

    (create_router(state.clone()), state)
}

/// Create a test app backed by the Firestore emulator.
#[allow(dead_code)]
pub async fn create_emulator_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let state = Arc::new(AppState {
        storage: AvatarStorage::new_mock(&config.avatar_bucket, &config.avatar_public_base),
        db: test_db().await,
        realtime: Arc::new(RealtimeHub::new()),
        config,
    });

    (create_router(state.clone()), state)
}

// SPDX-License-Identifier: MIT

//! Studyhall API Server
//!
//! Backend for a study-group chat application: accounts and sessions, groups
//! joined via invite codes, profiles with view-code lookup, realtime
//! messaging, and avatar storage.

use std::sync::Arc;
use std::time::Duration;
use studyhall::{
    config::Config,
    db::Db,
    services::{AvatarStorage, RealtimeHub},
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Studyhall API");

    // Initialize Firestore database
    let db = Db::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    // Initialize avatar storage
    let storage = AvatarStorage::new(&config.avatar_bucket, &config.avatar_public_base).await;
    tracing::info!(bucket = %config.avatar_bucket, "Avatar storage initialized");

    // Initialize realtime hub and its health check
    let realtime = Arc::new(RealtimeHub::new());
    realtime.spawn_health_check(Duration::from_secs(config.realtime_health_interval_secs));
    tracing::info!(
        interval_secs = config.realtime_health_interval_secs,
        "Realtime hub initialized"
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        storage,
        realtime,
    });

    // Build router
    let app = studyhall::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("studyhall=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}

// SPDX-License-Identifier: MIT

//! Studyhall: backend API for a study-group chat application.
//!
//! This crate provides user accounts and sessions, group creation and
//! joining via invite codes, profiles with view-code lookup, realtime
//! messaging over websockets, and avatar storage.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod retry;
pub mod routes;
pub mod services;

use config::Config;
use db::Db;
use services::{AvatarStorage, RealtimeHub};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Db,
    pub storage: AvatarStorage,
    pub realtime: Arc<RealtimeHub>,
}

// SPDX-License-Identifier: MIT

//! Services module - business logic layer.

pub mod codes;
pub mod password;
pub mod realtime;
pub mod storage;

pub use realtime::{ChannelEvent, RealtimeHub};
pub use storage::AvatarStorage;

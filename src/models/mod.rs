// SPDX-License-Identifier: MIT

//! Data models for the application.

pub mod account;
pub mod group;
pub mod meeting;
pub mod message;
pub mod profile;

pub use account::{Account, ResetToken};
pub use group::{Group, GroupMember};
pub use meeting::Meeting;
pub use message::{Message, SYSTEM_SENDER};
pub use profile::{Gender, UserProfile};

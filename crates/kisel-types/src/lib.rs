//! Shared type definitions for the Kisel friends and rewards core.
//!
//! This crate is the single source of truth for identifiers and value types
//! used across the workspace. It has no behaviour beyond parsing and
//! formatting.
//!
//! # Modules
//!
//! - [`ids`] -- Snowflake newtypes for users, communities, channels, roles
//! - [`enums`] -- Purchase, presence, activity, and notification enums
//! - [`structs`] -- Presence snapshots, verdicts, profiles, invites, colours

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{ActivityKind, NotifyMode, PresenceStatus, PurchaseState, PurchaseType};
pub use ids::{ChannelId, GuildId, RoleId, UserId};
pub use structs::{
    Activity, ColorOutOfRange, PresenceSnapshot, Profile, RoleColor, Verdict, VoiceInvite,
};

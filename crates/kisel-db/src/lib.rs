//! Durable JSON document stores for Kisel.
//!
//! Three human-readable documents hold all durable state:
//!
//! ```text
//! friends.json    { "<owner>": ["<friend>", ...] }
//! scores.json     { "<user>": <points> }
//! purchases.json  { "<user>": { "PROMOTION": "purchased" } }
//! ```
//!
//! Each document is loaded once at start, kept in memory, and written as a
//! whole after every mutation. Read-modify-write sequences are serialized per
//! key (owner or user) through [`KeyedLocks`], so concurrent mutations for the
//! same key never lose an update.
//!
//! # Modules
//!
//! - [`document`] -- Whole-document JSON persistence with atomic replace
//! - [`locks`] -- Per-key async mutexes
//! - [`friends`] -- The directed friend store
//! - [`rewards`] -- Scores and purchase registry persistence
//! - [`error`] -- Shared error types

pub mod document;
pub mod error;
pub mod friends;
pub mod locks;
pub mod rewards;

// Re-export primary types for convenience.
pub use document::JsonDocument;
pub use error::DbError;
pub use friends::{FriendError, FriendGraph, FriendStore};
pub use locks::{KeyGuard, KeyedLocks};
pub use rewards::{RewardError, RewardStore, UserLock};

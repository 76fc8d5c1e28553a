//! Domain services for Kisel.
//!
//! This crate wires the durable stores in `kisel-db` to the chat platform
//! through the traits in [`ports`]. It never talks to the platform itself;
//! the engine binary supplies the adapters.
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration with environment overrides
//! - [`ports`] -- Traits for identity, presence, messaging, and roles
//! - [`presence`] -- Folding per-community presence into one verdict
//! - [`notify`] -- Voice invitation fan-out and the who-is-playing roster
//! - [`directory`] -- Friend lists resolved to profiles, with pruning
//! - [`voice`] -- Voice session tracking and minute payouts
//! - [`purchase`] -- Promotion and custom role purchases

pub mod config;
pub mod directory;
pub mod notify;
pub mod ports;
pub mod presence;
pub mod purchase;
pub mod voice;

// Re-export primary types for convenience.
pub use config::{ConfigError, KiselConfig, LogFormat};
pub use directory::{FriendDirectory, FriendEntry};
pub use notify::{DispatchFailure, NotifyError, NotifyReport, Notifier};
pub use ports::{Dispatcher, ExternalError, IdentityResolver, PresenceSource, RoleAuthority};
pub use presence::{Roster, classify};
pub use purchase::{CustomRoleOrder, CustomRoleRequest, PurchaseError, PurchaseWorkflow, Receipt};
pub use voice::{Payout, VoiceError, VoiceEvent, VoiceRewards, VoiceTracker};

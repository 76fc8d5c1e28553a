//! Interfaces to the chat platform.
//!
//! The core never talks to the platform directly. Everything it needs from
//! the outside world comes through these traits: profile lookups, presence
//! snapshots, direct messages, and privileged role actions. The engine
//! supplies concrete implementations; tests supply fakes.
//!
//! Methods return `impl Future + Send` so services stay generic without
//! boxing. Implementations may simply write `async fn`.

use std::future::Future;
use std::sync::Arc;

use kisel_types::{PresenceSnapshot, Profile, RoleColor, RoleId, UserId, VoiceInvite};

/// Failure of an action performed by the platform.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExternalError {
    /// The target does not exist and never will again (deleted account,
    /// deleted role).
    #[error("not found: {0}")]
    NotFound(String),

    /// The platform refused the action (blocked DMs, missing permission).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Any other failure, possibly transient.
    #[error("platform error: {0}")]
    Failed(String),
}

impl ExternalError {
    /// Whether the failure means the target is permanently gone.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Resolves account ids to profiles.
pub trait IdentityResolver {
    /// Look up `id`. [`ExternalError::NotFound`] is permanent.
    fn resolve(&self, id: UserId) -> impl Future<Output = Result<Profile, ExternalError>> + Send;
}

/// Reports a user's presence in every community shared with the bot.
pub trait PresenceSource {
    /// Zero or more snapshots, one per shared community.
    fn presence_of(&self, id: UserId) -> impl Future<Output = Vec<PresenceSnapshot>> + Send;
}

/// Sends direct messages.
pub trait Dispatcher {
    /// Deliver a voice invitation to `target`.
    fn send(
        &self,
        target: UserId,
        invite: &VoiceInvite,
    ) -> impl Future<Output = Result<(), ExternalError>> + Send;
}

/// Performs privileged role actions on behalf of the purchase workflow.
pub trait RoleAuthority {
    /// Whether `user` currently holds `role`.
    fn holds_role(
        &self,
        user: UserId,
        role: RoleId,
    ) -> impl Future<Output = Result<bool, ExternalError>> + Send;

    /// Replace `from` with `to` on `user`.
    fn exchange_role(
        &self,
        user: UserId,
        from: RoleId,
        to: RoleId,
    ) -> impl Future<Output = Result<(), ExternalError>> + Send;

    /// Create a new role with the given name and colour.
    fn create_named_resource(
        &self,
        name: &str,
        color: RoleColor,
    ) -> impl Future<Output = Result<RoleId, ExternalError>> + Send;

    /// Give `role` to `user`.
    fn grant(
        &self,
        user: UserId,
        role: RoleId,
    ) -> impl Future<Output = Result<(), ExternalError>> + Send;
}

// ---------------------------------------------------------------------------
// Shared handles
// ---------------------------------------------------------------------------

impl<T: IdentityResolver + Send + Sync> IdentityResolver for Arc<T> {
    fn resolve(&self, id: UserId) -> impl Future<Output = Result<Profile, ExternalError>> + Send {
        T::resolve(self, id)
    }
}

impl<T: PresenceSource + Send + Sync> PresenceSource for Arc<T> {
    fn presence_of(&self, id: UserId) -> impl Future<Output = Vec<PresenceSnapshot>> + Send {
        T::presence_of(self, id)
    }
}

impl<T: Dispatcher + Send + Sync> Dispatcher for Arc<T> {
    fn send(
        &self,
        target: UserId,
        invite: &VoiceInvite,
    ) -> impl Future<Output = Result<(), ExternalError>> + Send {
        T::send(self, target, invite)
    }
}

impl<T: RoleAuthority + Send + Sync> RoleAuthority for Arc<T> {
    fn holds_role(
        &self,
        user: UserId,
        role: RoleId,
    ) -> impl Future<Output = Result<bool, ExternalError>> + Send {
        T::holds_role(self, user, role)
    }

    fn exchange_role(
        &self,
        user: UserId,
        from: RoleId,
        to: RoleId,
    ) -> impl Future<Output = Result<(), ExternalError>> + Send {
        T::exchange_role(self, user, from, to)
    }

    fn create_named_resource(
        &self,
        name: &str,
        color: RoleColor,
    ) -> impl Future<Output = Result<RoleId, ExternalError>> + Send {
        T::create_named_resource(self, name, color)
    }

    fn grant(
        &self,
        user: UserId,
        role: RoleId,
    ) -> impl Future<Output = Result<(), ExternalError>> + Send {
        T::grant(self, user, role)
    }
}

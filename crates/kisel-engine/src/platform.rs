//! Platform adapter backed by the input journal.
//!
//! [`JournalPlatform`] answers identity and presence queries from what the
//! journal has reported so far, and performs outbound actions (DMs, role
//! changes) by emitting [`OutboundLine`]s. It implements every port trait
//! the core services need.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::UnboundedSender;

use kisel_core::{Dispatcher, ExternalError, IdentityResolver, PresenceSource, RoleAuthority};
use kisel_types::{
    Activity, ChannelId, GuildId, PresenceSnapshot, PresenceStatus, Profile, RoleColor, RoleId,
    UserId, VoiceInvite,
};

use crate::journal::OutboundLine;

/// First id handed out to roles created by the engine.
const CREATED_ROLE_BASE: u64 = 1 << 40;

#[derive(Debug, Default)]
struct Known {
    presence: HashMap<UserId, BTreeMap<GuildId, PresenceSnapshot>>,
    profiles: HashMap<UserId, Profile>,
    closed_dms: HashSet<UserId>,
    deleted: HashSet<UserId>,
    roles: HashSet<(UserId, RoleId)>,
    voice: HashMap<UserId, (GuildId, ChannelId)>,
    created_roles: u64,
}

/// Journal-fed implementation of the platform ports.
#[derive(Debug)]
pub struct JournalPlatform {
    known: Mutex<Known>,
    outbox: UnboundedSender<OutboundLine>,
}

impl JournalPlatform {
    /// Create an adapter that writes outbound actions to `outbox`.
    pub fn new(outbox: UnboundedSender<OutboundLine>) -> Self {
        Self {
            known: Mutex::new(Known::default()),
            outbox,
        }
    }

    fn known(&self) -> MutexGuard<'_, Known> {
        self.known.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Emit an output line. A closed outbox is logged and otherwise ignored.
    pub fn emit(&self, line: OutboundLine) {
        if self.outbox.send(line).is_err() {
            tracing::warn!("output channel closed, dropping line");
        }
    }

    // -------------------------------------------------------------------------
    // Observations
    // -------------------------------------------------------------------------

    /// Record a presence update for one community.
    pub fn observe_presence(
        &self,
        user: UserId,
        guild: GuildId,
        status: PresenceStatus,
        activity: Option<Activity>,
    ) {
        self.known().presence.entry(user).or_default().insert(
            guild,
            PresenceSnapshot {
                guild,
                status,
                activity,
            },
        );
    }

    /// Record a profile and whether the user accepts DMs.
    pub fn observe_profile(&self, profile: Profile, accepts_dms: bool) {
        let mut known = self.known();
        let user = profile.id;
        known.deleted.remove(&user);
        if accepts_dms {
            known.closed_dms.remove(&user);
        } else {
            known.closed_dms.insert(user);
        }
        known.profiles.insert(user, profile);
    }

    /// Record that an account was deleted.
    pub fn observe_deletion(&self, user: UserId) {
        let mut known = self.known();
        known.profiles.remove(&user);
        known.presence.remove(&user);
        known.voice.remove(&user);
        known.deleted.insert(user);
    }

    /// Record where a user is connected after a voice update.
    pub fn observe_voice(&self, user: UserId, location: Option<(GuildId, ChannelId)>) {
        let mut known = self.known();
        match location {
            Some(location) => known.voice.insert(user, location),
            None => known.voice.remove(&user),
        };
    }

    /// Record a role given outside the purchase workflow.
    pub fn observe_role(&self, user: UserId, role: RoleId) {
        self.known().roles.insert((user, role));
    }

    /// The voice channel `user` is connected to, if known.
    pub fn voice_channel(&self, user: UserId) -> Option<(GuildId, ChannelId)> {
        self.known().voice.get(&user).copied()
    }
}

impl IdentityResolver for JournalPlatform {
    async fn resolve(&self, id: UserId) -> Result<Profile, ExternalError> {
        let known = self.known();
        if known.deleted.contains(&id) {
            return Err(ExternalError::NotFound(format!("user {id}")));
        }
        known
            .profiles
            .get(&id)
            .cloned()
            .ok_or_else(|| ExternalError::Failed(format!("no profile observed for {id}")))
    }
}

impl PresenceSource for JournalPlatform {
    async fn presence_of(&self, id: UserId) -> Vec<PresenceSnapshot> {
        self.known()
            .presence
            .get(&id)
            .map(|by_guild| by_guild.values().cloned().collect())
            .unwrap_or_default()
    }
}

impl Dispatcher for JournalPlatform {
    async fn send(&self, target: UserId, invite: &VoiceInvite) -> Result<(), ExternalError> {
        {
            let known = self.known();
            if known.deleted.contains(&target) {
                return Err(ExternalError::NotFound(format!("user {target}")));
            }
            if known.closed_dms.contains(&target) {
                return Err(ExternalError::Forbidden(format!("{target} does not accept DMs")));
            }
        }
        self.emit(OutboundLine::DirectMessage {
            to: target,
            from: invite.from,
            channel_url: invite.channel_url(),
        });
        Ok(())
    }
}

impl RoleAuthority for JournalPlatform {
    async fn holds_role(&self, user: UserId, role: RoleId) -> Result<bool, ExternalError> {
        Ok(self.known().roles.contains(&(user, role)))
    }

    async fn exchange_role(
        &self,
        user: UserId,
        from: RoleId,
        to: RoleId,
    ) -> Result<(), ExternalError> {
        {
            let mut known = self.known();
            if known.deleted.contains(&user) {
                return Err(ExternalError::NotFound(format!("user {user}")));
            }
            known.roles.remove(&(user, from));
            known.roles.insert((user, to));
        }
        self.emit(OutboundLine::RoleExchanged { user, from, to });
        Ok(())
    }

    async fn create_named_resource(
        &self,
        name: &str,
        color: RoleColor,
    ) -> Result<RoleId, ExternalError> {
        let role = {
            let mut known = self.known();
            known.created_roles = known.created_roles.saturating_add(1);
            RoleId::new(CREATED_ROLE_BASE.saturating_add(known.created_roles))
        };
        self.emit(OutboundLine::RoleCreated {
            role,
            name: name.to_owned(),
            color: color.to_string(),
        });
        Ok(role)
    }

    async fn grant(&self, user: UserId, role: RoleId) -> Result<(), ExternalError> {
        {
            let mut known = self.known();
            if known.deleted.contains(&user) {
                return Err(ExternalError::NotFound(format!("user {user}")));
            }
            known.roles.insert((user, role));
        }
        self.emit(OutboundLine::RoleGranted { user, role });
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    #[tokio::test]
    async fn presence_collects_every_community() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let platform = JournalPlatform::new(tx);
        let user = UserId::new(3);
        platform.observe_presence(user, GuildId::new(1), PresenceStatus::Offline, None);
        platform.observe_presence(user, GuildId::new(2), PresenceStatus::Online, None);
        platform.observe_presence(user, GuildId::new(1), PresenceStatus::Idle, None);

        let snapshots = platform.presence_of(user).await;
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots.first().map(|s| s.status), Some(PresenceStatus::Idle));
    }

    #[tokio::test]
    async fn deleted_accounts_are_permanently_missing() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let platform = JournalPlatform::new(tx);
        let user = UserId::new(4);
        platform.observe_profile(
            Profile {
                id: user,
                name: String::from("gone"),
                display_name: None,
            },
            true,
        );
        platform.observe_deletion(user);

        assert!(platform.resolve(user).await.unwrap_err().is_not_found());
        assert!(!platform.resolve(UserId::new(5)).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn closed_dms_are_refused_and_open_ones_emitted() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let platform = JournalPlatform::new(tx);
        let shy = UserId::new(6);
        platform.observe_profile(
            Profile {
                id: shy,
                name: String::from("shy"),
                display_name: None,
            },
            false,
        );
        let invite = VoiceInvite::new(UserId::new(1), Some((GuildId::new(2), ChannelId::new(3))));

        assert!(matches!(
            platform.send(shy, &invite).await,
            Err(ExternalError::Forbidden(_))
        ));
        platform.send(UserId::new(7), &invite).await.unwrap();
        assert_eq!(
            rx.recv().await,
            Some(OutboundLine::DirectMessage {
                to: UserId::new(7),
                from: UserId::new(1),
                channel_url: Some(String::from("https://discord.com/channels/2/3")),
            })
        );
    }
}

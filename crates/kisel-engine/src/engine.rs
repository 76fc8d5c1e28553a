//! The journal loop: one inbound event in, zero or more lines out.
//!
//! Observations update the platform adapter (and, for voice updates, the
//! voice reward tracker). Commands go to the core services and always
//! produce exactly one result line. A failed command never stops the loop.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::mpsc::UnboundedSender;

use kisel_core::{
    CustomRoleRequest, FriendDirectory, KiselConfig, Notifier, Payout, PurchaseWorkflow,
    VoiceEvent, VoiceRewards,
};
use kisel_db::{FriendStore, RewardStore};
use kisel_types::{ChannelId, GuildId, NotifyMode, Profile, UserId, VoiceInvite};

use crate::error::EngineError;
use crate::journal::{InboundEvent, OutboundLine};
use crate::platform::JournalPlatform;

/// Every service the journal drives, wired to one platform adapter.
#[derive(Debug)]
pub struct Engine {
    platform: Arc<JournalPlatform>,
    rewards: Arc<RewardStore>,
    directory: FriendDirectory<Arc<JournalPlatform>>,
    notifier: Notifier<Arc<JournalPlatform>, Arc<JournalPlatform>>,
    voice: VoiceRewards,
    purchases: PurchaseWorkflow<Arc<JournalPlatform>>,
    max_name_len: usize,
    leaderboard_size: usize,
    clock: Mutex<Option<DateTime<Utc>>>,
}

impl Engine {
    /// Open the stores named in `config` and wire the services.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] if a document cannot be loaded.
    pub async fn open(
        config: &KiselConfig,
        outbox: UnboundedSender<OutboundLine>,
    ) -> Result<Self, EngineError> {
        let friends = Arc::new(FriendStore::open(config.storage.friends_path()).await?);
        let rewards = Arc::new(
            RewardStore::open(
                config.storage.scores_path(),
                config.storage.purchases_path(),
            )
            .await?,
        );

        for (user, item) in rewards.pending_purchases().await {
            tracing::warn!(
                user = %user,
                item = %item,
                "unreconciled purchase intent from a previous run"
            );
        }

        let platform = Arc::new(JournalPlatform::new(outbox));
        let fan_out = config.notify.max_concurrent_dispatch;
        Ok(Self {
            directory: FriendDirectory::new(Arc::clone(&friends), Arc::clone(&platform), fan_out),
            notifier: Notifier::new(friends, Arc::clone(&platform), Arc::clone(&platform), fan_out),
            voice: VoiceRewards::new(Arc::clone(&rewards), config.rewards.credit_on_switch),
            purchases: PurchaseWorkflow::new(
                Arc::clone(&rewards),
                Arc::clone(&platform),
                config.catalog.clone(),
            ),
            max_name_len: config.catalog.custom_role.max_name_len,
            leaderboard_size: config.rewards.leaderboard_size,
            clock: Mutex::new(None),
            rewards,
            platform,
        })
    }

    /// The platform adapter.
    pub const fn platform(&self) -> &Arc<JournalPlatform> {
        &self.platform
    }

    /// Apply one journal event.
    pub async fn handle(&self, event: InboundEvent) {
        let command = event.name();
        let outcome = match event {
            InboundEvent::Presence {
                user,
                guild,
                status,
                activity,
            } => {
                self.platform.observe_presence(user, guild, status, activity);
                None
            }
            InboundEvent::Profile {
                user,
                name,
                display_name,
                accepts_dms,
            } => {
                let profile = Profile {
                    id: user,
                    name,
                    display_name,
                };
                self.platform.observe_profile(profile, accepts_dms);
                None
            }
            InboundEvent::ProfileDeleted { user } => {
                self.platform.observe_deletion(user);
                None
            }
            InboundEvent::GrantRole { user, role } => {
                self.platform.observe_role(user, role);
                None
            }
            InboundEvent::VoiceState {
                user,
                guild,
                before,
                after,
                at,
            } => {
                let location = guild.zip(after);
                self.voice_state(user, location, before, after, at).await;
                None
            }
            other => Some(self.command(other).await),
        };

        if let Some(result) = outcome {
            let line = match result {
                Ok(data) => OutboundLine::ok(command, data),
                Err(message) => {
                    tracing::info!(command, error = %message, "command rejected");
                    OutboundLine::failed(command, &message)
                }
            };
            self.platform.emit(line);
        }
    }

    /// End every voice session, returning the minutes that were not credited.
    pub fn shutdown(&self) -> Vec<Payout> {
        let now = self.now(None);
        let forfeited = self.voice.shutdown(now);
        for payout in &forfeited {
            tracing::warn!(
                user = %payout.user,
                channel = %payout.channel,
                minutes = payout.minutes,
                "voice session still active at shutdown, minutes forfeited"
            );
        }
        forfeited
    }

    // -------------------------------------------------------------------------
    // Voice
    // -------------------------------------------------------------------------

    async fn voice_state(
        &self,
        user: UserId,
        location: Option<(GuildId, ChannelId)>,
        before: Option<ChannelId>,
        after: Option<ChannelId>,
        at: Option<DateTime<Utc>>,
    ) {
        let now = self.now(at);
        self.platform.observe_voice(user, location);

        let Some(event) = VoiceEvent::from_transition(user, before, after, now) else {
            return;
        };
        if let Err(e) = self.voice.handle(event).await {
            tracing::warn!(user = %user, error = %e, "voice update not applied");
        }
    }

    /// The instant an event happened at.
    ///
    /// A stamped event uses its own time. An unstamped one uses the wall
    /// clock, but never earlier than the latest instant already seen.
    fn now(&self, at: Option<DateTime<Utc>>) -> DateTime<Utc> {
        let mut clock = self.clock.lock().unwrap_or_else(PoisonError::into_inner);
        let now = at.unwrap_or_else(|| {
            let wall = Utc::now();
            clock.map_or(wall, |seen| seen.max(wall))
        });
        if clock.is_none_or(|seen| now > seen) {
            *clock = Some(now);
        }
        now
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    async fn command(&self, event: InboundEvent) -> Result<Option<serde_json::Value>, String> {
        match event {
            InboundEvent::AddFriend { owner, friend } => self
                .directory
                .add(owner, friend)
                .await
                .map(|()| Some(json!({ "owner": owner, "friend": friend })))
                .map_err(|e| e.to_string()),

            InboundEvent::RemoveFriend { owner, friend } => self
                .directory
                .remove(owner, friend)
                .await
                .map(|()| Some(json!({ "owner": owner, "friend": friend })))
                .map_err(|e| e.to_string()),

            InboundEvent::ListFriends { owner } => {
                let entries = self
                    .directory
                    .resolve_friends(owner)
                    .await
                    .map_err(|e| e.to_string())?;
                let friends: Vec<_> = entries
                    .iter()
                    .map(|entry| json!({ "id": entry.id, "label": entry.label() }))
                    .collect();
                Ok(Some(json!({ "owner": owner, "friends": friends })))
            }

            InboundEvent::CallVoice { owner, mode } => self.call_voice(owner, mode).await,

            InboundEvent::WhoIsPlaying { owner } => {
                let roster = self.notifier.who_is_playing(owner).await;
                to_data(&roster)
            }

            InboundEvent::Score { user } => {
                let score = self.rewards.score(user).await;
                Ok(Some(json!({ "user": user, "score": score })))
            }

            InboundEvent::Leaderboard => {
                let top: Vec<_> = self
                    .rewards
                    .leaderboard(self.leaderboard_size)
                    .await
                    .into_iter()
                    .map(|(user, score)| json!({ "user": user, "score": score }))
                    .collect();
                Ok(Some(json!({ "leaderboard": top })))
            }

            InboundEvent::Credit { user, amount } => self
                .rewards
                .credit(user, amount)
                .await
                .map(|balance| Some(json!({ "user": user, "balance": balance })))
                .map_err(|e| e.to_string()),

            InboundEvent::Debit { user, amount } => self
                .rewards
                .debit(user, amount)
                .await
                .map(|debit| {
                    Some(json!({
                        "user": user,
                        "removed": debit.removed,
                        "balance": debit.balance,
                    }))
                })
                .map_err(|e| e.to_string()),

            InboundEvent::BuyPromotion { user } => {
                let receipt = self
                    .purchases
                    .buy_promotion(user)
                    .await
                    .map_err(|e| e.to_string())?;
                to_data(&receipt)
            }

            InboundEvent::BuyCustomRole { user, name, color } => {
                let order = CustomRoleRequest { name, color }
                    .into_order(self.max_name_len, &mut rand::rng())
                    .map_err(|e| e.to_string())?;
                let receipt = self
                    .purchases
                    .buy_custom_role(user, &order)
                    .await
                    .map_err(|e| e.to_string())?;
                to_data(&receipt)
            }

            InboundEvent::Presence { .. }
            | InboundEvent::Profile { .. }
            | InboundEvent::ProfileDeleted { .. }
            | InboundEvent::VoiceState { .. }
            | InboundEvent::GrantRole { .. } => Ok(None),
        }
    }

    async fn call_voice(
        &self,
        owner: UserId,
        mode: NotifyMode,
    ) -> Result<Option<serde_json::Value>, String> {
        let invite = VoiceInvite::new(owner, self.platform.voice_channel(owner));
        let report = self
            .notifier
            .notify(owner, mode, &invite)
            .await
            .map_err(|e| e.to_string())?;
        Ok(Some(json!({
            "sent_count": report.sent_count(),
            "skipped_count": report.skipped_count(),
            "report": report,
        })))
    }
}

fn to_data(value: &impl serde::Serialize) -> Result<Option<serde_json::Value>, String> {
    serde_json::to_value(value)
        .map(Some)
        .map_err(|e| e.to_string())
}

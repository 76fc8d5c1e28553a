//! Voice session tracking and reward payout.
//!
//! Every user is either idle or active in exactly one voice channel. The
//! [`VoiceTracker`] is the synchronous state machine; [`VoiceRewards`] feeds
//! its payouts into the [`RewardStore`].
//!
//! ```text
//!            Enter                    Leave (credit whole minutes)
//!   Idle ------------> Active(c, t) ---------------------------------> Idle
//!                        |    ^
//!                        +----+  Switch(c') -> Active(c', now)
//! ```
//!
//! Points are whole minutes: `floor((now - entered_at) / 60s)`. The
//! fractional remainder is discarded, never carried over. Sessions live only
//! in memory; anything still active at shutdown is forfeited.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

use kisel_db::{RewardError, RewardStore};
use kisel_types::{ChannelId, UserId};

/// Seconds of voice time that earn one point.
pub const SECONDS_PER_POINT: i64 = 60;

/// Errors from voice event handling.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    /// The event does not apply to the user's current state.
    #[error("illegal voice transition for {user}: {event} while {state}")]
    IllegalStateTransition {
        /// The user the event was for.
        user: UserId,
        /// The user's state when the event arrived.
        state: &'static str,
        /// The rejected event.
        event: &'static str,
    },

    /// Crediting the earned points failed.
    #[error(transparent)]
    Reward(#[from] RewardError),
}

/// A voice state change for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceEvent {
    /// The user joined a channel from nowhere.
    Enter {
        /// The user.
        user: UserId,
        /// The channel joined.
        channel: ChannelId,
        /// When it happened.
        at: DateTime<Utc>,
    },
    /// The user left voice entirely.
    Leave {
        /// The user.
        user: UserId,
        /// When it happened.
        at: DateTime<Utc>,
    },
    /// The user moved directly to another channel.
    Switch {
        /// The user.
        user: UserId,
        /// The new channel.
        channel: ChannelId,
        /// When it happened.
        at: DateTime<Utc>,
    },
}

impl VoiceEvent {
    /// Map a raw before/after voice update to an event.
    ///
    /// Returns `None` when the channel did not change (mute, deafen, and
    /// similar updates).
    pub const fn from_transition(
        user: UserId,
        before: Option<ChannelId>,
        after: Option<ChannelId>,
        at: DateTime<Utc>,
    ) -> Option<Self> {
        match (before, after) {
            (None, Some(channel)) => Some(Self::Enter { user, channel, at }),
            (Some(_), None) => Some(Self::Leave { user, at }),
            (Some(old), Some(new)) if old.get() != new.get() => Some(Self::Switch {
                user,
                channel: new,
                at,
            }),
            _ => None,
        }
    }

    /// The user the event concerns.
    pub const fn user(&self) -> UserId {
        match self {
            Self::Enter { user, .. } | Self::Leave { user, .. } | Self::Switch { user, .. } => {
                *user
            }
        }
    }

    const fn name(&self) -> &'static str {
        match self {
            Self::Enter { .. } => "enter",
            Self::Leave { .. } => "leave",
            Self::Switch { .. } => "switch",
        }
    }
}

/// An active voice session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActiveSession {
    /// The channel the user is in.
    pub channel: ChannelId,
    /// When the user entered it (or when the timer last restarted).
    pub entered_at: DateTime<Utc>,
}

impl ActiveSession {
    /// Whole minutes accrued up to `now`.
    pub fn minutes_until(&self, now: DateTime<Utc>) -> u64 {
        elapsed_minutes(self.entered_at, now)
    }
}

/// Points earned by closing (part of) a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Payout {
    /// The user to credit.
    pub user: UserId,
    /// The channel the time was spent in.
    pub channel: ChannelId,
    /// Whole minutes earned; always at least one.
    pub minutes: u64,
}

/// Whole minutes between `from` and `to`. A clock running backwards
/// yields zero.
pub fn elapsed_minutes(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    let seconds = to.signed_duration_since(from).num_seconds();
    u64::try_from(seconds.checked_div(SECONDS_PER_POINT).unwrap_or(0)).unwrap_or(0)
}

/// Per-user voice session state machine.
#[derive(Debug)]
pub struct VoiceTracker {
    sessions: Mutex<HashMap<UserId, ActiveSession>>,
    credit_on_switch: bool,
}

impl VoiceTracker {
    /// Create a tracker. `credit_on_switch` decides whether a channel switch
    /// pays out the minutes spent in the old channel.
    pub fn new(credit_on_switch: bool) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            credit_on_switch,
        }
    }

    /// Apply one event and return the payout it earns, if any.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::IllegalStateTransition`] for an enter while
    /// active, or a leave or switch while idle. State is left unchanged.
    pub fn apply(&self, event: VoiceEvent) -> Result<Option<Payout>, VoiceError> {
        let user = event.user();
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let current = sessions.get(&user).copied();

        match (current, event) {
            (None, VoiceEvent::Enter { channel, at, .. }) => {
                sessions.insert(
                    user,
                    ActiveSession {
                        channel,
                        entered_at: at,
                    },
                );
                tracing::debug!(user = %user, channel = %channel, "voice session started");
                Ok(None)
            }
            (Some(session), VoiceEvent::Leave { at, .. }) => {
                sessions.remove(&user);
                let minutes = session.minutes_until(at);
                tracing::debug!(
                    user = %user,
                    channel = %session.channel,
                    minutes,
                    "voice session ended"
                );
                Ok(payout(user, session.channel, minutes))
            }
            (Some(session), VoiceEvent::Switch { channel, at, .. }) => {
                sessions.insert(
                    user,
                    ActiveSession {
                        channel,
                        entered_at: at,
                    },
                );
                let minutes = session.minutes_until(at);
                tracing::debug!(
                    user = %user,
                    from = %session.channel,
                    to = %channel,
                    minutes,
                    credited = self.credit_on_switch,
                    "voice channel switched"
                );
                if self.credit_on_switch {
                    Ok(payout(user, session.channel, minutes))
                } else {
                    Ok(None)
                }
            }
            (current, event) => {
                let state = if current.is_some() { "active" } else { "idle" };
                tracing::warn!(
                    user = %user,
                    state,
                    event = event.name(),
                    "illegal voice transition"
                );
                Err(VoiceError::IllegalStateTransition {
                    user,
                    state,
                    event: event.name(),
                })
            }
        }
    }

    /// The user's active session, if any.
    pub fn session(&self, user: UserId) -> Option<ActiveSession> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user)
            .copied()
    }

    /// Number of users currently in voice.
    pub fn active_sessions(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Remove and return every active session.
    pub fn drain(&self) -> Vec<(UserId, ActiveSession)> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let mut drained: Vec<_> = sessions.drain().collect();
        drained.sort_by_key(|(user, _)| *user);
        drained
    }
}

const fn payout(user: UserId, channel: ChannelId, minutes: u64) -> Option<Payout> {
    if minutes == 0 {
        None
    } else {
        Some(Payout {
            user,
            channel,
            minutes,
        })
    }
}

/// Voice tracking wired to the reward ledger.
#[derive(Debug)]
pub struct VoiceRewards {
    tracker: VoiceTracker,
    store: Arc<RewardStore>,
}

impl VoiceRewards {
    /// Create the service over a shared reward store.
    pub fn new(store: Arc<RewardStore>, credit_on_switch: bool) -> Self {
        Self {
            tracker: VoiceTracker::new(credit_on_switch),
            store,
        }
    }

    /// The underlying state machine.
    pub const fn tracker(&self) -> &VoiceTracker {
        &self.tracker
    }

    /// Apply `event` and credit any minutes earned.
    ///
    /// # Errors
    ///
    /// [`VoiceError::IllegalStateTransition`] from the tracker, or
    /// [`VoiceError::Reward`] if the credit could not be saved. In the
    /// latter case the session has still ended.
    pub async fn handle(&self, event: VoiceEvent) -> Result<Option<Payout>, VoiceError> {
        let Some(payout) = self.tracker.apply(event)? else {
            return Ok(None);
        };

        match self.store.credit(payout.user, payout.minutes).await {
            Ok(balance) => {
                tracing::info!(
                    user = %payout.user,
                    channel = %payout.channel,
                    minutes = payout.minutes,
                    balance,
                    "voice minutes credited"
                );
                Ok(Some(payout))
            }
            Err(e) => {
                tracing::error!(
                    user = %payout.user,
                    minutes = payout.minutes,
                    error = %e,
                    "failed to credit voice minutes"
                );
                Err(e.into())
            }
        }
    }

    /// End every session without crediting it, returning what was forfeited.
    pub fn shutdown(&self, now: DateTime<Utc>) -> Vec<Payout> {
        self.tracker
            .drain()
            .into_iter()
            .filter_map(|(user, session)| payout(user, session.channel, session.minutes_until(now)))
            .collect()
    }
}

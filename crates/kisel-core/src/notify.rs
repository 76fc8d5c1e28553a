//! Presence-aware invitation fan-out and the who-is-playing view.
//!
//! [`Notifier::notify`] sends a voice invitation to an owner's friends,
//! optionally only to those whose presence says they are reachable. Each
//! delivery is independent: a friend who blocks DMs is logged and counted,
//! and the batch carries on. Nothing is retried.
//!
//! Presence lookups and deliveries run concurrently, bounded by
//! `notify.max_concurrent_dispatch`, and results keep friend-list order.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;

use kisel_db::{FriendError, FriendStore};
use kisel_types::{NotifyMode, UserId, Verdict, VoiceInvite};

use crate::ports::{Dispatcher, ExternalError, PresenceSource};
use crate::presence::{Roster, classify};

/// Errors from the fan-out and directory services.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The owner has no friends to act on.
    #[error("{0} has an empty friend list")]
    EmptyFriendList(UserId),

    /// The friend store failed while pruning.
    #[error(transparent)]
    Friends(#[from] FriendError),
}

/// A delivery that failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchFailure {
    /// The friend who did not receive the invite.
    pub friend: UserId,
    /// Why the platform refused.
    pub reason: String,
}

/// Outcome of one invitation batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotifyReport {
    /// Friends the invite was delivered to.
    pub sent: Vec<UserId>,
    /// Friends skipped because their presence was not reachable.
    pub skipped: Vec<UserId>,
    /// Friends whose delivery failed.
    pub failures: Vec<DispatchFailure>,
}

impl NotifyReport {
    /// Number of successful deliveries.
    pub fn sent_count(&self) -> usize {
        self.sent.len()
    }

    /// Friends who did not get the invite, for any reason.
    pub fn skipped_count(&self) -> usize {
        self.skipped.len().saturating_add(self.failures.len())
    }
}

/// Sends invitations and builds presence rosters.
#[derive(Debug)]
pub struct Notifier<P, D> {
    friends: Arc<FriendStore>,
    presence: P,
    dispatcher: D,
    max_in_flight: usize,
}

impl<P, D> Notifier<P, D>
where
    P: PresenceSource,
    D: Dispatcher,
{
    /// Create the service. `max_in_flight` is clamped to at least one.
    pub fn new(
        friends: Arc<FriendStore>,
        presence: P,
        dispatcher: D,
        max_in_flight: usize,
    ) -> Self {
        Self {
            friends,
            presence,
            dispatcher,
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Send `invite` to `owner`'s friends.
    ///
    /// With [`NotifyMode::OnlineOnly`], friends whose verdict is not
    /// reachable are skipped without a delivery attempt.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::EmptyFriendList`] when there is nobody to
    /// notify. Delivery failures are reported, not returned.
    pub async fn notify(
        &self,
        owner: UserId,
        mode: NotifyMode,
        invite: &VoiceInvite,
    ) -> Result<NotifyReport, NotifyError> {
        let friends = self.friends.list(owner).await;
        if friends.is_empty() {
            return Err(NotifyError::EmptyFriendList(owner));
        }

        let mut report = NotifyReport::default();
        let targets = match mode {
            NotifyMode::All => friends,
            NotifyMode::OnlineOnly => {
                let mut targets = Vec::with_capacity(friends.len());
                for (friend, verdict) in self.classify_all(friends).await {
                    if verdict.is_reachable() {
                        targets.push(friend);
                    } else {
                        report.skipped.push(friend);
                    }
                }
                targets
            }
        };

        let outcomes: Vec<(UserId, Result<(), ExternalError>)> = stream::iter(targets)
            .map(|friend| async move { (friend, self.dispatcher.send(friend, invite).await) })
            .buffered(self.max_in_flight)
            .collect()
            .await;

        for (friend, outcome) in outcomes {
            match outcome {
                Ok(()) => report.sent.push(friend),
                Err(e) => {
                    tracing::warn!(
                        owner = %owner,
                        friend = %friend,
                        error = %e,
                        "invite delivery failed"
                    );
                    report.failures.push(DispatchFailure {
                        friend,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            owner = %owner,
            ?mode,
            sent = report.sent_count(),
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            "voice invite fan-out finished"
        );
        Ok(report)
    }

    /// Group `owner`'s friends by what they are doing right now.
    ///
    /// Read-only; an empty friend list yields an empty roster.
    pub async fn who_is_playing(&self, owner: UserId) -> Roster {
        let friends = self.friends.list(owner).await;
        let mut roster = Roster::default();
        for (friend, verdict) in self.classify_all(friends).await {
            roster.push(friend, verdict);
        }
        roster
    }

    async fn classify_all(&self, friends: Vec<UserId>) -> Vec<(UserId, Verdict)> {
        stream::iter(friends)
            .map(|friend| async move {
                let snapshots = self.presence.presence_of(friend).await;
                (friend, classify(&snapshots))
            })
            .buffered(self.max_in_flight)
            .collect()
            .await
    }
}

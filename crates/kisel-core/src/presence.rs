//! Presence classification.
//!
//! A friend may share several communities with the bot and show a
//! different presence in each. [`classify`] folds those snapshots into one
//! [`Verdict`]: activity evidence from any community beats a plain status,
//! and any connected status beats offline.

use std::collections::BTreeMap;

use serde::Serialize;

use kisel_types::{PresenceSnapshot, UserId, Verdict};

/// Fold a friend's per-community snapshots into a single verdict.
///
/// - No snapshots at all: [`Verdict::Unreachable`].
/// - Any snapshot playing or streaming a game: [`Verdict::Playing`], taken
///   from the first such snapshot.
/// - Otherwise any connected status: [`Verdict::Online`].
/// - Otherwise: [`Verdict::Offline`].
pub fn classify(snapshots: &[PresenceSnapshot]) -> Verdict {
    if snapshots.is_empty() {
        return Verdict::Unreachable;
    }

    let game = snapshots
        .iter()
        .filter_map(|s| s.activity.as_ref())
        .find(|a| a.kind.is_game());
    if let Some(activity) = game {
        return Verdict::Playing {
            game: activity.name.clone(),
            detail: activity.detail.clone(),
        };
    }

    if snapshots.iter().any(|s| s.status.is_connected()) {
        Verdict::Online
    } else {
        Verdict::Offline
    }
}

/// Friends grouped by what they are doing right now.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Roster {
    /// Game name to the friends playing it, in friend-list order.
    pub playing: BTreeMap<String, Vec<UserId>>,
    /// Connected friends with no game activity.
    pub online: Vec<UserId>,
    /// Offline or unreachable friends.
    pub offline: Vec<UserId>,
}

impl Roster {
    /// Place `friend` in the bucket for `verdict`.
    pub fn push(&mut self, friend: UserId, verdict: Verdict) {
        match verdict {
            Verdict::Playing { game, .. } => self.playing.entry(game).or_default().push(friend),
            Verdict::Online => self.online.push(friend),
            Verdict::Offline | Verdict::Unreachable => self.offline.push(friend),
        }
    }

    /// Number of friends currently playing anything.
    pub fn playing_count(&self) -> usize {
        self.playing.values().map(Vec::len).sum()
    }

    /// Whether the roster holds nobody.
    pub fn is_empty(&self) -> bool {
        self.playing.is_empty() && self.online.is_empty() && self.offline.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use kisel_types::{Activity, ActivityKind, GuildId, PresenceStatus};

    use super::*;

    fn snap(status: PresenceStatus, activity: Option<(ActivityKind, &str)>) -> PresenceSnapshot {
        PresenceSnapshot {
            guild: GuildId::new(1),
            status,
            activity: activity.map(|(kind, name)| Activity {
                kind,
                name: name.to_owned(),
                detail: None,
            }),
        }
    }

    #[test]
    fn no_shared_community_is_unreachable() {
        assert_eq!(classify(&[]), Verdict::Unreachable);
    }

    #[test]
    fn activity_anywhere_beats_offline_elsewhere() {
        let snapshots = [
            snap(PresenceStatus::Online, Some((ActivityKind::Playing, "Chess"))),
            snap(PresenceStatus::Offline, None),
        ];
        assert_eq!(
            classify(&snapshots),
            Verdict::Playing {
                game: String::from("Chess"),
                detail: None
            }
        );
    }

    #[test]
    fn order_does_not_hide_activity() {
        let snapshots = [
            snap(PresenceStatus::Offline, None),
            snap(PresenceStatus::Dnd, Some((ActivityKind::Streaming, "Factorio"))),
        ];
        assert!(matches!(
            classify(&snapshots),
            Verdict::Playing { game, .. } if game == "Factorio"
        ));
    }

    #[test]
    fn first_game_wins() {
        let snapshots = [
            snap(PresenceStatus::Online, Some((ActivityKind::Playing, "Dota 2"))),
            snap(PresenceStatus::Online, Some((ActivityKind::Playing, "Chess"))),
        ];
        assert!(matches!(classify(&snapshots), Verdict::Playing { game, .. } if game == "Dota 2"));
    }

    #[test]
    fn non_game_activity_is_just_online() {
        let snapshots = [snap(
            PresenceStatus::Idle,
            Some((ActivityKind::Listening, "Spotify")),
        )];
        assert_eq!(classify(&snapshots), Verdict::Online);
    }

    #[test]
    fn all_offline_is_offline() {
        let snapshots = [
            snap(PresenceStatus::Offline, None),
            snap(PresenceStatus::Offline, None),
        ];
        assert_eq!(classify(&snapshots), Verdict::Offline);
    }

    #[test]
    fn roster_buckets() {
        let mut roster = Roster::default();
        roster.push(UserId::new(1), Verdict::Playing {
            game: String::from("Chess"),
            detail: None,
        });
        roster.push(UserId::new(2), Verdict::Online);
        roster.push(UserId::new(3), Verdict::Unreachable);
        roster.push(UserId::new(4), Verdict::Playing {
            game: String::from("Chess"),
            detail: Some(String::from("Blitz")),
        });
        roster.push(UserId::new(5), Verdict::Offline);

        assert_eq!(
            roster.playing.get("Chess"),
            Some(&vec![UserId::new(1), UserId::new(4)])
        );
        assert_eq!(roster.online, vec![UserId::new(2)]);
        assert_eq!(roster.offline, vec![UserId::new(3), UserId::new(5)]);
        assert_eq!(roster.playing_count(), 2);
    }
}

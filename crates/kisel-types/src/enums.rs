//! Enumeration types shared across the workspace.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Purchases
// ---------------------------------------------------------------------------

/// A one-time catalog item a user can redeem with reward points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseType {
    /// Exchange of the user's current tier role for the next tier.
    Promotion,
    /// A freshly created role with a user-chosen name and colour.
    CustomRole,
}

impl PurchaseType {
    /// All catalog items, in display order.
    pub const ALL: [Self; 2] = [Self::Promotion, Self::CustomRole];

    /// Stable identifier used in logs and persisted documents.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Promotion => "PROMOTION",
            Self::CustomRole => "CUSTOM_ROLE",
        }
    }
}

impl core::fmt::Display for PurchaseType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a purchase registry entry.
///
/// `Pending` is written before the external grant is attempted; `Purchased`
/// is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseState {
    /// The external action is in flight or its outcome was never committed.
    Pending,
    /// The item has been granted and paid for.
    Purchased,
}

// ---------------------------------------------------------------------------
// Presence
// ---------------------------------------------------------------------------

/// Status tag a user shows in one community.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    /// Online and active.
    Online,
    /// Online but away.
    Idle,
    /// Do not disturb.
    Dnd,
    /// Broadcasting a stream.
    Streaming,
    /// Offline or invisible.
    Offline,
}

impl PresenceStatus {
    /// Whether this status means the user is connected at all.
    pub const fn is_connected(self) -> bool {
        !matches!(self, Self::Offline)
    }
}

/// What kind of activity a presence reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// Playing a game.
    Playing,
    /// Streaming a game or other content.
    Streaming,
    /// Listening to audio.
    Listening,
    /// Watching video.
    Watching,
    /// Competing in something.
    Competing,
    /// Free-form custom status.
    Custom,
}

impl ActivityKind {
    /// Whether this activity counts as "playing" for the who-is-playing view.
    pub const fn is_game(self) -> bool {
        matches!(self, Self::Playing | Self::Streaming)
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Which friends a voice invitation is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyMode {
    /// Every friend on the list.
    #[default]
    All,
    /// Only friends whose presence is reachable.
    OnlineOnly,
}

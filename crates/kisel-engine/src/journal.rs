//! Wire format of the engine's input and output.
//!
//! Input is newline-delimited JSON, one [`InboundEvent`] per line, tagged by
//! `"type"`. Output is newline-delimited JSON too: platform actions the
//! engine performed ([`OutboundLine::DirectMessage`] and the role lines) and
//! one [`OutboundLine::Result`] per command.
//!
//! ```text
//! {"type":"presence","user":"7","guild":"1","status":"online"}
//! {"type":"add_friend","owner":"5","friend":"7"}
//! {"type":"call_voice","owner":"5","mode":"online_only"}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kisel_types::{Activity, ChannelId, GuildId, NotifyMode, PresenceStatus, RoleId, UserId};

use crate::error::EngineError;

const fn default_true() -> bool {
    true
}

/// One line of the input journal.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    // -- Platform observations ------------------------------------------------
    /// A user's presence in one community changed.
    Presence {
        /// The user.
        user: UserId,
        /// The community.
        guild: GuildId,
        /// New status.
        status: PresenceStatus,
        /// New activity, if any.
        #[serde(default)]
        activity: Option<Activity>,
    },

    /// A user's profile became known or changed.
    Profile {
        /// The user.
        user: UserId,
        /// Account name.
        name: String,
        /// Display name, if set.
        #[serde(default)]
        display_name: Option<String>,
        /// Whether the user accepts direct messages from the bot.
        #[serde(default = "default_true")]
        accepts_dms: bool,
    },

    /// A user deleted their account.
    ProfileDeleted {
        /// The user.
        user: UserId,
    },

    /// A user's voice connection changed.
    VoiceState {
        /// The user.
        user: UserId,
        /// Community of the channel after the change.
        #[serde(default)]
        guild: Option<GuildId>,
        /// Channel before the change.
        #[serde(default)]
        before: Option<ChannelId>,
        /// Channel after the change.
        #[serde(default)]
        after: Option<ChannelId>,
        /// When the change happened; the engine clock when absent.
        #[serde(default)]
        at: Option<DateTime<Utc>>,
    },

    /// An administrator gave a user a role.
    GrantRole {
        /// The user.
        user: UserId,
        /// The role.
        role: RoleId,
    },

    // -- Commands -------------------------------------------------------------
    /// Add a friend.
    AddFriend {
        /// List owner.
        owner: UserId,
        /// The new friend.
        friend: UserId,
    },

    /// Remove a friend.
    RemoveFriend {
        /// List owner.
        owner: UserId,
        /// The friend to remove.
        friend: UserId,
    },

    /// Show a friend list with resolved names.
    ListFriends {
        /// List owner.
        owner: UserId,
    },

    /// Invite friends to the owner's voice channel.
    CallVoice {
        /// The caller.
        owner: UserId,
        /// Who to invite.
        #[serde(default)]
        mode: NotifyMode,
    },

    /// Show what the owner's friends are doing.
    WhoIsPlaying {
        /// List owner.
        owner: UserId,
    },

    /// Show a balance.
    Score {
        /// The user.
        user: UserId,
    },

    /// Show the top balances.
    Leaderboard,

    /// Grant points by hand.
    Credit {
        /// The user.
        user: UserId,
        /// Points to add.
        amount: u64,
    },

    /// Remove points by hand.
    Debit {
        /// The user.
        user: UserId,
        /// Points to remove.
        amount: u64,
    },

    /// Buy the tier promotion.
    BuyPromotion {
        /// The buyer.
        user: UserId,
    },

    /// Buy a custom role.
    BuyCustomRole {
        /// The buyer.
        user: UserId,
        /// Role name.
        name: String,
        /// Optional `#RRGGBB` colour.
        #[serde(default)]
        color: Option<String>,
    },
}

impl InboundEvent {
    /// Parse one journal line.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Journal`] with the line number when the line
    /// is not a known event.
    pub fn parse(line_no: usize, line: &str) -> Result<Self, EngineError> {
        serde_json::from_str(line).map_err(|source| EngineError::Journal {
            line: line_no,
            source,
        })
    }

    /// Name used for this event in result lines.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Presence { .. } => "presence",
            Self::Profile { .. } => "profile",
            Self::ProfileDeleted { .. } => "profile_deleted",
            Self::VoiceState { .. } => "voice_state",
            Self::GrantRole { .. } => "grant_role",
            Self::AddFriend { .. } => "add_friend",
            Self::RemoveFriend { .. } => "remove_friend",
            Self::ListFriends { .. } => "list_friends",
            Self::CallVoice { .. } => "call_voice",
            Self::WhoIsPlaying { .. } => "who_is_playing",
            Self::Score { .. } => "score",
            Self::Leaderboard => "leaderboard",
            Self::Credit { .. } => "credit",
            Self::Debit { .. } => "debit",
            Self::BuyPromotion { .. } => "buy_promotion",
            Self::BuyCustomRole { .. } => "buy_custom_role",
        }
    }
}

/// One line of engine output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundLine {
    /// A voice invitation was delivered.
    DirectMessage {
        /// Recipient.
        to: UserId,
        /// The caller.
        from: UserId,
        /// Link to the caller's channel.
        #[serde(skip_serializing_if = "Option::is_none")]
        channel_url: Option<String>,
    },

    /// A user's role was swapped.
    RoleExchanged {
        /// The user.
        user: UserId,
        /// Role removed.
        from: RoleId,
        /// Role added.
        to: RoleId,
    },

    /// A new role was created.
    RoleCreated {
        /// The new role.
        role: RoleId,
        /// Its name.
        name: String,
        /// Its colour as `#RRGGBB`.
        color: String,
    },

    /// A role was given to a user.
    RoleGranted {
        /// The user.
        user: UserId,
        /// The role.
        role: RoleId,
    },

    /// Outcome of a command.
    Result {
        /// The command name.
        command: &'static str,
        /// Whether it succeeded.
        ok: bool,
        /// Command-specific payload.
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
        /// Error message on failure.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl OutboundLine {
    /// A successful command result.
    pub const fn ok(command: &'static str, data: Option<serde_json::Value>) -> Self {
        Self::Result {
            command,
            ok: true,
            data,
            error: None,
        }
    }

    /// A failed command result.
    pub fn failed(command: &'static str, error: &impl std::fmt::Display) -> Self {
        Self::Result {
            command,
            ok: false,
            data: None,
            error: Some(error.to_string()),
        }
    }
}

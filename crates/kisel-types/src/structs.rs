//! Core structs shared by the stores, the core services, and the engine.

use serde::{Deserialize, Serialize};

use crate::enums::{ActivityKind, PresenceStatus};
use crate::ids::{ChannelId, GuildId, UserId};

// ---------------------------------------------------------------------------
// Presence
// ---------------------------------------------------------------------------

/// The activity a user reports in one community.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// What the user is doing.
    pub kind: ActivityKind,
    /// Name of the game or content.
    pub name: String,
    /// Optional extra detail (map, mode, track).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A user's presence as seen from one shared community.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceSnapshot {
    /// The community this snapshot was observed in.
    pub guild: GuildId,
    /// Status tag in that community.
    pub status: PresenceStatus,
    /// Current activity, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<Activity>,
}

/// Classified reachability and activity of a friend at query time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// Playing or streaming a game.
    Playing {
        /// Game name.
        game: String,
        /// Optional detail reported with the activity.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    /// Connected with no game activity.
    Online,
    /// Visible in a shared community but offline everywhere.
    Offline,
    /// Not visible in any shared community.
    Unreachable,
}

impl Verdict {
    /// Whether a presence-filtered notification should reach this friend.
    pub const fn is_reachable(&self) -> bool {
        matches!(self, Self::Playing { .. } | Self::Online)
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Public profile of an account as returned by the identity resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Account id.
    pub id: UserId,
    /// Unique account name.
    pub name: String,
    /// Optional display name shown instead of the account name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Profile {
    /// The label to render for this account.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

// ---------------------------------------------------------------------------
// Invitations
// ---------------------------------------------------------------------------

/// Payload of a voice-channel invitation sent to a friend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceInvite {
    /// The user who is calling their friends.
    pub from: UserId,
    /// The community and voice channel the caller is in, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<(GuildId, ChannelId)>,
}

impl VoiceInvite {
    /// Build an invite from a caller who may or may not be in voice.
    pub const fn new(from: UserId, channel: Option<(GuildId, ChannelId)>) -> Self {
        Self { from, channel }
    }

    /// Deep link that drops the recipient into the caller's channel.
    pub fn channel_url(&self) -> Option<String> {
        self.channel
            .map(|(guild, channel)| format!("https://discord.com/channels/{guild}/{channel}"))
    }
}

// ---------------------------------------------------------------------------
// Role colour
// ---------------------------------------------------------------------------

/// A 24-bit RGB role colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct RoleColor(u32);

/// A packed value wider than 24 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("colour value {0:#X} does not fit in 24 bits")]
pub struct ColorOutOfRange(pub u32);

impl RoleColor {
    /// Largest representable colour (`#FFFFFF`).
    pub const MAX: u32 = 0x00FF_FFFF;

    /// Build a colour from a packed RGB value, rejecting anything above 24 bits.
    pub const fn from_rgb(rgb: u32) -> Option<Self> {
        if rgb > Self::MAX { None } else { Some(Self(rgb)) }
    }

    /// Build a colour from the low 24 bits of `raw`, discarding the rest.
    pub const fn from_low_bits(raw: u32) -> Self {
        Self(raw & Self::MAX)
    }

    /// Parse exactly `#` followed by six hex digits.
    pub fn parse_hex(input: &str) -> Option<Self> {
        let digits = input.trim().strip_prefix('#')?;
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u32::from_str_radix(digits, 16).ok().and_then(Self::from_rgb)
    }

    /// The packed RGB value.
    pub const fn rgb(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for RoleColor {
    type Error = ColorOutOfRange;

    fn try_from(rgb: u32) -> Result<Self, Self::Error> {
        Self::from_rgb(rgb).ok_or(ColorOutOfRange(rgb))
    }
}

impl From<RoleColor> for u32 {
    fn from(color: RoleColor) -> Self {
        color.0
    }
}

impl core::fmt::Display for RoleColor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{:06X}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn channel_url_only_when_in_voice() {
        let caller = UserId::new(1);
        let idle = VoiceInvite::new(caller, None);
        let in_voice = VoiceInvite::new(caller, Some((GuildId::new(10), ChannelId::new(20))));

        assert_eq!(idle.channel_url(), None);
        assert_eq!(
            in_voice.channel_url().as_deref(),
            Some("https://discord.com/channels/10/20")
        );
    }

    #[test]
    fn parses_well_formed_hex() {
        assert_eq!(RoleColor::parse_hex("#1a2B3c").map(RoleColor::rgb), Some(0x001A_2B3C));
        assert_eq!(RoleColor::parse_hex("#FFFFFF").map(RoleColor::rgb), Some(RoleColor::MAX));
    }

    #[test]
    fn rejects_malformed_hex() {
        for bad in ["#12G456", "123456", "#12345", "#1234567", "", "#", "#+12345"] {
            assert_eq!(RoleColor::parse_hex(bad), None, "{bad} should not parse");
        }
    }

    #[test]
    fn deserialized_color_keeps_24_bit_limit() {
        let ok: RoleColor = serde_json::from_str("16777215").unwrap();
        assert_eq!(ok.rgb(), RoleColor::MAX);
        assert_eq!(serde_json::to_string(&ok).unwrap(), "16777215");
        assert!(serde_json::from_str::<RoleColor>("16777216").is_err());
    }

    #[test]
    fn color_display_is_upper_hex() {
        assert_eq!(RoleColor::from_low_bits(0xFF00_0A0B).to_string(), "#000A0B");
    }

    #[test]
    fn profile_label_prefers_display_name() {
        let mut profile = Profile {
            id: UserId::new(5),
            name: String::from("kisel"),
            display_name: None,
        };
        assert_eq!(profile.label(), "kisel");
        profile.display_name = Some(String::from("Kisel"));
        assert_eq!(profile.label(), "Kisel");
    }

    #[test]
    fn reachability() {
        assert!(Verdict::Online.is_reachable());
        assert!(
            Verdict::Playing {
                game: String::from("Chess"),
                detail: None
            }
            .is_reachable()
        );
        assert!(!Verdict::Offline.is_reachable());
        assert!(!Verdict::Unreachable.is_reachable());
    }
}

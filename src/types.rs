//! Typed representations of the Discord API objects the core reads.
//!
//! Only the fields the reconcilers and typed resources consume are modelled;
//! everything else stays `serde_json::Value` and passes through untouched.

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Primitives
// ---------------------------------------------------------------------------

/// Discord IDs are snowflakes transmitted as strings in JSON.
pub type Snowflake = String;

// ---------------------------------------------------------------------------
// Channel types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize_repr, Serialize_repr)]
#[repr(u8)]
pub enum ChannelType {
    Text = 0,
    Voice = 2,
    Category = 4,
    News = 5,
    Store = 6,
    AnnouncementThread = 10,
    PublicThread = 11,
    PrivateThread = 12,
    Stage = 13,
    Forum = 15,
    Media = 16,
}

const CHANNEL_TYPES: &[(ChannelType, &str)] = &[
    (ChannelType::Text, "text"),
    (ChannelType::Voice, "voice"),
    (ChannelType::Category, "category"),
    (ChannelType::News, "news"),
    (ChannelType::Store, "store"),
    (ChannelType::AnnouncementThread, "announcement_thread"),
    (ChannelType::PublicThread, "public_thread"),
    (ChannelType::PrivateThread, "private_thread"),
    (ChannelType::Stage, "stage"),
    (ChannelType::Forum, "forum"),
    (ChannelType::Media, "media"),
];

impl ChannelType {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        CHANNEL_TYPES
            .iter()
            .find(|(kind, _)| *kind == self)
            .map(|(_, name)| *name)
            .unwrap_or("text")
    }

    pub fn from_code(code: u8) -> Option<Self> {
        CHANNEL_TYPES
            .iter()
            .find(|(kind, _)| kind.code() == code)
            .map(|(kind, _)| *kind)
    }

    pub fn from_name(name: &str) -> Result<Self> {
        CHANNEL_TYPES
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(kind, _)| *kind)
            .ok_or_else(|| Error::InvalidChannelType(name.to_string()))
    }

    /// Textual kind for a remote code; unknown codes become their decimal form.
    pub fn name_for_code(code: u64) -> String {
        u8::try_from(code)
            .ok()
            .and_then(Self::from_code)
            .map(|kind| kind.name().to_string())
            .unwrap_or_else(|| code.to_string())
    }
}

// ---------------------------------------------------------------------------
// Permission overwrites
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize_repr, Serialize_repr)]
#[repr(u8)]
pub enum OverwriteType {
    Role = 0,
    Member = 1,
}

impl OverwriteType {
    pub fn name(self) -> &'static str {
        match self {
            OverwriteType::Role => "role",
            OverwriteType::Member => "user",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "role" => Ok(OverwriteType::Role),
            "user" | "member" => Ok(OverwriteType::Member),
            other => Err(Error::InvalidOverwriteType(other.to_string())),
        }
    }
}

/// An overwrite as Discord sends it: bitsets are decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PermissionOverwrite {
    pub id: Snowflake,
    #[serde(rename = "type")]
    pub kind: OverwriteType,
    #[serde(default)]
    pub allow: String,
    #[serde(default)]
    pub deny: String,
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Channel {
    pub id: Snowflake,
    /// Raw type code; see [`ChannelType::name_for_code`].
    #[serde(rename = "type")]
    pub kind: u64,
    pub guild_id: Option<Snowflake>,
    pub name: Option<String>,
    pub topic: Option<String>,
    pub position: Option<i64>,
    pub parent_id: Option<Snowflake>,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub permission_overwrites: Vec<PermissionOverwrite>,
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Role {
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub color: u32,
    #[serde(default)]
    pub hoist: bool,
    #[serde(default)]
    pub mentionable: bool,
    #[serde(default)]
    pub managed: bool,
    pub position: i64,
    #[serde(default)]
    pub permissions: String,
}

// ---------------------------------------------------------------------------
// Member
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct User {
    pub id: Snowflake,
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GuildMember {
    pub user: Option<User>,
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
}

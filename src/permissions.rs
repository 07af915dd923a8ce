//! 64-bit permission bitsets.
//!
//! Discord transmits permissions as decimal strings because the values no
//! longer fit a 32-bit (and soon a signed 64-bit) integer. Resources expose
//! two fields: a legacy native integer and the canonical 64-bit string.

use bitflags::bitflags;

use crate::error::{Error, Result};

bitflags! {
    /// Named permission bits, as listed in Discord's documentation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u64 {
        const CREATE_INSTANT_INVITE = 1 << 0;
        const KICK_MEMBERS = 1 << 1;
        const BAN_MEMBERS = 1 << 2;
        const ADMINISTRATOR = 1 << 3;
        const MANAGE_CHANNELS = 1 << 4;
        const MANAGE_GUILD = 1 << 5;
        const ADD_REACTIONS = 1 << 6;
        const VIEW_AUDIT_LOG = 1 << 7;
        const PRIORITY_SPEAKER = 1 << 8;
        const STREAM = 1 << 9;
        const VIEW_CHANNEL = 1 << 10;
        const SEND_MESSAGES = 1 << 11;
        const SEND_TTS_MESSAGES = 1 << 12;
        const MANAGE_MESSAGES = 1 << 13;
        const EMBED_LINKS = 1 << 14;
        const ATTACH_FILES = 1 << 15;
        const READ_MESSAGE_HISTORY = 1 << 16;
        const MENTION_EVERYONE = 1 << 17;
        const USE_EXTERNAL_EMOJIS = 1 << 18;
        const VIEW_GUILD_INSIGHTS = 1 << 19;
        const CONNECT = 1 << 20;
        const SPEAK = 1 << 21;
        const MUTE_MEMBERS = 1 << 22;
        const DEAFEN_MEMBERS = 1 << 23;
        const MOVE_MEMBERS = 1 << 24;
        const USE_VAD = 1 << 25;
        const CHANGE_NICKNAME = 1 << 26;
        const MANAGE_NICKNAMES = 1 << 27;
        const MANAGE_ROLES = 1 << 28;
        const MANAGE_WEBHOOKS = 1 << 29;
        const MANAGE_GUILD_EXPRESSIONS = 1 << 30;
        const USE_APPLICATION_COMMANDS = 1 << 31;
        const REQUEST_TO_SPEAK = 1 << 32;
        const MANAGE_EVENTS = 1 << 33;
        const MANAGE_THREADS = 1 << 34;
        const CREATE_PUBLIC_THREADS = 1 << 35;
        const CREATE_PRIVATE_THREADS = 1 << 36;
        const USE_EXTERNAL_STICKERS = 1 << 37;
        const SEND_MESSAGES_IN_THREADS = 1 << 38;
        const USE_EMBEDDED_ACTIVITIES = 1 << 39;
        const MODERATE_MEMBERS = 1 << 40;
        const VIEW_CREATOR_MONETIZATION_ANALYTICS = 1 << 41;
        const USE_SOUNDBOARD = 1 << 42;
        const CREATE_GUILD_EXPRESSIONS = 1 << 43;
        const CREATE_EVENTS = 1 << 44;
        const USE_EXTERNAL_SOUNDS = 1 << 45;
        const SEND_VOICE_MESSAGES = 1 << 46;
        const SEND_POLLS = 1 << 49;
        const USE_EXTERNAL_APPS = 1 << 50;
    }
}

impl Permissions {
    /// Resolve a permission name such as `send_messages` (any case).
    pub fn from_permission_name(name: &str) -> Result<Self> {
        Self::from_name(&name.trim().to_ascii_uppercase())
            .ok_or_else(|| Error::InvalidPermission(name.to_string()))
    }
}

/// Largest value the host's native integer field can hold.
pub const NATIVE_INT_MAX: u64 = isize::MAX as u64;

/// Parse a decimal or `0x`-prefixed hex bitset.
pub fn parse_permissions(input: &str) -> Result<u64> {
    let trimmed = input.trim();
    let invalid = || Error::InvalidPermission(input.to_string());
    let (digits, radix) = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => (hex, 16),
        None => (trimmed, 10),
    };
    // `from_str_radix` accepts a leading '+'; a bitset never has a sign.
    if digits.starts_with('+') {
        return Err(invalid());
    }
    u64::from_str_radix(digits, radix).map_err(|_| invalid())
}

/// Canonical decimal rendering.
pub fn format_permissions(bits: u64) -> String {
    bits.to_string()
}

pub fn fits_native_int(bits: u64) -> bool {
    bits <= NATIVE_INT_MAX
}

/// Value for the legacy integer field: the bits themselves, or 0 on overflow.
pub fn native_int_field(bits: u64) -> i64 {
    if fits_native_int(bits) {
        bits as i64
    } else {
        0
    }
}

//! Export settings and their validation.
//!
//! Settings are immutable once an export starts; the orchestrator keeps its
//! own copy taken at `start_export`.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{BitAnd, BitOr};
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{AppError, Result};
use super::models::{DialogType, InputPeer, TimeId};

/// Largest accepted per-file size cutoff (2 GiB).
pub const MAX_SIZE_LIMIT: i64 = 2 * 1024 * 1024 * 1024;

/// Default per-file size cutoff (8 MiB).
pub const DEFAULT_SIZE_LIMIT: i64 = 8 * 1024 * 1024;

macro_rules! flag_set {
    ($name:ident { $($flag:ident = $bit:expr => $label:literal),* $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            $(pub const $flag: Self = Self($bit);)*

            const LABELS: &'static [(Self, &'static str)] = &[$((Self::$flag, $label)),*];

            /// Every defined flag.
            pub const ALL: Self = Self(0 $(| $bit)*);

            #[must_use]
            pub const fn empty() -> Self {
                Self(0)
            }

            #[must_use]
            pub const fn from_bits_retain(bits: u32) -> Self {
                Self(bits)
            }

            #[must_use]
            pub const fn bits(self) -> u32 {
                self.0
            }

            #[must_use]
            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            /// All bits of `other` are set.
            #[must_use]
            pub const fn contains(self, other: Self) -> bool {
                (self.0 & other.0) == other.0
            }

            /// At least one bit of `other` is set.
            #[must_use]
            pub const fn intersects(self, other: Self) -> bool {
                (self.0 & other.0) != 0
            }

            /// Only defined flags are set.
            #[must_use]
            pub const fn is_known(self) -> bool {
                (self.0 & !Self::ALL.0) == 0
            }

            /// Labels of the set flags, in definition order.
            #[must_use]
            pub fn labels(self) -> Vec<&'static str> {
                Self::LABELS
                    .iter()
                    .filter(|(flag, _)| self.contains(*flag))
                    .map(|(_, label)| *label)
                    .collect()
            }
        }

        impl BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl BitAnd for $name {
            type Output = Self;
            fn bitand(self, rhs: Self) -> Self {
                Self(self.0 & rhs.0)
            }
        }
    };
}

flag_set!(Types {
    PERSONAL_INFO = 0x001 => "personal_info",
    USERPICS = 0x002 => "userpics",
    CONTACTS = 0x004 => "contacts",
    SESSIONS = 0x008 => "sessions",
    OTHER_DATA = 0x010 => "other_data",
    PERSONAL_CHATS = 0x020 => "personal_chats",
    BOT_CHATS = 0x040 => "bot_chats",
    PRIVATE_GROUPS = 0x080 => "private_groups",
    PUBLIC_GROUPS = 0x100 => "public_groups",
    PRIVATE_CHANNELS = 0x200 => "private_channels",
    PUBLIC_CHANNELS = 0x400 => "public_channels",
});

impl Types {
    pub const GROUPS: Self = Self(Self::PRIVATE_GROUPS.0 | Self::PUBLIC_GROUPS.0);
    pub const CHANNELS: Self = Self(Self::PRIVATE_CHANNELS.0 | Self::PUBLIC_CHANNELS.0);
    pub const GROUPS_CHANNELS: Self = Self(Self::GROUPS.0 | Self::CHANNELS.0);
    pub const NON_CHANNEL_CHATS: Self =
        Self(Self::PERSONAL_CHATS.0 | Self::BOT_CHATS.0 | Self::PRIVATE_GROUPS.0);
    pub const ANY_CHATS: Self = Self(Self::NON_CHANNEL_CHATS.0 | Self::PUBLIC_GROUPS.0 | Self::CHANNELS.0);

    /// The flag that selects dialogs of the given type.
    #[must_use]
    pub const fn for_dialog(dialog_type: DialogType) -> Self {
        match dialog_type {
            DialogType::Unknown => Self::empty(),
            DialogType::SavedMessages
            | DialogType::Replies
            | DialogType::VerifyCodes
            | DialogType::Personal => Self::PERSONAL_CHATS,
            DialogType::Bot => Self::BOT_CHATS,
            DialogType::PrivateGroup | DialogType::PrivateSupergroup => Self::PRIVATE_GROUPS,
            DialogType::PublicSupergroup => Self::PUBLIC_GROUPS,
            DialogType::PrivateChannel => Self::PRIVATE_CHANNELS,
            DialogType::PublicChannel => Self::PUBLIC_CHANNELS,
        }
    }
}

flag_set!(MediaTypes {
    PHOTO = 0x01 => "photo",
    VIDEO = 0x02 => "video",
    VOICE_MESSAGE = 0x04 => "voice_message",
    VIDEO_MESSAGE = 0x08 => "video_message",
    STICKER = 0x10 => "sticker",
    GIF = 0x20 => "gif",
    FILE = 0x40 => "file",
});

/// Media classification used by the type filter and per-type size cutoffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Photo,
    Video,
    VoiceMessage,
    VideoMessage,
    Sticker,
    Gif,
    File,
}

impl MediaType {
    #[must_use]
    pub const fn flag(self) -> MediaTypes {
        match self {
            Self::Photo => MediaTypes::PHOTO,
            Self::Video => MediaTypes::VIDEO,
            Self::VoiceMessage => MediaTypes::VOICE_MESSAGE,
            Self::VideoMessage => MediaTypes::VIDEO_MESSAGE,
            Self::Sticker => MediaTypes::STICKER,
            Self::Gif => MediaTypes::GIF,
            Self::File => MediaTypes::FILE,
        }
    }
}

/// Which media are downloaded and how large they may be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSettings {
    #[serde(default = "default_media_types")]
    pub types: MediaTypes,

    /// Cutoff in bytes applied when no per-type cutoff is set.
    #[serde(default = "default_size_limit")]
    pub size_limit: i64,

    /// Independent cutoffs for individual media types.
    #[serde(default)]
    pub type_limits: BTreeMap<MediaType, i64>,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            types: default_media_types(),
            size_limit: default_size_limit(),
            type_limits: BTreeMap::new(),
        }
    }
}

impl MediaSettings {
    /// Effective cutoff for a media type (the global one for untyped files).
    #[must_use]
    pub fn limit_for(&self, media_type: Option<MediaType>) -> i64 {
        media_type
            .and_then(|t| self.type_limits.get(&t).copied())
            .unwrap_or(self.size_limit)
    }
}

const fn default_media_types() -> MediaTypes {
    MediaTypes::PHOTO
}

const fn default_size_limit() -> i64 {
    DEFAULT_SIZE_LIMIT
}

/// Output serializer selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
    #[default]
    Html,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "html" => Ok(Self::Html),
            _ => Err(format!("Unknown format: {s}. Use: text, json, html")),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Json => "json",
            Self::Html => "html",
        })
    }
}

/// Page traversal direction inside one split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageOrder {
    /// Descending ids; each page's oldest id bounds the next page.
    #[default]
    NewestFirst,
    /// Ascending ids, producing chronological chat files.
    OldestFirst,
}

/// Everything the export needs to know about what to fetch and where to put it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSettings {
    /// Output root directory.
    #[serde(default)]
    pub path: PathBuf,

    #[serde(default)]
    pub format: OutputFormat,

    #[serde(default = "default_types")]
    pub types: Types,

    /// Chat types exported in full rather than only outgoing messages.
    #[serde(default = "default_full_chats")]
    pub full_chats: Types,

    #[serde(default)]
    pub media: MediaSettings,

    /// Restrict the export to one peer.
    #[serde(default)]
    pub single_peer: Option<InputPeer>,

    /// Lower date bound (inclusive, 0 = unbounded); single-peer only.
    #[serde(default)]
    pub single_peer_from: TimeId,

    /// Upper date bound (exclusive, 0 = unbounded); single-peer only.
    #[serde(default)]
    pub single_peer_till: TimeId,

    #[serde(default)]
    pub message_order: MessageOrder,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            format: OutputFormat::default(),
            types: default_types(),
            full_chats: default_full_chats(),
            media: MediaSettings::default(),
            single_peer: None,
            single_peer_from: 0,
            single_peer_till: 0,
            message_order: MessageOrder::default(),
        }
    }
}

fn default_types() -> Types {
    Types::PERSONAL_INFO
        | Types::USERPICS
        | Types::CONTACTS
        | Types::SESSIONS
        | Types::PERSONAL_CHATS
        | Types::PRIVATE_GROUPS
}

fn default_full_chats() -> Types {
    Types::PERSONAL_CHATS | Types::BOT_CHATS | Types::PRIVATE_GROUPS
}

impl ExportSettings {
    #[must_use]
    pub const fn only_single_peer(&self) -> bool {
        self.single_peer.is_some()
    }

    /// True when only channel types are selected, so dialogs can be
    /// listed from the last split alone.
    #[must_use]
    pub const fn use_only_last_split(&self) -> bool {
        !self.types.intersects(Types::NON_CHANNEL_CHATS)
    }

    /// Check the invariants that must hold before an export starts.
    ///
    /// # Errors
    /// Returns `AppError::Config` describing the first violated rule.
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(AppError::config("Output path is not set"));
        }
        if !self.types.is_known() {
            return Err(AppError::config(format!(
                "Unknown export type flags: {:#x}",
                self.types.bits() & !Types::ALL.bits()
            )));
        }
        if !self.full_chats.is_known() || !Types::ANY_CHATS.contains(self.full_chats) {
            return Err(AppError::config(format!(
                "Full chats must be chat type flags, got {:#x}",
                self.full_chats.bits()
            )));
        }
        if !self.media.types.is_known() {
            return Err(AppError::config(format!(
                "Unknown media type flags: {:#x}",
                self.media.types.bits() & !MediaTypes::ALL.bits()
            )));
        }
        check_size_limit("media.size_limit", self.media.size_limit)?;
        for (media_type, limit) in &self.media.type_limits {
            check_size_limit(&format!("media.type_limits.{media_type:?}"), *limit)?;
        }
        if self.single_peer_from < 0 || self.single_peer_till < 0 {
            return Err(AppError::config("Date window bounds must not be negative"));
        }
        if self.single_peer_from > 0
            && self.single_peer_till > 0
            && self.single_peer_till <= self.single_peer_from
        {
            return Err(AppError::config(format!(
                "Date window is empty: till {} must exceed from {}",
                self.single_peer_till, self.single_peer_from
            )));
        }
        if !self.only_single_peer() && (self.single_peer_from > 0 || self.single_peer_till > 0) {
            return Err(AppError::config("Date window requires a single peer"));
        }
        if matches!(self.single_peer, Some(InputPeer::Empty)) {
            return Err(AppError::config("Single peer is empty"));
        }
        Ok(())
    }
}

fn check_size_limit(name: &str, value: i64) -> Result<()> {
    if (0..=MAX_SIZE_LIMIT).contains(&value) {
        Ok(())
    } else {
        Err(AppError::config(format!(
            "{name} must be within [0, {MAX_SIZE_LIMIT}], got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ExportSettings {
        ExportSettings {
            path: PathBuf::from("/tmp/export"),
            ..ExportSettings::default()
        }
    }

    #[test]
    fn test_default_with_path_is_valid() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_unknown_flags_rejected() {
        let mut settings = valid();
        settings.types = Types::from_bits_retain(0x8000);
        assert!(settings.validate().is_err());

        let mut settings = valid();
        settings.media.types = MediaTypes::from_bits_retain(0x100);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_size_limit_range() {
        let mut settings = valid();
        settings.media.size_limit = MAX_SIZE_LIMIT;
        assert!(settings.validate().is_ok());
        settings.media.size_limit = MAX_SIZE_LIMIT + 1;
        assert!(settings.validate().is_err());
        settings.media.size_limit = 0;
        settings.media.type_limits.insert(MediaType::Video, -1);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_date_window_must_be_ordered() {
        let mut settings = valid();
        settings.single_peer = Some(InputPeer::User {
            user_id: 5,
            access_hash: 0,
        });
        settings.single_peer_from = 200;
        settings.single_peer_till = 100;
        assert!(settings.validate().is_err());
        settings.single_peer_till = 300;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_date_window_requires_single_peer() {
        let mut settings = valid();
        settings.single_peer_from = 100;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_per_type_limits() {
        let mut media = MediaSettings {
            size_limit: 1024,
            ..MediaSettings::default()
        };
        media.type_limits.insert(MediaType::Video, 4096);
        assert_eq!(media.limit_for(Some(MediaType::Video)), 4096);
        assert_eq!(media.limit_for(Some(MediaType::Photo)), 1024);
        assert_eq!(media.limit_for(None), 1024);
    }

    #[test]
    fn test_only_last_split() {
        let mut settings = valid();
        settings.types = Types::PUBLIC_CHANNELS | Types::PUBLIC_GROUPS;
        assert!(settings.use_only_last_split());
        settings.types = settings.types | Types::PERSONAL_CHATS;
        assert!(!settings.use_only_last_split());
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("txt".parse::<OutputFormat>(), Ok(OutputFormat::Text));
        assert!("pdf".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_labels() {
        let types = Types::CONTACTS | Types::SESSIONS;
        assert_eq!(types.labels(), vec!["contacts", "sessions"]);
    }
}

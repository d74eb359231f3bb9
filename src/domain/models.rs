//! Export records produced by page deserialization.
//!
//! These are the values flowing from the orchestrator to the writers. A
//! slice of them is handed to the writer once every file it references has
//! a final download decision.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::settings::MediaType;

/// Unix timestamp in seconds; 0 means unset.
pub type TimeId = i64;

/// Message ids of a basic group that migrated into a supergroup are shifted
/// below this offset so they never collide with the supergroup's own ids.
pub const SERVER_MAX_MSG_ID: i32 = 0x3FFF_FFFF;

const PEER_KIND_SHIFT: u32 = 56;
const PEER_BARE_MASK: u64 = (1 << PEER_KIND_SHIFT) - 1;

/// Stable peer identity: kind tag in the high byte, bare id below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub u64);

impl PeerId {
    const USER: u64 = 0;
    const CHAT: u64 = 1;
    const CHANNEL: u64 = 2;

    #[must_use]
    pub const fn user(bare: u64) -> Self {
        Self((Self::USER << PEER_KIND_SHIFT) | (bare & PEER_BARE_MASK))
    }

    #[must_use]
    pub const fn chat(bare: u64) -> Self {
        Self((Self::CHAT << PEER_KIND_SHIFT) | (bare & PEER_BARE_MASK))
    }

    #[must_use]
    pub const fn channel(bare: u64) -> Self {
        Self((Self::CHANNEL << PEER_KIND_SHIFT) | (bare & PEER_BARE_MASK))
    }

    #[must_use]
    pub const fn bare(self) -> u64 {
        self.0 & PEER_BARE_MASK
    }

    #[must_use]
    pub const fn is_user(self) -> bool {
        self.0 >> PEER_KIND_SHIFT == Self::USER
    }

    #[must_use]
    pub const fn is_chat(self) -> bool {
        self.0 >> PEER_KIND_SHIFT == Self::CHAT
    }

    #[must_use]
    pub const fn is_channel(self) -> bool {
        self.0 >> PEER_KIND_SHIFT == Self::CHANNEL
    }
}

/// Addressing information for a peer, as sent back in requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputPeer {
    #[default]
    Empty,
    SelfPeer,
    User { user_id: u64, access_hash: u64 },
    Chat { chat_id: u64 },
    Channel { channel_id: u64, access_hash: u64 },
}

impl InputPeer {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    #[must_use]
    pub const fn is_channel(&self) -> bool {
        matches!(self, Self::Channel { .. })
    }

    /// Peer id for addressable peers (`SelfPeer` resolves through `self_id`).
    #[must_use]
    pub const fn peer_id(&self, self_id: PeerId) -> Option<PeerId> {
        match self {
            Self::Empty => None,
            Self::SelfPeer => Some(self_id),
            Self::User { user_id, .. } => Some(PeerId::user(*user_id)),
            Self::Chat { chat_id } => Some(PeerId::chat(*chat_id)),
            Self::Channel { channel_id, .. } => Some(PeerId::channel(*channel_id)),
        }
    }
}

/// Independent message-id range; dialogs may span several of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRange {
    pub min_id: i32,
    pub max_id: i32,
}

impl MessageRange {
    /// The range used when the server reports no splits.
    pub const WHOLE: Self = Self {
        min_id: 1,
        max_id: i32::MAX,
    };
}

/// Kind part of a remote blob identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LocationData {
    /// A photo stored on a file server.
    ServerFile {
        id: u64,
        access_hash: u64,
        #[serde(default)]
        file_reference: Vec<u8>,
        #[serde(default)]
        thumb_size: String,
    },
    Document {
        id: u64,
        access_hash: u64,
        #[serde(default)]
        file_reference: Vec<u8>,
        #[serde(default)]
        thumb_size: String,
    },
    SecureValue { id: u64, access_hash: u64 },
    EncryptedFile { id: u64, access_hash: u64 },
    /// Takeout-scoped data file; has no identity of its own.
    Takeout,
}

/// Ordered cache key derived from a location: discriminator and id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocationKey {
    pub kind: u64,
    pub id: u64,
}

/// Identifies a remote binary object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLocation {
    /// Datacenter holding the blob; 0 means "no blob".
    pub dc_id: i32,
    pub data: LocationData,
}

impl Default for FileLocation {
    fn default() -> Self {
        Self {
            dc_id: 0,
            data: LocationData::Takeout,
        }
    }
}

impl FileLocation {
    #[must_use]
    pub const fn takeout() -> Self {
        Self {
            dc_id: 0,
            data: LocationData::Takeout,
        }
    }

    /// A location pointing at a real server blob.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.dc_id != 0
    }

    #[must_use]
    pub const fn is_takeout(&self) -> bool {
        matches!(self.data, LocationData::Takeout)
    }

    /// Cache key, or `None` for locations that must never be cached.
    #[must_use]
    pub fn cache_key(&self) -> Option<LocationKey> {
        if !self.is_valid() {
            return None;
        }
        #[allow(clippy::cast_sign_loss)]
        let dc = u64::from(self.dc_id as u32 & 0xFFFF);
        let thumb = |size: &str| u64::from(size.bytes().next().unwrap_or(0));
        let (kind, letter, id) = match &self.data {
            LocationData::ServerFile { id, thumb_size, .. } => (6, thumb(thumb_size), *id),
            LocationData::Document { id, thumb_size, .. } => (2, thumb(thumb_size), *id),
            LocationData::SecureValue { id, .. } => (3, 0, *id),
            LocationData::EncryptedFile { id, .. } => (4, 0, *id),
            LocationData::Takeout => (5, 0, 0),
        };
        Some(LocationKey {
            kind: dc | (letter << 16) | (kind << 24),
            id,
        })
    }

    /// Take over `from` when it names the same blob, picking up a fresh
    /// file reference. Returns whether anything was replaced.
    pub fn refresh_reference(&mut self, from: &Self) -> bool {
        if self.dc_id != from.dc_id {
            return false;
        }
        let same = match (&self.data, &from.data) {
            (
                LocationData::ServerFile { id, thumb_size, .. },
                LocationData::ServerFile {
                    id: other_id,
                    thumb_size: other_size,
                    ..
                },
            )
            | (
                LocationData::Document { id, thumb_size, .. },
                LocationData::Document {
                    id: other_id,
                    thumb_size: other_size,
                    ..
                },
            ) => id == other_id && thumb_size == other_size,
            _ => false,
        };
        if same {
            self.clone_from(from);
        }
        same
    }
}

/// The message a downloaded file came from, used to re-read it when the
/// server rejects an expired file reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOrigin {
    pub peer: InputPeer,
    pub split: MessageRange,
    /// Server-side id, before any migrated-group shift.
    pub message_id: i32,
}

/// Why a file was not downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Unavailable,
    FileType,
    FileSize,
    DateLimits,
}

impl SkipReason {
    /// Placeholder text written instead of a path.
    #[must_use]
    pub fn describe(self, what: &str) -> String {
        match self {
            Self::Unavailable => format!("({what} unavailable, please try again later)"),
            Self::FileType => format!(
                "({what} not included. Change data exporting settings to download.)"
            ),
            Self::FileSize => format!(
                "({what} exceeds maximum size. Change data exporting settings to download.)"
            ),
            Self::DateLimits => format!(
                "({what} out of date range. Change data exporting settings to download.)"
            ),
        }
    }
}

/// A file referenced by a record, plus its download decision.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct File {
    pub location: FileLocation,
    /// Declared size in bytes; 0 when unknown.
    pub size: i64,
    /// Inline content delivered with the record (e.g. a vCard).
    pub content: Vec<u8>,
    pub suggested_path: String,
    /// Set once downloaded, relative to the output root.
    pub relative_path: String,
    pub skip_reason: Option<SkipReason>,
}

impl File {
    /// A download decision has been made.
    #[must_use]
    pub fn is_decided(&self) -> bool {
        !self.relative_path.is_empty() || self.skip_reason.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Image {
    pub width: i32,
    pub height: i32,
    pub file: File,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Photo {
    pub id: u64,
    pub date: TimeId,
    pub image: Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    #[default]
    File,
    Sticker,
    Animated,
    VideoMessage,
    VoiceMessage,
    VideoFile,
    AudioFile,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Document {
    pub id: u64,
    pub date: TimeId,
    pub file: File,
    pub thumb: Image,
    pub name: String,
    pub mime: String,
    pub width: i32,
    pub height: i32,
    pub duration: i32,
    pub kind: DocumentKind,
    pub sticker_emoji: String,
    pub song_performer: String,
    pub song_title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactInfo {
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub date: TimeId,
    pub user_id: u64,
}

impl ContactInfo {
    #[must_use]
    pub fn full_name(&self) -> String {
        match (self.first_name.is_empty(), self.last_name.is_empty()) {
            (false, false) => format!("{} {}", self.first_name, self.last_name),
            (false, true) => self.first_name.clone(),
            (true, false) => self.last_name.clone(),
            (true, true) => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedContact {
    pub info: ContactInfo,
    pub vcard: File,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Venue {
    pub point: GeoPoint,
    pub title: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PollAnswer {
    pub text: String,
    pub votes: i32,
    pub chosen: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Poll {
    pub id: u64,
    pub question: String,
    pub answers: Vec<PollAnswer>,
    pub total_votes: i32,
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaContent {
    #[default]
    None,
    Photo(Photo),
    Document(Document),
    Contact(SharedContact),
    Geo(GeoPoint),
    Venue(Venue),
    Poll(Poll),
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Media {
    pub content: MediaContent,
    /// Self-destruct timer in seconds.
    pub ttl: i32,
}

impl Media {
    /// Classification used by the media type filter.
    #[must_use]
    pub const fn media_type(&self) -> Option<MediaType> {
        match &self.content {
            MediaContent::Photo(_) => Some(MediaType::Photo),
            MediaContent::Document(document) => Some(match document.kind {
                DocumentKind::Sticker => MediaType::Sticker,
                DocumentKind::VideoMessage => MediaType::VideoMessage,
                DocumentKind::VoiceMessage => MediaType::VoiceMessage,
                DocumentKind::Animated => MediaType::Gif,
                DocumentKind::VideoFile => MediaType::Video,
                DocumentKind::AudioFile | DocumentKind::File => MediaType::File,
            }),
            _ => None,
        }
    }

    pub fn file_mut(&mut self) -> Option<&mut File> {
        match &mut self.content {
            MediaContent::Photo(photo) => Some(&mut photo.image.file),
            MediaContent::Document(document) => Some(&mut document.file),
            MediaContent::Contact(contact) => Some(&mut contact.vcard),
            _ => None,
        }
    }

    #[must_use]
    pub const fn file(&self) -> Option<&File> {
        match &self.content {
            MediaContent::Photo(photo) => Some(&photo.image.file),
            MediaContent::Document(document) => Some(&document.file),
            MediaContent::Contact(contact) => Some(&contact.vcard),
            _ => None,
        }
    }

    pub fn thumb_mut(&mut self) -> Option<&mut File> {
        match &mut self.content {
            MediaContent::Document(document) => Some(&mut document.thumb.file),
            _ => None,
        }
    }

    #[must_use]
    pub const fn thumb(&self) -> Option<&File> {
        match &self.content {
            MediaContent::Document(document) => Some(&document.thumb.file),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextPartType {
    #[default]
    Text,
    Unknown,
    Mention,
    Hashtag,
    BotCommand,
    Url,
    Email,
    Bold,
    Italic,
    Code,
    Pre,
    TextUrl,
    MentionName,
    Phone,
    Cashtag,
    Underline,
    Strike,
    Blockquote,
    BankCard,
    Spoiler,
    CustomEmoji,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TextPart {
    #[serde(rename = "type")]
    pub part_type: TextPartType,
    pub text: String,
    /// Link target, language tag or mentioned user id depending on the type.
    pub additional: String,
}

impl TextPart {
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            part_type: TextPartType::Text,
            text: text.into(),
            additional: String::new(),
        }
    }
}

/// Service message payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ServiceAction {
    ChatCreate { title: String, user_ids: Vec<u64> },
    ChatEditTitle { title: String },
    ChatEditPhoto { photo: Photo },
    ChatDeletePhoto,
    ChatAddUser { user_ids: Vec<u64> },
    ChatDeleteUser { user_id: u64 },
    ChatJoinedByLink { inviter_id: u64 },
    ChannelCreate { title: String },
    ChatMigrateTo { channel_id: u64 },
    ChannelMigrateFrom { title: String, chat_id: u64 },
    PinMessage,
    HistoryClear,
    PhoneCall { duration: i32, discard_reason: String },
    ScreenshotTaken,
    CustomAction { message: String },
    ContactSignUp,
    GroupCall { duration: i32 },
    SetMessagesTtl { period: i32 },
    TopicCreate { title: String },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    pub id: i32,
    pub date: TimeId,
    pub edited: TimeId,
    pub from_id: Option<PeerId>,
    pub peer_id: PeerId,
    pub forwarded_from_id: Option<PeerId>,
    pub forwarded_from_name: String,
    pub forwarded_date: TimeId,
    pub forwarded: bool,
    pub signature: String,
    pub via_bot_id: u64,
    pub reply_to_msg_id: i32,
    pub reply_to_peer_id: Option<PeerId>,
    pub text: Vec<TextPart>,
    pub media: Media,
    pub action: Option<ServiceAction>,
    pub out: bool,
}

impl Message {
    /// The file this message carries, from its media or its service action.
    pub fn file_mut(&mut self) -> Option<&mut File> {
        if let Some(ServiceAction::ChatEditPhoto { photo }) = &mut self.action {
            return Some(&mut photo.image.file);
        }
        self.media.file_mut()
    }

    #[must_use]
    pub fn file(&self) -> Option<&File> {
        if let Some(ServiceAction::ChatEditPhoto { photo }) = &self.action {
            return Some(&photo.image.file);
        }
        self.media.file()
    }

    /// Whether the message falls outside a `[from, till)` date window.
    #[must_use]
    pub const fn outside_window(&self, from: TimeId, till: TimeId) -> bool {
        (from > 0 && self.date < from) || (till > 0 && self.date >= till)
    }

    /// Shift ids of a message loaded from the pre-migration basic group.
    pub fn adjust_migrated_ids(&mut self) {
        self.id -= SERVER_MAX_MSG_ID;
        if self.reply_to_msg_id > 0 && self.reply_to_peer_id.is_none() {
            self.reply_to_msg_id -= SERVER_MAX_MSG_ID;
        }
    }

    #[must_use]
    pub fn plain_text(&self) -> String {
        self.text.iter().map(|part| part.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub bare_id: u64,
    pub info: ContactInfo,
    pub username: String,
    pub is_bot: bool,
    pub is_self: bool,
    pub access_hash: u64,
}

impl User {
    #[must_use]
    pub const fn peer_id(&self) -> PeerId {
        PeerId::user(self.bare_id)
    }

    #[must_use]
    pub const fn input(&self) -> InputPeer {
        InputPeer::User {
            user_id: self.bare_id,
            access_hash: self.access_hash,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Chat {
    pub bare_id: u64,
    pub title: String,
    pub username: String,
    pub is_channel: bool,
    pub is_broadcast: bool,
    pub is_supergroup: bool,
    pub migrated_to_channel_id: u64,
    pub access_hash: u64,
}

impl Chat {
    #[must_use]
    pub const fn peer_id(&self) -> PeerId {
        if self.is_channel {
            PeerId::channel(self.bare_id)
        } else {
            PeerId::chat(self.bare_id)
        }
    }

    #[must_use]
    pub const fn input(&self) -> InputPeer {
        if self.is_channel {
            InputPeer::Channel {
                channel_id: self.bare_id,
                access_hash: self.access_hash,
            }
        } else {
            InputPeer::Chat {
                chat_id: self.bare_id,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Peer {
    User(User),
    Chat(Chat),
}

impl Peer {
    #[must_use]
    pub const fn id(&self) -> PeerId {
        match self {
            Self::User(user) => user.peer_id(),
            Self::Chat(chat) => chat.peer_id(),
        }
    }

    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::User(user) => user.info.full_name(),
            Self::Chat(chat) => chat.title.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalInfo {
    pub user: User,
    pub bio: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserpicsInfo {
    pub count: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserpicsSlice {
    pub list: Vec<Photo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopPeer {
    pub peer: Peer,
    pub rating: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactsList {
    pub list: Vec<ContactInfo>,
    pub correspondents: Vec<TopPeer>,
    pub inline_bots: Vec<TopPeer>,
    pub phone_calls: Vec<TopPeer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Session {
    pub application_name: String,
    pub application_version: String,
    pub device_model: String,
    pub platform: String,
    pub system_version: String,
    pub ip: String,
    pub country: String,
    pub region: String,
    pub created: TimeId,
    pub last_active: TimeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSession {
    pub bot_username: String,
    pub domain: String,
    pub browser: String,
    pub platform: String,
    pub ip: String,
    pub region: String,
    pub created: TimeId,
    pub last_active: TimeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsList {
    pub list: Vec<Session>,
    pub web_list: Vec<WebSession>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogType {
    #[default]
    Unknown,
    SavedMessages,
    Replies,
    VerifyCodes,
    Personal,
    Bot,
    PrivateGroup,
    PrivateSupergroup,
    PublicSupergroup,
    PrivateChannel,
    PublicChannel,
}

impl DialogType {
    /// Type key used in structured output.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::SavedMessages => "saved_messages",
            Self::Replies => "replies",
            Self::VerifyCodes => "verification_codes",
            Self::Personal => "personal_chat",
            Self::Bot => "bot_chat",
            Self::PrivateGroup => "private_group",
            Self::PrivateSupergroup => "private_supergroup",
            Self::PublicSupergroup => "public_supergroup",
            Self::PrivateChannel => "private_channel",
            Self::PublicChannel => "public_channel",
        }
    }

    /// Coarse label used in chat lists.
    #[must_use]
    pub const fn group_label(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::SavedMessages | Self::Replies | Self::VerifyCodes | Self::Personal => "private",
            Self::Bot => "bot",
            Self::PrivateGroup | Self::PrivateSupergroup | Self::PublicSupergroup => "group",
            Self::PrivateChannel | Self::PublicChannel => "channel",
        }
    }

    #[must_use]
    pub const fn deleted_name(self) -> &'static str {
        match self {
            Self::PrivateGroup | Self::PrivateSupergroup | Self::PublicSupergroup => {
                "Deleted Group"
            }
            Self::PrivateChannel | Self::PublicChannel => "Deleted Channel",
            _ => "Deleted Account",
        }
    }
}

/// One dialog to export (the dialog descriptor).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogInfo {
    #[serde(rename = "type")]
    pub dialog_type: DialogType,
    pub name: String,
    pub last_name: String,
    pub input: InputPeer,
    pub top_message_id: i32,
    pub top_message_date: TimeId,
    pub peer_id: PeerId,

    /// Basic group this supergroup was migrated from.
    pub migrated_from_input: InputPeer,
    /// Supergroup this basic group was migrated to.
    pub migrated_to_channel_id: u64,

    /// Split indices holding this dialog's history; negative indices
    /// address the migrated-from basic group.
    pub splits: Vec<i32>,
    /// Parallel to `splits`, filled while counting.
    pub messages_count_per_split: Vec<i32>,
    pub only_my_messages: bool,
    pub is_left_channel: bool,
    pub relative_path: String,
}

impl DialogInfo {
    /// Display name for headers and lists.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self.dialog_type {
            DialogType::SavedMessages => "Saved messages".to_string(),
            DialogType::Replies => "Replies".to_string(),
            DialogType::VerifyCodes => "Verification Codes".to_string(),
            _ if self.name.is_empty() && self.last_name.is_empty() => {
                self.dialog_type.deleted_name().to_string()
            }
            DialogType::Personal | DialogType::Bot if !self.last_name.is_empty() => {
                format!("{} {}", self.name, self.last_name).trim().to_string()
            }
            _ => self.name.clone(),
        }
    }

    #[must_use]
    pub fn total_messages(&self) -> i64 {
        self.messages_count_per_split
            .iter()
            .map(|count| i64::from(*count))
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DialogsInfo {
    pub chats: Vec<DialogInfo>,
    pub left: Vec<DialogInfo>,
}

impl DialogsInfo {
    #[must_use]
    pub fn len(&self) -> usize {
        self.chats.len() + self.left.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chats.is_empty() && self.left.is_empty()
    }

    /// Chats followed by left channels, in export order.
    pub fn iter(&self) -> impl Iterator<Item = &DialogInfo> {
        self.chats.iter().chain(self.left.iter())
    }
}

/// One page of messages, with the peers they reference.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MessagesSlice {
    pub list: Vec<Message>,
    pub peers: BTreeMap<PeerId, Peer>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_location_has_no_key() {
        assert!(FileLocation::default().cache_key().is_none());
        assert!(FileLocation::takeout().cache_key().is_none());
    }

    #[test]
    fn test_keys_distinguish_kind_and_thumb() {
        let photo = FileLocation {
            dc_id: 2,
            data: LocationData::ServerFile {
                id: 77,
                access_hash: 1,
                file_reference: vec![],
                thumb_size: "y".into(),
            },
        };
        let document = FileLocation {
            dc_id: 2,
            data: LocationData::Document {
                id: 77,
                access_hash: 1,
                file_reference: vec![],
                thumb_size: String::new(),
            },
        };
        let mut thumb = photo.clone();
        if let LocationData::ServerFile { thumb_size, .. } = &mut thumb.data {
            *thumb_size = "s".into();
        }
        let keys = [photo.cache_key(), document.cache_key(), thumb.cache_key()];
        assert!(keys.iter().all(Option::is_some));
        assert_ne!(keys[0], keys[1]);
        assert_ne!(keys[0], keys[2]);
    }

    #[test]
    fn test_file_reference_does_not_change_key() {
        let make = |reference: Vec<u8>| FileLocation {
            dc_id: 4,
            data: LocationData::Document {
                id: 9,
                access_hash: 3,
                file_reference: reference,
                thumb_size: String::new(),
            },
        };
        assert_eq!(make(vec![1]).cache_key(), make(vec![2, 3]).cache_key());
    }

    #[test]
    fn test_refresh_reference_only_for_same_blob() {
        let make = |id: u64, reference: Vec<u8>| FileLocation {
            dc_id: 4,
            data: LocationData::Document {
                id,
                access_hash: 3,
                file_reference: reference,
                thumb_size: String::new(),
            },
        };
        let mut location = make(9, vec![1]);
        assert!(!location.refresh_reference(&make(10, vec![2])));
        assert_eq!(location, make(9, vec![1]));

        let moved = FileLocation {
            dc_id: 5,
            ..make(9, vec![2])
        };
        assert!(!location.refresh_reference(&moved));

        assert!(location.refresh_reference(&make(9, vec![2])));
        assert_eq!(location, make(9, vec![2]));
        assert!(!FileLocation::takeout().refresh_reference(&FileLocation::takeout()));
    }

    #[test]
    fn test_peer_id_kinds() {
        let channel = PeerId::channel(42);
        assert!(channel.is_channel());
        assert_eq!(channel.bare(), 42);
        assert_ne!(PeerId::user(42), PeerId::chat(42));
    }

    #[test]
    fn test_media_type_classification() {
        let media = Media {
            content: MediaContent::Document(Document {
                kind: DocumentKind::VideoFile,
                ..Document::default()
            }),
            ttl: 0,
        };
        assert_eq!(media.media_type(), Some(MediaType::Video));
        let media = Media {
            content: MediaContent::Photo(Photo::default()),
            ttl: 0,
        };
        assert_eq!(media.media_type(), Some(MediaType::Photo));
    }

    #[test]
    fn test_date_window() {
        let message = Message {
            date: 100,
            ..Message::default()
        };
        assert!(!message.outside_window(0, 0));
        assert!(!message.outside_window(100, 101));
        assert!(message.outside_window(101, 0));
        assert!(message.outside_window(0, 100));
    }

    #[test]
    fn test_action_photo_is_message_file() {
        let mut message = Message {
            action: Some(ServiceAction::ChatEditPhoto {
                photo: Photo {
                    id: 1,
                    ..Photo::default()
                },
            }),
            ..Message::default()
        };
        if let Some(file) = message.file_mut() {
            file.size = 10;
        }
        assert_eq!(message.file().map(|f| f.size), Some(10));
    }

    #[test]
    fn test_display_name_fallbacks() {
        let dialog = DialogInfo {
            dialog_type: DialogType::PrivateChannel,
            ..DialogInfo::default()
        };
        assert_eq!(dialog.display_name(), "Deleted Channel");
        let dialog = DialogInfo {
            dialog_type: DialogType::Personal,
            name: "Ada".into(),
            last_name: "Lovelace".into(),
            ..DialogInfo::default()
        };
        assert_eq!(dialog.display_name(), "Ada Lovelace");
    }
}

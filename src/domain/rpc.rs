//! The remote request port.
//!
//! Transport, framing and wire encoding belong to whoever implements
//! [`RequestClient`]; the export only sees typed requests and pages.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::models::{
    Chat, ContactInfo, DialogInfo, FileLocation, InputPeer, MessageRange, Message, Peer,
    PersonalInfo, Photo, Session, TopPeer, User, WebSession,
};

/// A remote failure: numeric code plus error type string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    #[serde(rename = "type")]
    pub kind: String,
}

impl RpcError {
    #[must_use]
    pub fn new(code: i32, kind: impl Into<String>) -> Self {
        Self {
            code,
            kind: kind.into(),
        }
    }

    /// Locally detected protocol violation reported like a remote one.
    #[must_use]
    pub fn api(text: impl AsRef<str>) -> Self {
        Self::new(0, format!("API_ERROR: {}", text.as_ref()))
    }

    /// The blob moved or its identity is no longer valid.
    #[must_use]
    pub fn is_location_unavailable(&self) -> bool {
        matches!(
            self.kind.as_str(),
            "LOCATION_INVALID" | "VERSION_INVALID" | "LOCATION_NOT_AVAILABLE"
        )
    }

    /// The file reference inside the location is stale and can be
    /// refreshed by re-reading the record that carries it.
    #[must_use]
    pub fn is_file_reference_expired(&self) -> bool {
        self.code == 400 && self.kind.starts_with("FILE_REFERENCE_")
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind, self.code)
    }
}

impl std::error::Error for RpcError {}

/// Flags sent when opening a takeout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TakeoutFlags {
    pub contacts: bool,
    pub message_users: bool,
    pub message_chats: bool,
    pub message_megagroups: bool,
    pub message_channels: bool,
    pub files: bool,
    pub file_max_size: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopPeerCategory {
    Correspondents,
    BotsInline,
    PhoneCalls,
}

/// Requests the export issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Request {
    /// Run `request` inside the takeout session.
    WithTakeout {
        takeout_id: u64,
        request: Box<Self>,
    },
    /// Run `request` restricted to one message-id range.
    WithMessagesRange {
        range: MessageRange,
        request: Box<Self>,
    },
    GetSelf,
    InitTakeoutSession {
        flags: TakeoutFlags,
    },
    FinishTakeoutSession {
        success: bool,
    },
    GetFullSelf,
    GetUserPhotos {
        offset: i32,
        max_id: u64,
        limit: i32,
    },
    GetContacts,
    GetTopPeers {
        offset: i32,
        limit: i32,
    },
    GetAuthorizations,
    GetWebAuthorizations,
    GetSplitRanges,
    GetDialogs {
        offset_date: i64,
        offset_id: i32,
        offset_peer: InputPeer,
        limit: i32,
    },
    GetLeftChannels {
        offset: i32,
    },
    /// Resolve one peer for single-peer export.
    ResolvePeer {
        peer: InputPeer,
    },
    /// Basic group the given supergroup was migrated from.
    GetMigratedFrom {
        channel: InputPeer,
    },
    GetHistory {
        peer: InputPeer,
        offset_id: i32,
        add_offset: i32,
        limit: i32,
    },
    /// History restricted to messages sent by `from`.
    Search {
        peer: InputPeer,
        from: InputPeer,
        offset_id: i32,
        add_offset: i32,
        limit: i32,
    },
    /// Re-read single messages by id, e.g. for a fresh file reference.
    GetMessages {
        peer: InputPeer,
        ids: Vec<i32>,
    },
    GetFile {
        location: FileLocation,
        offset: i64,
        limit: i32,
    },
}

impl Request {
    #[must_use]
    pub fn with_takeout(self, takeout_id: u64) -> Self {
        Self::WithTakeout {
            takeout_id,
            request: Box::new(self),
        }
    }

    #[must_use]
    pub fn with_range(self, range: MessageRange) -> Self {
        Self::WithMessagesRange {
            range,
            request: Box::new(self),
        }
    }

    /// The request with wrappers removed.
    #[must_use]
    pub fn inner(&self) -> &Self {
        match self {
            Self::WithTakeout { request, .. } | Self::WithMessagesRange { request, .. } => {
                request.inner()
            }
            other => other,
        }
    }
}

/// A list page: the complete list, a slice with a total count, or an
/// unchanged marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum Page<T> {
    Complete { items: Vec<T> },
    Slice { count: i32, items: Vec<T> },
    NotModified,
}

impl<T> Page<T> {
    #[must_use]
    pub fn items(&self) -> &[T] {
        match self {
            Self::Complete { items } | Self::Slice { items, .. } => items,
            Self::NotModified => &[],
        }
    }

    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        match self {
            Self::Complete { items } | Self::Slice { items, .. } => items,
            Self::NotModified => Vec::new(),
        }
    }

    /// Total count: explicit for slices, the list length otherwise.
    #[must_use]
    pub fn total(&self) -> i32 {
        match self {
            Self::Slice { count, .. } => *count,
            Self::Complete { items } => i32::try_from(items.len()).unwrap_or(i32::MAX),
            Self::NotModified => 0,
        }
    }

    /// No further pages can follow this one.
    #[must_use]
    pub fn is_last(&self) -> bool {
        match self {
            Self::Complete { .. } | Self::NotModified => true,
            Self::Slice { items, .. } => items.is_empty(),
        }
    }
}

/// A page of message history together with the peers it mentions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagesPage {
    pub page: Page<Message>,
    #[serde(default)]
    pub peers: Vec<Peer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPeers {
    pub category: TopPeerCategory,
    pub count: i32,
    pub peers: Vec<TopPeer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum TopPeersPage {
    Peers { categories: Vec<CategoryPeers> },
    NotModified,
    Disabled,
}

/// A chunk answer from the file service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum FilePart {
    Bytes { bytes: Vec<u8> },
    CdnRedirect,
}

/// Responses, one variant per distinct answer shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Response {
    Ok,
    Users { users: Vec<User> },
    Takeout { id: u64 },
    FullUser { info: PersonalInfo },
    Photos { page: Page<Photo> },
    Contacts { list: Vec<ContactInfo> },
    TopPeers { page: TopPeersPage },
    Authorizations { list: Vec<Session> },
    WebAuthorizations { list: Vec<WebSession> },
    SplitRanges { ranges: Vec<MessageRange> },
    Dialogs { page: Page<DialogInfo> },
    Chats { page: Page<Chat> },
    ResolvedPeer { dialog: DialogInfo },
    MigratedFrom { dialog: Option<DialogInfo> },
    Messages { page: MessagesPage },
    File { part: FilePart },
}

impl Response {
    #[must_use]
    pub const fn shape(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Users { .. } => "users",
            Self::Takeout { .. } => "takeout",
            Self::FullUser { .. } => "full_user",
            Self::Photos { .. } => "photos",
            Self::Contacts { .. } => "contacts",
            Self::TopPeers { .. } => "top_peers",
            Self::Authorizations { .. } => "authorizations",
            Self::WebAuthorizations { .. } => "web_authorizations",
            Self::SplitRanges { .. } => "split_ranges",
            Self::Dialogs { .. } => "dialogs",
            Self::Chats { .. } => "chats",
            Self::ResolvedPeer { .. } => "resolved_peer",
            Self::MigratedFrom { .. } => "migrated_from",
            Self::Messages { .. } => "messages",
            Self::File { .. } => "file",
        }
    }
}

/// Typed extraction from a [`Response`]; `None` on a shape mismatch.
pub trait FromResponse: Sized {
    fn from_response(response: Response) -> Option<Self>;
}

macro_rules! from_response {
    ($ty:ty, $variant:ident { $field:ident }) => {
        impl FromResponse for $ty {
            fn from_response(response: Response) -> Option<Self> {
                match response {
                    Response::$variant { $field } => Some($field),
                    _ => None,
                }
            }
        }
    };
}

from_response!(Vec<User>, Users { users });
from_response!(u64, Takeout { id });
from_response!(PersonalInfo, FullUser { info });
from_response!(Page<Photo>, Photos { page });
from_response!(Vec<ContactInfo>, Contacts { list });
from_response!(TopPeersPage, TopPeers { page });
from_response!(Vec<Session>, Authorizations { list });
from_response!(Vec<WebSession>, WebAuthorizations { list });
from_response!(Vec<MessageRange>, SplitRanges { ranges });
from_response!(Page<DialogInfo>, Dialogs { page });
from_response!(Page<Chat>, Chats { page });
from_response!(DialogInfo, ResolvedPeer { dialog });
from_response!(Option<DialogInfo>, MigratedFrom { dialog });
from_response!(MessagesPage, Messages { page });
from_response!(FilePart, File { part });

impl FromResponse for () {
    fn from_response(response: Response) -> Option<Self> {
        matches!(response, Response::Ok).then_some(())
    }
}

/// Capability to send one request and await one answer.
#[async_trait]
pub trait RequestClient: Send + Sync {
    /// Send a request and wait for its single response or error.
    async fn send(&self, request: Request) -> Result<Response, RpcError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_unavailable_classes() {
        assert!(RpcError::new(400, "LOCATION_INVALID").is_location_unavailable());
        assert!(!RpcError::new(400, "FILE_REFERENCE_EXPIRED").is_location_unavailable());
        assert!(!RpcError::new(420, "FLOOD_WAIT_10").is_location_unavailable());
    }

    #[test]
    fn test_file_reference_errors_need_code_400() {
        assert!(RpcError::new(400, "FILE_REFERENCE_EXPIRED").is_file_reference_expired());
        assert!(RpcError::new(400, "FILE_REFERENCE_INVALID").is_file_reference_expired());
        assert!(!RpcError::new(500, "FILE_REFERENCE_EXPIRED").is_file_reference_expired());
        assert!(!RpcError::new(400, "LOCATION_INVALID").is_file_reference_expired());
    }

    #[test]
    fn test_inner_unwraps_all_layers() {
        let request = Request::GetSplitRanges
            .with_range(MessageRange::WHOLE)
            .with_takeout(7);
        assert_eq!(request.inner(), &Request::GetSplitRanges);
    }

    #[test]
    fn test_page_last_and_total() {
        let slice: Page<i32> = Page::Slice {
            count: 10,
            items: vec![1, 2],
        };
        assert!(!slice.is_last());
        assert_eq!(slice.total(), 10);
        let empty: Page<i32> = Page::Slice {
            count: 10,
            items: vec![],
        };
        assert!(empty.is_last());
        let complete = Page::Complete { items: vec![1, 2, 3] };
        assert!(complete.is_last());
        assert_eq!(complete.total(), 3);
    }

    #[test]
    fn test_typed_extraction_rejects_wrong_shape() {
        assert_eq!(u64::from_response(Response::Takeout { id: 3 }), Some(3));
        assert_eq!(u64::from_response(Response::Ok), None);
        assert_eq!(<()>::from_response(Response::Ok), Some(()));
    }
}

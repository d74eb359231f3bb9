//! Domain layer - export records, settings and the request port.
//!
//! This layer holds plain data, validation rules and error types without
//! touching the network or the filesystem.

pub mod config;
pub mod error;
pub mod format;
pub mod models;
pub mod progress;
pub mod rpc;
pub mod settings;

pub use config::{AppConfig, PathConfig, TransferConfig};
pub use error::{AppError, ErrorKind, Result};
pub use models::{
    Chat, ContactInfo, ContactsList, DialogInfo, DialogType, DialogsInfo, Document, DocumentKind,
    File, FileLocation, FileOrigin, Image, InputPeer, LocationData, LocationKey, Media,
    MediaContent, Message, MessageRange, MessagesSlice, Peer, PeerId, PersonalInfo, Photo,
    ServiceAction, Session, SessionsList, SkipReason, TextPart, TextPartType, TimeId, TopPeer,
    User, UserpicsInfo, UserpicsSlice, WebSession,
};
pub use progress::{ExportEvent, ExportProgressSnapshot, FinishStats, ProgressStage, StartInfo};
pub use rpc::{Request, RequestClient, Response, RpcError};
pub use settings::{ExportSettings, MediaSettings, MediaType, MediaTypes, MessageOrder, OutputFormat, Types};

//! Domain-level error types for takeout-export.
//!
//! Remote failures, local disk failures and setup problems are kept apart
//! so the driver can report each with its own message.

use std::path::PathBuf;
use thiserror::Error;

use super::rpc::RpcError;

/// Coarse classification surfaced on the terminal `Error` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The server rejected a request.
    Remote,
    /// Disk write, directory creation or encoding failure.
    Local,
    /// Invalid settings or configuration.
    Setup,
    /// The export was cancelled by the caller.
    Cancelled,
}

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// A remote request failed and the failure is not file-specific.
    #[error("Remote error: {0}")]
    Rpc(RpcError),

    /// Local filesystem operation failed.
    #[error("IO error: {message} ({})", path.display())]
    Io {
        message: String,
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Invalid or inconsistent data received or produced.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// JSON encoding or parsing failed.
    #[error("JSON error: {message}")]
    JsonParse {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Configuration or settings error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The export was cancelled.
    #[error("Export cancelled")]
    Cancelled,
}

impl AppError {
    /// Create a JSON error.
    pub fn json_parse(err: serde_json::Error) -> Self {
        Self::JsonParse {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an IO error with context and the offending path.
    pub fn io(message: impl Into<String>, path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            path: path.into(),
            source: Some(err),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid-data error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Remote API-level failure synthesized locally (code 0).
    pub fn api(text: impl AsRef<str>) -> Self {
        Self::Rpc(RpcError::api(text))
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Rpc(_) | Self::InvalidData { .. } => ErrorKind::Remote,
            Self::Io { .. } | Self::JsonParse { .. } => ErrorKind::Local,
            Self::Config { .. } => ErrorKind::Setup,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Path involved in a local failure, if any.
    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Io { path, .. } => Some(path),
            _ => None,
        }
    }
}

impl From<RpcError> for AppError {
    fn from(err: RpcError) -> Self {
        Self::Rpc(err)
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

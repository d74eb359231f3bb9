//! Progress and lifecycle events surfaced to the caller.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::error::{AppError, ErrorKind};

/// Totals known once the startup counters have run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StartInfo {
    pub userpics_count: i32,
    pub dialogs_count: i32,
}

/// Export stage as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    #[default]
    Initializing,
    PersonalInfo,
    Userpics,
    Contacts,
    Sessions,
    OtherData,
    Chats,
    LeftChannels,
    Finishing,
}

/// Counters written by the driver and read by the caller.
///
/// Each field only grows during one export.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExportProgressSnapshot {
    pub stage: ProgressStage,
    pub userpics_count: i32,
    pub processed_userpics: i32,
    pub dialogs_count: i32,
    pub processed_dialogs: i32,
    /// Messages written for the dialog currently exported.
    pub processed_messages: i64,
    pub downloaded_bytes: i64,
    /// Name of the file currently being downloaded, if any.
    pub current_file: Option<String>,
    pub files_written: u64,
    pub bytes_written: u64,
}

/// Output totals reported with `Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FinishStats {
    pub files_count: u64,
    pub bytes_count: u64,
}

/// Lifecycle events of one export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExportEvent {
    Started(StartInfo),
    Progress(ExportProgressSnapshot),
    Finished {
        path: PathBuf,
        stats: FinishStats,
    },
    Error {
        kind: ErrorKind,
        detail: String,
        path: Option<PathBuf>,
    },
}

impl ExportEvent {
    /// Terminal event describing an export failure.
    #[must_use]
    pub fn from_error(error: &AppError) -> Self {
        Self::Error {
            kind: error.kind(),
            detail: error.to_string(),
            path: error.path().map(std::path::Path::to_path_buf),
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished { .. } | Self::Error { .. })
    }
}

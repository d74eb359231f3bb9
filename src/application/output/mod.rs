//! Output writers and the call protocol they share.
//!
//! The driver calls a writer in a fixed order:
//! `start → write_personal → write_userpics_start → write_userpics_slice* →
//! write_userpics_end → write_contacts_list → write_sessions_list →
//! write_other_data → write_dialogs_start → (write_dialog_start →
//! write_dialog_slice* → write_dialog_end)* → write_dialogs_end → finish`.
//! Sections whose type is not selected are skipped as a whole.

mod describe;
mod file;
pub mod html;
pub mod json;
pub mod text;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

pub use file::{prepare_relative_path, OutputFile, Stats};
pub use html::HtmlWriter;
pub use json::JsonWriter;
pub use text::TextWriter;

use crate::domain::{
    AppError, ContactsList, DialogInfo, DialogsInfo, ExportSettings, File, MessagesSlice,
    OutputFormat, PersonalInfo, SessionsList, UserpicsInfo, UserpicsSlice,
};

/// Messages per chat file before a new one is started.
pub const MESSAGES_IN_FILE: usize = 1000;

/// Failure of a writer call.
#[derive(Error, Debug)]
pub enum OutputError {
    /// The file could not be opened; retrying might help.
    #[error("Could not open {}: {source}", path.display())]
    Recoverable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Disk full, directory creation failure or inconsistent file state.
    #[error("Could not write {}: {source}", path.display())]
    Fatal {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl OutputError {
    pub fn fatal(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Fatal {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn recoverable(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Recoverable {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Encoding failure while producing content for `path`.
    pub fn encoding(path: impl AsRef<Path>, error: serde_json::Error) -> Self {
        Self::fatal(path, io::Error::other(error))
    }

    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Recoverable { path, .. } | Self::Fatal { path, .. } => path,
        }
    }
}

impl From<OutputError> for AppError {
    fn from(err: OutputError) -> Self {
        let (message, path, source) = match err {
            OutputError::Recoverable { path, source } => ("Could not open file", path, source),
            OutputError::Fatal { path, source } => ("Could not write file", path, source),
        };
        Self::io(message, path, source)
    }
}

pub type WriteResult = std::result::Result<(), OutputError>;

/// Shared state handed to a writer on `start`.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    /// Output root; every path a writer creates lives below it.
    pub root: PathBuf,
    pub stats: Arc<Stats>,
}

impl Environment {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            stats: Arc::new(Stats::default()),
        }
    }

    /// A file under the output root that counts into the shared stats.
    #[must_use]
    pub fn file(&self, relative_path: &str) -> OutputFile {
        OutputFile::new(self.root.join(relative_path), Some(self.stats.clone()))
    }
}

/// Serializer for one output format.
pub trait OutputWriter: Send {
    fn format(&self) -> OutputFormat;

    fn start(&mut self, settings: &ExportSettings, environment: &Environment) -> WriteResult;

    fn write_personal(&mut self, data: &PersonalInfo) -> WriteResult;

    fn write_userpics_start(&mut self, data: &UserpicsInfo) -> WriteResult;
    fn write_userpics_slice(&mut self, data: &UserpicsSlice) -> WriteResult;
    fn write_userpics_end(&mut self) -> WriteResult;

    fn write_contacts_list(&mut self, data: &ContactsList) -> WriteResult;

    fn write_sessions_list(&mut self, data: &SessionsList) -> WriteResult;

    /// The takeout data file, already downloaded (or skipped).
    fn write_other_data(&mut self, data: &File) -> WriteResult;

    fn write_dialogs_start(&mut self, data: &DialogsInfo) -> WriteResult;
    fn write_dialog_start(&mut self, data: &DialogInfo) -> WriteResult;
    /// Takes the slice by value; nothing upstream keeps the messages.
    fn write_dialog_slice(&mut self, data: MessagesSlice) -> WriteResult;
    fn write_dialog_end(&mut self) -> WriteResult;
    fn write_dialogs_end(&mut self) -> WriteResult;

    fn finish(&mut self) -> WriteResult;

    /// The file a user should open first.
    fn main_file_path(&self) -> PathBuf;
}

/// Writer for the chosen format.
#[must_use]
pub fn create_writer(format: OutputFormat) -> Box<dyn OutputWriter> {
    match format {
        OutputFormat::Text => Box::new(TextWriter::default()),
        OutputFormat::Json => Box::new(JsonWriter::default()),
        OutputFormat::Html => Box::new(HtmlWriter::default()),
    }
}

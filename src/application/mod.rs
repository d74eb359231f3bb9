//! Application layer - the export pipeline.
//!
//! The orchestrator pulls collections page by page through the request
//! port, downloads their files, and the controller hands each piece to
//! an output writer.

pub mod api_wrap;
pub mod controller;
pub mod downloader;
pub mod file_cache;
pub mod formatter;
pub mod output;
pub mod pagination;

pub use api_wrap::{ApiWrap, ErrorStreams, ExportHandle, IoFailure};
pub use controller::ExportController;
pub use downloader::{ChunkedDownloader, DownloadOutcome, FileProgress};
pub use file_cache::FileCache;
pub use formatter::{
    format_failure, format_progress, format_settings_table, format_start, format_stats,
};
pub use output::{create_writer, Environment, OutputError, OutputWriter};

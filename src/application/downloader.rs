//! Chunked blob transfer with a bounded window of in-flight requests.
//!
//! Chunks may come back in any order; bytes reach the disk strictly in
//! offset order because only the front of the queue is ever written.

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;

use super::output::{OutputFile, Stats};
use crate::domain::rpc::{FilePart, MessagesPage};
use crate::domain::{
    AppError, FileLocation, FileOrigin, Request, RequestClient, Response, Result, RpcError,
};

/// Fixed chunk size (128 KiB).
pub const FILE_CHUNK_SIZE: i32 = 128 * 1024;

/// Default number of chunk requests in flight.
pub const FILE_REQUESTS_COUNT: usize = 2;

const TAKEOUT_FILE_EMPTY: &str = "TAKEOUT_FILE_EMPTY";

/// How a transfer ended when it did not fail the export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// All bytes are on disk at this relative path.
    Completed(String),
    /// The blob moved or was skipped; the file gets no path.
    Unavailable,
}

/// Per-chunk progress of the active transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileProgress {
    pub transfer_id: u64,
    pub relative_path: String,
    pub ready: i64,
    pub total: i64,
}

#[derive(Debug)]
struct ChunkSlot {
    offset: i64,
    bytes: Option<Vec<u8>>,
}

/// What accepting a chunk did to the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    Pending,
    Complete,
}

/// The single active transfer: target, offsets and the in-flight queue.
#[derive(Debug)]
pub struct DownloadTransaction {
    location: FileLocation,
    origin: Option<FileOrigin>,
    relative_path: String,
    output: OutputFile,
    size: i64,
    /// Offset of the next chunk to request.
    offset: i64,
    chunk_size: i64,
    requests: VecDeque<ChunkSlot>,
    end_reached: bool,
}

impl DownloadTransaction {
    /// Start a transfer into `root/relative_path`; `size` 0 means unknown.
    #[must_use]
    pub fn new(
        location: FileLocation,
        root: &Path,
        relative_path: String,
        size: i64,
        stats: Option<Arc<Stats>>,
    ) -> Self {
        Self::resume(location, root, relative_path, size, 0, stats)
    }

    /// Continue a transfer whose first `confirmed` bytes are already on
    /// disk. Opening fails if the file length differs from `confirmed`.
    ///
    /// The orchestrator never resumes: it always allocates a fresh path
    /// and starts at zero through [`DownloadTransaction::new`]. This entry
    /// is for drivers that restart an interrupted transfer into the same
    /// file, and for checking that a resumed run writes the same bytes.
    #[must_use]
    pub fn resume(
        location: FileLocation,
        root: &Path,
        relative_path: String,
        size: i64,
        confirmed: u64,
        stats: Option<Arc<Stats>>,
    ) -> Self {
        let output = OutputFile::resume(root.join(&relative_path), confirmed, stats);
        Self {
            location,
            origin: None,
            relative_path,
            output,
            size,
            offset: i64::try_from(confirmed).unwrap_or(i64::MAX),
            chunk_size: i64::from(FILE_CHUNK_SIZE),
            requests: VecDeque::new(),
            end_reached: false,
        }
    }

    /// Attach the message the file belongs to, so an expired file
    /// reference can be refreshed mid-transfer.
    #[must_use]
    pub fn with_origin(mut self, origin: Option<FileOrigin>) -> Self {
        self.origin = origin;
        self
    }

    #[must_use]
    pub const fn location(&self) -> &FileLocation {
        &self.location
    }

    #[must_use]
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// Bytes already written to disk.
    #[must_use]
    pub fn ready(&self) -> i64 {
        i64::try_from(self.output.size()).unwrap_or(i64::MAX)
    }

    #[must_use]
    pub const fn size(&self) -> i64 {
        self.size
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.requests.len()
    }

    /// Reserve the next chunk if the window and declared size allow it.
    pub fn next_chunk(&mut self, window: usize) -> Option<i64> {
        let size_reached = self.size > 0 && self.offset >= self.size;
        if self.end_reached || size_reached || self.requests.len() >= window {
            return None;
        }
        let offset = self.offset;
        self.requests.push_back(ChunkSlot {
            offset,
            bytes: None,
        });
        self.offset += self.chunk_size;
        Some(offset)
    }

    /// Store a chunk and write every chunk that is now in order.
    ///
    /// # Errors
    /// Fails on an empty chunk for a file with a declared size, or when
    /// writing to disk fails.
    pub fn accept(&mut self, offset: i64, bytes: Vec<u8>) -> Result<ChunkState> {
        if bytes.is_empty() && self.size > 0 {
            return Err(AppError::api("Empty bytes received in file part."));
        }
        let Some(slot) = self.requests.iter_mut().find(|slot| slot.offset == offset) else {
            tracing::trace!(offset, "Ignoring chunk past the end of file");
            return Ok(ChunkState::Pending);
        };
        if bytes.is_empty() {
            self.end_reached = true;
        }
        slot.bytes = Some(bytes);

        while let Some(ready) = self.requests.front().and_then(|slot| slot.bytes.as_ref()) {
            let end_of_file = ready.is_empty();
            self.output.write_block(ready)?;
            self.requests.pop_front();
            if end_of_file {
                self.requests.clear();
                return Ok(ChunkState::Complete);
            }
        }
        if self.requests.is_empty() && self.size > 0 && self.offset >= self.size {
            return Ok(ChunkState::Complete);
        }
        Ok(ChunkState::Pending)
    }

    fn finish(mut self) -> Result<String> {
        self.output.close()?;
        Ok(self.relative_path)
    }
}

/// Runs one [`DownloadTransaction`] at a time against a request client.
#[derive(Debug, Clone)]
pub struct ChunkedDownloader {
    window: usize,
}

impl Default for ChunkedDownloader {
    fn default() -> Self {
        Self::new(FILE_REQUESTS_COUNT)
    }
}

impl ChunkedDownloader {
    #[must_use]
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
        }
    }

    #[must_use]
    pub const fn window(&self) -> usize {
        self.window
    }

    /// Drive a transfer to its end.
    ///
    /// Stops early with `Unavailable` when `skip` fires or the blob is
    /// gone, and with `Cancelled` when `cancel` fires. Outstanding chunk
    /// requests are dropped without waiting for them.
    ///
    /// # Errors
    /// Any remote error outside the unavailable class, a redirect answer,
    /// or a local write failure.
    pub async fn run(
        &mut self,
        client: &dyn RequestClient,
        takeout_id: u64,
        transfer_id: u64,
        mut transaction: DownloadTransaction,
        cancel: &CancellationToken,
        skip: &CancellationToken,
        on_progress: &mut (dyn FnMut(FileProgress) + Send),
    ) -> Result<DownloadOutcome> {
        let mut in_flight = FuturesUnordered::new();
        let mut retried = HashSet::new();
        loop {
            while let Some(offset) = transaction.next_chunk(self.window) {
                tracing::trace!(offset, path = transaction.relative_path(), "Requesting chunk");
                in_flight.push(request_chunk(
                    client,
                    takeout_id,
                    transaction.location().clone(),
                    offset,
                ));
            }

            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(AppError::Cancelled),
                () = skip.cancelled() => {
                    tracing::info!(path = transaction.relative_path(), "File skipped by request");
                    return Ok(DownloadOutcome::Unavailable);
                }
                next = in_flight.next() => next,
            };
            let Some((offset, sent, result)) = next else {
                return Err(AppError::invalid("Download stalled with no chunks in flight"));
            };

            let bytes = match result {
                Ok(Response::File {
                    part: FilePart::Bytes { bytes },
                }) => bytes,
                Ok(Response::File {
                    part: FilePart::CdnRedirect,
                }) => return Err(AppError::api("Cdn redirect is not supported.")),
                Ok(other) => {
                    return Err(AppError::api(format!(
                        "Unexpected {} response to a file request.",
                        other.shape()
                    )))
                }
                Err(error) => match classify_chunk_error(&error, transaction.location()) {
                    ChunkError::Unavailable => {
                        tracing::warn!(
                            path = transaction.relative_path(),
                            error = %error,
                            "File location unavailable"
                        );
                        return Ok(DownloadOutcome::Unavailable);
                    }
                    ChunkError::ReferenceExpired => {
                        // Each offset gets one retry with a fresh reference.
                        if !retried.insert(offset) {
                            tracing::warn!(
                                path = transaction.relative_path(),
                                offset,
                                "File reference rejected again after refresh"
                            );
                            return Ok(DownloadOutcome::Unavailable);
                        }
                        // Chunks sent before an earlier refresh only need a resend.
                        if sent == *transaction.location() {
                            let refreshed = tokio::select! {
                                biased;
                                () = cancel.cancelled() => return Err(AppError::Cancelled),
                                refreshed = refresh_location(client, takeout_id, &transaction) => refreshed?,
                            };
                            let Some(location) = refreshed else {
                                tracing::warn!(
                                    path = transaction.relative_path(),
                                    "File reference could not be refreshed"
                                );
                                return Ok(DownloadOutcome::Unavailable);
                            };
                            transaction.location = location;
                        }
                        tracing::debug!(offset, path = transaction.relative_path(), "Retrying chunk");
                        in_flight.push(request_chunk(
                            client,
                            takeout_id,
                            transaction.location().clone(),
                            offset,
                        ));
                        continue;
                    }
                    ChunkError::EmptyTakeoutFile => Vec::new(),
                    ChunkError::Fatal => return Err(AppError::Rpc(error)),
                },
            };

            let state = transaction.accept(offset, bytes)?;
            on_progress(FileProgress {
                transfer_id,
                relative_path: transaction.relative_path().to_string(),
                ready: transaction.ready(),
                total: transaction.size(),
            });
            if state == ChunkState::Complete {
                tracing::debug!(
                    path = transaction.relative_path(),
                    bytes = transaction.ready(),
                    "File downloaded"
                );
                return transaction.finish().map(DownloadOutcome::Completed);
            }
        }
    }
}

fn request_chunk(
    client: &dyn RequestClient,
    takeout_id: u64,
    location: FileLocation,
    offset: i64,
) -> impl Future<Output = (i64, FileLocation, std::result::Result<Response, RpcError>)> + Send + '_ {
    let request = Request::GetFile {
        location: location.clone(),
        offset,
        limit: FILE_CHUNK_SIZE,
    }
    .with_takeout(takeout_id);
    async move { (offset, location, client.send(request).await) }
}

/// Re-read the origin message and pick the transaction's blob out of it.
///
/// `Ok(None)` means the reference could not be refreshed and the file is
/// unavailable. A file without an origin message cannot be refreshed at all.
async fn refresh_location(
    client: &dyn RequestClient,
    takeout_id: u64,
    transaction: &DownloadTransaction,
) -> Result<Option<FileLocation>> {
    let Some(origin) = &transaction.origin else {
        return Err(AppError::api("FILE_REFERENCE error for non-message file."));
    };
    let mut request = Request::GetMessages {
        peer: origin.peer.clone(),
        ids: vec![origin.message_id],
    };
    // Channel messages are addressed by id alone.
    if !origin.peer.is_channel() {
        request = request.with_range(origin.split);
    }
    let page = match client.send(request.with_takeout(takeout_id)).await {
        Ok(Response::Messages { page }) => page,
        Ok(other) => {
            tracing::warn!(shape = other.shape(), "Unexpected answer to a message refresh");
            return Ok(None);
        }
        Err(error) => {
            tracing::warn!(error = %error, "Could not re-read message for a file reference");
            return Ok(None);
        }
    };
    Ok(find_refreshed(&page, origin.message_id, transaction.location()))
}

fn find_refreshed(page: &MessagesPage, message_id: i32, current: &FileLocation) -> Option<FileLocation> {
    page.page
        .items()
        .iter()
        .filter(|message| message.id == message_id)
        .flat_map(|message| [message.file(), message.media.thumb()])
        .flatten()
        .find_map(|file| {
            let mut location = current.clone();
            location.refresh_reference(&file.location).then_some(location)
        })
}

enum ChunkError {
    Unavailable,
    ReferenceExpired,
    EmptyTakeoutFile,
    Fatal,
}

fn classify_chunk_error(error: &RpcError, location: &FileLocation) -> ChunkError {
    if error.is_location_unavailable() {
        ChunkError::Unavailable
    } else if error.is_file_reference_expired() {
        ChunkError::ReferenceExpired
    } else if location.is_takeout() && error.kind == TAKEOUT_FILE_EMPTY {
        ChunkError::EmptyTakeoutFile
    } else {
        ChunkError::Fatal
    }
}

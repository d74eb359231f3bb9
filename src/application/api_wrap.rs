//! The export orchestrator.
//!
//! `ApiWrap` runs the startup counters, then serves each collection on
//! demand. Paged collections are pulled one slice at a time; the state of
//! the collection being paged lives in a single [`Stage`] slot, so at most
//! one is ever active. Every file referenced by a slice is decided
//! (cached, skipped or downloaded) before the slice is handed out.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::downloader::{ChunkedDownloader, DownloadOutcome, DownloadTransaction, FileProgress};
use super::file_cache::FileCache;
use super::output::{prepare_relative_path, OutputFile, Stats};
use super::pagination::{
    finalize_dialogs_info, DialogsCursor, LeftChannelsCursor, MessagesCursor, PaginationCursor,
    SplitTarget, TopPeersCursor, UserpicsCursor, USERPICS_SLICE_LIMIT,
};
use crate::domain::models::SERVER_MAX_MSG_ID;
use crate::domain::rpc::{FromResponse, MessagesPage, Page, TakeoutFlags};
use crate::domain::{
    AppError, ContactInfo, ContactsList, DialogInfo, DialogsInfo, ExportSettings, File,
    FileLocation, FileOrigin, InputPeer, MediaType, Message, MessageRange, MessagesSlice,
    PersonalInfo, Photo, Request, RequestClient, Result, RpcError, ServiceAction, Session,
    SessionsList, SkipReason, StartInfo, TimeId, TransferConfig, Types, User, UserpicsInfo,
    UserpicsSlice, WebSession,
};

const CHANNEL_PRIVATE: &str = "CHANNEL_PRIVATE";

/// Where the takeout data file is written.
pub const OTHER_DATA_PATH: &str = "lists/other_data.json";

/// A local write failure, reported apart from remote errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Receivers for the two failure streams. Each failure is sent once.
#[derive(Debug)]
pub struct ErrorStreams {
    pub remote: mpsc::UnboundedReceiver<RpcError>,
    pub local: mpsc::UnboundedReceiver<IoFailure>,
}

/// Cancellation and file skipping, usable while the orchestrator is busy.
#[derive(Clone)]
pub struct ExportHandle {
    client: Arc<dyn RequestClient>,
    takeout_id: Arc<AtomicU64>,
    cancel: CancellationToken,
    transfer: Arc<Mutex<Option<(u64, CancellationToken)>>>,
}

impl std::fmt::Debug for ExportHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportHandle")
            .field("takeout_id", &self.takeout_id)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl ExportHandle {
    fn new(client: Arc<dyn RequestClient>) -> Self {
        Self {
            client,
            takeout_id: Arc::new(AtomicU64::new(0)),
            cancel: CancellationToken::new(),
            transfer: Arc::new(Mutex::new(None)),
        }
    }

    fn takeout_id(&self) -> Option<u64> {
        match self.takeout_id.load(Ordering::Acquire) {
            0 => None,
            id => Some(id),
        }
    }

    fn set_takeout_id(&self, id: u64) {
        self.takeout_id.store(id, Ordering::Release);
    }

    fn begin_transfer(&self, transfer_id: u64) -> CancellationToken {
        let token = CancellationToken::new();
        *self.transfer.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((transfer_id, token.clone()));
        token
    }

    fn end_transfer(&self) {
        *self.transfer.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Abandon the transfer with this id. The file becomes unavailable.
    /// Returns false when that transfer is not the active one.
    pub fn skip_file(&self, transfer_id: u64) -> bool {
        let guard = self.transfer.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some((active, token)) if *active == transfer_id => {
                token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Stop everything now and close the takeout session without waiting.
    pub fn cancel_export_fast(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        let Some(takeout_id) = self.takeout_id() else {
            return;
        };
        let request = Request::FinishTakeoutSession { success: false }.with_takeout(takeout_id);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let client = self.client.clone();
                runtime.spawn(async move {
                    if let Err(error) = client.send(request).await {
                        tracing::debug!(error = %error, "Closing cancelled takeout session failed");
                    }
                });
            }
            Err(_) => tracing::warn!("No runtime to close the takeout session"),
        }
    }
}

/// Profile pictures being paged.
#[derive(Debug)]
struct UserpicsProcess {
    cursor: UserpicsCursor,
    /// The first slice, fetched together with the totals.
    pending: Option<UserpicsSlice>,
}

/// One dialog's history being paged, split by split.
#[derive(Debug)]
struct ChatProcess {
    dialog: DialogInfo,
    cursor: MessagesCursor,
    /// Next entry of `dialog.splits` to page.
    position: usize,
}

/// The collection currently being paged.
#[derive(Debug)]
enum Stage {
    Userpics(UserpicsProcess),
    Chat(ChatProcess),
}

impl Stage {
    const fn name(&self) -> &'static str {
        match self {
            Self::Userpics(_) => "userpics",
            Self::Chat(_) => "chat",
        }
    }
}

/// How one file is filtered by the media settings.
#[derive(Debug, Clone, Copy)]
struct FileFilter {
    media_type: Option<MediaType>,
    /// Profile pictures are only checked against the size cutoff.
    check_type: bool,
    size: i64,
    outside_window: bool,
}

/// Flags sent when opening the takeout session.
#[must_use]
pub fn takeout_flags(settings: &ExportSettings) -> TakeoutFlags {
    let types = settings.types;
    TakeoutFlags {
        contacts: types.contains(Types::CONTACTS),
        message_users: types.intersects(Types::PERSONAL_CHATS | Types::BOT_CHATS),
        message_chats: types.contains(Types::PRIVATE_GROUPS),
        message_megagroups: types.intersects(Types::GROUPS),
        message_channels: types.intersects(Types::CHANNELS),
        files: !settings.media.types.is_empty(),
        file_max_size: settings.media.size_limit,
    }
}

fn default_file_name(media_type: Option<MediaType>, id: i64, thumb: bool) -> String {
    let (folder, stem, extension) = match media_type {
        Some(MediaType::Photo) => ("photos", "photo", ".jpg"),
        Some(MediaType::Video) => ("video_files", "video", ".mp4"),
        Some(MediaType::VoiceMessage) => ("voice_messages", "audio", ".ogg"),
        Some(MediaType::VideoMessage) => ("round_video_messages", "file", ".mp4"),
        Some(MediaType::Sticker) => ("stickers", "sticker", ".webp"),
        Some(MediaType::Gif) => ("video_files", "animation", ".mp4"),
        Some(MediaType::File) | None => ("files", "file", ""),
    };
    if thumb {
        format!("{folder}/{stem}_{id}_thumb.jpg")
    } else {
        format!("{folder}/{stem}_{id}{extension}")
    }
}

/// Date of the single message a count request returned, if it has one.
fn first_date(page: &Page<Message>) -> Option<TimeId> {
    page.items()
        .first()
        .map(|message| message.date)
        .filter(|date| *date > 0)
}

fn is_channel_private(error: &AppError) -> bool {
    matches!(error, AppError::Rpc(rpc) if rpc.kind == CHANNEL_PRIVATE)
}

/// The export orchestrator.
pub struct ApiWrap {
    client: Arc<dyn RequestClient>,
    settings: ExportSettings,
    handle: ExportHandle,
    self_user: Option<User>,
    splits: Vec<MessageRange>,
    cache: FileCache,
    downloader: ChunkedDownloader,
    stage: Option<Stage>,
    left_channels: Option<LeftChannelsCursor>,
    remote_errors: mpsc::UnboundedSender<RpcError>,
    local_errors: mpsc::UnboundedSender<IoFailure>,
    error_streams: Option<ErrorStreams>,
    file_progress: Option<mpsc::UnboundedSender<FileProgress>>,
    stats: Option<Arc<Stats>>,
    stopped: bool,
    next_transfer_id: u64,
}

impl std::fmt::Debug for ApiWrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiWrap")
            .field("handle", &self.handle)
            .field("splits", &self.splits)
            .field("stage", &self.stage.as_ref().map(Stage::name))
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}

impl ApiWrap {
    #[must_use]
    pub fn new(client: Arc<dyn RequestClient>, settings: ExportSettings, transfer: &TransferConfig) -> Self {
        let (remote_errors, remote) = mpsc::unbounded_channel();
        let (local_errors, local) = mpsc::unbounded_channel();
        Self {
            handle: ExportHandle::new(client.clone()),
            client,
            settings,
            self_user: None,
            splits: Vec::new(),
            cache: FileCache::new(transfer.location_cache_size),
            downloader: ChunkedDownloader::new(transfer.chunk_window),
            stage: None,
            left_channels: None,
            remote_errors,
            local_errors,
            error_streams: Some(ErrorStreams { remote, local }),
            file_progress: None,
            stats: None,
            stopped: false,
            next_transfer_id: 1,
        }
    }

    /// Count downloaded files and bytes into the writer's stats.
    #[must_use]
    pub fn with_stats(mut self, stats: Arc<Stats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Report per-chunk progress of downloads.
    pub fn set_file_progress(&mut self, sender: mpsc::UnboundedSender<FileProgress>) {
        self.file_progress = Some(sender);
    }

    /// The failure streams; available once.
    pub fn error_streams(&mut self) -> Option<ErrorStreams> {
        self.error_streams.take()
    }

    #[must_use]
    pub fn handle(&self) -> ExportHandle {
        self.handle.clone()
    }

    #[must_use]
    pub const fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    #[must_use]
    pub fn splits(&self) -> &[MessageRange] {
        &self.splits
    }

    fn wrap(&self, request: Request) -> Request {
        match self.handle.takeout_id() {
            Some(id) => request.with_takeout(id),
            None => request,
        }
    }

    /// Send one request without reporting its failure.
    async fn send<T: FromResponse>(&self, request: Request) -> Result<T> {
        if self.handle.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        if self.stopped {
            return Err(AppError::invalid("Export stopped after an earlier failure"));
        }
        let request = self.wrap(request);
        tracing::debug!(request = ?request.inner(), "Sending request");
        let response = tokio::select! {
            biased;
            () = self.handle.cancel.cancelled() => return Err(AppError::Cancelled),
            response = self.client.send(request) => response?,
        };
        let shape = response.shape();
        T::from_response(response)
            .ok_or_else(|| AppError::api(format!("Unexpected {shape} response received.")))
    }

    /// Send one request; a failure stops the export.
    async fn request<T: FromResponse>(&mut self, request: Request) -> Result<T> {
        match self.send(request).await {
            Ok(value) => Ok(value),
            Err(error) => Err(self.fail(error)),
        }
    }

    /// Forward a failure once and stop issuing requests.
    fn fail(&mut self, error: AppError) -> AppError {
        if self.stopped || matches!(error, AppError::Cancelled) {
            return error;
        }
        self.stopped = true;
        self.stage = None;
        tracing::error!(kind = ?error.kind(), error = %error, "Export failed");
        match &error {
            AppError::Rpc(rpc) => {
                self.remote_errors.send(rpc.clone()).ok();
            }
            AppError::InvalidData { message } => {
                self.remote_errors.send(RpcError::api(message)).ok();
            }
            AppError::Io { message, path, .. } => {
                self.local_errors
                    .send(IoFailure {
                        path: path.clone(),
                        message: message.clone(),
                    })
                    .ok();
            }
            AppError::JsonParse { message, .. } => {
                self.local_errors
                    .send(IoFailure {
                        path: self.settings.path.clone(),
                        message: message.clone(),
                    })
                    .ok();
            }
            AppError::Config { .. } | AppError::Cancelled => {}
        }
        error
    }

    fn begin_stage(&mut self, stage: Stage) -> Result<()> {
        if let Some(active) = &self.stage {
            return Err(AppError::invalid(format!(
                "Cannot start {} while {} is in progress",
                stage.name(),
                active.name()
            )));
        }
        self.stage = Some(stage);
        Ok(())
    }

    /// Open the takeout session and run the startup counters.
    ///
    /// # Errors
    /// Invalid settings, or any remote failure.
    pub async fn start_export(&mut self) -> Result<StartInfo> {
        self.settings.validate()?;
        let users: Vec<User> = match self.send(Request::GetSelf).await {
            Ok(users) => users,
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(error) => {
                tracing::debug!(error = %error, "Self lookup failed");
                return Err(self.fail(AppError::api("Could not retrieve selfId")));
            }
        };
        let Some(user) = users.into_iter().next() else {
            return Err(self.fail(AppError::api("Could not retrieve selfId")));
        };
        self.self_user = Some(user);

        let flags = takeout_flags(&self.settings);
        let takeout_id: u64 = self.request(Request::InitTakeoutSession { flags }).await?;
        self.handle.set_takeout_id(takeout_id);
        tracing::info!(takeout_id, "Takeout session opened");

        let types = self.settings.types;
        let single_peer = self.settings.only_single_peer();
        let mut info = StartInfo::default();

        if types.contains(Types::USERPICS) && !single_peer {
            let page: Page<Photo> = self
                .request(Request::GetUserPhotos {
                    offset: 0,
                    max_id: 0,
                    limit: USERPICS_SLICE_LIMIT,
                })
                .await?;
            info.userpics_count = page.total();
        }

        if types.intersects(Types::ANY_CHATS) || single_peer {
            let ranges: Vec<MessageRange> = self.request(Request::GetSplitRanges).await?;
            self.splits = if ranges.is_empty() {
                vec![MessageRange::WHOLE]
            } else {
                ranges
            };
            info.dialogs_count = self.count_dialogs().await?;
        }

        if types.intersects(Types::GROUPS_CHANNELS) && !single_peer {
            let mut cursor = LeftChannelsCursor::new(self.splits.len(), types);
            if let Some(request) = cursor.next_request() {
                let page = self.request(request).await?;
                cursor.accept(page).map_err(|e| self.fail(e))?;
            }
            info.dialogs_count = info.dialogs_count.saturating_add(cursor.full_count());
            self.left_channels = Some(cursor);
        }

        tracing::info!(
            userpics = info.userpics_count,
            dialogs = info.dialogs_count,
            splits = self.splits.len(),
            "Export started"
        );
        Ok(info)
    }

    async fn count_dialogs(&mut self) -> Result<i32> {
        if let Some(peer) = &self.settings.single_peer {
            let count = if peer.is_channel() { 1 } else { self.splits.len() };
            return Ok(i32::try_from(count).unwrap_or(i32::MAX));
        }
        let first = if self.settings.use_only_last_split() {
            self.splits.len().saturating_sub(1)
        } else {
            0
        };
        let mut total = 0i32;
        for range in self.splits.clone().into_iter().skip(first) {
            let request = Request::GetDialogs {
                offset_date: 0,
                offset_id: 0,
                offset_peer: InputPeer::Empty,
                limit: 1,
            }
            .with_range(range);
            let page: Page<DialogInfo> = self.request(request).await?;
            if matches!(page, Page::NotModified) {
                return Err(self.fail(AppError::api("Unexpected dialogsNotModified received.")));
            }
            total = total.saturating_add(page.total());
        }
        Ok(total)
    }

    /// The account's own profile with its bio.
    ///
    /// # Errors
    /// Any remote failure.
    pub async fn request_personal_info(&mut self) -> Result<PersonalInfo> {
        let info: PersonalInfo = self.request(Request::GetFullSelf).await?;
        tracing::info!("Personal info loaded");
        Ok(info)
    }

    /// Start paging profile pictures and return their total.
    ///
    /// # Errors
    /// Another stage is active, or a remote or local failure.
    pub async fn request_userpics(&mut self) -> Result<UserpicsInfo> {
        self.begin_stage(Stage::Userpics(UserpicsProcess {
            cursor: UserpicsCursor::new(),
            pending: None,
        }))?;
        let Some(Stage::Userpics(mut process)) = self.stage.take() else {
            return Err(AppError::invalid("Userpics stage vanished"));
        };
        let page = self.load_userpics_page(&mut process).await?;
        let info = page.0.unwrap_or_default();
        process.pending = Some(page.1);
        self.stage = Some(Stage::Userpics(process));
        tracing::info!(count = info.count, "Userpics listing started");
        Ok(info)
    }

    async fn load_userpics_page(
        &mut self,
        process: &mut UserpicsProcess,
    ) -> Result<(Option<UserpicsInfo>, UserpicsSlice)> {
        let Some(request) = process.cursor.next_request() else {
            return Ok((None, UserpicsSlice::default()));
        };
        let page = self.request(request).await?;
        let mut page = process.cursor.accept(page).map_err(|e| self.fail(e))?;
        for photo in &mut page.slice.list {
            let filter = FileFilter {
                media_type: Some(MediaType::Photo),
                check_type: false,
                size: photo.image.file.size,
                outside_window: false,
            };
            let fallback = format!("photo_{}.jpg", photo.id);
            self.process_file_load(
                &mut photo.image.file,
                filter,
                None,
                "profile_pictures/",
                &fallback,
            )
            .await?;
        }
        tracing::debug!(
            photos = page.slice.list.len(),
            processed = process.cursor.processed(),
            "Userpics page loaded"
        );
        Ok((page.info, page.slice))
    }

    /// The next slice of profile pictures, or `None` when all were served.
    ///
    /// # Errors
    /// No userpics stage is active, or a remote or local failure.
    pub async fn next_userpics_slice(&mut self) -> Result<Option<UserpicsSlice>> {
        let Some(Stage::Userpics(mut process)) = self.stage.take() else {
            return Err(AppError::invalid("No userpics listing in progress"));
        };
        loop {
            let slice = match process.pending.take() {
                Some(slice) => slice,
                None if process.cursor.is_done() => return Ok(None),
                None => self.load_userpics_page(&mut process).await?.1,
            };
            if !slice.list.is_empty() {
                self.stage = Some(Stage::Userpics(process));
                return Ok(Some(slice));
            }
        }
    }

    /// Saved contacts followed by the top peers.
    ///
    /// # Errors
    /// Any remote failure.
    pub async fn request_contacts(&mut self) -> Result<ContactsList> {
        let list: Vec<ContactInfo> = self.request(Request::GetContacts).await?;
        let mut cursor = TopPeersCursor::new(ContactsList {
            list,
            ..ContactsList::default()
        });
        while let Some(request) = cursor.next_request() {
            let page = self.request(request).await?;
            cursor.accept(page).map_err(|e| self.fail(e))?;
        }
        let contacts = cursor.into_list();
        tracing::info!(
            contacts = contacts.list.len(),
            frequent = contacts.correspondents.len(),
            "Contacts loaded"
        );
        Ok(contacts)
    }

    /// App and web authorizations.
    ///
    /// # Errors
    /// Any remote failure.
    pub async fn request_sessions(&mut self) -> Result<SessionsList> {
        let list: Vec<Session> = self.request(Request::GetAuthorizations).await?;
        let web_list: Vec<WebSession> = self.request(Request::GetWebAuthorizations).await?;
        tracing::info!(sessions = list.len(), web = web_list.len(), "Sessions loaded");
        Ok(SessionsList { list, web_list })
    }

    /// Download the takeout data file, whose size is unknown.
    ///
    /// # Errors
    /// Any remote failure outside the unavailable class, or a write failure.
    pub async fn request_other_data(&mut self) -> Result<File> {
        let mut file = File {
            location: FileLocation::takeout(),
            suggested_path: OTHER_DATA_PATH.to_string(),
            ..File::default()
        };
        let relative_path = prepare_relative_path(&self.settings.path, OTHER_DATA_PATH);
        self.download(&mut file, relative_path, None).await?;
        tracing::info!(path = %file.relative_path, "Other data loaded");
        Ok(file)
    }

    /// Every dialog to export, with output paths assigned.
    ///
    /// # Errors
    /// Any remote failure.
    pub async fn request_dialogs_list(&mut self) -> Result<DialogsInfo> {
        let mut info = match self.settings.single_peer.clone() {
            Some(peer) => self.request_single_peer_dialog(peer).await?,
            None => self.request_all_dialogs().await?,
        };
        finalize_dialogs_info(&mut info, &self.settings);
        tracing::info!(chats = info.chats.len(), left = info.left.len(), "Dialogs listed");
        Ok(info)
    }

    async fn request_all_dialogs(&mut self) -> Result<DialogsInfo> {
        let mut cursor = DialogsCursor::new(
            self.splits.clone(),
            self.settings.types,
            self.settings.use_only_last_split(),
        );
        while let Some(request) = cursor.next_request() {
            let page = self.request(request).await?;
            cursor.accept(page).map_err(|e| self.fail(e))?;
            tracing::debug!(processed = cursor.processed(), "Dialogs page loaded");
        }
        let mut left = Vec::new();
        if let Some(mut cursor) = self.left_channels.take() {
            while let Some(request) = cursor.next_request() {
                let page = self.request(request).await?;
                cursor.accept(page).map_err(|e| self.fail(e))?;
            }
            left = cursor.into_left();
        }
        Ok(DialogsInfo {
            chats: cursor.into_chats(),
            left,
        })
    }

    /// Resolve the one peer directly; its splits are all known splits.
    async fn request_single_peer_dialog(&mut self, peer: InputPeer) -> Result<DialogsInfo> {
        let mut dialog: DialogInfo = self
            .request(Request::ResolvePeer { peer: peer.clone() })
            .await?;
        let splits_count = i32::try_from(self.splits.len()).unwrap_or(i32::MAX);
        dialog.splits.clear();
        dialog.messages_count_per_split.clear();
        if peer.is_channel() {
            let migrated: Option<DialogInfo> = self
                .request(Request::GetMigratedFrom {
                    channel: peer.clone(),
                })
                .await?;
            if let Some(from) = migrated {
                dialog.migrated_from_input = from.input;
                dialog.splits.extend(-splits_count..0);
            }
        }
        dialog.splits.extend(0..splits_count);
        dialog.messages_count_per_split = vec![0; dialog.splits.len()];
        Ok(DialogsInfo {
            chats: vec![dialog],
            left: Vec::new(),
        })
    }

    /// Count a dialog's messages per split and start paging its history.
    ///
    /// Returns the dialog with its counts filled in.
    ///
    /// # Errors
    /// Another stage is active, or a remote failure.
    pub async fn request_messages(&mut self, dialog: DialogInfo) -> Result<DialogInfo> {
        if let Some(active) = &self.stage {
            return Err(AppError::invalid(format!(
                "Cannot start chat while {} is in progress",
                active.name()
            )));
        }
        let mut process = ChatProcess {
            cursor: MessagesCursor::new(self.settings.message_order, dialog.only_my_messages),
            dialog,
            position: 0,
        };
        let splits = process.dialog.splits.clone();
        for (index, split) in splits.into_iter().enumerate() {
            let target = SplitTarget::resolve(&process.dialog, split, &self.splits)
                .ok_or_else(|| self.fail(AppError::invalid(format!("Unknown split {split}"))))?;
            process.cursor.begin_split(target);
            let count = self.count_split(&mut process.cursor).await?;
            if let Some(slot) = process.dialog.messages_count_per_split.get_mut(index) {
                *slot = count;
            }
        }
        process.cursor.reset();
        process.dialog.only_my_messages = process.cursor.only_my_messages();
        let dialog = process.dialog.clone();
        tracing::info!(
            dialog = %dialog.display_name(),
            messages = dialog.total_messages(),
            "Chat export started"
        );
        self.begin_stage(Stage::Chat(process))?;
        Ok(dialog)
    }

    /// Messages in the cursor's current split, honoring the date window.
    async fn count_split(&mut self, cursor: &mut MessagesCursor) -> Result<i32> {
        let newest = self.request_history(cursor, |c| c.edge_request(false)).await?;
        let count = newest.page.total();
        if count <= 0 {
            return Ok(0);
        }
        let (from, till) = (self.settings.single_peer_from, self.settings.single_peer_till);
        // The newest message must be strictly after `from`.
        if from > 0 && !first_date(&newest.page).is_some_and(|date| date > from) {
            return Ok(0);
        }
        if till > 0 {
            // And the oldest one strictly before `till`.
            let oldest = self.request_history(cursor, |c| c.edge_request(true)).await?;
            if !first_date(&oldest.page).is_some_and(|date| date < till) {
                return Ok(0);
            }
        }
        Ok(count)
    }

    /// Send a history request, retrying once with only own messages when
    /// a channel turns out to be private.
    async fn request_history(
        &mut self,
        cursor: &mut MessagesCursor,
        build: impl Fn(&mut MessagesCursor) -> Option<Request> + Send,
    ) -> Result<MessagesPage> {
        loop {
            let Some(request) = build(cursor) else {
                return Err(self.fail(AppError::invalid("History request out of order")));
            };
            match self.send(request).await {
                Ok(page) => return Ok(page),
                Err(error) if is_channel_private(&error) && cursor.switch_to_only_my_messages() => {
                    tracing::warn!("Channel is private, exporting only own messages");
                }
                Err(error) => return Err(self.fail(error)),
            }
        }
    }

    fn begin_next_split(&self, process: &mut ChatProcess) -> Option<SplitTarget> {
        while let Some(&split) = process.dialog.splits.get(process.position) {
            let count = process
                .dialog
                .messages_count_per_split
                .get(process.position)
                .copied()
                .unwrap_or(0);
            process.position += 1;
            if count <= 0 {
                tracing::debug!(split, "Skipping empty split");
                continue;
            }
            return SplitTarget::resolve(&process.dialog, split, &self.splits);
        }
        None
    }

    /// The next slice of the current dialog, or `None` once every split
    /// was paged.
    ///
    /// # Errors
    /// No chat stage is active, or a remote or local failure.
    pub async fn next_messages_slice(&mut self) -> Result<Option<MessagesSlice>> {
        let Some(Stage::Chat(mut process)) = self.stage.take() else {
            return Err(AppError::invalid("No chat export in progress"));
        };
        loop {
            if process.cursor.is_done() {
                let Some(target) = self.begin_next_split(&mut process) else {
                    tracing::debug!(dialog = %process.dialog.display_name(), "Chat export done");
                    return Ok(None);
                };
                process.cursor.begin_split(target);
            }
            let page = self
                .request_history(&mut process.cursor, |cursor| cursor.next_request())
                .await?;
            process.dialog.only_my_messages = process.cursor.only_my_messages();
            let mut slice = process.cursor.accept(page).map_err(|e| self.fail(e))?;
            if slice.list.is_empty() {
                continue;
            }
            let base = process.dialog.relative_path.clone();
            let target = process.cursor.target().cloned();
            self.process_message_files(&mut slice, &base, target.as_ref())
                .await?;
            tracing::debug!(messages = slice.list.len(), "Messages slice loaded");
            self.stage = Some(Stage::Chat(process));
            return Ok(Some(slice));
        }
    }

    async fn process_message_files(
        &mut self,
        slice: &mut MessagesSlice,
        base: &str,
        target: Option<&SplitTarget>,
    ) -> Result<()> {
        let (from, till) = (self.settings.single_peer_from, self.settings.single_peer_till);
        for message in &mut slice.list {
            let outside_window = message.outside_window(from, till);
            let origin = target.map(|target| FileOrigin {
                peer: target.peer.clone(),
                split: target.range,
                message_id: if target.migrated {
                    message.id + SERVER_MAX_MSG_ID
                } else {
                    message.id
                },
            });
            let media_type = if matches!(message.action, Some(ServiceAction::ChatEditPhoto { .. })) {
                Some(MediaType::Photo)
            } else {
                message.media.media_type()
            };
            let id = i64::from(message.id);
            let Some(file) = message.file_mut() else {
                continue;
            };
            let filter = FileFilter {
                media_type,
                check_type: true,
                size: file.size,
                outside_window,
            };
            let fallback = default_file_name(media_type, id, false);
            self.process_file_load(file, filter, origin.as_ref(), base, &fallback)
                .await?;
            if let Some(thumb) = message.media.thumb_mut() {
                let fallback = default_file_name(media_type, id, true);
                self.process_file_load(thumb, filter, origin.as_ref(), base, &fallback)
                    .await?;
            }
        }
        Ok(())
    }

    /// Decide one file: reuse, skip or download it.
    async fn process_file_load(
        &mut self,
        file: &mut File,
        filter: FileFilter,
        origin: Option<&FileOrigin>,
        base: &str,
        fallback: &str,
    ) -> Result<()> {
        if file.is_decided() {
            return Ok(());
        }
        if !file.location.is_valid() && file.content.is_empty() {
            file.skip_reason = Some(SkipReason::Unavailable);
            return Ok(());
        }
        if let Some(path) = self.cache.find(&file.location) {
            tracing::debug!(path, "File found in cache");
            file.relative_path = path.to_string();
            return Ok(());
        }
        let name = if file.suggested_path.is_empty() {
            fallback
        } else {
            file.suggested_path.as_str()
        };
        let suggested = format!("{base}{name}");
        if !file.content.is_empty() {
            return self.write_inline(file, &suggested);
        }
        let skip = if filter.outside_window {
            Some(SkipReason::DateLimits)
        } else if filter.check_type
            && filter
                .media_type
                .is_some_and(|media_type| !self.settings.media.types.contains(media_type.flag()))
        {
            Some(SkipReason::FileType)
        } else if filter.size > self.settings.media.limit_for(filter.media_type) {
            Some(SkipReason::FileSize)
        } else {
            None
        };
        if let Some(reason) = skip {
            tracing::debug!(?reason, path = %suggested, "File skipped");
            file.skip_reason = Some(reason);
            return Ok(());
        }
        let relative_path = prepare_relative_path(&self.settings.path, &suggested);
        self.download(file, relative_path, origin).await
    }

    fn write_inline(&mut self, file: &mut File, suggested: &str) -> Result<()> {
        let relative_path = prepare_relative_path(&self.settings.path, suggested);
        let mut output = OutputFile::new(self.settings.path.join(&relative_path), self.stats.clone());
        let written = output
            .write_block(&file.content)
            .and_then(|()| output.close());
        if let Err(error) = written {
            return Err(self.fail(error.into()));
        }
        file.relative_path = relative_path;
        Ok(())
    }

    async fn download(
        &mut self,
        file: &mut File,
        relative_path: String,
        origin: Option<&FileOrigin>,
    ) -> Result<()> {
        if self.handle.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        if self.stopped {
            return Err(AppError::invalid("Export stopped after an earlier failure"));
        }
        let Some(takeout_id) = self.handle.takeout_id() else {
            return Err(self.fail(AppError::invalid("Takeout session is not open")));
        };
        let transfer_id = self.next_transfer_id;
        self.next_transfer_id += 1;
        let skip = self.handle.begin_transfer(transfer_id);
        let transaction = DownloadTransaction::new(
            file.location.clone(),
            &self.settings.path,
            relative_path,
            file.size,
            self.stats.clone(),
        )
        .with_origin(origin.cloned());
        let progress = self.file_progress.clone();
        let mut on_progress = move |update: FileProgress| {
            if let Some(sender) = &progress {
                sender.send(update).ok();
            }
        };
        let outcome = self
            .downloader
            .run(
                self.client.as_ref(),
                takeout_id,
                transfer_id,
                transaction,
                &self.handle.cancel,
                &skip,
                &mut on_progress,
            )
            .await;
        self.handle.end_transfer();
        match outcome {
            Ok(DownloadOutcome::Completed(path)) => {
                self.cache.save(&file.location, &path);
                file.relative_path = path;
                Ok(())
            }
            Ok(DownloadOutcome::Unavailable) => {
                file.skip_reason = Some(SkipReason::Unavailable);
                Ok(())
            }
            Err(error) => Err(self.fail(error)),
        }
    }

    /// Close the takeout session successfully.
    ///
    /// # Errors
    /// Any remote failure.
    pub async fn finish_export(&mut self) -> Result<()> {
        self.stage = None;
        self.request::<()>(Request::FinishTakeoutSession { success: true })
            .await?;
        tracing::info!("Takeout session finished");
        Ok(())
    }

    /// Abandon the transfer with this id; see [`ExportHandle::skip_file`].
    pub fn skip_file(&self, transfer_id: u64) -> bool {
        self.handle.skip_file(transfer_id)
    }

    /// Cancel without waiting for the server and drop the active stage.
    pub fn cancel_export_fast(&mut self) {
        self.handle.cancel_export_fast();
        self.stage = None;
    }
}

//! The export driver.
//!
//! Pulls every selected collection out of [`ApiWrap`] and feeds it to the
//! output writer in protocol order, reporting progress as [`ExportEvent`]s.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use super::api_wrap::{ApiWrap, ExportHandle};
use super::downloader::FileProgress;
use super::output::{create_writer, Environment, OutputWriter, WriteResult};
use crate::domain::{
    AppError, DialogInfo, ExportEvent, ExportProgressSnapshot, ExportSettings, FinishStats,
    ProgressStage, RequestClient, Result, TransferConfig, Types,
};

/// Owns the orchestrator and the writer for one export.
pub struct ExportController {
    api: ApiWrap,
    writer: Box<dyn OutputWriter>,
    settings: ExportSettings,
    environment: Environment,
    events: mpsc::UnboundedSender<ExportEvent>,
    file_progress: mpsc::UnboundedReceiver<FileProgress>,
    snapshot: ExportProgressSnapshot,
    /// Last reported transfer and how many of its bytes were counted.
    last_transfer: (u64, i64),
}

impl ExportController {
    /// Build a controller and the receiving end of its event stream.
    #[must_use]
    pub fn new(
        client: Arc<dyn RequestClient>,
        settings: ExportSettings,
        transfer: &TransferConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ExportEvent>) {
        let environment = Environment::new(settings.path.clone());
        let mut api = ApiWrap::new(client, settings.clone(), transfer)
            .with_stats(environment.stats.clone());
        let (progress_tx, file_progress) = mpsc::unbounded_channel();
        api.set_file_progress(progress_tx);
        let (events, receiver) = mpsc::unbounded_channel();
        let controller = Self {
            api,
            writer: create_writer(settings.format),
            settings,
            environment,
            events,
            file_progress,
            snapshot: ExportProgressSnapshot::default(),
            last_transfer: (0, 0),
        };
        (controller, receiver)
    }

    /// Cancellation and file skipping while the export runs.
    #[must_use]
    pub fn handle(&self) -> ExportHandle {
        self.api.handle()
    }

    /// Run the export to its end and emit the terminal event.
    ///
    /// # Errors
    /// The error that stopped the export; it was also sent as an event.
    pub async fn run(mut self) -> Result<PathBuf> {
        match self.export().await {
            Ok(path) => {
                let stats = FinishStats {
                    files_count: self.environment.stats.files_count(),
                    bytes_count: self.environment.stats.bytes_count(),
                };
                tracing::info!(
                    path = %path.display(),
                    files = stats.files_count,
                    bytes = stats.bytes_count,
                    "Export finished"
                );
                self.emit(ExportEvent::Finished {
                    path: path.clone(),
                    stats,
                });
                Ok(path)
            }
            Err(error) => {
                if matches!(error, AppError::Cancelled) {
                    tracing::info!("Export cancelled");
                } else {
                    tracing::error!(kind = ?error.kind(), error = %error, "Export stopped");
                }
                self.emit(ExportEvent::from_error(&error));
                Err(error)
            }
        }
    }

    fn emit(&self, event: ExportEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("Event receiver dropped");
        }
    }

    fn push_progress(&mut self) {
        while let Ok(update) = self.file_progress.try_recv() {
            let (transfer, counted) = self.last_transfer;
            let already = if transfer == update.transfer_id { counted } else { 0 };
            self.snapshot.downloaded_bytes += (update.ready - already).max(0);
            self.snapshot.current_file = Some(update.relative_path);
            self.last_transfer = (update.transfer_id, update.ready);
        }
        self.snapshot.files_written = self.environment.stats.files_count();
        self.snapshot.bytes_written = self.environment.stats.bytes_count();
        self.emit(ExportEvent::Progress(self.snapshot.clone()));
    }

    fn set_stage(&mut self, stage: ProgressStage) {
        tracing::info!(?stage, "Export stage");
        self.snapshot.stage = stage;
        self.snapshot.current_file = None;
        self.push_progress();
    }

    /// Writer failures abort the export; the kind is logged.
    fn check(result: WriteResult) -> Result<()> {
        result.map_err(|error| {
            tracing::error!(
                fatal = error.is_fatal(),
                path = %error.path().display(),
                error = %error,
                "Output writer failed"
            );
            AppError::from(error)
        })
    }

    async fn export(&mut self) -> Result<PathBuf> {
        let info = self.api.start_export().await?;
        self.snapshot.userpics_count = info.userpics_count;
        self.snapshot.dialogs_count = info.dialogs_count;
        self.emit(ExportEvent::Started(info));
        Self::check(self.writer.start(&self.settings, &self.environment))?;

        let types = self.settings.types;
        let single_peer = self.settings.only_single_peer();
        if !single_peer {
            if types.contains(Types::PERSONAL_INFO) {
                self.set_stage(ProgressStage::PersonalInfo);
                let personal = self.api.request_personal_info().await?;
                Self::check(self.writer.write_personal(&personal))?;
            }
            if types.contains(Types::USERPICS) {
                self.export_userpics().await?;
            }
            if types.contains(Types::CONTACTS) {
                self.set_stage(ProgressStage::Contacts);
                let contacts = self.api.request_contacts().await?;
                Self::check(self.writer.write_contacts_list(&contacts))?;
            }
            if types.contains(Types::SESSIONS) {
                self.set_stage(ProgressStage::Sessions);
                let sessions = self.api.request_sessions().await?;
                Self::check(self.writer.write_sessions_list(&sessions))?;
            }
            if types.contains(Types::OTHER_DATA) {
                self.set_stage(ProgressStage::OtherData);
                let file = self.api.request_other_data().await?;
                Self::check(self.writer.write_other_data(&file))?;
            }
        }
        if types.intersects(Types::ANY_CHATS) || single_peer {
            self.export_dialogs().await?;
        }

        self.set_stage(ProgressStage::Finishing);
        self.api.finish_export().await?;
        Self::check(self.writer.finish())?;
        Ok(self.writer.main_file_path())
    }

    async fn export_userpics(&mut self) -> Result<()> {
        self.set_stage(ProgressStage::Userpics);
        let info = self.api.request_userpics().await?;
        Self::check(self.writer.write_userpics_start(&info))?;
        while let Some(slice) = self.api.next_userpics_slice().await? {
            let count = i32::try_from(slice.list.len()).unwrap_or(i32::MAX);
            Self::check(self.writer.write_userpics_slice(&slice))?;
            self.snapshot.processed_userpics = self.snapshot.processed_userpics.saturating_add(count);
            self.push_progress();
        }
        Self::check(self.writer.write_userpics_end())
    }

    async fn export_dialogs(&mut self) -> Result<()> {
        self.set_stage(ProgressStage::Chats);
        let dialogs = self.api.request_dialogs_list().await?;
        Self::check(self.writer.write_dialogs_start(&dialogs))?;
        for dialog in dialogs.chats {
            self.export_dialog(dialog).await?;
        }
        if !dialogs.left.is_empty() {
            self.set_stage(ProgressStage::LeftChannels);
        }
        for dialog in dialogs.left {
            self.export_dialog(dialog).await?;
        }
        Self::check(self.writer.write_dialogs_end())
    }

    async fn export_dialog(&mut self, dialog: DialogInfo) -> Result<()> {
        let dialog = self.api.request_messages(dialog).await?;
        Self::check(self.writer.write_dialog_start(&dialog))?;
        self.snapshot.processed_messages = 0;
        while let Some(slice) = self.api.next_messages_slice().await? {
            let count = i64::try_from(slice.list.len()).unwrap_or(i64::MAX);
            Self::check(self.writer.write_dialog_slice(slice))?;
            self.snapshot.processed_messages += count;
            self.push_progress();
        }
        Self::check(self.writer.write_dialog_end())?;
        self.snapshot.processed_dialogs = self.snapshot.processed_dialogs.saturating_add(1);
        self.push_progress();
        Ok(())
    }
}

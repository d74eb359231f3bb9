//! Console formatting for settings, progress and results.

use std::path::Path;

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};

use crate::domain::format::format_file_size;
use crate::domain::{
    ErrorKind, ExportProgressSnapshot, ExportSettings, FinishStats, ProgressStage, StartInfo,
    TransferConfig,
};

fn join_labels(labels: &[&str]) -> String {
    if labels.is_empty() {
        "-".to_string()
    } else {
        labels.join(", ")
    }
}

fn stage_label(stage: ProgressStage) -> &'static str {
    match stage {
        ProgressStage::Initializing => "Initializing",
        ProgressStage::PersonalInfo => "Personal info",
        ProgressStage::Userpics => "Profile pictures",
        ProgressStage::Contacts => "Contacts",
        ProgressStage::Sessions => "Sessions",
        ProgressStage::OtherData => "Other data",
        ProgressStage::Chats => "Chats",
        ProgressStage::LeftChannels => "Left channels",
        ProgressStage::Finishing => "Finishing",
    }
}

/// Formats the effective settings as a two-column table.
pub fn format_settings_table(settings: &ExportSettings, transfer: &TransferConfig) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Setting", "Value"]);

    let size_limit = format_file_size(settings.media.size_limit);
    let rows = [
        ("Output", settings.path.display().to_string()),
        ("Format", settings.format.to_string()),
        ("Types", join_labels(&settings.types.labels())),
        ("Full chats", join_labels(&settings.full_chats.labels())),
        ("Media", join_labels(&settings.media.types.labels())),
        ("Size limit", size_limit),
        ("Order", format!("{:?}", settings.message_order)),
        ("Chunk window", transfer.chunk_window.to_string()),
    ];
    for (name, value) in &rows {
        table.add_row(vec![*name, value.as_str()]);
    }
    for (media_type, limit) in &settings.media.type_limits {
        table.add_row(vec![
            format!("Size limit ({media_type:?})"),
            format_file_size(*limit),
        ]);
    }
    if let Some(peer) = &settings.single_peer {
        table.add_row(vec!["Single peer".to_string(), format!("{peer:?}")]);
    }

    table.to_string()
}

/// One status line for a progress snapshot.
pub fn format_progress(snapshot: &ExportProgressSnapshot) -> String {
    let mut line = format!("{:<16}", stage_label(snapshot.stage));
    match snapshot.stage {
        ProgressStage::Userpics => {
            line.push_str(&format!(
                " {}/{}",
                snapshot.processed_userpics, snapshot.userpics_count
            ));
        }
        ProgressStage::Chats | ProgressStage::LeftChannels => {
            line.push_str(&format!(
                " {}/{} chats, {} messages",
                snapshot.processed_dialogs, snapshot.dialogs_count, snapshot.processed_messages
            ));
        }
        _ => {}
    }
    if let Some(file) = &snapshot.current_file {
        line.push_str(&format!(" [{file}]"));
    }
    line
}

/// Counters announced once the session is open.
pub fn format_start(info: &StartInfo) -> String {
    format!(
        "{} {} profile pictures, {} chats",
        "▶ Export started:".bold(),
        info.userpics_count.to_string().cyan(),
        info.dialogs_count.to_string().cyan()
    )
}

/// Formats the final statistics for display.
pub fn format_stats(stats: &FinishStats, path: &Path) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Files written", "Bytes written", "Open"]);
    table.add_row(vec![
        stats.files_count.to_string(),
        format_file_size(i64::try_from(stats.bytes_count).unwrap_or(i64::MAX)),
        path.display().to_string(),
    ]);
    format!("{}\n{table}", "📊 Export complete".bold())
}

/// Headline for a terminal error, naming where the failure happened.
pub fn format_failure(kind: ErrorKind, detail: &str, path: Option<&Path>) -> String {
    let label = match kind {
        ErrorKind::Remote => "Server error:",
        ErrorKind::Local => "Write error:",
        ErrorKind::Setup => "Configuration error:",
        ErrorKind::Cancelled => "Cancelled:",
    };
    match path {
        Some(path) => format!("{} {detail}\n  at {}", label.red().bold(), path.display()),
        None => format!("{} {detail}", label.red().bold()),
    }
}

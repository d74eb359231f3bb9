//! Plain-text writer: one append-only file per collection.

use std::path::PathBuf;

use super::describe::{action_text, media_summary, peer_name, sender_name, FileSummary};
use super::{Environment, OutputFile, OutputWriter, WriteResult};
use crate::domain::format::{format_date_time, format_phone_number, messages_count_text};
use crate::domain::{
    ContactsList, DialogInfo, DialogsInfo, ExportSettings, File, Message, MessagesSlice,
    OutputFormat, PersonalInfo, SessionsList, TopPeer, UserpicsInfo, UserpicsSlice,
};

const SUMMARY_FILE: &str = "export_results.txt";
const MESSAGES_FILE: &str = "messages.txt";

#[derive(Debug, Default)]
pub struct TextWriter {
    environment: Environment,
    single_peer: bool,
    summary: Option<OutputFile>,
    userpics: Option<OutputFile>,
    userpics_count: i32,
    chat: Option<OutputFile>,
}

fn write(file: &mut OutputFile, text: &str) -> WriteResult {
    file.write_block(text.as_bytes())
}

fn field(out: &mut String, label: &str, value: &str) {
    if !value.is_empty() {
        out.push_str(&format!("{label}: {value}\n"));
    }
}

fn top_peers_block(out: &mut String, title: &str, list: &[TopPeer]) {
    if list.is_empty() {
        return;
    }
    out.push_str(&format!("{title}\n\n"));
    for top in list {
        out.push_str(&format!("{} (rating {:.2})\n", top.peer.name(), top.rating));
    }
    out.push('\n');
}

/// Text block for one message.
fn message_text(slice: &MessagesSlice, message: &Message) -> String {
    let date = format_date_time(message.date);
    if let Some(action) = &message.action {
        let mut out = format!("[{date}] {}\n", action_text(&slice.peers, message, action));
        if let Some(file) = message.file() {
            out.push_str(&format!("{}\n", FileSummary::of(file, "Photo").text()));
        }
        out.push('\n');
        return out;
    }

    let mut out = format!("{}, [{date}]", sender_name(&slice.peers, message));
    if message.edited > 0 {
        out.push_str(&format!(" (edited {})", format_date_time(message.edited)));
    }
    out.push('\n');
    if message.forwarded {
        let origin = message.forwarded_from_id.map_or_else(
            || message.forwarded_from_name.clone(),
            |id| peer_name(&slice.peers, id),
        );
        out.push_str(&format!("Forwarded from {origin}\n"));
    }
    if message.reply_to_msg_id != 0 {
        out.push_str(&format!("In reply to message #{}\n", message.reply_to_msg_id));
    }
    if message.via_bot_id != 0 {
        out.push_str(&format!(
            "via {}\n",
            peer_name(&slice.peers, crate::domain::PeerId::user(message.via_bot_id))
        ));
    }
    if let Some(media) = media_summary(&message.media) {
        match &media.file {
            Some(file) => out.push_str(&format!("{}: {}\n", media.title, file.text())),
            None => out.push_str(&format!("{}\n", media.title)),
        }
        for detail in &media.details {
            out.push_str(&format!("  {detail}\n"));
        }
    }
    let text = message.plain_text();
    if !text.is_empty() {
        out.push_str(&text);
        out.push('\n');
    }
    out.push('\n');
    out
}

impl TextWriter {
    fn summary_line(&mut self, text: &str) -> WriteResult {
        match self.summary.as_mut() {
            Some(summary) => write(summary, text),
            None => Ok(()),
        }
    }

    fn write_list(&self, relative_path: &str, content: &str) -> WriteResult {
        let mut file = self.environment.file(relative_path);
        write(&mut file, content)?;
        file.close()
    }

    fn chats_list(title: &str, list: &[DialogInfo]) -> String {
        let mut out = format!("{title}\n\n");
        for dialog in list {
            out.push_str(&format!("Name: {}\n", dialog.display_name()));
            out.push_str(&format!("Type: {}\n", dialog.dialog_type.key()));
            out.push_str(&format!(
                "Content: {}{MESSAGES_FILE} ({})\n\n",
                dialog.relative_path,
                messages_count_text(dialog.total_messages(), dialog.only_my_messages)
            ));
        }
        out
    }
}

impl OutputWriter for TextWriter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Text
    }

    fn start(&mut self, settings: &ExportSettings, environment: &Environment) -> WriteResult {
        self.environment = environment.clone();
        self.single_peer = settings.only_single_peer();
        if !self.single_peer {
            let mut summary = self.environment.file(SUMMARY_FILE);
            write(&mut summary, "Exported Data\n\n")?;
            self.summary = Some(summary);
        }
        Ok(())
    }

    fn write_personal(&mut self, data: &PersonalInfo) -> WriteResult {
        let info = &data.user.info;
        let mut out = String::from("Personal information\n\n");
        field(&mut out, "First name", &info.first_name);
        field(&mut out, "Last name", &info.last_name);
        field(&mut out, "Phone number", &format_phone_number(&info.phone_number));
        if !data.user.username.is_empty() {
            field(&mut out, "Username", &format!("@{}", data.user.username));
        }
        field(&mut out, "Bio", &data.bio);
        out.push('\n');
        self.summary_line(&out)
    }

    fn write_userpics_start(&mut self, data: &UserpicsInfo) -> WriteResult {
        self.userpics_count = data.count;
        if data.count > 0 {
            self.userpics = Some(self.environment.file("lists/profile_pictures.txt"));
        }
        Ok(())
    }

    fn write_userpics_slice(&mut self, data: &UserpicsSlice) -> WriteResult {
        let Some(file) = self.userpics.as_mut() else {
            return Ok(());
        };
        let mut out = String::new();
        for photo in &data.list {
            out.push_str(&format!(
                "{}\n{}\n\n",
                format_date_time(photo.date),
                FileSummary::of(&photo.image.file, "Photo").text()
            ));
        }
        write(file, &out)
    }

    fn write_userpics_end(&mut self) -> WriteResult {
        if let Some(mut file) = self.userpics.take() {
            file.close()?;
            let line = format!(
                "Profile pictures - {}\nlists/profile_pictures.txt\n\n",
                self.userpics_count
            );
            self.summary_line(&line)?;
        }
        Ok(())
    }

    fn write_contacts_list(&mut self, data: &ContactsList) -> WriteResult {
        let mut contacts = String::from("Contacts\n\n");
        for contact in &data.list {
            let name = contact.full_name();
            contacts.push_str(&format!(
                "{}\n{}\nAdded: {}\n\n",
                if name.is_empty() { "(deleted user)" } else { &name },
                format_phone_number(&contact.phone_number),
                format_date_time(contact.date)
            ));
        }
        self.write_list("lists/contacts.txt", &contacts)?;
        self.summary_line(&format!(
            "Contacts - {}\nlists/contacts.txt\n\n",
            data.list.len()
        ))?;

        let mut frequent = String::new();
        top_peers_block(&mut frequent, "People", &data.correspondents);
        top_peers_block(&mut frequent, "Inline bots", &data.inline_bots);
        top_peers_block(&mut frequent, "Calls", &data.phone_calls);
        if !frequent.is_empty() {
            self.write_list("lists/frequent.txt", &frequent)?;
            self.summary_line("Frequent contacts\nlists/frequent.txt\n\n")?;
        }
        Ok(())
    }

    fn write_sessions_list(&mut self, data: &SessionsList) -> WriteResult {
        let mut sessions = String::from("Active sessions\n\n");
        for session in &data.list {
            sessions.push_str(&format!(
                "{} {}\n{} {}, {}\n{} - {} {}\nCreated: {}\nLast active: {}\n\n",
                session.application_name,
                session.application_version,
                session.device_model,
                session.platform,
                session.system_version,
                session.ip,
                session.country,
                session.region,
                format_date_time(session.created),
                format_date_time(session.last_active)
            ));
        }
        self.write_list("lists/sessions.txt", &sessions)?;
        self.summary_line(&format!(
            "Sessions - {}\nlists/sessions.txt\n\n",
            data.list.len()
        ))?;

        if !data.web_list.is_empty() {
            let mut web = String::from("Web sessions\n\n");
            for session in &data.web_list {
                web.push_str(&format!(
                    "{} ({})\n{} {}\n{} - {}\nCreated: {}\nLast active: {}\n\n",
                    session.domain,
                    session.bot_username,
                    session.browser,
                    session.platform,
                    session.ip,
                    session.region,
                    format_date_time(session.created),
                    format_date_time(session.last_active)
                ));
            }
            self.write_list("lists/web_sessions.txt", &web)?;
            self.summary_line(&format!(
                "Web sessions - {}\nlists/web_sessions.txt\n\n",
                data.web_list.len()
            ))?;
        }
        Ok(())
    }

    fn write_other_data(&mut self, data: &File) -> WriteResult {
        let line = format!(
            "Other data\n{}\n\n",
            FileSummary::of(data, "Other data").text()
        );
        self.summary_line(&line)
    }

    fn write_dialogs_start(&mut self, data: &DialogsInfo) -> WriteResult {
        if self.single_peer {
            return Ok(());
        }
        if !data.chats.is_empty() {
            self.write_list("lists/chats.txt", &Self::chats_list("Chats", &data.chats))?;
            self.summary_line(&format!(
                "Chats - {}\nlists/chats.txt\n\n",
                data.chats.len()
            ))?;
        }
        if !data.left.is_empty() {
            self.write_list(
                "lists/left_chats.txt",
                &Self::chats_list("Left chats", &data.left),
            )?;
            self.summary_line(&format!(
                "Left chats - {}\nlists/left_chats.txt\n\n",
                data.left.len()
            ))?;
        }
        Ok(())
    }

    fn write_dialog_start(&mut self, data: &DialogInfo) -> WriteResult {
        let mut file = self
            .environment
            .file(&format!("{}{MESSAGES_FILE}", data.relative_path));
        write(
            &mut file,
            &format!(
                "{}\nType: {}\n\n",
                data.display_name(),
                data.dialog_type.key()
            ),
        )?;
        self.chat = Some(file);
        Ok(())
    }

    fn write_dialog_slice(&mut self, data: MessagesSlice) -> WriteResult {
        let Some(file) = self.chat.as_mut() else {
            return Ok(());
        };
        let out: String = data
            .list
            .iter()
            .map(|message| message_text(&data, message))
            .collect();
        write(file, &out)
    }

    fn write_dialog_end(&mut self) -> WriteResult {
        match self.chat.take() {
            Some(mut file) => file.close(),
            None => Ok(()),
        }
    }

    fn write_dialogs_end(&mut self) -> WriteResult {
        Ok(())
    }

    fn finish(&mut self) -> WriteResult {
        match self.summary.take() {
            Some(mut summary) => summary.close(),
            None => Ok(()),
        }
    }

    fn main_file_path(&self) -> PathBuf {
        let name = if self.single_peer {
            MESSAGES_FILE
        } else {
            SUMMARY_FILE
        };
        self.environment.root.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ContactInfo, DialogType, InputPeer, Peer, PeerId, SkipReason, TextPart, User,
    };
    use std::fs;
    use tempfile::tempdir;

    fn dialog() -> DialogInfo {
        DialogInfo {
            dialog_type: DialogType::Personal,
            name: "Alice".into(),
            peer_id: PeerId::user(7),
            relative_path: "chats/chat_1/".into(),
            messages_count_per_split: vec![2],
            splits: vec![0],
            ..DialogInfo::default()
        }
    }

    fn slice() -> MessagesSlice {
        let alice = User {
            bare_id: 7,
            info: ContactInfo {
                first_name: "Alice".into(),
                ..ContactInfo::default()
            },
            ..User::default()
        };
        let messages = vec![
            Message {
                id: 2,
                date: 1_600_000_100,
                from_id: Some(PeerId::user(7)),
                peer_id: PeerId::user(7),
                reply_to_msg_id: 1,
                text: vec![TextPart::plain("second")],
                ..Message::default()
            },
            Message {
                id: 1,
                date: 1_600_000_000,
                from_id: Some(PeerId::user(7)),
                peer_id: PeerId::user(7),
                text: vec![TextPart::plain("first")],
                ..Message::default()
            },
        ];
        MessagesSlice {
            list: messages,
            peers: [(PeerId::user(7), Peer::User(alice))].into_iter().collect(),
        }
    }

    #[test]
    fn test_full_sequence_writes_summary_lists_and_chat() {
        let dir = tempdir().unwrap();
        let environment = Environment::new(dir.path());
        let settings = ExportSettings {
            path: dir.path().to_path_buf(),
            ..ExportSettings::default()
        };
        let mut writer = TextWriter::default();
        writer.start(&settings, &environment).unwrap();
        writer
            .write_personal(&PersonalInfo {
                user: User {
                    info: ContactInfo {
                        first_name: "Me".into(),
                        phone_number: "15551234567".into(),
                        ..ContactInfo::default()
                    },
                    username: "me".into(),
                    ..User::default()
                },
                bio: "Hello".into(),
            })
            .unwrap();
        writer
            .write_userpics_start(&UserpicsInfo { count: 0 })
            .unwrap();
        writer.write_userpics_end().unwrap();
        writer
            .write_contacts_list(&ContactsList::default())
            .unwrap();
        writer
            .write_sessions_list(&SessionsList::default())
            .unwrap();
        let info = DialogsInfo {
            chats: vec![dialog()],
            left: vec![],
        };
        writer.write_dialogs_start(&info).unwrap();
        writer.write_dialog_start(&info.chats[0]).unwrap();
        writer.write_dialog_slice(slice()).unwrap();
        writer.write_dialog_end().unwrap();
        writer.write_dialogs_end().unwrap();
        writer.finish().unwrap();

        let summary = fs::read_to_string(dir.path().join(SUMMARY_FILE)).unwrap();
        assert!(summary.contains("First name: Me"));
        assert!(summary.contains("Username: @me"));
        assert!(summary.contains("Chats - 1\nlists/chats.txt"));
        assert!(!summary.contains("Profile pictures"));

        let chats = fs::read_to_string(dir.path().join("lists/chats.txt")).unwrap();
        assert!(chats.contains("Content: chats/chat_1/messages.txt (2 messages)"));

        let chat = fs::read_to_string(dir.path().join("chats/chat_1/messages.txt")).unwrap();
        assert!(chat.starts_with("Alice\nType: personal_chat\n\n"));
        let second = chat.find("second").unwrap();
        let first = chat.find("first").unwrap();
        assert!(second < first);
        assert!(chat.contains("In reply to message #1"));
        assert_eq!(writer.main_file_path(), dir.path().join(SUMMARY_FILE));
        assert_eq!(environment.stats.files_count(), 5);
    }

    #[test]
    fn test_single_peer_writes_chat_at_root() {
        let dir = tempdir().unwrap();
        let environment = Environment::new(dir.path());
        let settings = ExportSettings {
            path: dir.path().to_path_buf(),
            single_peer: Some(InputPeer::User {
                user_id: 7,
                access_hash: 1,
            }),
            ..ExportSettings::default()
        };
        let mut writer = TextWriter::default();
        writer.start(&settings, &environment).unwrap();
        let mut single = dialog();
        single.relative_path = String::new();
        writer
            .write_dialogs_start(&DialogsInfo {
                chats: vec![single.clone()],
                left: vec![],
            })
            .unwrap();
        writer.write_dialog_start(&single).unwrap();
        writer.write_dialog_slice(slice()).unwrap();
        writer.write_dialog_end().unwrap();
        writer.finish().unwrap();

        assert!(!dir.path().join(SUMMARY_FILE).exists());
        assert!(!dir.path().join("lists").exists());
        assert!(dir.path().join(MESSAGES_FILE).exists());
        assert_eq!(writer.main_file_path(), dir.path().join(MESSAGES_FILE));
    }

    #[test]
    fn test_skipped_media_placeholder() {
        let mut data = slice();
        data.list[0].media = crate::domain::Media {
            content: crate::domain::MediaContent::Photo(crate::domain::Photo {
                image: crate::domain::Image {
                    file: File {
                        skip_reason: Some(SkipReason::FileSize),
                        ..File::default()
                    },
                    ..crate::domain::Image::default()
                },
                ..crate::domain::Photo::default()
            }),
            ttl: 0,
        };
        let text = message_text(&data, &data.list[0]);
        assert!(text.contains("Photo: (Photo exceeds maximum size."));
    }
}

//! HTML writer: a summary page, list pages and paged chat histories.

use std::fmt::Write as _;
use std::path::PathBuf;

use super::describe::{action_text, media_summary, peer_name, sender_name, FileSummary};
use super::{Environment, OutputFile, OutputWriter, WriteResult, MESSAGES_IN_FILE};
use crate::domain::format::{
    day_of, format_date_text, format_date_time, format_phone_number, messages_count_text,
};
use crate::domain::{
    ContactsList, DialogInfo, DialogsInfo, ExportSettings, File, Message, MessagesSlice,
    OutputFormat, PeerId, PersonalInfo, SessionsList, TextPartType, TopPeer, UserpicsInfo,
    UserpicsSlice,
};

const SUMMARY_FILE: &str = "export_results.html";
const STYLE_FILE: &str = "css/style.css";

const STYLE: &str = "body { margin: 0; font: 12px/18px 'Open Sans', Arial, sans-serif; }
.page_wrap { background: #fff; min-height: 100vh; }
.page_header { position: sticky; top: 0; background: #fff; border-bottom: 1px solid #e3e6e8; }
.page_header .content { padding: 12px 20px; font-weight: bold; }
.page_body { padding: 10px 20px; }
.section { display: block; padding: 10px 0; color: #168acd; text-decoration: none; }
.section .counter { color: #999; margin-left: 8px; }
.entry { padding: 8px 0; border-bottom: 1px solid #f0f0f0; }
.message { padding: 6px 0; }
.message.service { text-align: center; color: #999; }
.message .from_name { color: #3892db; font-weight: bold; }
.message .date { color: #999; float: right; }
.message .reply_to, .message .forwarded { color: #777; }
.media { color: #555; }
.pagination { display: block; padding: 10px 0; text-align: center; }
.date_separator { text-align: center; color: #999; padding: 10px 0; }
.empty { color: #999; text-align: center; padding: 20px; }
";

/// Escape text for use in element content and attribute values.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '\n' => out.push_str("<br>"),
            _ => out.push(ch),
        }
    }
    out
}

/// Link from a page in `base_dir` to a path relative to the output root.
fn relative_to(base_dir: &str, target: &str) -> String {
    if let Some(inside) = target.strip_prefix(base_dir) {
        return inside.to_string();
    }
    let depth = base_dir.matches('/').count();
    format!("{}{target}", "../".repeat(depth))
}

fn file_name(index: usize) -> String {
    if index <= 1 {
        "messages.html".to_string()
    } else {
        format!("messages{index}.html")
    }
}

fn page_start(title: &str, base_dir: &str, back: Option<&str>) -> String {
    let style = relative_to(base_dir, STYLE_FILE);
    let header = match back {
        Some(back) => format!(
            "<a href=\"{}\">&larr;</a> {}",
            escape(&relative_to(base_dir, back)),
            escape(title)
        ),
        None => escape(title),
    };
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\"/>\n<title>{}</title>\n\
<meta content=\"width=device-width, initial-scale=1.0\" name=\"viewport\"/>\n\
<link href=\"{style}\" rel=\"stylesheet\"/>\n</head>\n<body>\n<div class=\"page_wrap\">\n\
<div class=\"page_header\"><div class=\"content\">{header}</div></div>\n\
<div class=\"page_body\">\n",
        escape(title)
    )
}

const PAGE_END: &str = "</div>\n</div>\n</body>\n</html>\n";

fn file_html(summary: &FileSummary, base_dir: &str) -> String {
    match summary {
        FileSummary::Path(path) => format!(
            "<a href=\"{}\">{}</a>",
            escape(&relative_to(base_dir, path)),
            escape(path)
        ),
        FileSummary::Missing(text) => escape(text),
    }
}

/// A line on the summary page.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Section {
    priority: u8,
    title: &'static str,
    path: String,
    count: usize,
}

/// The chat currently being written.
#[derive(Debug)]
struct ChatState {
    dialog: DialogInfo,
    file: OutputFile,
    file_index: usize,
    in_file: usize,
    messages_count: usize,
    /// Smallest and largest message id in each written file.
    ranges: Vec<Option<(i32, i32)>>,
    last_day: Option<chrono::NaiveDate>,
}

impl ChatState {
    fn note_id(&mut self, id: i32) {
        if let Some(slot) = self.ranges.get_mut(self.file_index - 1) {
            *slot = Some(slot.map_or((id, id), |(min, max)| (min.min(id), max.max(id))));
        }
    }

    /// Link target for a reply to message `id`.
    fn reply_link(&self, id: i32) -> String {
        let anchor = format!("#go_to_message{id}");
        let earlier = self.ranges[..self.file_index - 1]
            .iter()
            .position(|range| range.is_some_and(|(min, max)| (min..=max).contains(&id)));
        match earlier {
            Some(position) => format!("{}{anchor}", file_name(position + 1)),
            None => anchor,
        }
    }
}

#[derive(Debug, Default)]
pub struct HtmlWriter {
    environment: Environment,
    single_peer: bool,
    personal: Option<PersonalInfo>,
    personal_block: String,
    userpic: Option<FileSummary>,
    userpics: Option<OutputFile>,
    userpics_count: usize,
    sections: Vec<Section>,
    chat: Option<ChatState>,
}

impl HtmlWriter {
    fn write_page(&mut self, relative_path: &str, title: &str, body: &str) -> WriteResult {
        let base_dir = relative_path
            .rfind('/')
            .map_or("", |slash| &relative_path[..=slash]);
        let mut file = self.environment.file(relative_path);
        let back = (!self.single_peer).then_some(SUMMARY_FILE);
        let content = format!("{}{body}{PAGE_END}", page_start(title, base_dir, back));
        file.write_block(content.as_bytes())?;
        file.close()
    }

    fn add_section(&mut self, priority: u8, title: &'static str, path: &str, count: usize) {
        self.sections.push(Section {
            priority,
            title,
            path: path.to_string(),
            count,
        });
    }

    /// Render the personal block once the first userpic is known.
    fn flush_personal(&mut self) {
        let Some(data) = self.personal.take() else {
            return;
        };
        let info = &data.user.info;
        let mut out = String::from("<div class=\"personal_info\">\n");
        if let Some(userpic) = &self.userpic {
            let _ = writeln!(out, "<div class=\"userpic\">{}</div>", file_html(userpic, ""));
        }
        let name = info.full_name();
        let _ = writeln!(out, "<div class=\"name\">{}</div>", escape(&name));
        for (label, value) in [
            ("Phone number", format_phone_number(&info.phone_number)),
            (
                "Username",
                if data.user.username.is_empty() {
                    String::new()
                } else {
                    format!("@{}", data.user.username)
                },
            ),
            ("Bio", data.bio.clone()),
        ] {
            if !value.is_empty() {
                let _ = writeln!(
                    out,
                    "<div class=\"entry\"><b>{label}</b>: {}</div>",
                    escape(&value)
                );
            }
        }
        out.push_str("</div>\n");
        self.personal_block = out;
    }

    fn chats_page(list: &[DialogInfo]) -> String {
        let mut out = String::new();
        for dialog in list {
            let _ = writeln!(
                out,
                "<a class=\"entry\" href=\"{}\"><div class=\"name\">{}</div>\
<div class=\"details\">{}</div></a>",
                escape(&relative_to("lists/", &format!("{}messages.html", dialog.relative_path))),
                escape(&dialog.display_name()),
                messages_count_text(dialog.total_messages(), dialog.only_my_messages)
            );
        }
        out
    }

    fn top_peers_html(out: &mut String, title: &str, list: &[TopPeer]) {
        if list.is_empty() {
            return;
        }
        let _ = writeln!(out, "<h3>{title}</h3>");
        for top in list {
            let _ = writeln!(
                out,
                "<div class=\"entry\">{} <span class=\"counter\">{:.2}</span></div>",
                escape(&top.peer.name()),
                top.rating
            );
        }
    }

    fn message_html(chat: &mut ChatState, slice: &MessagesSlice, message: &Message) -> String {
        let base_dir = chat.dialog.relative_path.clone();
        let mut out = String::new();
        let day = day_of(message.date);
        if day.is_some() && day != chat.last_day {
            chat.last_day = day;
            let _ = writeln!(
                out,
                "<div class=\"date_separator\">{}</div>",
                format_date_text(message.date)
            );
        }
        let date = format_date_time(message.date);

        if let Some(action) = &message.action {
            let _ = write!(
                out,
                "<div class=\"message service\" id=\"go_to_message{}\">{}",
                message.id,
                escape(&action_text(&slice.peers, message, action))
            );
            if let Some(file) = message.file() {
                let _ = write!(
                    out,
                    "<div class=\"media\">{}</div>",
                    file_html(&FileSummary::of(file, "Photo"), &base_dir)
                );
            }
            out.push_str("</div>\n");
            return out;
        }

        let _ = write!(
            out,
            "<div class=\"message\" id=\"go_to_message{}\"><div class=\"date\" title=\"{date}\">{}</div>\
<div class=\"from_name\">{}</div>",
            message.id,
            date.get(11..16).unwrap_or(date.as_str()),
            escape(&sender_name(&slice.peers, message))
        );
        if message.forwarded {
            let origin = message.forwarded_from_id.map_or_else(
                || message.forwarded_from_name.clone(),
                |id| peer_name(&slice.peers, id),
            );
            let _ = write!(
                out,
                "<div class=\"forwarded\">Forwarded from {}</div>",
                escape(&origin)
            );
        }
        if message.reply_to_msg_id != 0 {
            let _ = write!(
                out,
                "<div class=\"reply_to\">In reply to <a href=\"{}\">this message</a></div>",
                chat.reply_link(message.reply_to_msg_id)
            );
        }
        if message.via_bot_id != 0 {
            let _ = write!(
                out,
                "<div class=\"via_bot\">via {}</div>",
                escape(&peer_name(&slice.peers, PeerId::user(message.via_bot_id)))
            );
        }
        if let Some(media) = media_summary(&message.media) {
            let _ = write!(out, "<div class=\"media\"><b>{}</b>", media.title);
            if let Some(file) = &media.file {
                let _ = write!(out, " {}", file_html(file, &base_dir));
            }
            for detail in &media.details {
                let _ = write!(out, "<div class=\"details\">{}</div>", escape(detail));
            }
            out.push_str("</div>");
        }
        if !message.text.is_empty() {
            out.push_str("<div class=\"text\">");
            for part in &message.text {
                let text = escape(&part.text);
                match part.part_type {
                    TextPartType::Bold => {
                        let _ = write!(out, "<strong>{text}</strong>");
                    }
                    TextPartType::Italic => {
                        let _ = write!(out, "<em>{text}</em>");
                    }
                    TextPartType::Code => {
                        let _ = write!(out, "<code>{text}</code>");
                    }
                    TextPartType::Pre => {
                        let _ = write!(out, "<pre>{text}</pre>");
                    }
                    TextPartType::Underline => {
                        let _ = write!(out, "<u>{text}</u>");
                    }
                    TextPartType::Strike => {
                        let _ = write!(out, "<s>{text}</s>");
                    }
                    TextPartType::Blockquote => {
                        let _ = write!(out, "<blockquote>{text}</blockquote>");
                    }
                    TextPartType::TextUrl => {
                        let _ = write!(out, "<a href=\"{}\">{text}</a>", escape(&part.additional));
                    }
                    TextPartType::Url => {
                        let _ = write!(out, "<a href=\"{text}\">{text}</a>");
                    }
                    TextPartType::Email => {
                        let _ = write!(out, "<a href=\"mailto:{text}\">{text}</a>");
                    }
                    _ => out.push_str(&text),
                }
            }
            out.push_str("</div>");
        }
        out.push_str("</div>\n");
        out
    }

    fn open_chat_file(&self, dialog: &DialogInfo, index: usize) -> Result<OutputFile, super::OutputError> {
        let mut file = self
            .environment
            .file(&format!("{}{}", dialog.relative_path, file_name(index)));
        let back = (!self.single_peer).then_some("lists/chats.html");
        let mut head = page_start(&dialog.display_name(), &dialog.relative_path, back);
        if index > 1 {
            let _ = writeln!(
                head,
                "<a class=\"pagination\" href=\"{}\">Previous messages</a>",
                file_name(index - 1)
            );
        }
        file.write_block(head.as_bytes())?;
        Ok(file)
    }

    fn close_chat_file(file: &mut OutputFile, next: Option<String>) -> WriteResult {
        let mut tail = String::new();
        if let Some(next) = next {
            let _ = writeln!(tail, "<a class=\"pagination\" href=\"{next}\">Next messages</a>");
        }
        tail.push_str(PAGE_END);
        file.write_block(tail.as_bytes())?;
        file.close()
    }

    fn rotate(&mut self) -> WriteResult {
        let Some(mut chat) = self.chat.take() else {
            return Ok(());
        };
        let next_index = chat.file_index + 1;
        Self::close_chat_file(&mut chat.file, Some(file_name(next_index)))?;
        chat.file = self.open_chat_file(&chat.dialog, next_index)?;
        chat.file_index = next_index;
        chat.in_file = 0;
        chat.ranges.push(None);
        chat.last_day = None;
        self.chat = Some(chat);
        Ok(())
    }
}

impl OutputWriter for HtmlWriter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Html
    }

    fn start(&mut self, settings: &ExportSettings, environment: &Environment) -> WriteResult {
        self.environment = environment.clone();
        self.single_peer = settings.only_single_peer();
        let mut style = self.environment.file(STYLE_FILE);
        style.write_block(STYLE.as_bytes())?;
        style.close()
    }

    fn write_personal(&mut self, data: &PersonalInfo) -> WriteResult {
        self.personal = Some(data.clone());
        Ok(())
    }

    fn write_userpics_start(&mut self, data: &UserpicsInfo) -> WriteResult {
        self.userpics_count = usize::try_from(data.count).unwrap_or(0);
        if self.userpics_count == 0 {
            self.flush_personal();
            return Ok(());
        }
        let mut file = self.environment.file("lists/profile_pictures.html");
        let back = (!self.single_peer).then_some(SUMMARY_FILE);
        file.write_block(page_start("Profile pictures", "lists/", back).as_bytes())?;
        self.userpics = Some(file);
        Ok(())
    }

    fn write_userpics_slice(&mut self, data: &UserpicsSlice) -> WriteResult {
        if self.userpic.is_none() {
            if let Some(first) = data.list.first() {
                self.userpic = Some(FileSummary::of(&first.image.file, "Photo"));
                self.flush_personal();
            }
        }
        let Some(file) = self.userpics.as_mut() else {
            return Ok(());
        };
        let mut out = String::new();
        for photo in &data.list {
            let _ = writeln!(
                out,
                "<div class=\"entry\">{}<div class=\"details\">{}</div></div>",
                file_html(&FileSummary::of(&photo.image.file, "Photo"), "lists/"),
                format_date_time(photo.date)
            );
        }
        file.write_block(out.as_bytes())
    }

    fn write_userpics_end(&mut self) -> WriteResult {
        self.flush_personal();
        if let Some(mut file) = self.userpics.take() {
            file.write_block(PAGE_END.as_bytes())?;
            file.close()?;
            let count = self.userpics_count;
            self.add_section(2, "Profile pictures", "lists/profile_pictures.html", count);
        }
        Ok(())
    }

    fn write_contacts_list(&mut self, data: &ContactsList) -> WriteResult {
        self.flush_personal();
        let mut body = String::new();
        for contact in &data.list {
            let name = contact.full_name();
            let _ = writeln!(
                body,
                "<div class=\"entry\"><div class=\"name\">{}</div><div class=\"details\">{}</div></div>",
                escape(if name.is_empty() { "Deleted Account" } else { &name }),
                escape(&format_phone_number(&contact.phone_number))
            );
        }
        self.write_page("lists/contacts.html", "Contacts", &body)?;
        self.add_section(3, "Contacts", "lists/contacts.html", data.list.len());

        let mut frequent = String::new();
        Self::top_peers_html(&mut frequent, "People", &data.correspondents);
        Self::top_peers_html(&mut frequent, "Inline bots", &data.inline_bots);
        Self::top_peers_html(&mut frequent, "Calls", &data.phone_calls);
        if !frequent.is_empty() {
            let count = data.correspondents.len() + data.inline_bots.len() + data.phone_calls.len();
            self.write_page("lists/frequent.html", "Frequent contacts", &frequent)?;
            self.add_section(4, "Frequent contacts", "lists/frequent.html", count);
        }
        Ok(())
    }

    fn write_sessions_list(&mut self, data: &SessionsList) -> WriteResult {
        self.flush_personal();
        let mut body = String::new();
        for session in &data.list {
            let _ = writeln!(
                body,
                "<div class=\"entry\"><div class=\"name\">{} {}</div>\
<div class=\"details\">{}, {} {}</div><div class=\"details\">{} - {}</div>\
<div class=\"details\">Last active: {}</div></div>",
                escape(&session.application_name),
                escape(&session.application_version),
                escape(&session.device_model),
                escape(&session.platform),
                escape(&session.system_version),
                escape(&session.ip),
                escape(&session.country),
                format_date_time(session.last_active)
            );
        }
        self.write_page("lists/sessions.html", "Sessions", &body)?;
        self.add_section(5, "Sessions", "lists/sessions.html", data.list.len());

        if !data.web_list.is_empty() {
            let mut web = String::new();
            for session in &data.web_list {
                let _ = writeln!(
                    web,
                    "<div class=\"entry\"><div class=\"name\">{}</div>\
<div class=\"details\">{} {}</div><div class=\"details\">Last active: {}</div></div>",
                    escape(&session.domain),
                    escape(&session.browser),
                    escape(&session.platform),
                    format_date_time(session.last_active)
                );
            }
            self.write_page("lists/web_sessions.html", "Web sessions", &web)?;
            self.add_section(6, "Web sessions", "lists/web_sessions.html", data.web_list.len());
        }
        Ok(())
    }

    fn write_other_data(&mut self, data: &File) -> WriteResult {
        self.flush_personal();
        if !data.relative_path.is_empty() {
            self.add_section(7, "Other data", &data.relative_path, 0);
        }
        Ok(())
    }

    fn write_dialogs_start(&mut self, data: &DialogsInfo) -> WriteResult {
        self.flush_personal();
        if self.single_peer {
            return Ok(());
        }
        if !data.chats.is_empty() {
            self.write_page("lists/chats.html", "Chats", &Self::chats_page(&data.chats))?;
            self.add_section(0, "Chats", "lists/chats.html", data.chats.len());
        }
        if !data.left.is_empty() {
            self.write_page("lists/left_chats.html", "Left chats", &Self::chats_page(&data.left))?;
            self.add_section(1, "Left chats", "lists/left_chats.html", data.left.len());
        }
        Ok(())
    }

    fn write_dialog_start(&mut self, data: &DialogInfo) -> WriteResult {
        let file = self.open_chat_file(data, 1)?;
        self.chat = Some(ChatState {
            dialog: data.clone(),
            file,
            file_index: 1,
            in_file: 0,
            messages_count: 0,
            ranges: vec![None],
            last_day: None,
        });
        Ok(())
    }

    fn write_dialog_slice(&mut self, data: MessagesSlice) -> WriteResult {
        for message in &data.list {
            if self
                .chat
                .as_ref()
                .is_some_and(|chat| chat.in_file >= MESSAGES_IN_FILE)
            {
                self.rotate()?;
            }
            let Some(chat) = self.chat.as_mut() else {
                return Ok(());
            };
            chat.note_id(message.id);
            let html = Self::message_html(chat, &data, message);
            chat.file.write_block(html.as_bytes())?;
            chat.in_file += 1;
            chat.messages_count += 1;
        }
        Ok(())
    }

    fn write_dialog_end(&mut self) -> WriteResult {
        let Some(mut chat) = self.chat.take() else {
            return Ok(());
        };
        if chat.messages_count == 0 {
            chat.file
                .write_block(b"<div class=\"empty\">No exported messages</div>\n")?;
        }
        Self::close_chat_file(&mut chat.file, None)
    }

    fn write_dialogs_end(&mut self) -> WriteResult {
        Ok(())
    }

    fn finish(&mut self) -> WriteResult {
        self.flush_personal();
        if self.single_peer {
            return Ok(());
        }
        let mut sections = std::mem::take(&mut self.sections);
        sections.sort_by_key(|section| section.priority);
        let mut body = std::mem::take(&mut self.personal_block);
        for section in &sections {
            let counter = if section.count > 0 {
                format!("<span class=\"counter\">{}</span>", section.count)
            } else {
                String::new()
            };
            let _ = writeln!(
                body,
                "<a class=\"section\" href=\"{}\">{}{counter}</a>",
                escape(&section.path),
                section.title
            );
        }
        let mut file = self.environment.file(SUMMARY_FILE);
        let content = format!("{}{body}{PAGE_END}", page_start("Exported Data", "", None));
        file.write_block(content.as_bytes())?;
        file.close()
    }

    fn main_file_path(&self) -> PathBuf {
        let name = if self.single_peer {
            "messages.html"
        } else {
            SUMMARY_FILE
        };
        self.environment.root.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ContactInfo, DialogType, Image, InputPeer, Photo, TextPart, User};
    use std::fs;
    use tempfile::tempdir;

    fn dialog() -> DialogInfo {
        DialogInfo {
            dialog_type: DialogType::PrivateGroup,
            name: "Team".into(),
            peer_id: PeerId::chat(4),
            relative_path: "chats/chat_1/".into(),
            splits: vec![0],
            messages_count_per_split: vec![3],
            only_my_messages: true,
            ..DialogInfo::default()
        }
    }

    fn messages(ids: impl Iterator<Item = i32>) -> MessagesSlice {
        MessagesSlice {
            list: ids
                .map(|id| Message {
                    id,
                    date: 1_600_000_000 + i64::from(id) * 60,
                    peer_id: PeerId::chat(4),
                    from_id: Some(PeerId::user(1)),
                    reply_to_msg_id: if id > 1 { id - 1 } else { 0 },
                    text: vec![TextPart::plain(format!("<msg {id}>"))],
                    ..Message::default()
                })
                .collect(),
            peers: Default::default(),
        }
    }

    fn start(dir: &std::path::Path, single_peer: Option<InputPeer>) -> (HtmlWriter, Environment) {
        let environment = Environment::new(dir);
        let settings = ExportSettings {
            path: dir.to_path_buf(),
            single_peer,
            ..ExportSettings::default()
        };
        let mut writer = HtmlWriter::default();
        writer.start(&settings, &environment).unwrap();
        (writer, environment)
    }

    #[test]
    fn test_personal_info_waits_for_first_userpic() {
        let dir = tempdir().unwrap();
        let (mut writer, _) = start(dir.path(), None);
        writer
            .write_personal(&PersonalInfo {
                user: User {
                    info: ContactInfo {
                        first_name: "Me".into(),
                        ..ContactInfo::default()
                    },
                    ..User::default()
                },
                bio: String::new(),
            })
            .unwrap();
        assert!(writer.personal_block.is_empty());
        writer
            .write_userpics_start(&UserpicsInfo { count: 1 })
            .unwrap();
        assert!(writer.personal_block.is_empty());
        writer
            .write_userpics_slice(&UserpicsSlice {
                list: vec![Photo {
                    image: Image {
                        file: File {
                            relative_path: "profile_pictures/photo_1.jpg".into(),
                            ..File::default()
                        },
                        ..Image::default()
                    },
                    ..Photo::default()
                }],
            })
            .unwrap();
        assert!(writer.personal_block.contains("profile_pictures/photo_1.jpg"));
        writer.write_userpics_end().unwrap();
        writer.write_contacts_list(&ContactsList::default()).unwrap();
        writer.finish().unwrap();

        let summary = fs::read_to_string(dir.path().join(SUMMARY_FILE)).unwrap();
        let contacts = summary.find("lists/contacts.html").unwrap();
        let pictures = summary.find("lists/profile_pictures.html").unwrap();
        assert!(pictures < contacts);
        assert!(summary.contains("<div class=\"name\">Me</div>"));
        assert!(dir.path().join(STYLE_FILE).exists());
    }

    #[test]
    fn test_chat_pages_split_and_link() {
        let dir = tempdir().unwrap();
        let (mut writer, _) = start(dir.path(), None);
        let chat = dialog();
        writer
            .write_dialogs_start(&DialogsInfo {
                chats: vec![chat.clone()],
                left: vec![],
            })
            .unwrap();
        writer.write_dialog_start(&chat).unwrap();
        let total = i32::try_from(MESSAGES_IN_FILE).unwrap() + 2;
        writer.write_dialog_slice(messages(1..=total)).unwrap();
        writer.write_dialog_end().unwrap();
        writer.finish().unwrap();

        let first = fs::read_to_string(dir.path().join("chats/chat_1/messages.html")).unwrap();
        assert!(first.contains("href=\"messages2.html\">Next messages"));
        assert!(!first.contains("Previous messages"));
        assert!(first.contains("&lt;msg 1&gt;"));
        assert!(first.contains("../../css/style.css"));

        let second = fs::read_to_string(dir.path().join("chats/chat_1/messages2.html")).unwrap();
        assert!(second.contains("href=\"messages.html\">Previous messages"));
        // Message 1001 replies to 1000, which lives in the first file.
        assert!(second.contains("href=\"messages.html#go_to_message1000\""));
        // Message 1002 replies to 1001 on the same page.
        assert!(second.contains("href=\"#go_to_message1001\""));

        let chats = fs::read_to_string(dir.path().join("lists/chats.html")).unwrap();
        assert!(chats.contains("3 outgoing messages"));
        assert!(chats.contains("href=\"../chats/chat_1/messages.html\""));
    }

    #[test]
    fn test_single_peer_empty_chat() {
        let dir = tempdir().unwrap();
        let (mut writer, _) = start(dir.path(), Some(InputPeer::Chat { chat_id: 4 }));
        let mut chat = dialog();
        chat.relative_path = String::new();
        writer
            .write_dialogs_start(&DialogsInfo {
                chats: vec![chat.clone()],
                left: vec![],
            })
            .unwrap();
        writer.write_dialog_start(&chat).unwrap();
        writer.write_dialog_end().unwrap();
        writer.finish().unwrap();

        let page = fs::read_to_string(dir.path().join("messages.html")).unwrap();
        assert!(page.contains("No exported messages"));
        assert!(!dir.path().join(SUMMARY_FILE).exists());
        assert!(!dir.path().join("lists").exists());
    }

    #[test]
    fn test_relative_links() {
        assert_eq!(relative_to("chats/chat_1/", "chats/chat_1/photos/a.jpg"), "photos/a.jpg");
        assert_eq!(relative_to("lists/", "profile_pictures/a.jpg"), "../profile_pictures/a.jpg");
        assert_eq!(relative_to("", "css/style.css"), "css/style.css");
        assert_eq!(escape("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
    }
}

//! JSON writer: a streamed `result.json` index plus chat files.
//!
//! The index is appended section by section as the export progresses, so
//! it is only valid JSON once `finish` has run. Chat files hold at most
//! [`MESSAGES_IN_FILE`] messages each and link to their neighbours.

use std::path::PathBuf;

use serde_json::{json, Map, Value};

use super::describe::FileSummary;
use super::{Environment, OutputError, OutputFile, OutputWriter, WriteResult, MESSAGES_IN_FILE};
use crate::domain::format::format_iso;
use crate::domain::{
    ContactInfo, ContactsList, DialogInfo, DialogsInfo, DocumentKind, ExportSettings, File,
    MediaContent, Message, MessagesSlice, OutputFormat, Peer, PeerId, PersonalInfo, Photo,
    SessionsList, TextPartType, TopPeer, UserpicsInfo, UserpicsSlice,
};

const INDEX_FILE: &str = "result.json";

const ABOUT: &str = "Here is the data you requested. Remember: we don't use your data for \
ad targeting, don't sell it to anyone, and don't share it with anyone except for our partners \
that handle the data for us.";

fn file_name(index: usize) -> String {
    if index <= 1 {
        "messages.json".to_string()
    } else {
        format!("messages{index}.json")
    }
}

/// `user123`, `chat45`, `channel67`.
fn peer_id_string(id: PeerId) -> String {
    let prefix = if id.is_channel() {
        "channel"
    } else if id.is_chat() {
        "chat"
    } else {
        "user"
    };
    format!("{prefix}{}", id.bare())
}

fn indented(path: &std::path::Path, value: &Value, depth: usize) -> Result<String, OutputError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| OutputError::encoding(path, e))?;
    Ok(text.replace('\n', &format!("\n{}", " ".repeat(depth))))
}

fn file_value(file: &File, what: &str) -> Value {
    Value::String(FileSummary::of(file, what).text().to_string())
}

fn contact_value(contact: &ContactInfo) -> Value {
    json!({
        "user_id": contact.user_id,
        "first_name": contact.first_name,
        "last_name": contact.last_name,
        "phone_number": contact.phone_number,
        "date": format_iso(contact.date),
        "date_unixtime": contact.date.to_string(),
    })
}

fn top_peer_value(top: &TopPeer) -> Value {
    let category = match &top.peer {
        Peer::User(user) if user.is_bot => "bot",
        Peer::User(_) => "user",
        Peer::Chat(chat) if chat.is_broadcast => "channel",
        Peer::Chat(_) => "group",
    };
    json!({
        "id": peer_id_string(top.peer.id()),
        "category": category,
        "name": top.peer.name(),
        "rating": top.rating,
    })
}

fn photo_value(photo: &Photo) -> Value {
    json!({
        "date": format_iso(photo.date),
        "date_unixtime": photo.date.to_string(),
        "photo": file_value(&photo.image.file, "Photo"),
    })
}

fn text_entities(message: &Message) -> Value {
    message
        .text
        .iter()
        .map(|part| {
            let mut entity = Map::new();
            let kind = serde_json::to_value(part.part_type).unwrap_or(Value::Null);
            entity.insert("type".into(), kind);
            entity.insert("text".into(), Value::String(part.text.clone()));
            if !part.additional.is_empty() {
                let key = match part.part_type {
                    TextPartType::TextUrl => "href",
                    TextPartType::MentionName => "user_id",
                    TextPartType::Pre => "language",
                    _ => "additional",
                };
                entity.insert(key.into(), Value::String(part.additional.clone()));
            }
            Value::Object(entity)
        })
        .collect()
}

fn media_fields(message: &Message, out: &mut Map<String, Value>) {
    match &message.media.content {
        MediaContent::None | MediaContent::Unsupported => {}
        MediaContent::Photo(photo) => {
            out.insert("photo".into(), file_value(&photo.image.file, "Photo"));
            out.insert("width".into(), photo.image.width.into());
            out.insert("height".into(), photo.image.height.into());
        }
        MediaContent::Document(document) => {
            out.insert("file".into(), file_value(&document.file, "File"));
            if document.thumb.file.location.is_valid() {
                out.insert("thumbnail".into(), file_value(&document.thumb.file, "Thumbnail"));
            }
            let media_type = match document.kind {
                DocumentKind::Sticker => Some("sticker"),
                DocumentKind::Animated => Some("animation"),
                DocumentKind::VideoMessage => Some("video_message"),
                DocumentKind::VoiceMessage => Some("voice_message"),
                DocumentKind::VideoFile => Some("video_file"),
                DocumentKind::AudioFile => Some("audio_file"),
                DocumentKind::File => None,
            };
            if let Some(media_type) = media_type {
                out.insert("media_type".into(), media_type.into());
            }
            if !document.name.is_empty() {
                out.insert("file_name".into(), document.name.clone().into());
            }
            if !document.mime.is_empty() {
                out.insert("mime_type".into(), document.mime.clone().into());
            }
            if !document.sticker_emoji.is_empty() {
                out.insert("sticker_emoji".into(), document.sticker_emoji.clone().into());
            }
            if !document.song_performer.is_empty() {
                out.insert("performer".into(), document.song_performer.clone().into());
            }
            if !document.song_title.is_empty() {
                out.insert("title".into(), document.song_title.clone().into());
            }
            if document.duration > 0 {
                out.insert("duration_seconds".into(), document.duration.into());
            }
            if document.width > 0 && document.height > 0 {
                out.insert("width".into(), document.width.into());
                out.insert("height".into(), document.height.into());
            }
        }
        MediaContent::Contact(contact) => {
            out.insert(
                "contact_information".into(),
                json!({
                    "first_name": contact.info.first_name,
                    "last_name": contact.info.last_name,
                    "phone_number": contact.info.phone_number,
                }),
            );
            if contact.vcard.location.is_valid() || !contact.vcard.relative_path.is_empty() {
                out.insert("contact_vcard".into(), file_value(&contact.vcard, "vCard"));
            }
        }
        MediaContent::Geo(point) => {
            if point.valid {
                out.insert(
                    "location_information".into(),
                    json!({ "latitude": point.latitude, "longitude": point.longitude }),
                );
            }
        }
        MediaContent::Venue(venue) => {
            out.insert("place_name".into(), venue.title.clone().into());
            out.insert("address".into(), venue.address.clone().into());
            if venue.point.valid {
                out.insert(
                    "location_information".into(),
                    json!({ "latitude": venue.point.latitude, "longitude": venue.point.longitude }),
                );
            }
        }
        MediaContent::Poll(poll) => {
            let answers: Vec<_> = poll
                .answers
                .iter()
                .map(|answer| {
                    json!({ "text": answer.text, "voters": answer.votes, "chosen": answer.chosen })
                })
                .collect();
            out.insert(
                "poll".into(),
                json!({
                    "question": poll.question,
                    "closed": poll.closed,
                    "total_voters": poll.total_votes,
                    "answers": answers,
                }),
            );
        }
    }
    if message.media.ttl > 0 {
        out.insert("self_destruct_period_seconds".into(), message.media.ttl.into());
    }
}

fn message_value(slice: &MessagesSlice, message: &Message) -> Value {
    let mut out = Map::new();
    out.insert("id".into(), message.id.into());
    let kind = if message.action.is_some() { "service" } else { "message" };
    out.insert("type".into(), kind.into());
    out.insert("date".into(), format_iso(message.date).into());
    out.insert("date_unixtime".into(), message.date.to_string().into());
    if message.edited > 0 {
        out.insert("edited".into(), format_iso(message.edited).into());
        out.insert("edited_unixtime".into(), message.edited.to_string().into());
    }
    let sender = message.from_id.unwrap_or(message.peer_id);
    let name = super::describe::sender_name(&slice.peers, message);
    let (name_key, id_key) = if message.action.is_some() {
        ("actor", "actor_id")
    } else {
        ("from", "from_id")
    };
    out.insert(name_key.into(), name.into());
    out.insert(id_key.into(), peer_id_string(sender).into());

    if let Some(action) = &message.action {
        if let Ok(Value::Object(fields)) = serde_json::to_value(action) {
            out.extend(fields);
        }
        if let Some(file) = message.file() {
            out.insert("photo".into(), file_value(file, "Photo"));
        }
    }
    if message.forwarded {
        let origin = message.forwarded_from_id.map_or_else(
            || message.forwarded_from_name.clone(),
            |id| super::describe::peer_name(&slice.peers, id),
        );
        out.insert("forwarded_from".into(), origin.into());
    }
    if message.reply_to_msg_id != 0 {
        out.insert("reply_to_message_id".into(), message.reply_to_msg_id.into());
        if let Some(peer) = message.reply_to_peer_id {
            out.insert("reply_to_peer_id".into(), peer_id_string(peer).into());
        }
    }
    if message.via_bot_id != 0 {
        let bot = super::describe::peer_name(&slice.peers, PeerId::user(message.via_bot_id));
        out.insert("via_bot".into(), bot.into());
    }
    if message.action.is_none() {
        media_fields(message, &mut out);
    }
    out.insert("text".into(), message.plain_text().into());
    out.insert("text_entities".into(), text_entities(message));
    Value::Object(out)
}

/// Which chat list of the index is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChatList {
    Chats,
    Left,
}

/// The chat currently being written, across its rotated files.
#[derive(Debug)]
struct ChatState {
    relative_path: String,
    header: Value,
    file: OutputFile,
    file_index: usize,
    in_file: usize,
    files: Vec<String>,
    messages_count: usize,
}

#[derive(Debug, Default)]
pub struct JsonWriter {
    environment: Environment,
    single_peer: bool,
    index: Option<OutputFile>,
    index_has_keys: bool,
    list_has_items: bool,
    userpics_open: bool,
    chat_list: Option<ChatList>,
    chat: Option<ChatState>,
}

impl JsonWriter {
    fn index_path(&self) -> PathBuf {
        self.environment.root.join(INDEX_FILE)
    }

    fn write_index(&mut self, text: &str) -> WriteResult {
        match self.index.as_mut() {
            Some(index) => index.write_block(text.as_bytes()),
            None => Ok(()),
        }
    }

    fn push_key(&mut self, key: &str, value: &Value) -> WriteResult {
        let body = indented(&self.index_path(), value, 1)?;
        let separator = if self.index_has_keys { "," } else { "" };
        self.index_has_keys = true;
        self.write_index(&format!("{separator}\n \"{key}\": {body}"))
    }

    /// Open an object whose items stream into its `list` array.
    fn open_list(&mut self, key: &str, about: &str) -> WriteResult {
        let separator = if self.index_has_keys { "," } else { "" };
        self.index_has_keys = true;
        self.list_has_items = false;
        let about = Value::String(about.to_string());
        self.write_index(&format!(
            "{separator}\n \"{key}\": {{\n  \"about\": {about},\n  \"list\": ["
        ))
    }

    fn push_item(&mut self, value: &Value) -> WriteResult {
        let body = indented(&self.index_path(), value, 3)?;
        let separator = if self.list_has_items { "," } else { "" };
        self.list_has_items = true;
        self.write_index(&format!("{separator}\n   {body}"))
    }

    fn close_list(&mut self) -> WriteResult {
        let closing = if self.list_has_items { "\n  ]\n }" } else { "]\n }" };
        self.list_has_items = false;
        self.write_index(closing)
    }

    fn enter_chat_list(&mut self, list: ChatList) -> WriteResult {
        if self.single_peer || self.chat_list == Some(list) {
            return Ok(());
        }
        if self.chat_list.is_some() {
            self.close_list()?;
        }
        let key = match list {
            ChatList::Chats => "chats",
            ChatList::Left => "left_chats",
        };
        self.chat_list = Some(list);
        self.open_list(
            key,
            "This page lists all chats from this export.",
        )
    }

    fn open_chat_file(
        &self,
        relative_path: &str,
        header: &Value,
        index: usize,
    ) -> Result<OutputFile, OutputError> {
        let mut file = self
            .environment
            .file(&format!("{relative_path}{}", file_name(index)));
        let mut header = header.clone();
        if index > 1 {
            if let Value::Object(fields) = &mut header {
                fields.insert("previous".into(), file_name(index - 1).into());
            }
        }
        let mut text = serde_json::to_string_pretty(&header)
            .map_err(|e| OutputError::encoding(file.path(), e))?;
        // Drop the closing brace so the messages array can follow.
        text.truncate(text.trim_end().len().saturating_sub(1));
        let text = format!("{},\n \"messages\": [", text.trim_end());
        file.write_block(text.as_bytes())?;
        Ok(file)
    }

    fn close_chat_file(file: &mut OutputFile, has_messages: bool, next: Option<String>) -> WriteResult {
        let mut text = String::from(if has_messages { "\n ]" } else { "]" });
        if let Some(next) = next {
            text.push_str(&format!(",\n \"next\": {}", Value::String(next)));
        }
        text.push_str("\n}\n");
        file.write_block(text.as_bytes())?;
        file.close()
    }

    fn rotate(&mut self) -> WriteResult {
        let Some(mut chat) = self.chat.take() else {
            return Ok(());
        };
        let next_index = chat.file_index + 1;
        Self::close_chat_file(&mut chat.file, chat.in_file > 0, Some(file_name(next_index)))?;
        chat.file = self.open_chat_file(&chat.relative_path, &chat.header, next_index)?;
        chat.file_index = next_index;
        chat.in_file = 0;
        chat.files
            .push(format!("{}{}", chat.relative_path, file_name(next_index)));
        self.chat = Some(chat);
        Ok(())
    }
}

impl OutputWriter for JsonWriter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Json
    }

    fn start(&mut self, settings: &ExportSettings, environment: &Environment) -> WriteResult {
        self.environment = environment.clone();
        self.single_peer = settings.only_single_peer();
        if !self.single_peer {
            let mut index = self.environment.file(INDEX_FILE);
            index.write_block(b"{")?;
            self.index = Some(index);
            self.push_key("about", &Value::String(ABOUT.to_string()))?;
        }
        Ok(())
    }

    fn write_personal(&mut self, data: &PersonalInfo) -> WriteResult {
        let info = &data.user.info;
        let value = json!({
            "user_id": data.user.bare_id,
            "first_name": info.first_name,
            "last_name": info.last_name,
            "phone_number": info.phone_number,
            "username": data.user.username,
            "bio": data.bio,
        });
        self.push_key("personal_information", &value)
    }

    fn write_userpics_start(&mut self, data: &UserpicsInfo) -> WriteResult {
        if data.count == 0 || self.index.is_none() {
            return Ok(());
        }
        let separator = if self.index_has_keys { "," } else { "" };
        self.index_has_keys = true;
        self.list_has_items = false;
        self.userpics_open = true;
        self.write_index(&format!("{separator}\n \"profile_pictures\": ["))
    }

    fn write_userpics_slice(&mut self, data: &UserpicsSlice) -> WriteResult {
        if !self.userpics_open {
            return Ok(());
        }
        for photo in &data.list {
            let body = indented(&self.index_path(), &photo_value(photo), 2)?;
            let separator = if self.list_has_items { "," } else { "" };
            self.list_has_items = true;
            self.write_index(&format!("{separator}\n  {body}"))?;
        }
        Ok(())
    }

    fn write_userpics_end(&mut self) -> WriteResult {
        if !self.userpics_open {
            return Ok(());
        }
        self.userpics_open = false;
        let closing = if self.list_has_items { "\n ]" } else { "]" };
        self.list_has_items = false;
        self.write_index(closing)
    }

    fn write_contacts_list(&mut self, data: &ContactsList) -> WriteResult {
        let contacts: Vec<_> = data.list.iter().map(contact_value).collect();
        self.push_key(
            "contacts",
            &json!({
                "about": "If you allow access to your contacts, the list is stored here.",
                "list": contacts,
            }),
        )?;
        let frequent: Vec<_> = data
            .correspondents
            .iter()
            .chain(&data.inline_bots)
            .chain(&data.phone_calls)
            .map(top_peer_value)
            .collect();
        self.push_key(
            "frequent_contacts",
            &json!({
                "about": "People you talk to most often, used for suggestions.",
                "list": frequent,
            }),
        )
    }

    fn write_sessions_list(&mut self, data: &SessionsList) -> WriteResult {
        let sessions: Vec<_> = data
            .list
            .iter()
            .map(|session| {
                json!({
                    "last_active": format_iso(session.last_active),
                    "last_active_unixtime": session.last_active.to_string(),
                    "last_ip": session.ip,
                    "last_country": session.country,
                    "last_region": session.region,
                    "application_name": session.application_name,
                    "application_version": session.application_version,
                    "device_model": session.device_model,
                    "platform": session.platform,
                    "system_version": session.system_version,
                    "created": format_iso(session.created),
                    "created_unixtime": session.created.to_string(),
                })
            })
            .collect();
        self.push_key(
            "sessions",
            &json!({ "about": "All active sessions of this account.", "list": sessions }),
        )?;
        let web: Vec<_> = data
            .web_list
            .iter()
            .map(|session| {
                json!({
                    "last_active": format_iso(session.last_active),
                    "last_active_unixtime": session.last_active.to_string(),
                    "last_ip": session.ip,
                    "last_region": session.region,
                    "bot_username": session.bot_username,
                    "domain_name": session.domain,
                    "browser": session.browser,
                    "platform": session.platform,
                    "created": format_iso(session.created),
                    "created_unixtime": session.created.to_string(),
                })
            })
            .collect();
        self.push_key(
            "web_sessions",
            &json!({ "about": "Websites where you logged in with this account.", "list": web }),
        )
    }

    fn write_other_data(&mut self, data: &File) -> WriteResult {
        self.push_key(
            "other_data",
            &json!({
                "about": "Other data associated with the account.",
                "file": file_value(data, "Other data"),
            }),
        )
    }

    fn write_dialogs_start(&mut self, data: &DialogsInfo) -> WriteResult {
        if !data.chats.is_empty() {
            self.enter_chat_list(ChatList::Chats)?;
        }
        Ok(())
    }

    fn write_dialog_start(&mut self, data: &DialogInfo) -> WriteResult {
        let list = if data.is_left_channel {
            ChatList::Left
        } else {
            ChatList::Chats
        };
        self.enter_chat_list(list)?;
        let header = json!({
            "name": data.display_name(),
            "type": data.dialog_type.key(),
            "id": data.peer_id.bare(),
        });
        let file = self.open_chat_file(&data.relative_path, &header, 1)?;
        let chat = ChatState {
            relative_path: data.relative_path.clone(),
            header,
            file,
            file_index: 1,
            in_file: 0,
            files: vec![format!("{}{}", data.relative_path, file_name(1))],
            messages_count: 0,
        };
        self.chat = Some(chat);
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
            let value = message_value(&data, message);
            let body = indented(chat.file.path(), &value, 2)?;
            let separator = if chat.in_file > 0 { "," } else { "" };
            chat.file
                .write_block(format!("{separator}\n  {body}").as_bytes())?;
            chat.in_file += 1;
            chat.messages_count += 1;
        }
        Ok(())
    }

    fn write_dialog_end(&mut self) -> WriteResult {
        let Some(mut chat) = self.chat.take() else {
            return Ok(());
        };
        Self::close_chat_file(&mut chat.file, chat.in_file > 0, None)?;
        if self.single_peer {
            return Ok(());
        }
        let mut entry = chat.header;
        if let Value::Object(fields) = &mut entry {
            fields.insert("messages_count".into(), chat.messages_count.into());
            fields.insert("files".into(), chat.files.into());
        }
        self.push_item(&entry)
    }

    fn write_dialogs_end(&mut self) -> WriteResult {
        if self.chat_list.take().is_some() {
            self.close_list()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> WriteResult {
        self.write_index("\n}\n")?;
        match self.index.take() {
            Some(mut index) => index.close(),
            None => Ok(()),
        }
    }

    fn main_file_path(&self) -> PathBuf {
        let name = if self.single_peer {
            "messages.json"
        } else {
            INDEX_FILE
        };
        self.environment.root.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DialogType, InputPeer, ServiceAction, TextPart};
    use std::fs;
    use tempfile::tempdir;

    fn dialog(bare: u64, path: &str, left: bool) -> DialogInfo {
        DialogInfo {
            dialog_type: if left {
                DialogType::PrivateChannel
            } else {
                DialogType::Personal
            },
            name: format!("Peer {bare}"),
            peer_id: if left {
                PeerId::channel(bare)
            } else {
                PeerId::user(bare)
            },
            relative_path: path.into(),
            is_left_channel: left,
            ..DialogInfo::default()
        }
    }

    fn messages(ids: std::ops::RangeInclusive<i32>) -> MessagesSlice {
        MessagesSlice {
            list: ids
                .map(|id| Message {
                    id,
                    date: 1_600_000_000 + i64::from(id),
                    peer_id: PeerId::user(1),
                    from_id: Some(PeerId::user(1)),
                    text: vec![TextPart::plain(format!("message {id}"))],
                    ..Message::default()
                })
                .collect(),
            peers: Default::default(),
        }
    }

    fn read_json(path: &std::path::Path) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    fn settings(root: &std::path::Path) -> ExportSettings {
        ExportSettings {
            path: root.to_path_buf(),
            ..ExportSettings::default()
        }
    }

    #[test]
    fn test_index_is_valid_json_with_chats_and_left_chats() {
        let dir = tempdir().unwrap();
        let environment = Environment::new(dir.path());
        let mut writer = JsonWriter::default();
        writer.start(&settings(dir.path()), &environment).unwrap();
        writer.write_personal(&PersonalInfo::default()).unwrap();
        writer
            .write_userpics_start(&UserpicsInfo { count: 1 })
            .unwrap();
        writer
            .write_userpics_slice(&UserpicsSlice {
                list: vec![Photo::default()],
            })
            .unwrap();
        writer.write_userpics_end().unwrap();
        writer.write_contacts_list(&ContactsList::default()).unwrap();
        writer.write_sessions_list(&SessionsList::default()).unwrap();

        let info = DialogsInfo {
            chats: vec![dialog(1, "chats/chat_1/", false)],
            left: vec![dialog(2, "chats/chat_2/", true)],
        };
        writer.write_dialogs_start(&info).unwrap();
        for chat in info.iter() {
            writer.write_dialog_start(chat).unwrap();
            writer.write_dialog_slice(messages(1..=3)).unwrap();
            writer.write_dialog_end().unwrap();
        }
        writer.write_dialogs_end().unwrap();
        writer.finish().unwrap();

        let index = read_json(&dir.path().join(INDEX_FILE));
        assert_eq!(index["profile_pictures"].as_array().unwrap().len(), 1);
        assert_eq!(index["chats"]["list"][0]["messages_count"], 3);
        assert_eq!(
            index["chats"]["list"][0]["files"][0],
            "chats/chat_1/messages.json"
        );
        assert_eq!(index["left_chats"]["list"][0]["type"], "private_channel");

        let chat = read_json(&dir.path().join("chats/chat_2/messages.json"));
        assert_eq!(chat["messages"].as_array().unwrap().len(), 3);
        assert_eq!(chat["messages"][0]["text"], "message 1");
        assert!(chat.get("next").is_none());
    }

    #[test]
    fn test_chat_files_split_with_links() {
        let dir = tempdir().unwrap();
        let environment = Environment::new(dir.path());
        let mut writer = JsonWriter::default();
        writer.start(&settings(dir.path()), &environment).unwrap();
        let chat = dialog(1, "chats/chat_1/", false);
        writer
            .write_dialogs_start(&DialogsInfo {
                chats: vec![chat.clone()],
                left: vec![],
            })
            .unwrap();
        writer.write_dialog_start(&chat).unwrap();
        writer.write_dialog_slice(messages(1..=600)).unwrap();
        writer.write_dialog_slice(messages(601..=1001)).unwrap();
        writer.write_dialog_end().unwrap();
        writer.write_dialogs_end().unwrap();
        writer.finish().unwrap();

        let first = read_json(&dir.path().join("chats/chat_1/messages.json"));
        assert_eq!(first["messages"].as_array().unwrap().len(), 1000);
        assert_eq!(first["next"], "messages2.json");
        assert!(first.get("previous").is_none());

        let second = read_json(&dir.path().join("chats/chat_1/messages2.json"));
        assert_eq!(second["messages"].as_array().unwrap().len(), 1);
        assert_eq!(second["previous"], "messages.json");
        assert_eq!(second["messages"][0]["id"], 1001);

        let index = read_json(&dir.path().join(INDEX_FILE));
        assert_eq!(index["chats"]["list"][0]["files"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_single_peer_has_no_index() {
        let dir = tempdir().unwrap();
        let environment = Environment::new(dir.path());
        let mut writer = JsonWriter::default();
        let settings = ExportSettings {
            single_peer: Some(InputPeer::Chat { chat_id: 5 }),
            ..settings(dir.path())
        };
        writer.start(&settings, &environment).unwrap();
        let chat = dialog(5, "", false);
        writer
            .write_dialogs_start(&DialogsInfo {
                chats: vec![chat.clone()],
                left: vec![],
            })
            .unwrap();
        writer.write_dialog_start(&chat).unwrap();
        writer.write_dialog_slice(MessagesSlice::default()).unwrap();
        writer.write_dialog_end().unwrap();
        writer.write_dialogs_end().unwrap();
        writer.finish().unwrap();

        assert!(!dir.path().join(INDEX_FILE).exists());
        let chat = read_json(&dir.path().join("messages.json"));
        assert_eq!(chat["messages"], json!([]));
        assert_eq!(writer.main_file_path(), dir.path().join("messages.json"));
    }

    #[test]
    fn test_service_message_fields() {
        let slice = MessagesSlice {
            list: vec![Message {
                id: 9,
                from_id: Some(PeerId::user(3)),
                action: Some(ServiceAction::ChatEditTitle {
                    title: "Renamed".into(),
                }),
                ..Message::default()
            }],
            peers: Default::default(),
        };
        let value = message_value(&slice, &slice.list[0]);
        assert_eq!(value["type"], "service");
        assert_eq!(value["action"], "chat_edit_title");
        assert_eq!(value["title"], "Renamed");
        assert_eq!(value["actor_id"], "user3");
    }
}

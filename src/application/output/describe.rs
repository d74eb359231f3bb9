//! Human-readable descriptions shared by the text and HTML writers.

use std::collections::BTreeMap;

use crate::domain::format::{format_duration, format_file_size, format_phone_number};
use crate::domain::{
    DocumentKind, File, Media, MediaContent, Message, Peer, PeerId, ServiceAction, SkipReason,
};

const DELETED_ACCOUNT: &str = "Deleted Account";

#[must_use]
pub fn peer_name(peers: &BTreeMap<PeerId, Peer>, id: PeerId) -> String {
    peers
        .get(&id)
        .map(Peer::name)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DELETED_ACCOUNT.to_string())
}

/// Name shown as the author of a message.
#[must_use]
pub fn sender_name(peers: &BTreeMap<PeerId, Peer>, message: &Message) -> String {
    if !message.signature.is_empty() {
        return message.signature.clone();
    }
    peer_name(peers, message.from_id.unwrap_or(message.peer_id))
}

fn user_names(peers: &BTreeMap<PeerId, Peer>, ids: &[u64]) -> String {
    let names: Vec<_> = ids
        .iter()
        .map(|id| peer_name(peers, PeerId::user(*id)))
        .collect();
    match names.as_slice() {
        [] => String::new(),
        [single] => single.clone(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}

/// One line describing a service message.
#[must_use]
pub fn action_text(peers: &BTreeMap<PeerId, Peer>, message: &Message, action: &ServiceAction) -> String {
    let from = sender_name(peers, message);
    match action {
        ServiceAction::ChatCreate { title, .. } => format!("{from} created group «{title}»"),
        ServiceAction::ChatEditTitle { title } => format!("{from} changed group title to «{title}»"),
        ServiceAction::ChatEditPhoto { .. } => format!("{from} changed group photo"),
        ServiceAction::ChatDeletePhoto => format!("{from} deleted group photo"),
        ServiceAction::ChatAddUser { user_ids } => {
            format!("{from} invited {}", user_names(peers, user_ids))
        }
        ServiceAction::ChatDeleteUser { user_id } => {
            format!("{from} removed {}", peer_name(peers, PeerId::user(*user_id)))
        }
        ServiceAction::ChatJoinedByLink { .. } => format!("{from} joined group by link"),
        ServiceAction::ChannelCreate { title } => format!("Channel «{title}» created"),
        ServiceAction::ChatMigrateTo { .. } => format!("{from} converted this group to a supergroup"),
        ServiceAction::ChannelMigrateFrom { title, .. } => {
            format!("{from} converted a basic group to this supergroup «{title}»")
        }
        ServiceAction::PinMessage => format!("{from} pinned a message"),
        ServiceAction::HistoryClear => "History cleared".to_string(),
        ServiceAction::PhoneCall {
            duration,
            discard_reason,
        } => {
            let mut text = format!("{from} made a phone call");
            if *duration > 0 {
                text.push_str(&format!(" ({})", format_duration(*duration)));
            } else if !discard_reason.is_empty() {
                text.push_str(&format!(" ({discard_reason})"));
            }
            text
        }
        ServiceAction::ScreenshotTaken => format!("{from} took a screenshot"),
        ServiceAction::CustomAction { message } => message.clone(),
        ServiceAction::ContactSignUp => format!("{from} joined the service"),
        ServiceAction::GroupCall { duration } if *duration > 0 => {
            format!("{from} ended a voice chat ({})", format_duration(*duration))
        }
        ServiceAction::GroupCall { .. } => format!("{from} started a voice chat"),
        ServiceAction::SetMessagesTtl { period } if *period > 0 => {
            format!("{from} set messages to auto-delete in {}", format_duration(*period))
        }
        ServiceAction::SetMessagesTtl { .. } => format!("{from} disabled the auto-delete timer"),
        ServiceAction::TopicCreate { title } => format!("{from} created topic «{title}»"),
    }
}

/// What a media attachment looks like in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MediaSummary {
    /// "Photo", "Video file", ...
    pub title: &'static str,
    /// The attached file, if the media has one.
    pub file: Option<FileSummary>,
    /// Extra facts such as dimensions, duration or poll answers.
    pub details: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSummary {
    /// Relative path of the downloaded file.
    Path(String),
    /// Placeholder text explaining why the file is missing.
    Missing(String),
}

impl FileSummary {
    #[must_use]
    pub fn of(file: &File, what: &str) -> Self {
        match file.skip_reason {
            Some(reason) => Self::Missing(reason.describe(what)),
            None if file.relative_path.is_empty() => {
                Self::Missing(SkipReason::Unavailable.describe(what))
            }
            None => Self::Path(file.relative_path.clone()),
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Path(text) | Self::Missing(text) => text,
        }
    }
}

/// Summary of a message's media, or `None` for text-only messages.
#[must_use]
pub fn media_summary(media: &Media) -> Option<MediaSummary> {
    let summary = match &media.content {
        MediaContent::None => return None,
        MediaContent::Photo(photo) => MediaSummary {
            title: "Photo",
            file: Some(FileSummary::of(&photo.image.file, "Photo")),
            details: dimensions(photo.image.width, photo.image.height),
        },
        MediaContent::Document(document) => {
            let title = match document.kind {
                DocumentKind::Sticker => "Sticker",
                DocumentKind::Animated => "Animation",
                DocumentKind::VideoMessage => "Video message",
                DocumentKind::VoiceMessage => "Voice message",
                DocumentKind::VideoFile => "Video file",
                DocumentKind::AudioFile => "Audio file",
                DocumentKind::File => "File",
            };
            let mut details = Vec::new();
            if !document.sticker_emoji.is_empty() {
                details.push(document.sticker_emoji.clone());
            }
            if !document.name.is_empty() && document.kind == DocumentKind::File {
                details.push(document.name.clone());
            }
            if !document.song_performer.is_empty() || !document.song_title.is_empty() {
                details.push(
                    format!("{} - {}", document.song_performer, document.song_title)
                        .trim_matches([' ', '-'])
                        .to_string(),
                );
            }
            details.extend(dimensions(document.width, document.height));
            if document.duration > 0 {
                details.push(format_duration(document.duration));
            }
            if document.file.size > 0 {
                details.push(format_file_size(document.file.size));
            }
            MediaSummary {
                title,
                file: Some(FileSummary::of(&document.file, title)),
                details,
            }
        }
        MediaContent::Contact(contact) => {
            let mut details = vec![contact.info.full_name()];
            if !contact.info.phone_number.is_empty() {
                details.push(format_phone_number(&contact.info.phone_number));
            }
            let has_vcard = contact.vcard.location.is_valid() || !contact.vcard.content.is_empty();
            MediaSummary {
                title: "Contact",
                file: has_vcard.then(|| FileSummary::of(&contact.vcard, "Contact vCard")),
                details,
            }
        }
        MediaContent::Geo(point) => MediaSummary {
            title: "Location",
            file: None,
            details: geo_details(point.valid, point.latitude, point.longitude),
        },
        MediaContent::Venue(venue) => {
            let mut details = vec![venue.title.clone()];
            if !venue.address.is_empty() {
                details.push(venue.address.clone());
            }
            details.extend(geo_details(
                venue.point.valid,
                venue.point.latitude,
                venue.point.longitude,
            ));
            MediaSummary {
                title: "Place",
                file: None,
                details,
            }
        }
        MediaContent::Poll(poll) => {
            let mut details = vec![poll.question.clone()];
            for answer in &poll.answers {
                let chosen = if answer.chosen { " (chosen)" } else { "" };
                details.push(format!("- {}: {} votes{chosen}", answer.text, answer.votes));
            }
            details.push(format!("Total votes: {}", poll.total_votes));
            if poll.closed {
                details.push("Poll closed".to_string());
            }
            MediaSummary {
                title: "Poll",
                file: None,
                details,
            }
        }
        MediaContent::Unsupported => MediaSummary {
            title: "Unsupported media",
            file: None,
            details: Vec::new(),
        },
    };
    Some(summary)
}

fn dimensions(width: i32, height: i32) -> Vec<String> {
    if width > 0 && height > 0 {
        vec![format!("{width}x{height}")]
    } else {
        Vec::new()
    }
}

fn geo_details(valid: bool, latitude: f64, longitude: f64) -> Vec<String> {
    if valid {
        vec![format!("{latitude:.6}, {longitude:.6}")]
    } else {
        vec!["(unknown location)".to_string()]
    }
}

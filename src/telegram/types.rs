//! Platform data types
//!
//! The platform's duck-typed message object maps to a tagged
//! [`MessageKind`] variant; everything the engines need travels in these
//! DTOs so the transport adapter stays swappable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A single message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub chat_id: i64,
    pub date: DateTime<Utc>,
    /// Body for text messages, caption for media; empty when absent
    pub text: String,
    pub kind: MessageKind,
    /// Album id when the message is part of a media group
    pub grouped_id: Option<i64>,
}

/// Tagged media variant for per-kind dispatch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Photo,
    Video(VideoAttrs),
    Document(DocumentAttrs),
    Audio(AudioAttrs),
    Voice { duration_secs: u32 },
    Sticker,
    Animation,
    VideoNote { duration_secs: u32 },
    Poll(PollAttrs),
    Location { latitude: f64, longitude: f64 },
    /// Anything the processor does not handle; the payload names the kind
    Unsupported(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VideoAttrs {
    pub duration_secs: u32,
    pub width: u32,
    pub height: u32,
    pub file_name: Option<String>,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DocumentAttrs {
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AudioAttrs {
    pub duration_secs: u32,
    pub title: Option<String>,
    pub performer: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PollAttrs {
    pub question: String,
    pub options: Vec<String>,
}

impl MessageKind {
    /// Short label used in scratch-file names and logs.
    pub fn label(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Photo => "photo",
            MessageKind::Video(_) => "video",
            MessageKind::Document(_) => "document",
            MessageKind::Audio(_) => "audio",
            MessageKind::Voice { .. } => "voice",
            MessageKind::Sticker => "sticker",
            MessageKind::Animation => "animation",
            MessageKind::VideoNote { .. } => "video_note",
            MessageKind::Poll(_) => "poll",
            MessageKind::Location { .. } => "location",
            MessageKind::Unsupported(_) => "unsupported",
        }
    }

    /// Default file extension for the downloaded payload.
    pub fn extension(&self) -> &'static str {
        match self {
            MessageKind::Photo => "jpg",
            MessageKind::Video(_) | MessageKind::Animation | MessageKind::VideoNote { .. } => "mp4",
            MessageKind::Audio(_) => "mp3",
            MessageKind::Voice { .. } => "ogg",
            MessageKind::Sticker => "webp",
            _ => "bin",
        }
    }

    /// True when the kind carries a downloadable payload.
    pub fn has_payload(&self) -> bool {
        matches!(
            self,
            MessageKind::Photo
                | MessageKind::Video(_)
                | MessageKind::Document(_)
                | MessageKind::Audio(_)
                | MessageKind::Voice { .. }
                | MessageKind::Sticker
                | MessageKind::Animation
                | MessageKind::VideoNote { .. }
        )
    }

    pub fn is_video(&self) -> bool {
        matches!(self, MessageKind::Video(_))
    }
}

/// A chat the account can see
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub title: String,
    /// Chat-level protected-content flag
    pub is_restricted: bool,
}

/// One dialog row for `list-chats`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dialog {
    pub chat_id: i64,
    pub title: String,
    /// `user`, `group`, or `channel`
    pub kind: String,
}

/// One forum topic row for `list-topics`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForumTopic {
    pub id: i64,
    pub title: String,
}

/// A local file staged for upload, with best-effort metadata
#[derive(Debug, Clone)]
pub struct MediaPayload {
    pub path: PathBuf,
    pub caption: String,
    pub kind: MessageKind,
}

/// Internal channel id as used in `t.me/c/...` deep links.
///
/// Channel ids are stored in the `-100<internal>` form; the deep link
/// carries only the internal part.
pub fn internal_channel_id(chat_id: i64) -> i64 {
    let s = chat_id.to_string();
    match s.strip_prefix("-100") {
        Some(rest) => rest.parse().unwrap_or(chat_id.abs()),
        None => chat_id.abs(),
    }
}

/// Private-channel deep link for a message.
pub fn deep_link(chat_id: i64, message_id: i64) -> String {
    format!("https://t.me/c/{}/{}", internal_channel_id(chat_id), message_id)
}

//! Shared test doubles: a scripted platform client, a no-op transcoder,
//! and fixture builders.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use clonechat::config::Config;
use clonechat::database::Database;
use clonechat::error::{Error, Result};
use clonechat::media::{MediaProcessor, VideoProbe};
use clonechat::telegram::{
    Chat, Dialog, ForumTopic, MediaPayload, Message, MessageKind, TelegramClient, VideoAttrs,
};

/// Scripted failure kinds (crate errors are not Clone)
#[derive(Debug, Clone, Copy)]
pub enum Fail {
    RateLimited(u64),
    Transient,
    Permanent,
    Restricted,
}

impl Fail {
    fn to_error(self) -> Error {
        match self {
            Fail::RateLimited(secs) => Error::RateLimited(secs),
            Fail::Transient => Error::Transient("scripted transient".into()),
            Fail::Permanent => Error::Permanent("scripted permanent".into()),
            Fail::Restricted => Error::Restricted,
        }
    }
}

/// In-memory platform with programmable failures
#[derive(Default)]
pub struct MockTelegram {
    pub chats: Mutex<HashMap<i64, Chat>>,
    pub history: Mutex<HashMap<i64, Vec<Message>>>,
    /// (origin, message_id, destination) per acknowledged forward
    pub forwarded: Mutex<Vec<(i64, i64, i64)>>,
    pub sent_media: Mutex<Vec<(i64, MediaPayload)>>,
    pub sent_texts: Mutex<Vec<(i64, String, Option<i64>)>>,
    pub pins_made: Mutex<Vec<(i64, i64)>>,
    /// Source pins, newest-first as the platform serves them
    pub source_pins: Mutex<Vec<i64>>,
    pub left_chats: Mutex<Vec<i64>>,
    pub usernames: Mutex<HashMap<String, i64>>,
    /// Chats whose content cannot be forwarded
    pub restricted_chats: Mutex<HashSet<i64>>,
    /// Scripted failures keyed by 1-based forward call index
    pub forward_failures: Mutex<HashMap<u64, Fail>>,
    forward_calls: AtomicU64,
    /// Scripted failures keyed by 1-based send_media call index
    pub media_failures: Mutex<HashMap<u64, Fail>>,
    media_calls: AtomicU64,
    /// Every nth platform call fails with RateLimited(secs)
    pub flood_every: Mutex<Option<(u64, u64)>>,
    /// Bytes served per download; missing ids default to 1024
    pub download_sizes: Mutex<HashMap<i64, u64>>,
    call_count: AtomicU64,
    next_message_id: AtomicI64,
    next_chat_id: AtomicI64,
}

impl MockTelegram {
    pub fn new() -> Self {
        Self {
            next_message_id: AtomicI64::new(1),
            next_chat_id: AtomicI64::new(-1009000000001),
            ..Self::default()
        }
    }

    /// Register a source chat with the given history.
    pub fn with_source(self, chat_id: i64, title: &str, messages: Vec<Message>) -> Self {
        self.chats.lock().unwrap().insert(
            chat_id,
            Chat {
                id: chat_id,
                title: title.to_string(),
                is_restricted: false,
            },
        );
        self.history.lock().unwrap().insert(chat_id, messages);
        self
    }

    pub fn mark_restricted(&self, chat_id: i64) {
        if let Some(chat) = self.chats.lock().unwrap().get_mut(&chat_id) {
            chat.is_restricted = true;
        }
        self.restricted_chats.lock().unwrap().insert(chat_id);
    }

    /// Destination message ids delivered to `chat_id`, in send order.
    pub fn deliveries_to(&self, chat_id: i64) -> Vec<i64> {
        self.forwarded
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, _, dest)| *dest == chat_id)
            .map(|(_, msg, _)| *msg)
            .collect()
    }

    pub fn calls_made(&self) -> u64 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Count the call and inject a flood wait when scripted.
    fn gate(&self) -> Result<()> {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((every, secs)) = *self.flood_every.lock().unwrap() {
            if count % every == 0 {
                return Err(Error::RateLimited(secs));
            }
        }
        Ok(())
    }

    fn fresh_message_id(&self) -> i64 {
        self.next_message_id.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl TelegramClient for MockTelegram {
    async fn get_chat(&self, chat_id: i64) -> Result<Chat> {
        self.gate()?;
        self.chats
            .lock()
            .unwrap()
            .get(&chat_id)
            .cloned()
            .ok_or_else(|| Error::Permanent(format!("chat {} not found", chat_id)))
    }

    async fn resolve_username(&self, username: &str) -> Result<i64> {
        self.gate()?;
        self.usernames
            .lock()
            .unwrap()
            .get(username)
            .copied()
            .ok_or_else(|| Error::NoAccess(format!("unknown username {}", username)))
    }

    async fn history_page(
        &self,
        chat_id: i64,
        min_id: i64,
        max_id: i64,
        limit: usize,
    ) -> Result<Vec<Message>> {
        self.gate()?;
        let history = self.history.lock().unwrap();
        let mut page: Vec<Message> = history
            .get(&chat_id)
            .map(|m| m.as_slice())
            .unwrap_or_default()
            .iter()
            .filter(|m| m.id > min_id && (max_id == 0 || m.id < max_id))
            .cloned()
            .collect();
        // Newest-first, as the platform serves history
        page.sort_by_key(|m| std::cmp::Reverse(m.id));
        page.truncate(limit);
        Ok(page)
    }

    async fn forward_message(&self, origin: i64, message_id: i64, destination: i64) -> Result<i64> {
        self.gate()?;
        let nth = self.forward_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(fail) = self.forward_failures.lock().unwrap().remove(&nth) {
            return Err(fail.to_error());
        }
        if self.restricted_chats.lock().unwrap().contains(&origin) {
            return Err(Error::Restricted);
        }
        self.forwarded
            .lock()
            .unwrap()
            .push((origin, message_id, destination));
        Ok(self.fresh_message_id())
    }

    async fn send_text(&self, chat_id: i64, text: &str, topic_id: Option<i64>) -> Result<i64> {
        self.gate()?;
        self.sent_texts
            .lock()
            .unwrap()
            .push((chat_id, text.to_string(), topic_id));
        Ok(self.fresh_message_id())
    }

    async fn send_media(&self, chat_id: i64, media: &MediaPayload) -> Result<i64> {
        self.gate()?;
        let nth = self.media_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(fail) = self.media_failures.lock().unwrap().remove(&nth) {
            return Err(fail.to_error());
        }
        self.sent_media.lock().unwrap().push((chat_id, media.clone()));
        Ok(self.fresh_message_id())
    }

    async fn send_poll(&self, chat_id: i64, question: &str, _options: &[String]) -> Result<i64> {
        self.gate()?;
        self.sent_texts
            .lock()
            .unwrap()
            .push((chat_id, format!("poll:{}", question), None));
        Ok(self.fresh_message_id())
    }

    async fn send_location(&self, chat_id: i64, latitude: f64, longitude: f64) -> Result<i64> {
        self.gate()?;
        self.sent_texts
            .lock()
            .unwrap()
            .push((chat_id, format!("location:{},{}", latitude, longitude), None));
        Ok(self.fresh_message_id())
    }

    async fn download_media(
        &self,
        _chat_id: i64,
        message_id: i64,
        destination: &Path,
    ) -> Result<u64> {
        self.gate()?;
        let size = self
            .download_sizes
            .lock()
            .unwrap()
            .get(&message_id)
            .copied()
            .unwrap_or(1024);
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(destination, vec![0u8; size as usize])?;
        Ok(size)
    }

    async fn create_channel(&self, title: &str) -> Result<Chat> {
        self.gate()?;
        let chat = Chat {
            id: self.next_chat_id.fetch_sub(1, Ordering::SeqCst),
            title: title.to_string(),
            is_restricted: false,
        };
        self.chats.lock().unwrap().insert(chat.id, chat.clone());
        Ok(chat)
    }

    async fn set_chat_description(&self, _chat_id: i64, _description: &str) -> Result<()> {
        self.gate()?;
        Ok(())
    }

    async fn export_invite_link(&self, chat_id: i64) -> Result<String> {
        self.gate()?;
        Ok(format!("https://t.me/+invite{}", chat_id.abs()))
    }

    async fn pinned_messages(&self, _chat_id: i64) -> Result<Vec<i64>> {
        self.gate()?;
        Ok(self.source_pins.lock().unwrap().clone())
    }

    async fn pin_message(&self, chat_id: i64, message_id: i64) -> Result<()> {
        self.gate()?;
        self.pins_made.lock().unwrap().push((chat_id, message_id));
        Ok(())
    }

    async fn leave_chat(&self, chat_id: i64) -> Result<()> {
        self.gate()?;
        self.left_chats.lock().unwrap().push(chat_id);
        Ok(())
    }

    async fn list_dialogs(&self) -> Result<Vec<Dialog>> {
        self.gate()?;
        Ok(self
            .chats
            .lock()
            .unwrap()
            .values()
            .map(|c| Dialog {
                chat_id: c.id,
                title: c.title.clone(),
                kind: "channel".into(),
            })
            .collect())
    }

    async fn list_forum_topics(&self, _chat_id: i64) -> Result<Vec<ForumTopic>> {
        self.gate()?;
        Ok(Vec::new())
    }
}

/// Transcoder double: copies bytes around instead of transcoding
#[derive(Default)]
pub struct MockMedia {
    pub fail_extractions: Mutex<bool>,
    /// Remaining number of concatenate calls to fail
    pub fail_concats: Mutex<u32>,
    /// Probe overrides by file name; everything else is a joinable H.264
    pub probes: Mutex<HashMap<String, VideoProbe>>,
    pub extracted: Mutex<Vec<PathBuf>>,
    pub reencoded: Mutex<Vec<PathBuf>>,
    pub concatenated: Mutex<Vec<PathBuf>>,
}

impl MockMedia {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_probe(&self, file_name: &str, probe: VideoProbe) {
        self.probes.lock().unwrap().insert(file_name.into(), probe);
    }
}

pub fn h264_probe(duration_secs: u64, size_bytes: u64) -> VideoProbe {
    VideoProbe {
        duration: Duration::from_secs(duration_secs),
        width: 1280,
        height: 720,
        codec: "h264".into(),
        bit_rate: 900_000,
        size_bytes,
    }
}

#[async_trait]
impl MediaProcessor for MockMedia {
    async fn probe(&self, input: &Path) -> Result<VideoProbe> {
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(self
            .probes
            .lock()
            .unwrap()
            .get(&name)
            .cloned()
            .unwrap_or_else(|| h264_probe(60, 1024)))
    }

    async fn extract_audio(&self, _input: &Path, output: &Path) -> Result<()> {
        if *self.fail_extractions.lock().unwrap() {
            return Err(Error::ExternalTool("scripted extraction failure".into()));
        }
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(output, b"mp3")?;
        self.extracted.lock().unwrap().push(output.to_path_buf());
        Ok(())
    }

    async fn reencode(&self, input: &Path, output: &Path) -> Result<()> {
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(input, output)?;
        self.reencoded.lock().unwrap().push(output.to_path_buf());
        Ok(())
    }

    async fn concatenate(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
        {
            let mut remaining = self.fail_concats.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(Error::ExternalTool("scripted concat failure".into()));
            }
        }
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut joined = Vec::new();
        for input in inputs {
            joined.extend(std::fs::read(input)?);
        }
        std::fs::write(output, joined)?;
        self.concatenated.lock().unwrap().push(output.to_path_buf());
        Ok(())
    }
}

pub fn text_message(chat_id: i64, id: i64) -> Message {
    Message {
        id,
        chat_id,
        date: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        text: format!("message {}", id),
        kind: MessageKind::Text,
        grouped_id: None,
    }
}

pub fn video_message(chat_id: i64, id: i64) -> Message {
    Message {
        id,
        chat_id,
        date: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        text: format!("video {}", id),
        kind: MessageKind::Video(VideoAttrs {
            duration_secs: 60,
            width: 1280,
            height: 720,
            file_name: Some(format!("clip{}.mp4", id)),
            size_bytes: 1024,
        }),
        grouped_id: None,
    }
}

pub async fn test_db() -> Database {
    let db = Database::connect_in_memory().await.expect("in-memory db");
    db.ensure_schema().await.expect("schema");
    db
}

/// Config pointing every path at a fresh temp dir, with no pacing delay.
pub fn test_config(dir: &Path) -> Config {
    Config {
        cloner_delay: Duration::ZERO,
        download_path: dir.join("downloads"),
        data_dir: dir.join("data"),
        links_file: dir.join("links_canais.txt"),
        ..Config::default()
    }
}

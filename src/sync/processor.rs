//! Per-message processing
//!
//! One message in, one destination delivery (or a well-typed skip) out.
//! The forward strategy is a single platform call; download-upload stages
//! the payload through the scratch directory and re-sends it with
//! best-effort metadata.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::CAPTION_LIMIT;
use crate::error::Result;
use crate::media::MediaProcessor;
use crate::retry::RetryPolicy;
use crate::tasks::CloningStrategy;
use crate::telegram::{MediaPayload, Message, MessageKind, TelegramClient};

/// Per-run processing options
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Emit an MP3 sibling for every staged video
    pub extract_audio: bool,
}

/// What happened to one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Delivered; payload is the destination message id
    Delivered(i64),
    /// Skipped without delivery; the checkpoint still advances
    Skipped,
}

/// Stateless per-message dispatcher
pub struct MessageProcessor {
    client: Arc<dyn TelegramClient>,
    media: Arc<dyn MediaProcessor>,
    retry: RetryPolicy,
    download_root: PathBuf,
    cancel: CancellationToken,
}

impl MessageProcessor {
    pub fn new(
        client: Arc<dyn TelegramClient>,
        media: Arc<dyn MediaProcessor>,
        download_root: PathBuf,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            media,
            retry: RetryPolicy::default(),
            download_root,
            cancel,
        }
    }

    /// Process one message under the given strategy.
    ///
    /// A `Restricted` failure from the forward path propagates so the
    /// engine can downgrade the task strategy; every other skip-worthy
    /// condition is absorbed here and reported as [`Outcome::Skipped`].
    pub async fn process(
        &self,
        strategy: CloningStrategy,
        message: &Message,
        origin_title: &str,
        destination: i64,
        options: &ProcessOptions,
    ) -> Result<Outcome> {
        if let MessageKind::Unsupported(kind) = &message.kind {
            // Unsupported kinds are skipped whole, caption included.
            tracing::warn!(
                message_id = message.id,
                kind = kind.as_str(),
                "unsupported message kind, skipping"
            );
            return Ok(Outcome::Skipped);
        }

        match strategy {
            CloningStrategy::Forward => {
                let id = self
                    .retry
                    .call(&self.cancel, "forward_message", || {
                        self.client
                            .forward_message(message.chat_id, message.id, destination)
                    })
                    .await?;
                Ok(Outcome::Delivered(id))
            }
            CloningStrategy::DownloadUpload => {
                self.reupload(message, origin_title, destination, options).await
            }
        }
    }

    async fn reupload(
        &self,
        message: &Message,
        origin_title: &str,
        destination: i64,
        options: &ProcessOptions,
    ) -> Result<Outcome> {
        let caption = truncate_caption(&message.text);

        match &message.kind {
            MessageKind::Text => {
                let id = self
                    .retry
                    .call(&self.cancel, "send_text", || {
                        self.client.send_text(destination, &message.text, None)
                    })
                    .await?;
                Ok(Outcome::Delivered(id))
            }
            MessageKind::Poll(poll) => {
                let id = self
                    .retry
                    .call(&self.cancel, "send_poll", || {
                        self.client.send_poll(destination, &poll.question, &poll.options)
                    })
                    .await?;
                Ok(Outcome::Delivered(id))
            }
            MessageKind::Location { latitude, longitude } => {
                let id = self
                    .retry
                    .call(&self.cancel, "send_location", || {
                        self.client.send_location(destination, *latitude, *longitude)
                    })
                    .await?;
                Ok(Outcome::Delivered(id))
            }
            kind if kind.has_payload() => {
                let Some(path) = self.stage_payload(message, origin_title).await? else {
                    return Ok(Outcome::Skipped);
                };

                let audio_path = if kind.is_video() && options.extract_audio {
                    self.extract_audio(&path).await
                } else {
                    None
                };

                let payload = MediaPayload {
                    path: path.clone(),
                    caption,
                    kind: message.kind.clone(),
                };
                let id = self
                    .retry
                    .call(&self.cancel, "send_media", || self.client.send_media(destination, &payload))
                    .await?;

                // Videos and documents are scratch-only once delivered;
                // the extracted audio stays.
                if matches!(kind, MessageKind::Video(_) | MessageKind::Document(_)) {
                    if let Err(e) = tokio::fs::remove_file(&path).await {
                        tracing::warn!(path = %path.display(), error = %e, "failed to remove payload");
                    }
                }
                if let Some(audio) = audio_path {
                    tracing::debug!(path = %audio.display(), "kept extracted audio");
                }

                Ok(Outcome::Delivered(id))
            }
            other => {
                tracing::warn!(
                    message_id = message.id,
                    kind = other.label(),
                    "kind has no payload to re-upload, skipping"
                );
                Ok(Outcome::Skipped)
            }
        }
    }

    /// Download the payload into the per-channel scratch directory.
    ///
    /// A zero-byte result is retried once as transient; a second zero is
    /// logged and the message skipped.
    async fn stage_payload(&self, message: &Message, origin_title: &str) -> Result<Option<PathBuf>> {
        let dir = self.download_root.join(format!(
            "{} - {}",
            message.chat_id,
            sanitize_component(origin_title)
        ));
        let path = dir.join(format!(
            "{}-{}.{}",
            message.id,
            message.kind.label(),
            payload_extension(&message.kind)
        ));

        for attempt in 0..2 {
            let written = self
                .retry
                .call(&self.cancel, "download_media", || {
                    self.client.download_media(message.chat_id, message.id, &path)
                })
                .await?;

            if written > 0 {
                return Ok(Some(path));
            }
            tracing::warn!(
                message_id = message.id,
                attempt,
                "zero-byte download, retrying"
            );
        }

        tracing::warn!(message_id = message.id, "payload still empty after retry, skipping");
        let _ = tokio::fs::remove_file(&path).await;
        Ok(None)
    }

    async fn extract_audio(&self, video: &Path) -> Option<PathBuf> {
        let audio = video.with_extension("mp3");
        match self.media.extract_audio(video, &audio).await {
            Ok(()) => Some(audio),
            Err(e) => {
                // Extraction failure is non-fatal; the video still goes up.
                tracing::warn!(path = %video.display(), error = %e, "audio extraction failed");
                None
            }
        }
    }
}

/// Preferred extension: the original filename's if present, else by kind.
fn payload_extension(kind: &MessageKind) -> String {
    let from_name = match kind {
        MessageKind::Video(v) => v.file_name.as_deref(),
        MessageKind::Document(d) => d.file_name.as_deref(),
        MessageKind::Audio(a) => a.file_name.as_deref(),
        _ => None,
    };

    from_name
        .and_then(|name| name.rsplit_once('.').map(|(_, ext)| ext.to_lowercase()))
        .filter(|ext| !ext.is_empty() && ext.len() <= 5)
        .unwrap_or_else(|| kind.extension().to_string())
}

/// Truncate a caption at the platform boundary with a trailing ellipsis.
pub fn truncate_caption(text: &str) -> String {
    if text.chars().count() <= CAPTION_LIMIT {
        return text.to_string();
    }
    let truncated: String = text.chars().take(CAPTION_LIMIT - 1).collect();
    format!("{}…", truncated)
}

/// Make a chat title safe as a single path component.
pub fn sanitize_component(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

//! Bulk video download engine
//!
//! A video-only variant of the clone loop: every video newer than the
//! checkpoint is downloaded into a dated folder, an MP3 is extracted next
//! to it, and counters plus the checkpoint advance per file.

use std::path::PathBuf;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::database::Database;
use crate::error::{Error, Result};
use crate::media::MediaProcessor;
use crate::retry::RetryPolicy;
use crate::sync::history;
use crate::sync::processor::sanitize_component;
use crate::tasks::{self, DownloadTask};
use crate::telegram::{resolver, MessageKind, TelegramClient};

/// Options for one `download` invocation
#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    pub origin: String,
    /// Stop after this many new videos
    pub limit: Option<usize>,
    /// Output root; defaults to the configured download path
    pub output: Option<PathBuf>,
    pub restart: bool,
    /// Remove the video once its MP3 exists
    pub delete_video: bool,
    /// Rewind the starting checkpoint to this message id
    pub message_id: Option<i64>,
}

/// Result of one download run
#[derive(Debug, Clone)]
pub struct DownloadReport {
    pub origin_chat_id: i64,
    pub downloaded: usize,
    pub checkpoint: i64,
}

/// Drives one [`DownloadTask`] from checkpoint to head
pub struct DownloadEngine {
    client: Arc<dyn TelegramClient>,
    media: Arc<dyn MediaProcessor>,
    db: Database,
    config: Config,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl DownloadEngine {
    pub fn new(
        client: Arc<dyn TelegramClient>,
        media: Arc<dyn MediaProcessor>,
        db: Database,
        config: Config,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            media,
            db,
            config,
            retry: RetryPolicy::default(),
            cancel,
        }
    }

    pub async fn run(&self, options: &DownloadOptions) -> Result<DownloadReport> {
        let pool = self.db.pool();

        let resolved = resolver::resolve(&*self.client, &options.origin).await?;
        let chat = self
            .retry
            .call(&self.cancel, "get_chat", || self.client.get_chat(resolved.chat_id))
            .await?;

        if options.restart {
            tasks::download::delete(pool, chat.id).await?;
        }

        let mut task = match tasks::download::get(pool, chat.id).await? {
            Some(task) => task,
            None => {
                tasks::download::upsert(pool, &DownloadTask::new(chat.id, &chat.title)).await?;
                tasks::download::get(pool, chat.id)
                    .await?
                    .ok_or_else(|| Error::Database(sqlx::Error::RowNotFound))?
            }
        };

        // --message-id only rewinds; it never skips forward past videos.
        if let Some(from) = options.message_id {
            let rewound = from.saturating_sub(1);
            if rewound < task.last_downloaded_message_id {
                tasks::download::set_checkpoint(pool, chat.id, rewound).await?;
                task.last_downloaded_message_id = rewound;
            }
        }

        let pending = history::collect_pending(
            &*self.client,
            &self.retry,
            &self.cancel,
            chat.id,
            task.last_downloaded_message_id,
        )
        .await?;

        let videos: Vec<_> = pending
            .iter()
            .filter(|m| matches!(m.kind, MessageKind::Video(_)))
            .collect();

        tasks::download::set_total_videos(
            pool,
            chat.id,
            task.downloaded_videos + videos.len() as i64,
        )
        .await?;

        tracing::info!(
            chat_id = chat.id,
            videos = videos.len(),
            checkpoint = task.last_downloaded_message_id,
            "new videos found"
        );

        let output_root = options
            .output
            .clone()
            .unwrap_or_else(|| self.config.download_path.clone());
        let chat_dir = output_root.join(sanitize_component(&chat.title));

        let target = options.limit.unwrap_or(videos.len()).min(videos.len());
        let progress = ProgressBar::new(target as u64);
        progress.set_style(
            ProgressStyle::with_template("{msg} [{bar:30}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        progress.set_message(chat.title.clone());

        let mut downloaded = 0usize;
        let mut checkpoint = task.last_downloaded_message_id;

        for message in videos {
            if let Some(limit) = options.limit {
                if downloaded >= limit {
                    break;
                }
            }
            if self.cancel.is_cancelled() {
                return Err(Error::Interrupted);
            }

            let file_name = match &message.kind {
                MessageKind::Video(attrs) => attrs
                    .file_name
                    .clone()
                    .unwrap_or_else(|| format!("{}.mp4", message.id)),
                _ => continue,
            };
            let day_dir = chat_dir.join(message.date.format("%Y-%m-%d").to_string());
            let path = day_dir.join(format!("{}-{}", message.id, sanitize_component(&file_name)));

            let mut written = 0u64;
            for attempt in 0..2u32 {
                written = self
                    .retry
                    .call(&self.cancel, "download_media", || {
                        self.client.download_media(chat.id, message.id, &path)
                    })
                    .await?;
                if written > 0 {
                    break;
                }
                tracing::warn!(message_id = message.id, attempt, "zero-byte download");
            }

            if written == 0 {
                tracing::warn!(message_id = message.id, "payload empty after retry, skipping");
                let _ = tokio::fs::remove_file(&path).await;
                tasks::download::set_checkpoint(pool, chat.id, message.id).await?;
                checkpoint = message.id;
                continue;
            }

            let audio = path.with_extension("mp3");
            match self.media.extract_audio(&path, &audio).await {
                Ok(()) => {
                    if options.delete_video {
                        if let Err(e) = tokio::fs::remove_file(&path).await {
                            tracing::warn!(path = %path.display(), error = %e, "video cleanup failed");
                        }
                    }
                }
                Err(e) => {
                    // Keep the video; only the audio sidecar is lost.
                    tracing::warn!(message_id = message.id, error = %e, "audio extraction failed");
                }
            }

            tasks::download::advance(pool, chat.id, message.id).await?;
            checkpoint = message.id;
            downloaded += 1;
            progress.inc(1);
        }
        progress.finish_and_clear();

        tracing::info!(chat_id = chat.id, downloaded, checkpoint, "download run finished");

        Ok(DownloadReport {
            origin_chat_id: chat.id,
            downloaded,
            checkpoint,
        })
    }
}

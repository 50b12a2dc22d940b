//! Clone engine
//!
//! Walks a source conversation in strict chronological order, delivers
//! each message to the destination under the task's transport strategy,
//! and advances the durable checkpoint only after the destination write
//! is acknowledged. Safe to kill at any point; a restart resumes from the
//! checkpoint with no duplicates and no gaps.

pub mod history;
pub mod links;
pub mod processor;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::database::Database;
use crate::error::{Error, Result};
use crate::media::MediaProcessor;
use crate::retry::{self, RetryPolicy};
use crate::tasks::{self, CloningStrategy, SyncTask};
use crate::telegram::{deep_link, resolver, TelegramClient};

pub use processor::{MessageProcessor, Outcome, ProcessOptions};

/// Options for one `sync` invocation
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Free-form origin identifier (id, handle, or link)
    pub origin: String,
    /// Optional destination identifier; a fresh channel is created when absent
    pub destination: Option<String>,
    pub force_download: bool,
    pub extract_audio: bool,
    pub restart: bool,
    pub leave_origin: bool,
    /// Chat to receive the clone link on completion
    pub publish_to: Option<String>,
    /// Forum topic for the published link
    pub topic: Option<i64>,
}

/// Result of one clone run
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub origin_chat_id: i64,
    pub destination_chat_id: i64,
    pub delivered: usize,
    pub skipped: usize,
    pub checkpoint: i64,
}

/// Drives one [`SyncTask`] from checkpoint to head
pub struct SyncEngine {
    client: Arc<dyn TelegramClient>,
    media: Arc<dyn MediaProcessor>,
    db: Database,
    config: Config,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl SyncEngine {
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

    /// Clone one origin to completion (or the next interruption).
    pub async fn run(&self, options: &SyncOptions) -> Result<SyncReport> {
        let pool = self.db.pool();

        let resolved = resolver::resolve(&*self.client, &options.origin).await?;
        let chat = self
            .retry
            .call(&self.cancel, "get_chat", || self.client.get_chat(resolved.chat_id))
            .await?;

        if options.restart {
            tracing::info!(chat_id = chat.id, "restart requested, dropping task state");
            tasks::sync::delete(pool, chat.id).await?;
        }

        let task = match tasks::sync::get(pool, chat.id).await? {
            Some(task) => task,
            None => {
                let strategy = if chat.is_restricted || options.force_download {
                    CloningStrategy::DownloadUpload
                } else {
                    CloningStrategy::Forward
                };
                tracing::info!(
                    chat_id = chat.id,
                    title = %chat.title,
                    %strategy,
                    "creating clone task"
                );
                tasks::sync::upsert(pool, &SyncTask::new(chat.id, &chat.title, strategy)).await?;
                tasks::sync::get(pool, chat.id)
                    .await?
                    .ok_or_else(|| Error::Database(sqlx::Error::RowNotFound))?
            }
        };

        // Strategy is sticky, but download_upload may be forced by flag.
        let mut strategy = task.cloning_strategy;
        if options.force_download && strategy == CloningStrategy::Forward {
            strategy = CloningStrategy::DownloadUpload;
            tasks::sync::set_strategy(pool, chat.id, strategy).await?;
        }

        let destination = match task.destination_chat_id {
            Some(id) => id,
            None => {
                let id = match &options.destination {
                    Some(raw) => resolver::resolve(&*self.client, raw).await?.chat_id,
                    None => {
                        let title = format!("[CLONE] {}", chat.title);
                        let created = self
                            .retry
                            .call(&self.cancel, "create_channel", || {
                                self.client.create_channel(&title)
                            })
                            .await?;
                        created.id
                    }
                };
                // The id must be durable before the first delivery.
                tasks::sync::set_destination(pool, chat.id, id).await?;
                id
            }
        };

        let pending = history::collect_pending(
            &*self.client,
            &self.retry,
            &self.cancel,
            chat.id,
            task.last_synced_message_id,
        )
        .await?;

        tracing::info!(
            chat_id = chat.id,
            pending = pending.len(),
            checkpoint = task.last_synced_message_id,
            "history collected"
        );

        let processor = MessageProcessor::new(
            self.client.clone(),
            self.media.clone(),
            self.config.download_path.clone(),
            self.cancel.clone(),
        );
        let process_options = ProcessOptions {
            extract_audio: options.extract_audio,
        };

        let progress = ProgressBar::new(pending.len() as u64);
        progress.set_style(
            ProgressStyle::with_template("{msg} [{bar:30}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        progress.set_message(chat.title.clone());

        let mut translations: HashMap<i64, i64> = HashMap::new();
        let mut delivered = 0usize;
        let mut skipped = 0usize;
        let mut checkpoint = task.last_synced_message_id;

        for message in &pending {
            if self.cancel.is_cancelled() {
                return Err(Error::Interrupted);
            }

            let outcome = match processor
                .process(strategy, message, &chat.title, destination, &process_options)
                .await
            {
                Ok(outcome) => outcome,
                Err(Error::Restricted) if strategy == CloningStrategy::Forward => {
                    // One-way downgrade; the reverse transition never happens.
                    tracing::warn!(
                        chat_id = chat.id,
                        message_id = message.id,
                        "forward forbidden, downgrading to download_upload"
                    );
                    strategy = CloningStrategy::DownloadUpload;
                    tasks::sync::set_strategy(pool, chat.id, strategy).await?;
                    processor
                        .process(strategy, message, &chat.title, destination, &process_options)
                        .await?
                }
                Err(e) => return Err(e),
            };

            match outcome {
                Outcome::Delivered(dest_id) => {
                    translations.insert(message.id, dest_id);
                    delivered += 1;
                }
                Outcome::Skipped => skipped += 1,
            }

            tasks::sync::advance(pool, chat.id, message.id).await?;
            checkpoint = checkpoint.max(message.id);
            progress.inc(1);

            if !self.config.cloner_delay.is_zero() {
                retry::sleep_or_cancel(&self.cancel, self.config.cloner_delay).await?;
            }
        }
        progress.finish_and_clear();

        self.replicate_pins(chat.id, destination, &translations).await?;

        if !pending.is_empty() {
            let invite = if self.config.register_invite_link {
                self.export_invite(destination).await
            } else {
                None
            };
            links::append_record(
                &self.config.links_file,
                &chat.title,
                &deep_link(destination, 1),
                invite.as_deref(),
            )
            .await?;
        }

        if options.leave_origin {
            self.retry
                .call(&self.cancel, "leave_chat", || self.client.leave_chat(chat.id))
                .await?;
            tracing::info!(chat_id = chat.id, "left origin chat");
        }

        if let Some(target) = &options.publish_to {
            let target = resolver::resolve(&*self.client, target).await?;
            let announcement = format!("{}\n{}", chat.title, deep_link(destination, 1));
            self.retry
                .call(&self.cancel, "send_text", || {
                    self.client
                        .send_text(target.chat_id, &announcement, options.topic)
                })
                .await?;
        }

        tracing::info!(
            chat_id = chat.id,
            destination,
            delivered,
            skipped,
            checkpoint,
            "clone run finished"
        );

        Ok(SyncReport {
            origin_chat_id: chat.id,
            destination_chat_id: destination,
            delivered,
            skipped,
            checkpoint,
        })
    }

    /// Run a batch file of identifiers, one clone task each, sequentially.
    ///
    /// Unresolvable or inaccessible identifiers are logged and skipped;
    /// only interruption stops the batch.
    pub async fn run_batch(&self, file: &Path, template: &SyncOptions) -> Result<()> {
        let content = tokio::fs::read_to_string(file).await?;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Err(e) = resolver::resolve(&*self.client, line).await {
                match e {
                    Error::Unresolvable(_) | Error::NoAccess(_) => {
                        tracing::warn!(identifier = line, error = %e, "skipping batch entry");
                        continue;
                    }
                    Error::Interrupted => return Err(Error::Interrupted),
                    other => return Err(other),
                }
            }

            let options = SyncOptions {
                origin: line.to_string(),
                destination: None,
                ..template.clone()
            };

            match self.run(&options).await {
                Ok(report) => tracing::info!(
                    identifier = line,
                    delivered = report.delivered,
                    "batch entry completed"
                ),
                Err(Error::Interrupted) => return Err(Error::Interrupted),
                Err(e) => {
                    tracing::error!(identifier = line, error = %e, "batch entry failed, continuing");
                }
            }
        }

        Ok(())
    }

    /// Pin destination counterparts of the origin's pins, oldest first.
    /// Translation misses and pin failures are logged, never fatal.
    async fn replicate_pins(
        &self,
        origin: i64,
        destination: i64,
        translations: &HashMap<i64, i64>,
    ) -> Result<()> {
        let pinned = match self
            .retry
            .call(&self.cancel, "pinned_messages", || self.client.pinned_messages(origin))
            .await
        {
            Ok(ids) => ids,
            Err(Error::Interrupted) => return Err(Error::Interrupted),
            Err(e) => {
                tracing::warn!(origin, error = %e, "could not fetch pinned messages");
                return Ok(());
            }
        };

        // The platform returns pins newest-first; replicate chronologically.
        for source_id in pinned.iter().rev() {
            let Some(dest_id) = translations.get(source_id) else {
                tracing::warn!(
                    origin,
                    message_id = source_id,
                    "pinned message has no destination counterpart in this run"
                );
                continue;
            };

            if let Err(e) = self
                .retry
                .call(&self.cancel, "pin_message", || {
                    self.client.pin_message(destination, *dest_id)
                })
                .await
            {
                if matches!(e, Error::Interrupted) {
                    return Err(Error::Interrupted);
                }
                tracing::warn!(destination, message_id = dest_id, error = %e, "pin failed");
            }
        }

        Ok(())
    }

    async fn export_invite(&self, destination: i64) -> Option<String> {
        match self
            .retry
            .call(&self.cancel, "export_invite_link", || {
                self.client.export_invite_link(destination)
            })
            .await
        {
            Ok(link) => Some(link),
            Err(e) => {
                tracing::warn!(destination, error = %e, "invite link export failed");
                None
            }
        }
    }
}

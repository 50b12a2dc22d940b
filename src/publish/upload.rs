//! Upload stage
//!
//! Sends the plan to the destination channel, resuming from the
//! `last_uploaded_file` marker: rows lexicographically at or below it are
//! skipped, and the marker advances per acknowledged send. Finishes by
//! pinning the summary and populating the channel description.

use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::publish::summary::{self, PlanRow};
use crate::publish::workspace::Workspace;
use crate::retry::{self, RetryPolicy};
use crate::sync::links;
use crate::tasks;
use crate::telegram::{
    deep_link, DocumentAttrs, MediaPayload, MessageKind, TelegramClient, VideoAttrs,
};

pub struct UploadStage<'a> {
    pub ws: &'a Workspace,
    pub config: &'a Config,
    pub pool: &'a SqlitePool,
    pub client: Arc<dyn TelegramClient>,
    pub retry: &'a RetryPolicy,
    pub cancel: &'a CancellationToken,
    /// Publish task primary key (canonical source folder path)
    pub task_key: &'a str,
}

impl UploadStage<'_> {
    pub async fn run(&self) -> Result<()> {
        let plan = summary::load_plan(self.ws)?;
        let task = tasks::publish::get(self.pool, self.task_key)
            .await?
            .ok_or_else(|| Error::InvalidInput("publish task vanished mid-run".into()))?;

        let destination = match task.destination_chat_id {
            Some(id) => id,
            None => {
                let id = self.select_destination().await?;
                tasks::publish::set_destination(self.pool, self.task_key, id).await?;
                id
            }
        };

        let marker = task.last_uploaded_file;
        let remaining: Vec<&PlanRow> = plan
            .iter()
            .filter(|row| marker.as_deref().is_none_or(|m| row.path.as_str() > m))
            .collect();

        tracing::info!(
            destination,
            total = plan.len(),
            remaining = remaining.len(),
            "uploading plan"
        );

        let progress = ProgressBar::new(remaining.len() as u64);
        progress.set_style(
            ProgressStyle::with_template("{msg} [{bar:30}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        progress.set_message(self.ws.project_name.clone());

        for row in remaining {
            if self.cancel.is_cancelled() {
                return Err(Error::Interrupted);
            }

            let path = row.absolute(self.ws);
            let size = tokio::fs::metadata(&path).await?.len();
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned());

            let kind = if row.kind == "video" {
                MessageKind::Video(VideoAttrs {
                    file_name,
                    size_bytes: size,
                    ..VideoAttrs::default()
                })
            } else {
                MessageKind::Document(DocumentAttrs {
                    file_name,
                    mime_type: None,
                    size_bytes: size,
                })
            };

            let payload = MediaPayload {
                path,
                caption: row.caption.clone(),
                kind,
            };
            self.retry
                .call(self.cancel, "send_media", || {
                    self.client.send_media(destination, &payload)
                })
                .await?;

            tasks::publish::set_last_uploaded_file(self.pool, self.task_key, &row.path).await?;
            progress.inc(1);

            if !self.config.cloner_delay.is_zero() {
                retry::sleep_or_cancel(self.cancel, self.config.cloner_delay).await?;
            }
        }
        progress.finish_and_clear();

        self.finish(destination).await
    }

    /// Destination policy: explicit CHAT_ID wins, then channel creation,
    /// then the fallback MOC chat.
    async fn select_destination(&self) -> Result<i64> {
        if let Some(id) = self.config.chat_id {
            return Ok(id);
        }
        if self.config.create_new_channel {
            let title = self.ws.project_name.clone();
            let created = self
                .retry
                .call(self.cancel, "create_channel", || {
                    self.client.create_channel(&title)
                })
                .await?;
            return Ok(created.id);
        }
        self.config.moc_chat_id.ok_or_else(|| {
            Error::Configuration(
                "no destination: set CHAT_ID, CREATE_NEW_CHANNEL, or MOC_CHAT_ID".into(),
            )
        })
    }

    async fn finish(&self, destination: i64) -> Result<()> {
        let summary_text = tokio::fs::read_to_string(self.ws.summary_txt()).await?;
        let summary_id = self
            .retry
            .call(self.cancel, "send_text", || {
                self.client.send_text(destination, &summary_text, None)
            })
            .await?;
        self.retry
            .call(self.cancel, "pin_message", || {
                self.client.pin_message(destination, summary_id)
            })
            .await?;

        let description =
            tokio::fs::read_to_string(self.ws.summary_dir().join("description.txt")).await?;
        self.retry
            .call(self.cancel, "set_chat_description", || {
                self.client.set_chat_description(destination, &description)
            })
            .await?;

        if self.config.register_invite_link {
            let invite = self
                .retry
                .call(self.cancel, "export_invite_link", || {
                    self.client.export_invite_link(destination)
                })
                .await
                .map_err(|e| {
                    tracing::warn!(error = %e, "invite link export failed");
                    e
                })
                .ok();
            links::append_record(
                &self.config.links_file,
                &self.ws.project_name,
                &deep_link(destination, 1),
                invite.as_deref(),
            )
            .await?;
        }

        if self.config.autodel_video_temp {
            for dir in [self.ws.reencoded_dir(), self.ws.joined_dir()] {
                if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
                    tracing::warn!(dir = %dir.display(), error = %e, "temp cleanup failed");
                }
            }
        }

        tracing::info!(destination, "upload stage finished");
        Ok(())
    }
}

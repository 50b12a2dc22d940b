//! Publish pipeline
//!
//! Deterministic stage machine over `PublishTask.current_step`:
//! init -> zip -> report -> reencode_auth -> reencode -> join -> timestamp
//! -> upload_auth -> upload -> done. Each artefact stage is idempotent
//! against partial output; its latch commits only after the artefacts
//! exist on disk, so a crash in between repeats exactly that stage.

pub mod archive;
pub mod join;
pub mod reencode;
pub mod report;
pub mod summary;
pub mod upload;
pub mod workspace;

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::database::Database;
use crate::error::{Error, Result};
use crate::media::MediaProcessor;
use crate::retry::RetryPolicy;
use crate::tasks::{self, PublishStep, PublishTask, TaskStatus};
use crate::telegram::TelegramClient;
use upload::UploadStage;
use workspace::Workspace;

/// Options for one `publish` invocation
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    pub folder: PathBuf,
    pub restart: bool,
    /// Skip the interactive authorisation gates
    pub assume_yes: bool,
}

/// Drives one [`PublishTask`] to `done`
pub struct PublishPipeline {
    client: Arc<dyn TelegramClient>,
    media: Arc<dyn MediaProcessor>,
    db: Database,
    config: Config,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl PublishPipeline {
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

    pub async fn run(&self, options: &PublishOptions) -> Result<()> {
        let pool = self.db.pool();

        let source = tokio::fs::canonicalize(&options.folder)
            .await
            .map_err(|_| {
                Error::InvalidInput(format!("folder not found: {}", options.folder.display()))
            })?;
        if !source.is_dir() {
            return Err(Error::InvalidInput(format!(
                "not a directory: {}",
                source.display()
            )));
        }

        let key = source.to_string_lossy().into_owned();
        let project = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::InvalidInput("folder has no basename".into()))?;

        if options.restart {
            tracing::info!(%key, "restart requested, dropping publish task");
            tasks::publish::delete(pool, &key).await?;
        }
        tasks::publish::upsert(pool, &PublishTask::new(&key, &project)).await?;
        tasks::publish::set_status(pool, &key, TaskStatus::Running).await?;

        let ws = Workspace::new(&self.config, &source, &project);

        match self.drive(&ws, &key, options).await {
            Ok(true) => {
                tasks::publish::set_status(pool, &key, TaskStatus::Completed).await?;
                tracing::info!(%key, "publish pipeline completed");
                Ok(())
            }
            Ok(false) => {
                // A declined gate is not a failure; the task resumes later.
                tasks::publish::set_status(pool, &key, TaskStatus::Pending).await?;
                tracing::info!(%key, "publish pipeline paused at authorisation gate");
                Ok(())
            }
            Err(Error::Interrupted) => {
                tasks::publish::set_status(pool, &key, TaskStatus::Pending).await?;
                Err(Error::Interrupted)
            }
            Err(e) => {
                tasks::publish::set_status(pool, &key, TaskStatus::Failed).await?;
                Err(e)
            }
        }
    }

    /// Execute stages until `done` (true) or a declined gate (false).
    async fn drive(&self, ws: &Workspace, key: &str, options: &PublishOptions) -> Result<bool> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Interrupted);
            }

            let task = tasks::publish::get(self.db.pool(), key)
                .await?
                .ok_or_else(|| Error::InvalidInput("publish task vanished mid-run".into()))?;

            let step = task.current_step;
            if step == PublishStep::Done {
                return Ok(true);
            }

            tracing::info!(%step, "entering stage");
            if !self.execute(step, ws, key, options).await? {
                return Ok(false);
            }
            tasks::publish::complete_step(self.db.pool(), key, step).await?;
        }
    }

    async fn execute(
        &self,
        step: PublishStep,
        ws: &Workspace,
        key: &str,
        options: &PublishOptions,
    ) -> Result<bool> {
        match step {
            PublishStep::Init => {
                ws.ensure_dirs().await?;
            }
            PublishStep::Zip => {
                archive::run(ws, &self.config).await?;
            }
            PublishStep::Report => {
                report::run(ws, &self.config, &*self.media).await?;
            }
            PublishStep::ReencodeAuth => {
                if !self
                    .authorise(options, "Report written. Proceed with re-encode and join?")
                    .await?
                {
                    return Ok(false);
                }
            }
            PublishStep::Reencode => {
                let rows = report::load(ws)?;
                reencode::run(ws, &self.config, &*self.media, &rows).await?;
            }
            PublishStep::Join => {
                let rows = report::load(ws)?;
                join::run(ws, &self.config, &*self.media, &rows).await?;
            }
            PublishStep::Timestamp => {
                let rows = report::load(ws)?;
                summary::run(ws, &self.config, &*self.media, &rows).await?;
            }
            PublishStep::UploadAuth => {
                if !self
                    .authorise(options, "Artefacts ready. Upload to the destination channel?")
                    .await?
                {
                    return Ok(false);
                }
            }
            PublishStep::Upload => {
                UploadStage {
                    ws,
                    config: &self.config,
                    pool: self.db.pool(),
                    client: self.client.clone(),
                    retry: &self.retry,
                    cancel: &self.cancel,
                    task_key: key,
                }
                .run()
                .await?;
            }
            PublishStep::Done => {}
        }
        Ok(true)
    }

    async fn authorise(&self, options: &PublishOptions, prompt: &str) -> Result<bool> {
        if options.assume_yes {
            return Ok(true);
        }
        let prompt = prompt.to_string();
        let confirmed = tokio::task::spawn_blocking(move || {
            dialoguer::Confirm::new()
                .with_prompt(prompt)
                .default(false)
                .interact()
        })
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
        .map_err(|e| Error::Io(std::io::Error::other(e)))?;
        Ok(confirmed)
    }
}

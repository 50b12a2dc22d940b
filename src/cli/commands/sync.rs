//! Sync command handler

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::app::Clonechat;
use crate::error::{Error, Result};
use crate::media::Ffmpeg;
use crate::sync::{SyncEngine, SyncOptions};
use crate::telegram::GatewayClient;

#[allow(clippy::too_many_arguments)]
pub async fn handle_sync(
    app: &Clonechat,
    cancel: CancellationToken,
    origin: Option<String>,
    dest: Option<String>,
    force_download: bool,
    extract_audio: bool,
    restart: bool,
    leave_origin: bool,
    publish_to: Option<String>,
    topic: Option<i64>,
    batch: bool,
    source: Option<PathBuf>,
) -> Result<()> {
    if extract_audio {
        Ffmpeg::ensure_available().await?;
    }

    let client = Arc::new(GatewayClient::connect(&app.config).await?);
    let media = Arc::new(Ffmpeg::new(app.config.time_limit));
    let engine = SyncEngine::new(
        client,
        media,
        app.database.clone(),
        app.config.clone(),
        cancel,
    );

    let options = SyncOptions {
        origin: origin.clone().unwrap_or_default(),
        destination: dest,
        force_download,
        extract_audio,
        restart,
        leave_origin,
        publish_to,
        topic,
    };

    if batch {
        let file = source.ok_or_else(|| {
            Error::InvalidInput("--batch requires --source <file>".into())
        })?;
        engine.run_batch(&file, &options).await?;
        println!("Batch finished");
        return Ok(());
    }

    if origin.is_none() {
        return Err(Error::InvalidInput("--origin is required".into()));
    }

    let report = engine.run(&options).await?;
    println!(
        "Cloned {} message(s) ({} skipped) into {}; checkpoint at {}",
        report.delivered, report.skipped, report.destination_chat_id, report.checkpoint
    );

    Ok(())
}

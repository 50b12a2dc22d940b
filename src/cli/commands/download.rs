//! Download command handler

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::app::Clonechat;
use crate::download::{DownloadEngine, DownloadOptions};
use crate::error::Result;
use crate::media::Ffmpeg;
use crate::telegram::GatewayClient;

#[allow(clippy::too_many_arguments)]
pub async fn handle_download(
    app: &Clonechat,
    cancel: CancellationToken,
    origin: String,
    limit: Option<usize>,
    output: Option<PathBuf>,
    restart: bool,
    delete_video: bool,
    message_id: Option<i64>,
) -> Result<()> {
    Ffmpeg::ensure_available().await?;

    let client = Arc::new(GatewayClient::connect(&app.config).await?);
    let media = Arc::new(Ffmpeg::new(app.config.time_limit));
    let engine = DownloadEngine::new(
        client,
        media,
        app.database.clone(),
        app.config.clone(),
        cancel,
    );

    let report = engine
        .run(&DownloadOptions {
            origin,
            limit,
            output,
            restart,
            delete_video,
            message_id,
        })
        .await?;

    println!(
        "Downloaded {} video(s); checkpoint at {}",
        report.downloaded, report.checkpoint
    );

    Ok(())
}

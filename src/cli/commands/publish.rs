//! Publish command handler

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::app::Clonechat;
use crate::error::Result;
use crate::media::Ffmpeg;
use crate::publish::{PublishOptions, PublishPipeline};
use crate::telegram::GatewayClient;

pub async fn handle_publish(
    app: &Clonechat,
    cancel: CancellationToken,
    folder: PathBuf,
    restart: bool,
    yes: bool,
) -> Result<()> {
    Ffmpeg::ensure_available().await?;

    let client = Arc::new(GatewayClient::connect(&app.config).await?);
    let media = Arc::new(Ffmpeg::new(app.config.time_limit));
    let pipeline = PublishPipeline::new(
        client,
        media,
        app.database.clone(),
        app.config.clone(),
        cancel,
    );

    pipeline
        .run(&PublishOptions {
            folder,
            restart,
            assume_yes: yes,
        })
        .await?;

    Ok(())
}

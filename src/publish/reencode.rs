//! Re-encode stage
//!
//! Normalises every video the report marked `reencode` into
//! `reencoded/`, numbered from the configured start index. Outputs that
//! already exist are complete (the transcoder renames atomically) and are
//! skipped on re-entry.

use std::path::PathBuf;

use crate::config::Config;
use crate::error::Result;
use crate::media::MediaProcessor;
use crate::publish::report::{Action, VideoRow};
use crate::publish::workspace::{truncate_name, Workspace};

/// Output file name for a `reencode` row.
pub fn output_name(row: &VideoRow, position: usize, config: &Config, parent_len: usize) -> String {
    let stem = PathBuf::from(&row.path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| row.order.to_string());
    let name = format!("{:03} - {}.mp4", config.start_index as usize + position, stem);
    truncate_name(&name, parent_len, config.max_path)
}

pub async fn run(
    ws: &Workspace,
    config: &Config,
    media: &dyn MediaProcessor,
    rows: &[VideoRow],
) -> Result<()> {
    ws.clean_partial_outputs(&ws.reencoded_dir()).await?;

    let targets: Vec<&VideoRow> = rows.iter().filter(|r| r.action == Action::Reencode).collect();
    if targets.is_empty() {
        tracing::info!("nothing to re-encode");
        return Ok(());
    }

    let parent_len = ws.reencoded_dir().to_string_lossy().chars().count();
    for (position, row) in targets.iter().enumerate() {
        let input = ws.source.join(&row.path);
        let output = ws
            .reencoded_dir()
            .join(output_name(row, position, config, parent_len));

        if tokio::fs::try_exists(&output).await? {
            tracing::debug!(output = %output.display(), "already re-encoded, skipping");
            continue;
        }

        tracing::info!(input = %row.path, output = %output.display(), "re-encoding");
        media.reencode(&input, &output).await?;
    }

    Ok(())
}

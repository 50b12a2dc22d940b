//! Report stage
//!
//! Probes every source video and writes `report/videos.csv`: duration,
//! resolution, codec, bitrate, size, and a recommended action per file.
//! The action column is authoritative for the rest of the pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{Config, ReencodePlan};
use crate::error::{Error, Result};
use crate::media::{tmp_path, MediaProcessor};
use crate::publish::workspace::Workspace;

/// Recommended handling for one video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Upload as-is, individually
    Single,
    /// Concatenate with its neighbours
    Join,
    /// Normalise first, then upload individually
    Reencode,
}

/// One row of `report/videos.csv`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRow {
    pub order: u32,
    pub path: String,
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub codec: String,
    pub bit_rate: u64,
    pub size_bytes: u64,
    pub action: Action,
}

/// Decide the action for one probed video.
///
/// Non-H.264 streams must be normalised before anything else; files
/// already beyond the joining bounds are uploaded alone; the rest join
/// unless the plan says otherwise.
pub fn decide_action(
    codec: &str,
    duration: Duration,
    size_bytes: u64,
    config: &Config,
) -> Action {
    if codec != "h264" {
        return Action::Reencode;
    }
    let size_limit = config.file_size_limit_mb * 1024 * 1024;
    if duration > config.duration_limit || size_bytes > size_limit {
        return Action::Single;
    }
    match config.reencode_plan {
        ReencodePlan::Single => Action::Single,
        ReencodePlan::Group => Action::Join,
    }
}

pub async fn run(ws: &Workspace, config: &Config, media: &dyn MediaProcessor) -> Result<()> {
    ws.clean_partial_outputs(&ws.report_dir()).await?;

    let (videos, _) = ws.source_files(config)?;
    let mut rows = Vec::with_capacity(videos.len());

    for (index, video) in videos.iter().enumerate() {
        let probe = media.probe(video).await?;
        let action = decide_action(&probe.codec, probe.duration, probe.size_bytes, config);
        rows.push(VideoRow {
            order: index as u32 + 1,
            path: ws.relative(video),
            duration_secs: probe.duration.as_secs_f64(),
            width: probe.width,
            height: probe.height,
            codec: probe.codec,
            bit_rate: probe.bit_rate,
            size_bytes: probe.size_bytes,
            action,
        });
    }

    tracing::info!(videos = rows.len(), "video inventory probed");
    write_rows(ws, &rows).await
}

async fn write_rows(ws: &Workspace, rows: &[VideoRow]) -> Result<()> {
    let output = ws.report_csv();
    let tmp = tmp_path(&output);

    let mut writer =
        csv::Writer::from_path(&tmp).map_err(|e| Error::Io(std::io::Error::other(e)))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;
    }
    writer
        .flush()
        .map_err(|e| Error::Io(std::io::Error::other(e)))?;
    drop(writer);

    tokio::fs::rename(&tmp, &output).await?;
    Ok(())
}

/// Read the inventory back for the downstream stages.
pub fn load(ws: &Workspace) -> Result<Vec<VideoRow>> {
    let mut reader = csv::Reader::from_path(ws.report_csv())
        .map_err(|e| Error::Io(std::io::Error::other(e)))?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record.map_err(|e| Error::Io(std::io::Error::other(e)))?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decide_action_reencode_wins() {
        let config = Config::default();
        assert_eq!(
            decide_action("hevc", Duration::from_secs(60), 1024, &config),
            Action::Reencode
        );
    }

    #[test]
    fn test_decide_action_oversized_is_single() {
        let config = Config::default();
        assert_eq!(
            decide_action("h264", config.duration_limit + Duration::from_secs(1), 1024, &config),
            Action::Single
        );
        let over = (config.file_size_limit_mb + 1) * 1024 * 1024;
        assert_eq!(
            decide_action("h264", Duration::from_secs(60), over, &config),
            Action::Single
        );
    }

    #[test]
    fn test_decide_action_honours_plan() {
        let mut config = Config::default();
        assert_eq!(
            decide_action("h264", Duration::from_secs(60), 1024, &config),
            Action::Join
        );
        config.reencode_plan = ReencodePlan::Single;
        assert_eq!(
            decide_action("h264", Duration::from_secs(60), 1024, &config),
            Action::Single
        );
    }
}

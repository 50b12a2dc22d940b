//! Timestamp stage
//!
//! Produces the human summary (`summary.txt`), the channel description
//! (`description.txt`), and the machine plan (`upload_plan.csv`). Plan
//! rows are sorted lexicographically by their workspace-relative path, so
//! the upload marker comparison and the execution order agree.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{format_duration_hms, Config};
use crate::error::{Error, Result};
use crate::media::{tmp_path, MediaProcessor};
use crate::publish::join::plan_groups;
use crate::publish::report::{Action, VideoRow};
use crate::publish::workspace::{truncate_name, Workspace};
use crate::publish::reencode;

/// One row of `upload_plan.csv`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRow {
    pub order: u32,
    /// `video` or `document`
    pub kind: String,
    /// Canonical relative path; also the resumption marker value
    pub path: String,
    pub caption: String,
}

impl PlanRow {
    /// Resolve the relative plan path against the workspace.
    pub fn absolute(&self, ws: &Workspace) -> PathBuf {
        match self.path.strip_prefix("source/") {
            Some(rest) => ws.source.join(rest),
            None => ws.root.join(&self.path),
        }
    }
}

struct VideoItem {
    path: String,
    duration: Duration,
    /// (offset, source name) per constituent clip; single-clip items empty
    segments: Vec<(Duration, String)>,
}

pub async fn run(ws: &Workspace, config: &Config, media: &dyn MediaProcessor, rows: &[VideoRow]) -> Result<()> {
    ws.clean_partial_outputs(&ws.summary_dir()).await?;

    let transition = transition_duration(ws, config, media).await?;
    let mut items = Vec::new();

    // Joined outputs carry per-segment offsets
    let joined_parent = ws.joined_dir().to_string_lossy().chars().count();
    for group in plan_groups(rows, config, &ws.project_name) {
        let name = truncate_name(&group.output_name, joined_parent, config.max_path);
        let mut segments = Vec::new();
        let mut offset = Duration::ZERO;
        for (index, input) in group.inputs.iter().enumerate() {
            if index > 0 {
                offset += transition;
            }
            segments.push((offset, clip_name(input)));
            let duration = rows
                .iter()
                .find(|r| &r.path == input)
                .map(|r| Duration::from_secs_f64(r.duration_secs))
                .unwrap_or_default();
            offset += duration;
        }
        items.push(VideoItem {
            path: format!("joined/{}", name),
            duration: offset,
            segments,
        });
    }

    // Re-encoded outputs, numbered the way the reencode stage names them
    let reencoded_parent = ws.reencoded_dir().to_string_lossy().chars().count();
    for (position, row) in rows
        .iter()
        .filter(|r| r.action == Action::Reencode)
        .enumerate()
    {
        let name = reencode::output_name(row, position, config, reencoded_parent);
        items.push(VideoItem {
            path: format!("reencoded/{}", name),
            duration: Duration::from_secs_f64(row.duration_secs),
            segments: Vec::new(),
        });
    }

    // Singles straight from the source folder
    for row in rows.iter().filter(|r| r.action == Action::Single) {
        items.push(VideoItem {
            path: format!("source/{}", row.path),
            duration: Duration::from_secs_f64(row.duration_secs),
            segments: Vec::new(),
        });
    }

    // The marker comparison in the upload stage is lexicographic;
    // execution order must match it.
    items.sort_by(|a, b| a.path.cmp(&b.path));

    let documents = list_archive_parts(ws).await?;

    let mut plan = Vec::new();
    for (index, item) in items.iter().enumerate() {
        let hashtag = format!("#{:03}", config.hashtag_index as usize + index);
        let label = if config.descriptions_auto_adapt {
            format!("{} {:02}", ws.project_name, index + 1)
        } else {
            clip_name(&item.path)
        };
        plan.push(PlanRow {
            order: index as u32 + 1,
            kind: "video".into(),
            path: item.path.clone(),
            caption: format!("{} {}", hashtag, label),
        });
    }
    for name in &documents {
        plan.push(PlanRow {
            order: plan.len() as u32 + 1,
            kind: "document".into(),
            path: format!("zipped/{}", name),
            caption: format!("{} {}", config.document_hashtag, config.document_title),
        });
    }

    let total_duration: Duration = items.iter().map(|i| i.duration).sum();
    let total_size = total_plan_size(ws, &plan).await?;

    let summary = render_summary(ws, config, &items, &documents, total_duration, total_size).await?;
    let description = format!(
        "{}\nTotal size: {}\nTotal duration: {}",
        ws.project_name,
        format_size(total_size),
        format_duration_hms(total_duration)
    );

    write_atomic(&ws.summary_txt(), summary.as_bytes()).await?;
    write_atomic(&ws.summary_dir().join("description.txt"), description.as_bytes()).await?;
    write_plan(ws, &plan).await?;

    tracing::info!(videos = items.len(), documents = documents.len(), "upload plan written");
    Ok(())
}

/// Read the plan back for the upload stage.
pub fn load_plan(ws: &Workspace) -> Result<Vec<PlanRow>> {
    let mut reader = csv::Reader::from_path(ws.upload_plan_csv())
        .map_err(|e| Error::Io(std::io::Error::other(e)))?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record.map_err(|e| Error::Io(std::io::Error::other(e)))?);
    }
    Ok(rows)
}

async fn render_summary(
    ws: &Workspace,
    config: &Config,
    items: &[VideoItem],
    documents: &[String],
    total_duration: Duration,
    total_size: u64,
) -> Result<String> {
    let mut out = String::new();

    if let Some(header) = &config.summary_top {
        out.push_str(&tokio::fs::read_to_string(header).await?);
        out.push('\n');
    }

    out.push_str(&ws.project_name);
    out.push_str("\n\n");

    for (index, item) in items.iter().enumerate() {
        let hashtag = format!("#{:03}", config.hashtag_index as usize + index);
        out.push_str(&format!("{} {}\n", hashtag, clip_name(&item.path)));
        for (offset, name) in &item.segments {
            out.push_str(&format!("  {} {}\n", format_duration_hms(*offset), name));
        }
    }

    if !documents.is_empty() {
        out.push('\n');
        out.push_str(&format!("{} {}\n", config.document_hashtag, config.document_title));
        for name in documents {
            out.push_str(&format!("  {}\n", name));
        }
    }

    out.push('\n');
    out.push_str(&format!("Total size: {}\n", format_size(total_size)));
    out.push_str(&format!(
        "Total duration: {}\n",
        format_duration_hms(total_duration)
    ));

    if let Some(footer) = &config.summary_bot {
        out.push('\n');
        out.push_str(&tokio::fs::read_to_string(footer).await?);
    }

    Ok(out)
}

async fn transition_duration(
    ws: &Workspace,
    config: &Config,
    media: &dyn MediaProcessor,
) -> Result<Duration> {
    if !config.activate_transition {
        return Ok(Duration::ZERO);
    }
    let clip = ws.transition_clip();
    if !tokio::fs::try_exists(&clip).await? {
        return Ok(Duration::ZERO);
    }
    Ok(media.probe(&clip).await?.duration)
}

async fn list_archive_parts(ws: &Workspace) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = match tokio::fs::read_dir(ws.zipped_dir()).await {
        Ok(entries) => entries,
        Err(_) => return Ok(names),
    };
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".zip") {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

async fn total_plan_size(ws: &Workspace, plan: &[PlanRow]) -> Result<u64> {
    let mut total = 0u64;
    for row in plan {
        let path = row.absolute(ws);
        match tokio::fs::metadata(&path).await {
            Ok(meta) => total += meta.len(),
            Err(_) => tracing::warn!(path = %path.display(), "plan entry missing on disk"),
        }
    }
    Ok(total)
}

async fn write_plan(ws: &Workspace, plan: &[PlanRow]) -> Result<()> {
    let output = ws.upload_plan_csv();
    let tmp = tmp_path(&output);

    let mut writer =
        csv::Writer::from_path(&tmp).map_err(|e| Error::Io(std::io::Error::other(e)))?;
    for row in plan {
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

async fn write_atomic(path: &std::path::Path, content: &[u8]) -> Result<()> {
    let tmp = tmp_path(path);
    tokio::fs::write(&tmp, content).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

fn clip_name(path: &str) -> String {
    PathBuf::from(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

fn format_size(bytes: u64) -> String {
    const GB: f64 = 1024.0 * 1024.0 * 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    let bytes = bytes as f64;
    if bytes >= GB {
        format!("{:.2} GB", bytes / GB)
    } else {
        format!("{:.1} MB", bytes / MB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(1024 * 1024 * 1024), "1.00 GB");
        assert_eq!(format_size(50 * 1024 * 1024), "50.0 MB");
    }

    #[test]
    fn test_plan_row_resolution() {
        let config = Config::default();
        let ws = Workspace::new(&config, std::path::Path::new("/course"), "course");

        let source_row = PlanRow {
            order: 1,
            kind: "video".into(),
            path: "source/week1/a.mp4".into(),
            caption: String::new(),
        };
        assert_eq!(
            source_row.absolute(&ws),
            PathBuf::from("/course/week1/a.mp4")
        );

        let artefact_row = PlanRow {
            order: 2,
            kind: "video".into(),
            path: "joined/001 - course.mp4".into(),
            caption: String::new(),
        };
        assert!(artefact_row.absolute(&ws).ends_with("course/joined/001 - course.mp4"));
    }

    #[test]
    fn test_clip_name_strips_dirs_and_extension() {
        assert_eq!(clip_name("source/week1/lesson.mp4"), "lesson");
        assert_eq!(clip_name("joined/001 - c.mp4"), "001 - c");
    }
}

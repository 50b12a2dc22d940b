//! Join stage
//!
//! Concatenates the report's `join` rows into groups bounded by the
//! duration and size limits, in inventory order. Group composition is a
//! pure function of the report and the config, so the timestamp stage can
//! recompute it deterministically.

use crate::config::Config;
use crate::error::Result;
use crate::media::MediaProcessor;
use crate::publish::report::{Action, VideoRow};
use crate::publish::workspace::{truncate_name, Workspace};

/// One concatenation group
#[derive(Debug, Clone, PartialEq)]
pub struct JoinGroup {
    pub output_name: String,
    /// Relative source paths, in order
    pub inputs: Vec<String>,
    pub duration_secs: f64,
    pub size_bytes: u64,
}

/// Pack `join` rows greedily under the configured bounds.
pub fn plan_groups(rows: &[VideoRow], config: &Config, project: &str) -> Vec<JoinGroup> {
    let duration_limit = config.duration_limit.as_secs_f64();
    let size_limit = config.file_size_limit_mb * 1024 * 1024;

    let mut groups: Vec<JoinGroup> = Vec::new();
    let mut inputs: Vec<String> = Vec::new();
    let mut duration = 0f64;
    let mut size = 0u64;

    let close = |inputs: &mut Vec<String>, duration: &mut f64, size: &mut u64,
                 groups: &mut Vec<JoinGroup>| {
        if inputs.is_empty() {
            return;
        }
        let index = config.start_index as usize + groups.len();
        groups.push(JoinGroup {
            output_name: format!("{:03} - {}.mp4", index, project),
            inputs: std::mem::take(inputs),
            duration_secs: *duration,
            size_bytes: *size,
        });
        *duration = 0.0;
        *size = 0;
    };

    for row in rows.iter().filter(|r| r.action == Action::Join) {
        let over_duration = duration + row.duration_secs > duration_limit;
        let over_size = size + row.size_bytes > size_limit;
        if !inputs.is_empty() && (over_duration || over_size) {
            close(&mut inputs, &mut duration, &mut size, &mut groups);
        }
        duration += row.duration_secs;
        size += row.size_bytes;
        inputs.push(row.path.clone());
    }
    close(&mut inputs, &mut duration, &mut size, &mut groups);

    groups
}

pub async fn run(
    ws: &Workspace,
    config: &Config,
    media: &dyn MediaProcessor,
    rows: &[VideoRow],
) -> Result<()> {
    ws.clean_partial_outputs(&ws.joined_dir()).await?;

    let groups = plan_groups(rows, config, &ws.project_name);
    if groups.is_empty() {
        tracing::info!("nothing to join");
        return Ok(());
    }

    let transition = if config.activate_transition {
        let clip = ws.transition_clip();
        tokio::fs::try_exists(&clip).await?.then_some(clip)
    } else {
        None
    };

    let parent_len = ws.joined_dir().to_string_lossy().chars().count();
    for group in &groups {
        let output = ws
            .joined_dir()
            .join(truncate_name(&group.output_name, parent_len, config.max_path));
        if tokio::fs::try_exists(&output).await? {
            tracing::debug!(output = %output.display(), "already joined, skipping");
            continue;
        }

        let mut paths = Vec::with_capacity(group.inputs.len() * 2);
        for (index, input) in group.inputs.iter().enumerate() {
            if index > 0 {
                if let Some(clip) = &transition {
                    paths.push(clip.clone());
                }
            }
            paths.push(ws.source.join(input));
        }

        tracing::info!(
            output = %output.display(),
            clips = group.inputs.len(),
            duration_secs = group.duration_secs as u64,
            "concatenating group"
        );
        media.concatenate(&paths, &output).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(path: &str, duration_secs: f64, size_mb: u64, action: Action) -> VideoRow {
        VideoRow {
            order: 0,
            path: path.into(),
            duration_secs,
            width: 1280,
            height: 720,
            codec: "h264".into(),
            bit_rate: 0,
            size_bytes: size_mb * 1024 * 1024,
            action,
        }
    }

    #[test]
    fn test_plan_groups_bounded_by_duration() {
        let mut config = Config::default();
        config.duration_limit = std::time::Duration::from_secs(100);

        let rows = vec![
            row("a.mp4", 60.0, 1, Action::Join),
            row("b.mp4", 60.0, 1, Action::Join),
            row("c.mp4", 30.0, 1, Action::Join),
        ];

        let groups = plan_groups(&rows, &config, "course");
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].inputs, vec!["a.mp4"]);
        assert_eq!(groups[1].inputs, vec!["b.mp4", "c.mp4"]);
        assert_eq!(groups[0].output_name, "001 - course.mp4");
        assert_eq!(groups[1].output_name, "002 - course.mp4");
    }

    #[test]
    fn test_plan_groups_bounded_by_size() {
        let mut config = Config::default();
        config.file_size_limit_mb = 100;

        let rows = vec![
            row("a.mp4", 10.0, 60, Action::Join),
            row("b.mp4", 10.0, 60, Action::Join),
        ];

        let groups = plan_groups(&rows, &config, "p");
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_plan_groups_ignores_non_join_rows() {
        let config = Config::default();
        let rows = vec![
            row("a.mp4", 10.0, 1, Action::Single),
            row("b.mp4", 10.0, 1, Action::Reencode),
        ];
        assert!(plan_groups(&rows, &config, "p").is_empty());
    }

    #[test]
    fn test_plan_groups_is_deterministic() {
        let config = Config::default();
        let rows = vec![
            row("a.mp4", 10.0, 1, Action::Join),
            row("b.mp4", 10.0, 1, Action::Join),
        ];
        assert_eq!(
            plan_groups(&rows, &config, "p"),
            plan_groups(&rows, &config, "p")
        );
    }
}

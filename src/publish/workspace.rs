//! Publish workspace layout
//!
//! Each project owns a subtree under `data/project_workspace/<project>/`
//! with one directory per artefact stage. Stage outputs are written as
//! `*.tmp` and renamed into place, so anything without the suffix is a
//! complete artefact.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Error, Result};

/// Paths for one publish project
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Canonical source folder being published
    pub source: PathBuf,
    /// Workspace root for generated artefacts
    pub root: PathBuf,
    pub project_name: String,
}

impl Workspace {
    pub fn new(config: &Config, source: &Path, project_name: &str) -> Self {
        Self {
            source: source.to_path_buf(),
            root: config.workspace_root(project_name),
            project_name: project_name.to_string(),
        }
    }

    pub fn zipped_dir(&self) -> PathBuf {
        self.root.join("zipped")
    }

    pub fn report_dir(&self) -> PathBuf {
        self.root.join("report")
    }

    pub fn reencoded_dir(&self) -> PathBuf {
        self.root.join("reencoded")
    }

    pub fn joined_dir(&self) -> PathBuf {
        self.root.join("joined")
    }

    pub fn summary_dir(&self) -> PathBuf {
        self.root.join("summary")
    }

    pub fn report_csv(&self) -> PathBuf {
        self.report_dir().join("videos.csv")
    }

    pub fn summary_txt(&self) -> PathBuf {
        self.summary_dir().join("summary.txt")
    }

    pub fn upload_plan_csv(&self) -> PathBuf {
        self.summary_dir().join("upload_plan.csv")
    }

    /// Transition clip inserted between joined videos when enabled.
    pub fn transition_clip(&self) -> PathBuf {
        self.source.join("transition.mp4")
    }

    pub async fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            self.zipped_dir(),
            self.report_dir(),
            self.reencoded_dir(),
            self.joined_dir(),
            self.summary_dir(),
        ] {
            tokio::fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }

    /// Source files split into (videos, others), each sorted by relative
    /// path so every stage sees the same deterministic order.
    pub fn source_files(&self, config: &Config) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
        let mut videos = Vec::new();
        let mut others = Vec::new();

        for entry in WalkDir::new(&self.source).sort_by_file_name() {
            let entry = entry
                .map_err(|e| Error::InvalidInput(format!("cannot walk source folder: {e}")))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            if path == self.transition_clip() {
                continue;
            }
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase())
                .unwrap_or_default();
            if config.is_video_extension(&ext) {
                videos.push(path);
            } else {
                others.push(path);
            }
        }

        videos.sort();
        others.sort();
        Ok((videos, others))
    }

    /// Path relative to the source folder, with forward slashes.
    pub fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.source)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    /// Drop stale `*.tmp` leftovers in a stage directory before re-entry.
    pub async fn clean_partial_outputs(&self, dir: &Path) -> Result<()> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(_) => return Ok(()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("tmp") {
                tracing::debug!(path = %path.display(), "removing partial output");
                tokio::fs::remove_file(&path).await?;
            }
        }
        Ok(())
    }
}

/// Clamp a generated file name so the full path stays under the limit.
/// The extension survives truncation.
pub fn truncate_name(name: &str, parent_len: usize, max_path: usize) -> String {
    let budget = max_path.saturating_sub(parent_len + 1);
    if name.chars().count() <= budget {
        return name.to_string();
    }

    match name.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() => {
            let keep = budget.saturating_sub(ext.len() + 1).max(1);
            let stem: String = stem.chars().take(keep).collect();
            format!("{}.{}", stem, ext)
        }
        _ => name.chars().take(budget.max(1)).collect(),
    }
}

//! Archive stage
//!
//! Packs every non-video source file into size-bounded zip parts under
//! `zipped/`. Parts are deterministic for a given source tree, so
//! re-entry after a crash skips the parts that already exist.

use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::media::tmp_path;
use crate::publish::workspace::{truncate_name, Workspace};

pub async fn run(ws: &Workspace, config: &Config) -> Result<()> {
    if config.archive_mode != "zip" {
        return Err(Error::Configuration(format!(
            "unsupported archive MODE '{}'",
            config.archive_mode
        )));
    }

    ws.clean_partial_outputs(&ws.zipped_dir()).await?;

    let (_, others) = ws.source_files(config)?;
    if others.is_empty() {
        tracing::info!("no non-video files to archive");
        return Ok(());
    }

    let limit_bytes = config.file_size_limit_mb * 1024 * 1024;
    let parts = plan_parts(&others, limit_bytes)?;
    tracing::info!(files = others.len(), parts = parts.len(), "archiving non-video files");

    let parent_len = ws.zipped_dir().to_string_lossy().chars().count();
    for (index, part) in parts.iter().enumerate() {
        let name = format!("{}_part{:03}.zip", ws.project_name, index + 1);
        let output = ws
            .zipped_dir()
            .join(truncate_name(&name, parent_len, config.max_path));

        if tokio::fs::try_exists(&output).await? {
            tracing::debug!(part = %output.display(), "archive part already exists, skipping");
            continue;
        }

        let entries: Vec<(PathBuf, String)> = part
            .iter()
            .map(|p| (p.clone(), ws.relative(p)))
            .collect();
        let tmp = tmp_path(&output);
        let tmp_for_task = tmp.clone();

        tokio::task::spawn_blocking(move || write_part(&entries, &tmp_for_task))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))??;

        tokio::fs::rename(&tmp, &output).await?;
        tracing::info!(part = %output.display(), files = part.len(), "archive part written");
    }

    Ok(())
}

/// Greedy split by on-disk size; a single oversized file still gets its
/// own part rather than failing the stage.
fn plan_parts(files: &[PathBuf], limit_bytes: u64) -> Result<Vec<Vec<PathBuf>>> {
    let mut parts: Vec<Vec<PathBuf>> = Vec::new();
    let mut current: Vec<PathBuf> = Vec::new();
    let mut current_size = 0u64;

    for file in files {
        let size = std::fs::metadata(file)?.len();
        if !current.is_empty() && current_size + size > limit_bytes {
            parts.push(std::mem::take(&mut current));
            current_size = 0;
        }
        current_size += size;
        current.push(file.clone());
    }
    if !current.is_empty() {
        parts.push(current);
    }

    Ok(parts)
}

fn write_part(entries: &[(PathBuf, String)], output: &Path) -> Result<()> {
    let file = std::fs::File::create(output)?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(true);

    for (path, name) in entries {
        writer
            .start_file(name.clone(), options)
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;
        let mut source = std::fs::File::open(path)?;
        std::io::copy(&mut source, &mut writer)?;
    }

    writer
        .finish()
        .map_err(|e| Error::Io(std::io::Error::other(e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str, size: usize) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, vec![0u8; size]).unwrap();
        path
    }

    #[test]
    fn test_plan_parts_respects_limit() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![
            touch(dir.path(), "a", 600),
            touch(dir.path(), "b", 600),
            touch(dir.path(), "c", 600),
        ];

        let parts = plan_parts(&files, 1000).unwrap();
        assert_eq!(parts.len(), 3);

        let parts = plan_parts(&files, 1300).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].len(), 2);
    }

    #[test]
    fn test_plan_parts_oversized_file_gets_own_part() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![touch(dir.path(), "big", 5000), touch(dir.path(), "small", 10)];

        let parts = plan_parts(&files, 1000).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].len(), 1);
    }

    #[test]
    fn test_write_part_produces_readable_zip() {
        let dir = tempfile::tempdir().unwrap();
        let source = touch(dir.path(), "doc.txt", 64);
        let output = dir.path().join("part.zip");

        write_part(&[(source, "doc.txt".into())], &output).unwrap();

        let archive = std::fs::File::open(&output).unwrap();
        let zip = zip::ZipArchive::new(archive).unwrap();
        assert_eq!(zip.len(), 1);
    }
}

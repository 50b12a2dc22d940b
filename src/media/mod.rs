//! External transcoder integration
//!
//! Wraps the `ffmpeg`/`ffprobe` pair behind the [`MediaProcessor`] trait
//! so the engines and the publish pipeline can be exercised without the
//! tools installed. Every spawned process carries a wall-clock limit;
//! expiry kills the child and classifies the operation transient.

use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::error::{Error, Result};

/// Probe result for one video file
#[derive(Debug, Clone)]
pub struct VideoProbe {
    pub duration: Duration,
    pub width: u32,
    pub height: u32,
    pub codec: String,
    pub bit_rate: u64,
    pub size_bytes: u64,
}

/// Media operations the pipeline depends on
#[async_trait]
pub trait MediaProcessor: Send + Sync {
    /// Inspect a video file.
    async fn probe(&self, input: &Path) -> Result<VideoProbe>;

    /// Emit an MP3 next to a video.
    async fn extract_audio(&self, input: &Path, output: &Path) -> Result<()>;

    /// Re-encode to the normalised H.264/AAC profile.
    async fn reencode(&self, input: &Path, output: &Path) -> Result<()>;

    /// Concatenate already-normalised videos into one output.
    async fn concatenate(&self, inputs: &[PathBuf], output: &Path) -> Result<()>;
}

/// `ffmpeg`/`ffprobe` backed implementation
pub struct Ffmpeg {
    time_limit: Duration,
}

impl Ffmpeg {
    pub fn new(time_limit: Duration) -> Self {
        Self { time_limit }
    }

    /// Verify the transcoder is on PATH before any pipeline work starts.
    pub async fn ensure_available() -> Result<()> {
        for tool in ["ffmpeg", "ffprobe"] {
            let spawned = Command::new(tool).arg("-version").output().await;
            match spawned {
                Ok(output) if output.status.success() => {}
                Ok(output) => {
                    return Err(Error::ExternalTool(format!(
                        "{} -version exited with {}",
                        tool, output.status
                    )))
                }
                Err(_) => {
                    return Err(Error::ExternalTool(format!("{} not found in PATH", tool)))
                }
            }
        }
        Ok(())
    }

    /// Run a transcoder command under the wall-clock limit.
    ///
    /// Timeout kills the child (tokio drops the handle with kill-on-drop)
    /// and surfaces as transient; a non-zero exit is an external-tool
    /// failure with the tail of stderr attached.
    async fn run(&self, mut cmd: Command, description: &str) -> Result<Output> {
        cmd.kill_on_drop(true);
        let output = match tokio::time::timeout(self.time_limit, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(io_err)) => {
                return Err(Error::ExternalTool(format!("{} failed: {}", description, io_err)))
            }
            Err(_elapsed) => {
                return Err(Error::Transient(format!(
                    "{} timed out after {}s and was killed",
                    description,
                    self.time_limit.as_secs()
                )))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr
                .lines()
                .rev()
                .take(5)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            return Err(Error::ExternalTool(format!(
                "{} exited with {}: {}",
                description, output.status, tail
            )));
        }

        Ok(output)
    }

    /// Run ffmpeg writing to `<output>.tmp`, then rename into place so a
    /// killed run never leaves a plausible-looking artefact.
    async fn run_to_output(
        &self,
        mut cmd: Command,
        output: &Path,
        format: &str,
        description: &str,
    ) -> Result<()> {
        let tmp = tmp_path(output);
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        cmd.arg("-f").arg(format).arg(&tmp);
        let result = self.run(cmd, description).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(&tmp).await;
        }
        result?;

        tokio::fs::rename(&tmp, output).await?;
        Ok(())
    }
}

/// Sibling temporary name: `video.mp4` -> `video.mp4.tmp`.
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
    size: Option<String>,
}

#[async_trait]
impl MediaProcessor for Ffmpeg {
    async fn probe(&self, input: &Path) -> Result<VideoProbe> {
        let mut cmd = Command::new("ffprobe");
        cmd.args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(input);

        let output = self.run(cmd, "ffprobe").await?;
        let parsed: ProbeOutput = serde_json::from_slice(&output.stdout)?;

        let video = parsed
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .ok_or_else(|| {
                Error::ExternalTool(format!("no video stream in {}", input.display()))
            })?;
        let format = parsed
            .format
            .ok_or_else(|| Error::ExternalTool("ffprobe returned no format block".into()))?;

        let duration_secs: f64 = format
            .duration
            .as_deref()
            .and_then(|d| d.parse().ok())
            .unwrap_or(0.0);

        Ok(VideoProbe {
            duration: Duration::from_secs_f64(duration_secs.max(0.0)),
            width: video.width.unwrap_or(0),
            height: video.height.unwrap_or(0),
            codec: video.codec_name.clone().unwrap_or_else(|| "unknown".into()),
            bit_rate: format
                .bit_rate
                .as_deref()
                .and_then(|b| b.parse().ok())
                .unwrap_or(0),
            size_bytes: format
                .size
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
        })
    }

    async fn extract_audio(&self, input: &Path, output: &Path) -> Result<()> {
        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-y")
            .args(["-loglevel", "error"])
            .arg("-i")
            .arg(input)
            .args(["-vn", "-codec:a", "libmp3lame", "-q:a", "2"]);
        self.run_to_output(cmd, output, "mp3", "audio extraction").await
    }

    async fn reencode(&self, input: &Path, output: &Path) -> Result<()> {
        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-y")
            .args(["-loglevel", "error"])
            .arg("-i")
            .arg(input)
            .args([
                "-c:v",
                "libx264",
                "-preset",
                "veryfast",
                "-crf",
                "23",
                "-c:a",
                "aac",
                "-movflags",
                "+faststart",
            ]);
        self.run_to_output(cmd, output, "mp4", "re-encode").await
    }

    async fn concatenate(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
        if inputs.is_empty() {
            return Err(Error::InvalidInput("nothing to concatenate".into()));
        }

        // concat demuxer wants a list file; single quotes are escaped the
        // ffmpeg way ('\'' inside a quoted string)
        let list_path = tmp_path(&output.with_extension("list"));
        let mut list = String::new();
        for input in inputs {
            let escaped = input.display().to_string().replace('\'', "'\\''");
            list.push_str(&format!("file '{}'\n", escaped));
        }
        if let Some(parent) = list_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&list_path, list).await?;

        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-y")
            .args(["-loglevel", "error", "-f", "concat", "-safe", "0"])
            .arg("-i")
            .arg(&list_path)
            .args(["-c", "copy"]);
        let result = self.run_to_output(cmd, output, "mp4", "concatenation").await;
        let _ = tokio::fs::remove_file(&list_path).await;
        result
    }
}

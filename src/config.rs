//! Runtime configuration loaded from the environment
//!
//! All knobs are read once at startup into an immutable [`Config`] value
//! that is threaded through engine constructors. Nothing reads the process
//! environment after this point.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Platform caption limit in characters; longer captions are truncated
/// with a trailing ellipsis.
pub const CAPTION_LIMIT: usize = 1024;

/// Immutable runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Platform API credentials, forwarded to the gateway session
    pub api_id: i32,
    pub api_hash: String,

    /// Base URL of the local MTProto gateway process
    pub gateway_url: String,

    /// Pause between successive outbound messages
    pub cloner_delay: Duration,

    /// Scratch directory root for download-upload payloads
    pub download_path: PathBuf,

    /// Root for the task store, workspaces, and the application log
    pub data_dir: PathBuf,

    /// Append-only clone results file
    pub links_file: PathBuf,

    /// Upper bound for archive parts and joined videos, in megabytes
    pub file_size_limit_mb: u64,

    /// Archive algorithm; only `zip` is supported
    pub archive_mode: String,

    /// Extensions treated as video in the publish pipeline (lowercase, no dot)
    pub video_extensions: Vec<String>,

    /// `single` or `group`
    pub reencode_plan: ReencodePlan,

    /// Upper bound per joined output
    pub duration_limit: Duration,

    /// Insert a transition clip between joined videos
    pub activate_transition: bool,

    /// First numeric index used in generated filenames
    pub start_index: u32,

    /// First number used for per-file hashtags in summaries
    pub hashtag_index: u32,

    /// Hashtag attached to document uploads in summaries
    pub document_hashtag: String,

    /// Section label for document uploads in summaries
    pub document_title: String,

    /// Literal header/footer files injected into summary.txt
    pub summary_top: Option<PathBuf>,
    pub summary_bot: Option<PathBuf>,

    /// Rewrite captions to match uploaded order
    pub descriptions_auto_adapt: bool,

    /// Append an invite link beside the channel in the link file
    pub register_invite_link: bool,

    /// Truncation limit for generated workspace paths
    pub max_path: usize,

    /// Destination-selection policy for publish
    pub create_new_channel: bool,
    pub chat_id: Option<i64>,
    pub moc_chat_id: Option<i64>,

    /// Delete intermediate videos after upload
    pub autodel_video_temp: bool,

    /// Transcoder wall-clock limit
    pub time_limit: Duration,
}

/// Re-encode planning mode for the publish report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReencodePlan {
    /// Every video is uploaded individually; nothing is joined
    Single,
    /// Joinable videos are concatenated into bounded groups
    Group,
}

impl std::str::FromStr for ReencodePlan {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "single" => Ok(ReencodePlan::Single),
            "group" => Ok(ReencodePlan::Group),
            other => Err(Error::Configuration(format!(
                "REENCODE_PLAN must be 'single' or 'group', got '{}'",
                other
            ))),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// `dotenv` has already populated the environment from `.env` by the
    /// time this runs. Credentials are the only required keys.
    pub fn from_env() -> Result<Self> {
        let api_id = require("TELEGRAM_API_ID")?
            .parse::<i32>()
            .map_err(|_| Error::Configuration("TELEGRAM_API_ID must be an integer".into()))?;
        let api_hash = require("TELEGRAM_API_HASH")?;

        let data_dir = PathBuf::from(var_or("CLONER_DATA_DIR", "data"));

        Ok(Self {
            api_id,
            api_hash,
            gateway_url: var_or("TELEGRAM_GATEWAY_URL", "http://127.0.0.1:8754"),
            cloner_delay: Duration::from_secs(parse_or("CLONER_DELAY_SECONDS", 2)?),
            download_path: std::env::var("CLONER_DOWNLOAD_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir.join("downloads")),
            links_file: PathBuf::from(var_or("LINKS_FILE_PATH", "links_canais.txt")),
            file_size_limit_mb: parse_or("FILE_SIZE_LIMIT_MB", 1950)?,
            archive_mode: var_or("MODE", "zip"),
            video_extensions: var_or("VIDEO_EXTENSIONS", "mp4,mkv,avi,webm,mov,wmv,m4v,ts")
                .split(',')
                .map(|s| s.trim().trim_start_matches('.').to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            reencode_plan: var_or("REENCODE_PLAN", "group").parse()?,
            duration_limit: parse_duration_hms(&var_or("DURATION_LIMIT", "02:00:00.000"))?,
            activate_transition: parse_bool("ACTIVATE_TRANSITION", false),
            start_index: parse_or("START_INDEX", 1)?,
            hashtag_index: parse_or("HASHTAG_INDEX", 1)?,
            document_hashtag: var_or("DOCUMENT_HASHTAG", "#doc"),
            document_title: var_or("DOCUMENT_TITLE", "Documents"),
            summary_top: std::env::var("PATH_SUMMARY_TOP").ok().map(PathBuf::from),
            summary_bot: std::env::var("PATH_SUMMARY_BOT").ok().map(PathBuf::from),
            descriptions_auto_adapt: parse_bool("DESCRIPTIONS_AUTO_ADAPT", false),
            register_invite_link: parse_bool("REGISTER_INVITE_LINK", false),
            max_path: parse_or("MAX_PATH", 240)?,
            create_new_channel: parse_bool("CREATE_NEW_CHANNEL", true),
            chat_id: parse_opt("CHAT_ID")?,
            moc_chat_id: parse_opt("MOC_CHAT_ID")?,
            autodel_video_temp: parse_bool("AUTODEL_VIDEO_TEMP", true),
            time_limit: Duration::from_secs(parse_or::<u64>("TIME_LIMIT", 120)? * 60),
            data_dir,
        })
    }

    /// Path of the SQLite task store.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("clonechat.db")
    }

    /// Path of the application log file.
    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("app.log")
    }

    /// Workspace root for a publish project.
    pub fn workspace_root(&self, project: &str) -> PathBuf {
        self.data_dir.join("project_workspace").join(project)
    }

    /// True when `ext` (lowercase, no dot) counts as video.
    pub fn is_video_extension(&self, ext: &str) -> bool {
        self.video_extensions.iter().any(|e| e == ext)
    }
}

impl Default for Config {
    /// Documented defaults with empty credentials; `from_env` is the
    /// real loader, this exists for construction in tests and embedders.
    fn default() -> Self {
        Self {
            api_id: 0,
            api_hash: String::new(),
            gateway_url: "http://127.0.0.1:8754".into(),
            cloner_delay: Duration::from_secs(2),
            download_path: PathBuf::from("data/downloads"),
            data_dir: PathBuf::from("data"),
            links_file: PathBuf::from("links_canais.txt"),
            file_size_limit_mb: 1950,
            archive_mode: "zip".into(),
            video_extensions: ["mp4", "mkv", "avi", "webm", "mov", "wmv", "m4v", "ts"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            reencode_plan: ReencodePlan::Group,
            duration_limit: Duration::from_secs(2 * 3600),
            activate_transition: false,
            start_index: 1,
            hashtag_index: 1,
            document_hashtag: "#doc".into(),
            document_title: "Documents".into(),
            summary_top: None,
            summary_bot: None,
            descriptions_auto_adapt: false,
            register_invite_link: false,
            max_path: 240,
            create_new_channel: true,
            chat_id: None,
            moc_chat_id: None,
            autodel_video_temp: true,
            time_limit: Duration::from_secs(120 * 60),
        }
    }
}

fn require(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| Error::Configuration(format!("{} is required", key)))
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .map_err(|_| Error::Configuration(format!("{} has an invalid value: '{}'", key, v))),
        Err(_) => Ok(default),
    }
}

fn parse_opt(key: &str) -> Result<Option<i64>> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| Error::Configuration(format!("{} must be an integer", key))),
        _ => Ok(None),
    }
}

fn parse_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// Parse `HH:MM:SS.mmm` (milliseconds optional) into a [`Duration`].
pub fn parse_duration_hms(s: &str) -> Result<Duration> {
    let invalid = || Error::Configuration(format!("invalid duration '{}', expected HH:MM:SS.mmm", s));

    let (hms, millis) = match s.split_once('.') {
        Some((hms, frac)) => {
            let frac = format!("{:0<3}", frac);
            let ms = frac[..3].parse::<u64>().map_err(|_| invalid())?;
            (hms, ms)
        }
        None => (s, 0),
    };

    let parts: Vec<&str> = hms.split(':').collect();
    if parts.len() != 3 {
        return Err(invalid());
    }
    let hours = parts[0].parse::<u64>().map_err(|_| invalid())?;
    let minutes = parts[1].parse::<u64>().map_err(|_| invalid())?;
    let seconds = parts[2].parse::<u64>().map_err(|_| invalid())?;
    if minutes >= 60 || seconds >= 60 {
        return Err(invalid());
    }

    Ok(Duration::from_millis(
        (hours * 3600 + minutes * 60 + seconds) * 1000 + millis,
    ))
}

/// Format a [`Duration`] as `HH:MM:SS` for summaries and reports.
pub fn format_duration_hms(d: Duration) -> String {
    let total = d.as_secs();
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

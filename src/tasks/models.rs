//! Task data models and types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport strategy for a clone task
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum CloningStrategy {
    /// Re-broadcast via a single platform call referencing the original id
    Forward,
    /// Fetch payload to local disk, then send as a new message
    DownloadUpload,
}

impl fmt::Display for CloningStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloningStrategy::Forward => write!(f, "forward"),
            CloningStrategy::DownloadUpload => write!(f, "download_upload"),
        }
    }
}

impl std::str::FromStr for CloningStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forward" => Ok(CloningStrategy::Forward),
            "download_upload" => Ok(CloningStrategy::DownloadUpload),
            _ => Err(format!("Invalid cloning strategy: {}", s)),
        }
    }
}

/// One clone task per origin chat
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SyncTask {
    pub origin_chat_id: i64,
    /// Snapshot at task creation; informational only
    pub origin_chat_title: String,
    pub destination_chat_id: Option<i64>,
    pub cloning_strategy: CloningStrategy,
    /// Monotonic non-decreasing; 0 = no progress
    pub last_synced_message_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SyncTask {
    pub fn new(origin_chat_id: i64, title: &str, strategy: CloningStrategy) -> Self {
        let now = Utc::now();
        Self {
            origin_chat_id,
            origin_chat_title: title.to_string(),
            destination_chat_id: None,
            cloning_strategy: strategy,
            last_synced_message_id: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One bulk-download task per origin chat
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DownloadTask {
    pub origin_chat_id: i64,
    pub origin_chat_title: String,
    /// Monotonic checkpoint across video messages only
    pub last_downloaded_message_id: i64,
    /// Counters for reporting; may be stale between ticks
    pub total_videos: i64,
    pub downloaded_videos: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DownloadTask {
    pub fn new(origin_chat_id: i64, title: &str) -> Self {
        let now = Utc::now();
        Self {
            origin_chat_id,
            origin_chat_title: title.to_string(),
            last_downloaded_message_id: 0,
            total_videos: 0,
            downloaded_videos: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Pipeline stage of a publish task
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum PublishStep {
    Init,
    Zip,
    Report,
    ReencodeAuth,
    Reencode,
    Join,
    Timestamp,
    UploadAuth,
    Upload,
    Done,
}

impl PublishStep {
    /// Stage order for the pipeline driver.
    pub const ALL: [PublishStep; 10] = [
        PublishStep::Init,
        PublishStep::Zip,
        PublishStep::Report,
        PublishStep::ReencodeAuth,
        PublishStep::Reencode,
        PublishStep::Join,
        PublishStep::Timestamp,
        PublishStep::UploadAuth,
        PublishStep::Upload,
        PublishStep::Done,
    ];

    /// The stage after this one, or `None` at `done`.
    pub fn next(self) -> Option<PublishStep> {
        let idx = Self::ALL.iter().position(|s| *s == self)?;
        Self::ALL.get(idx + 1).copied()
    }

    /// Store column latched when this stage completes, if any.
    pub fn latch_column(self) -> Option<&'static str> {
        match self {
            PublishStep::Init => Some("is_started"),
            PublishStep::Zip => Some("is_zipped"),
            PublishStep::Report => Some("is_reported"),
            PublishStep::ReencodeAuth => Some("is_reencode_auth"),
            PublishStep::Reencode => Some("is_reencoded"),
            PublishStep::Join => Some("is_joined"),
            PublishStep::Timestamp => Some("is_timestamped"),
            PublishStep::UploadAuth => Some("is_upload_auth"),
            PublishStep::Upload => Some("is_published"),
            PublishStep::Done => None,
        }
    }
}

impl fmt::Display for PublishStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PublishStep::Init => "init",
            PublishStep::Zip => "zip",
            PublishStep::Report => "report",
            PublishStep::ReencodeAuth => "reencode_auth",
            PublishStep::Reencode => "reencode",
            PublishStep::Join => "join",
            PublishStep::Timestamp => "timestamp",
            PublishStep::UploadAuth => "upload_auth",
            PublishStep::Upload => "upload",
            PublishStep::Done => "done",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for PublishStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(PublishStep::Init),
            "zip" => Ok(PublishStep::Zip),
            "report" => Ok(PublishStep::Report),
            "reencode_auth" => Ok(PublishStep::ReencodeAuth),
            "reencode" => Ok(PublishStep::Reencode),
            "join" => Ok(PublishStep::Join),
            "timestamp" => Ok(PublishStep::Timestamp),
            "upload_auth" => Ok(PublishStep::UploadAuth),
            "upload" => Ok(PublishStep::Upload),
            "done" => Ok(PublishStep::Done),
            _ => Err(format!("Invalid publish step: {}", s)),
        }
    }
}

/// Task status enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One publish task per source folder path
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PublishTask {
    /// Canonical absolute path; primary key
    pub source_folder_path: String,
    /// Derived from the folder basename at creation
    pub project_name: String,
    pub destination_chat_id: Option<i64>,
    pub current_step: PublishStep,
    pub status: TaskStatus,
    // Monotonic latches, one per artefact stage
    pub is_started: bool,
    pub is_zipped: bool,
    pub is_reported: bool,
    pub is_reencode_auth: bool,
    pub is_reencoded: bool,
    pub is_joined: bool,
    pub is_timestamped: bool,
    pub is_upload_auth: bool,
    pub is_published: bool,
    /// Canonical relative path of the last file acknowledged by the platform
    pub last_uploaded_file: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PublishTask {
    pub fn new(source_folder_path: &str, project_name: &str) -> Self {
        let now = Utc::now();
        Self {
            source_folder_path: source_folder_path.to_string(),
            project_name: project_name.to_string(),
            destination_chat_id: None,
            current_step: PublishStep::Init,
            status: TaskStatus::Pending,
            is_started: false,
            is_zipped: false,
            is_reported: false,
            is_reencode_auth: false,
            is_reencoded: false,
            is_joined: false,
            is_timestamped: false,
            is_upload_auth: false,
            is_published: false,
            last_uploaded_file: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Latch vector in stage order, for monotonicity checks.
    pub fn latches(&self) -> [bool; 9] {
        [
            self.is_started,
            self.is_zipped,
            self.is_reported,
            self.is_reencode_auth,
            self.is_reencoded,
            self.is_joined,
            self.is_timestamped,
            self.is_upload_auth,
            self.is_published,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_round_trip() {
        for s in [CloningStrategy::Forward, CloningStrategy::DownloadUpload] {
            assert_eq!(s.to_string().parse::<CloningStrategy>().unwrap(), s);
        }
    }

    #[test]
    fn test_step_ordering() {
        assert_eq!(PublishStep::Init.next(), Some(PublishStep::Zip));
        assert_eq!(PublishStep::Upload.next(), Some(PublishStep::Done));
        assert_eq!(PublishStep::Done.next(), None);

        // every artefact stage has a latch; done has none
        for step in PublishStep::ALL {
            assert_eq!(step.latch_column().is_none(), step == PublishStep::Done);
        }
    }

    #[test]
    fn test_step_round_trip() {
        for step in PublishStep::ALL {
            assert_eq!(step.to_string().parse::<PublishStep>().unwrap(), step);
        }
    }
}

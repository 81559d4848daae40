//! Download job records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::status::JobStatus;
use crate::video::VideoId;

/// Unique identifier for a download job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Durable record of a single-video download job.
///
/// A job is bound to one video for its whole life; repairs re-enqueue the
/// same `job_id`, they never mint a new record. At most one job per video
/// may be in an active status at a time, enforced by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DownloadJob {
    /// Unique job ID
    pub job_id: JobId,

    /// Video this job downloads
    pub video_id: VideoId,

    /// Current status
    #[serde(default)]
    pub status: JobStatus,

    /// Progress (0-100)
    #[serde(default)]
    pub progress: u8,

    /// Path of the downloaded file, set only on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,

    /// Error text, set only on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// When a worker picked the job up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the job reached a terminal status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl DownloadJob {
    /// Create a new queued job for a video.
    pub fn new(video_id: VideoId) -> Self {
        let now = Utc::now();
        Self {
            job_id: JobId::new(),
            video_id,
            status: JobStatus::Queued,
            progress: 0,
            output_path: None,
            error_message: None,
            started_at: None,
            finished_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Worker picked the job up.
    pub fn start(&mut self) {
        self.status = JobStatus::Running;
        self.progress = 5;
        self.started_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    /// Download finished; record the output location.
    pub fn complete(&mut self, output_path: impl Into<String>) {
        self.status = JobStatus::Success;
        self.progress = 100;
        self.output_path = Some(output_path.into());
        self.error_message = None;
        self.finished_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    /// Download failed; capture the error text verbatim.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.progress = 0;
        self.error_message = Some(error.into());
        self.finished_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    /// Reset an orphaned job so the same `job_id` can be re-enqueued.
    pub fn requeue(&mut self) {
        self.status = JobStatus::Queued;
        self.progress = 0;
        self.updated_at = Utc::now();
    }
}

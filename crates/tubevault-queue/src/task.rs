//! Task payloads carried on the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tubevault_models::{JobId, ScanId, VideoId};

/// Task to download a single video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadTask {
    /// Download job this task executes; also the queue key
    pub job_id: JobId,
    /// Video to download
    pub video_id: VideoId,
    /// When the task was submitted
    pub created_at: DateTime<Utc>,
}

impl DownloadTask {
    pub fn new(job_id: JobId, video_id: VideoId) -> Self {
        Self {
            job_id,
            video_id,
            created_at: Utc::now(),
        }
    }
}

/// Task to scan a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanTask {
    /// Scan job this task executes; also the queue key
    pub scan_id: ScanId,
    /// When the task was submitted
    pub created_at: DateTime<Utc>,
}

impl ScanTask {
    pub fn new(scan_id: ScanId) -> Self {
        Self {
            scan_id,
            created_at: Utc::now(),
        }
    }
}

/// Generic task wrapper for queue storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueTask {
    /// Download one video
    Download(DownloadTask),
    /// Scan one channel
    Scan(ScanTask),
}

impl QueueTask {
    /// Id of the job record this task executes; tasks are keyed by it.
    pub fn job_key(&self) -> &str {
        match self {
            QueueTask::Download(t) => t.job_id.as_str(),
            QueueTask::Scan(t) => t.scan_id.as_str(),
        }
    }
}

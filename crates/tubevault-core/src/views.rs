//! Serializable views of job records, the shape the HTTP layer returns.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use tubevault_models::{DownloadJob, JobStatus, ScanJob};

/// Client view of a download job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DownloadJobView {
    pub job_id: String,
    pub video_id: String,
    pub status: JobStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DownloadJob> for DownloadJobView {
    fn from(job: DownloadJob) -> Self {
        Self {
            job_id: job.job_id.0,
            video_id: job.video_id.0,
            status: job.status,
            progress: job.progress,
            output_path: job.output_path,
            error_message: job.error_message,
            started_at: job.started_at,
            finished_at: job.finished_at,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// Client view of a scan job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScanJobView {
    pub scan_id: String,
    pub channel: String,
    pub status: JobStatus,
    pub progress: u8,
    /// Effective per-category cap after clamping
    pub effective_max_items: u32,
    pub counts: HashMap<String, u32>,
    pub unique_videos: u32,
    pub inserted: u32,
    pub updated: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ScanJob> for ScanJobView {
    fn from(scan: ScanJob) -> Self {
        Self {
            scan_id: scan.scan_id.0,
            channel: scan.channel,
            status: scan.status,
            progress: scan.progress,
            effective_max_items: scan.max_items,
            counts: scan.counts,
            unique_videos: scan.unique_videos,
            inserted: scan.inserted,
            updated: scan.updated,
            error_message: scan.error_message,
            started_at: scan.started_at,
            finished_at: scan.finished_at,
            created_at: scan.created_at,
            updated_at: scan.updated_at,
        }
    }
}

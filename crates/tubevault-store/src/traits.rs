//! Store traits consumed by the orchestrators.

use async_trait::async_trait;

use tubevault_models::{DownloadJob, JobId, ScanId, ScanJob, Video, VideoId};

use crate::error::StoreResult;

/// Catalog video records.
#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Fetch a video by its natural id.
    async fn get(&self, id: &VideoId) -> StoreResult<Option<Video>>;

    /// Write the whole record; creates or replaces atomically.
    async fn put(&self, video: &Video) -> StoreResult<()>;

    /// All videos, newest first.
    async fn list(&self) -> StoreResult<Vec<Video>>;
}

/// Download job records.
#[async_trait]
pub trait DownloadJobStore: Send + Sync {
    /// Fetch a job by id.
    async fn get(&self, id: &JobId) -> StoreResult<Option<DownloadJob>>;

    /// Write the whole record; creates or replaces atomically.
    async fn put(&self, job: &DownloadJob) -> StoreResult<()>;

    /// Most recently created job for a video, regardless of status.
    async fn latest_for_video(&self, video_id: &VideoId) -> StoreResult<Option<DownloadJob>>;

    /// Most recently created job for a video still in an active
    /// (queued/running) status.
    async fn active_for_video(&self, video_id: &VideoId) -> StoreResult<Option<DownloadJob>>;

    /// Most recent job with status `success`, if any.
    async fn latest_success_for_video(&self, video_id: &VideoId)
        -> StoreResult<Option<DownloadJob>>;
}

/// Scan job records.
#[async_trait]
pub trait ScanJobStore: Send + Sync {
    /// Fetch a scan by id.
    async fn get(&self, id: &ScanId) -> StoreResult<Option<ScanJob>>;

    /// Write the whole record; creates or replaces atomically.
    async fn put(&self, scan: &ScanJob) -> StoreResult<()>;
}

//! The service surface consumed by the HTTP layer.

use std::path::PathBuf;
use std::sync::Arc;

use tubevault_extract::Extractor;
use tubevault_models::{ItemMetadata, JobId, ScanId, ScanRequest, Video, VideoId};
use tubevault_queue::TaskQueue;
use tubevault_store::{DownloadJobStore, ScanJobStore, VideoStore};

use crate::catalog::{self, UpsertMode, VideoFilter};
use crate::config::CoreConfig;
use crate::download::DownloadOrchestrator;
use crate::error::{CoreError, CoreResult};
use crate::scan::ScanOrchestrator;
use crate::views::{DownloadJobView, ScanJobView};

/// Facade over the orchestrators and catalog operations.
///
/// Validation errors surface synchronously from the creation operations;
/// failures during asynchronous execution only ever appear as
/// `status=failed` on the polled job record.
pub struct CatalogService {
    videos: Arc<dyn VideoStore>,
    jobs: Arc<dyn DownloadJobStore>,
    scans: Arc<dyn ScanJobStore>,
    extractor: Arc<dyn Extractor>,
    downloads: DownloadOrchestrator,
    scanner: ScanOrchestrator,
}

impl CatalogService {
    pub fn new(
        videos: Arc<dyn VideoStore>,
        jobs: Arc<dyn DownloadJobStore>,
        scans: Arc<dyn ScanJobStore>,
        queue: Arc<dyn TaskQueue>,
        extractor: Arc<dyn Extractor>,
        config: CoreConfig,
    ) -> Self {
        let downloads = DownloadOrchestrator::new(
            Arc::clone(&videos),
            Arc::clone(&jobs),
            Arc::clone(&queue),
            Arc::clone(&extractor),
            config.clone(),
        );
        let scanner = ScanOrchestrator::new(
            Arc::clone(&scans),
            Arc::clone(&videos),
            Arc::clone(&queue),
            Arc::clone(&extractor),
            config,
        );

        Self {
            videos,
            jobs,
            scans,
            extractor,
            downloads,
            scanner,
        }
    }

    /// Access the download orchestrator (worker side uses `run`).
    pub fn downloads(&self) -> &DownloadOrchestrator {
        &self.downloads
    }

    /// Access the scan orchestrator (worker side uses `run`).
    pub fn scanner(&self) -> &ScanOrchestrator {
        &self.scanner
    }

    /// Request a download for a cataloged video.
    pub async fn create_download(&self, video_id: &VideoId) -> CoreResult<DownloadJobView> {
        Ok(self.downloads.request_download(video_id).await?.into())
    }

    /// Fetch a download job by id.
    pub async fn get_download(&self, job_id: &JobId) -> CoreResult<DownloadJobView> {
        self.jobs
            .get(job_id)
            .await?
            .map(Into::into)
            .ok_or_else(|| CoreError::not_found(format!("job not found: {job_id}")))
    }

    /// Most recent download job for a video.
    pub async fn latest_download_for_video(
        &self,
        video_id: &VideoId,
    ) -> CoreResult<DownloadJobView> {
        self.jobs
            .latest_for_video(video_id)
            .await?
            .map(Into::into)
            .ok_or_else(|| CoreError::not_found(format!("job not found for video: {video_id}")))
    }

    /// Newest job per requested video id; blank ids and videos without
    /// jobs are skipped.
    pub async fn latest_downloads_for_videos(
        &self,
        video_ids: &[VideoId],
    ) -> CoreResult<Vec<DownloadJobView>> {
        let mut out = Vec::new();
        for id in video_ids {
            if id.as_str().trim().is_empty() {
                continue;
            }
            if let Some(job) = self.jobs.latest_for_video(id).await? {
                out.push(job.into());
            }
        }
        Ok(out)
    }

    /// Resolve the media file of a successful download job.
    ///
    /// A terminal success record pointing at a file no longer on disk is
    /// unusable; callers may request a fresh download.
    pub async fn download_file_path(&self, job_id: &JobId) -> CoreResult<PathBuf> {
        let job = self
            .jobs
            .get(job_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("job not found: {job_id}")))?;

        let path = match (&job.status, &job.output_path) {
            (tubevault_models::JobStatus::Success, Some(path)) => path.clone(),
            _ => {
                return Err(CoreError::FileNotReady(format!(
                    "job {job_id} has no finished output"
                )))
            }
        };

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(CoreError::FileMissing(path));
        }
        Ok(PathBuf::from(path))
    }

    /// Create a channel scan job.
    pub async fn create_scan(&self, request: &ScanRequest) -> CoreResult<ScanJobView> {
        Ok(self.scanner.create_scan(request).await?.into())
    }

    /// Fetch a scan job by id.
    pub async fn get_scan(&self, scan_id: &ScanId) -> CoreResult<ScanJobView> {
        self.scans
            .get(scan_id)
            .await?
            .map(Into::into)
            .ok_or_else(|| CoreError::not_found(format!("scan not found: {scan_id}")))
    }

    /// Merge extracted metadata into the catalog; `true` means inserted.
    pub async fn upsert_video(&self, meta: &ItemMetadata) -> CoreResult<bool> {
        catalog::upsert_video(self.videos.as_ref(), meta, UpsertMode::Replace).await
    }

    /// Extract a URL and add/merge it into the catalog.
    pub async fn add_video_by_url(&self, url: &str) -> CoreResult<VideoId> {
        catalog::add_video_by_url(self.extractor.as_ref(), self.videos.as_ref(), url).await
    }

    /// List catalog videos, newest first.
    pub async fn list_videos(&self, filter: &VideoFilter) -> CoreResult<Vec<Video>> {
        catalog::list_videos(self.videos.as_ref(), filter).await
    }
}

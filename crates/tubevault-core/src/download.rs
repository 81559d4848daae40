//! Single-video download orchestration.

use std::sync::Arc;

use tracing::{info, warn};

use tubevault_extract::Extractor;
use tubevault_models::{DownloadJob, VideoId};
use tubevault_queue::{DownloadTask, QueueTask, TaskQueue};
use tubevault_store::{DownloadJobStore, VideoStore};

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};

/// Orchestrates download jobs for single videos.
///
/// The request side deduplicates against existing jobs and repairs
/// orphaned ones; the run side executes the job state machine on a worker.
pub struct DownloadOrchestrator {
    videos: Arc<dyn VideoStore>,
    jobs: Arc<dyn DownloadJobStore>,
    queue: Arc<dyn TaskQueue>,
    extractor: Arc<dyn Extractor>,
    config: CoreConfig,
}

impl DownloadOrchestrator {
    pub fn new(
        videos: Arc<dyn VideoStore>,
        jobs: Arc<dyn DownloadJobStore>,
        queue: Arc<dyn TaskQueue>,
        extractor: Arc<dyn Extractor>,
        config: CoreConfig,
    ) -> Self {
        Self {
            videos,
            jobs,
            queue,
            extractor,
            config,
        }
    }

    /// Request a download for a cataloged video.
    ///
    /// Dedup rule, checked in order:
    /// 1. An active (queued/running) job is reused. If the queue no longer
    ///    holds its task, the job is orphaned: reset to queued and
    ///    re-submit the *same* job id.
    /// 2. A successful job whose output file still exists is returned
    ///    directly, with no new task.
    /// 3. Otherwise a fresh job is created and submitted.
    pub async fn request_download(&self, video_id: &VideoId) -> CoreResult<DownloadJob> {
        let video = self
            .videos
            .get(video_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("video not found: {video_id}")))?;

        if let Some(mut job) = self.jobs.active_for_video(&video.video_id).await? {
            // A queued/running record must be backed by a queue task. A
            // definitive miss means the task was lost (e.g. the queue
            // backend restarted without persistence); transport errors
            // propagate instead of triggering a repair.
            if !self.queue.exists(job.job_id.as_str()).await? {
                warn!(
                    "Repairing orphaned download job {} for video {}",
                    job.job_id, video_id
                );
                job.requeue();
                self.jobs.put(&job).await?;
                self.queue
                    .submit(&QueueTask::Download(DownloadTask::new(
                        job.job_id.clone(),
                        video.video_id.clone(),
                    )))
                    .await?;
            }
            return Ok(job);
        }

        if let Some(job) = self.jobs.latest_success_for_video(&video.video_id).await? {
            if let Some(path) = &job.output_path {
                if tokio::fs::try_exists(path).await.unwrap_or(false) {
                    info!(
                        "Reusing completed download job {} for video {}",
                        job.job_id, video_id
                    );
                    return Ok(job);
                }
            }
        }

        let job = DownloadJob::new(video.video_id.clone());
        self.jobs.put(&job).await?;
        self.queue
            .submit(&QueueTask::Download(DownloadTask::new(
                job.job_id.clone(),
                video.video_id.clone(),
            )))
            .await?;

        info!("Created download job {} for video {}", job.job_id, video_id);
        Ok(job)
    }

    /// Execute a download task on a worker.
    ///
    /// Any failure is captured verbatim into the job record before the
    /// error propagates, so the queue backend's retry policy still sees it
    /// while pollers read `status=failed`.
    pub async fn run(&self, task: &DownloadTask) -> CoreResult<()> {
        match self.execute(task).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if let Ok(Some(mut job)) = self.jobs.get(&task.job_id).await {
                    job.fail(e.to_string());
                    if let Err(put_err) = self.jobs.put(&job).await {
                        warn!(
                            "Failed to persist failure of job {}: {}",
                            task.job_id, put_err
                        );
                    }
                }
                Err(e)
            }
        }
    }

    async fn execute(&self, task: &DownloadTask) -> CoreResult<()> {
        let mut job = self
            .jobs
            .get(&task.job_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("download job not found: {}", task.job_id)))?;

        let mut video = self
            .videos
            .get(&task.video_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("video not found: {}", task.video_id)))?;

        info!("Download start job={} video={}", job.job_id, video.video_id);

        job.start();
        self.jobs.put(&job).await?;

        // Output may already be on disk from an earlier run of this job
        if let Some(path) = job.output_path.clone() {
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                job.complete(path.as_str());
                self.jobs.put(&job).await?;

                video.mark_downloaded(job.job_id.clone());
                self.videos.put(&video).await?;

                info!("Download already present job={} out={}", job.job_id, path);
                return Ok(());
            }
        }

        let out = self
            .extractor
            .download_media(
                &video.source_url,
                &self.config.output_dir,
                video.video_id.as_str(),
                video.uploader.as_deref(),
                self.config.max_height,
            )
            .await?;

        let out = out.to_string_lossy().into_owned();
        job.complete(out.as_str());
        self.jobs.put(&job).await?;

        video.mark_downloaded(job.job_id.clone());
        self.videos.put(&video).await?;

        info!("Download success job={} out={}", job.job_id, out);
        Ok(())
    }
}

//! In-memory store for tests and single-process deployments.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use tubevault_models::{DownloadJob, JobId, JobStatus, ScanId, ScanJob, Video, VideoId};

use crate::error::StoreResult;
use crate::traits::{DownloadJobStore, ScanJobStore, VideoStore};

/// Thread-safe in-process record store.
///
/// Records carry an insertion sequence so "latest" queries stay
/// deterministic even when timestamps collide.
#[derive(Default)]
pub struct MemoryStore {
    seq: AtomicU64,
    videos: RwLock<HashMap<String, (u64, Video)>>,
    jobs: RwLock<HashMap<String, (u64, DownloadJob)>>,
    scans: RwLock<HashMap<String, ScanJob>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    async fn jobs_for_video(&self, video_id: &VideoId) -> Vec<(u64, DownloadJob)> {
        let jobs = self.jobs.read().await;
        let mut out: Vec<(u64, DownloadJob)> = jobs
            .values()
            .filter(|(_, j)| &j.video_id == video_id)
            .cloned()
            .collect();
        // Newest first
        out.sort_by(|a, b| b.1.created_at.cmp(&a.1.created_at).then(b.0.cmp(&a.0)));
        out
    }
}

#[async_trait]
impl VideoStore for MemoryStore {
    async fn get(&self, id: &VideoId) -> StoreResult<Option<Video>> {
        let videos = self.videos.read().await;
        Ok(videos.get(id.as_str()).map(|(_, v)| v.clone()))
    }

    async fn put(&self, video: &Video) -> StoreResult<()> {
        let mut videos = self.videos.write().await;
        let seq = match videos.get(video.video_id.as_str()) {
            Some((seq, _)) => *seq,
            None => self.next_seq(),
        };
        videos.insert(video.video_id.as_str().to_string(), (seq, video.clone()));
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<Video>> {
        let videos = self.videos.read().await;
        let mut out: Vec<(u64, Video)> = videos.values().cloned().collect();
        out.sort_by(|a, b| b.1.created_at.cmp(&a.1.created_at).then(b.0.cmp(&a.0)));
        Ok(out.into_iter().map(|(_, v)| v).collect())
    }
}

#[async_trait]
impl DownloadJobStore for MemoryStore {
    async fn get(&self, id: &JobId) -> StoreResult<Option<DownloadJob>> {
        let jobs = self.jobs.read().await;
        Ok(jobs.get(id.as_str()).map(|(_, j)| j.clone()))
    }

    async fn put(&self, job: &DownloadJob) -> StoreResult<()> {
        let mut jobs = self.jobs.write().await;
        let seq = match jobs.get(job.job_id.as_str()) {
            Some((seq, _)) => *seq,
            None => self.next_seq(),
        };
        jobs.insert(job.job_id.as_str().to_string(), (seq, job.clone()));
        Ok(())
    }

    async fn latest_for_video(&self, video_id: &VideoId) -> StoreResult<Option<DownloadJob>> {
        Ok(self
            .jobs_for_video(video_id)
            .await
            .into_iter()
            .map(|(_, j)| j)
            .next())
    }

    async fn active_for_video(&self, video_id: &VideoId) -> StoreResult<Option<DownloadJob>> {
        Ok(self
            .jobs_for_video(video_id)
            .await
            .into_iter()
            .map(|(_, j)| j)
            .find(|j| j.status.is_active()))
    }

    async fn latest_success_for_video(
        &self,
        video_id: &VideoId,
    ) -> StoreResult<Option<DownloadJob>> {
        Ok(self
            .jobs_for_video(video_id)
            .await
            .into_iter()
            .map(|(_, j)| j)
            .find(|j| j.status == JobStatus::Success))
    }
}

#[async_trait]
impl ScanJobStore for MemoryStore {
    async fn get(&self, id: &ScanId) -> StoreResult<Option<ScanJob>> {
        let scans = self.scans.read().await;
        Ok(scans.get(id.as_str()).cloned())
    }

    async fn put(&self, scan: &ScanJob) -> StoreResult<()> {
        let mut scans = self.scans.write().await;
        scans.insert(scan.scan_id.as_str().to_string(), scan.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_video_roundtrip() {
        let store = MemoryStore::new();
        let id = VideoId::from("abc123def45");
        assert!(VideoStore::get(&store, &id).await.unwrap().is_none());

        let video = Video::new(id.clone(), "https://www.youtube.com/watch?v=abc123def45");
        VideoStore::put(&store, &video).await.unwrap();

        let got = VideoStore::get(&store, &id).await.unwrap().unwrap();
        assert_eq!(got.video_id, id);
    }

    #[tokio::test]
    async fn test_latest_and_active_job_queries() {
        let store = MemoryStore::new();
        let video_id = VideoId::from("abc123def45");

        let mut first = DownloadJob::new(video_id.clone());
        first.start();
        first.fail("boom");
        DownloadJobStore::put(&store, &first).await.unwrap();

        let second = DownloadJob::new(video_id.clone());
        DownloadJobStore::put(&store, &second).await.unwrap();

        let latest = store.latest_for_video(&video_id).await.unwrap().unwrap();
        assert_eq!(latest.job_id, second.job_id);

        let active = store.active_for_video(&video_id).await.unwrap().unwrap();
        assert_eq!(active.job_id, second.job_id);

        // Finish the active job; no active job remains
        let mut done = active;
        done.start();
        done.complete("/videos/x/abc123def45.mp4");
        DownloadJobStore::put(&store, &done).await.unwrap();
        assert!(store.active_for_video(&video_id).await.unwrap().is_none());

        let success = store
            .latest_success_for_video(&video_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(success.job_id, second.job_id);
    }

    #[tokio::test]
    async fn test_put_replaces_whole_record() {
        let store = MemoryStore::new();
        let mut scan = ScanJob::new(
            "Example",
            &tubevault_models::ScanRequest {
                channel: "@Example".to_string(),
                include_shorts: true,
                include_videos: true,
                include_streams: false,
                max_items: 10,
            },
            10,
        );
        ScanJobStore::put(&store, &scan).await.unwrap();

        scan.start();
        scan.counts.insert("shorts".to_string(), 3);
        ScanJobStore::put(&store, &scan).await.unwrap();

        let got = ScanJobStore::get(&store, &scan.scan_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.status, JobStatus::Running);
        assert_eq!(got.counts.get("shorts"), Some(&3));
    }
}

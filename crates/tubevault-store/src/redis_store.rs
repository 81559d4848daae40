//! Redis-backed record store.
//!
//! Records are JSON documents written with a single `SET`, so every status
//! transition lands atomically. Per-video job ordering lives in a sorted
//! set scored by creation time.

use async_trait::async_trait;
use metrics::counter;
use redis::AsyncCommands;
use tracing::debug;

use tubevault_models::{DownloadJob, JobId, JobStatus, ScanId, ScanJob, Video, VideoId};

use crate::error::StoreResult;
use crate::traits::{DownloadJobStore, ScanJobStore, VideoStore};

/// Redis store configuration.
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Redis URL
    pub redis_url: String,
    /// Key prefix for all records
    pub key_prefix: String,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "tubevault".to_string(),
        }
    }
}

impl RedisStoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            key_prefix: std::env::var("STORE_KEY_PREFIX")
                .unwrap_or_else(|_| "tubevault".to_string()),
        }
    }
}

/// Record store backed by Redis.
pub struct RedisStore {
    client: redis::Client,
    config: RedisStoreConfig,
}

impl RedisStore {
    /// Create a new store.
    pub fn new(config: RedisStoreConfig) -> StoreResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        Self::new(RedisStoreConfig::from_env())
    }

    fn video_key(&self, id: &VideoId) -> String {
        format!("{}:video:{}", self.config.key_prefix, id)
    }

    fn videos_index_key(&self) -> String {
        format!("{}:videos", self.config.key_prefix)
    }

    fn job_key(&self, id: &JobId) -> String {
        format!("{}:download_job:{}", self.config.key_prefix, id)
    }

    fn video_jobs_key(&self, video_id: &VideoId) -> String {
        format!("{}:video_jobs:{}", self.config.key_prefix, video_id)
    }

    fn scan_key(&self, id: &ScanId) -> String {
        format!("{}:scan_job:{}", self.config.key_prefix, id)
    }

    async fn conn(&self) -> StoreResult<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Jobs for a video, newest first.
    async fn jobs_for_video(&self, video_id: &VideoId) -> StoreResult<Vec<DownloadJob>> {
        let mut conn = self.conn().await?;
        let job_ids: Vec<String> = conn
            .zrevrange(self.video_jobs_key(video_id), 0, -1)
            .await?;

        let mut out = Vec::with_capacity(job_ids.len());
        for id in job_ids {
            let payload: Option<String> = conn.get(self.job_key(&JobId(id))).await?;
            if let Some(p) = payload {
                out.push(serde_json::from_str(&p)?);
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl VideoStore for RedisStore {
    async fn get(&self, id: &VideoId) -> StoreResult<Option<Video>> {
        let mut conn = self.conn().await?;
        let payload: Option<String> = conn.get(self.video_key(id)).await?;
        payload
            .map(|p| serde_json::from_str(&p).map_err(Into::into))
            .transpose()
    }

    async fn put(&self, video: &Video) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let payload = serde_json::to_string(video)?;
        conn.set::<_, _, ()>(self.video_key(&video.video_id), payload)
            .await?;
        conn.zadd::<_, _, _, ()>(
            self.videos_index_key(),
            video.video_id.as_str(),
            video.created_at.timestamp_millis(),
        )
        .await?;
        counter!("tubevault_video_puts_total").increment(1);
        debug!("Stored video record: {}", video.video_id);
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<Video>> {
        let mut conn = self.conn().await?;
        let ids: Vec<String> = conn.zrevrange(self.videos_index_key(), 0, -1).await?;

        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let payload: Option<String> = conn.get(self.video_key(&VideoId(id))).await?;
            if let Some(p) = payload {
                out.push(serde_json::from_str(&p)?);
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl DownloadJobStore for RedisStore {
    async fn get(&self, id: &JobId) -> StoreResult<Option<DownloadJob>> {
        let mut conn = self.conn().await?;
        let payload: Option<String> = conn.get(self.job_key(id)).await?;
        payload
            .map(|p| serde_json::from_str(&p).map_err(Into::into))
            .transpose()
    }

    async fn put(&self, job: &DownloadJob) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let payload = serde_json::to_string(job)?;
        conn.set::<_, _, ()>(self.job_key(&job.job_id), payload)
            .await?;
        conn.zadd::<_, _, _, ()>(
            self.video_jobs_key(&job.video_id),
            job.job_id.as_str(),
            job.created_at.timestamp_millis(),
        )
        .await?;
        counter!("tubevault_download_job_puts_total", "status" => job.status.as_str())
            .increment(1);
        debug!("Stored download job {} ({})", job.job_id, job.status);
        Ok(())
    }

    async fn latest_for_video(&self, video_id: &VideoId) -> StoreResult<Option<DownloadJob>> {
        Ok(self.jobs_for_video(video_id).await?.into_iter().next())
    }

    async fn active_for_video(&self, video_id: &VideoId) -> StoreResult<Option<DownloadJob>> {
        Ok(self
            .jobs_for_video(video_id)
            .await?
            .into_iter()
            .find(|j| j.status.is_active()))
    }

    async fn latest_success_for_video(
        &self,
        video_id: &VideoId,
    ) -> StoreResult<Option<DownloadJob>> {
        Ok(self
            .jobs_for_video(video_id)
            .await?
            .into_iter()
            .find(|j| j.status == JobStatus::Success))
    }
}

#[async_trait]
impl ScanJobStore for RedisStore {
    async fn get(&self, id: &ScanId) -> StoreResult<Option<ScanJob>> {
        let mut conn = self.conn().await?;
        let payload: Option<String> = conn.get(self.scan_key(id)).await?;
        payload
            .map(|p| serde_json::from_str(&p).map_err(Into::into))
            .transpose()
    }

    async fn put(&self, scan: &ScanJob) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let payload = serde_json::to_string(scan)?;
        conn.set::<_, _, ()>(self.scan_key(&scan.scan_id), payload)
            .await?;
        counter!("tubevault_scan_job_puts_total", "status" => scan.status.as_str())
            .increment(1);
        debug!("Stored scan job {} ({})", scan.scan_id, scan.status);
        Ok(())
    }
}

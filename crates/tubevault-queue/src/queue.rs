//! Task queue over Redis Streams.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::task::QueueTask;

/// Which stream a task travels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Downloads,
    Scans,
}

impl QueueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueKind::Downloads => "downloads",
            QueueKind::Scans => "scans",
        }
    }

    /// Stream for a given task payload.
    pub fn for_task(task: &QueueTask) -> Self {
        match task {
            QueueTask::Download(_) => QueueKind::Downloads,
            QueueTask::Scan(_) => QueueKind::Scans,
        }
    }
}

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream name for download tasks
    pub downloads_stream: String,
    /// Stream name for scan tasks
    pub scans_stream: String,
    /// Consumer group name (shared by both streams)
    pub consumer_group: String,
    /// Dead letter queue stream name
    pub dlq_stream: String,
    /// Prefix for pending-task marker keys
    pub task_key_prefix: String,
    /// Max retries before DLQ
    pub max_retries: u32,
    /// Job visibility timeout before redelivery
    pub visibility_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            downloads_stream: "tubevault:downloads".to_string(),
            scans_stream: "tubevault:scans".to_string(),
            consumer_group: "tubevault:workers".to_string(),
            dlq_stream: "tubevault:dlq".to_string(),
            task_key_prefix: "tubevault:task".to_string(),
            max_retries: 3,
            visibility_timeout: Duration::from_secs(600), // 10 minutes
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            downloads_stream: std::env::var("QUEUE_DOWNLOADS_STREAM")
                .unwrap_or_else(|_| "tubevault:downloads".to_string()),
            scans_stream: std::env::var("QUEUE_SCANS_STREAM")
                .unwrap_or_else(|_| "tubevault:scans".to_string()),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or_else(|_| "tubevault:workers".to_string()),
            dlq_stream: std::env::var("QUEUE_DLQ_STREAM")
                .unwrap_or_else(|_| "tubevault:dlq".to_string()),
            task_key_prefix: std::env::var("QUEUE_TASK_KEY_PREFIX")
                .unwrap_or_else(|_| "tubevault:task".to_string()),
            max_retries: std::env::var("QUEUE_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            visibility_timeout: Duration::from_secs(
                std::env::var("QUEUE_VISIBILITY_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
        }
    }
}

/// Submission side of the queue, as seen by the orchestrators.
///
/// `exists` answers whether the queue still holds a pending or active task
/// for a job id; a definitive `false` is the orphaned-job signal. Transport
/// failures surface as errors, never as `false`.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Submit a task, keyed by its job id.
    async fn submit(&self, task: &QueueTask) -> QueueResult<()>;

    /// Check whether a pending/active task exists for this job id.
    async fn exists(&self, job_key: &str) -> QueueResult<bool>;
}

/// Task queue client over Redis Streams.
pub struct JobQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl JobQueue {
    /// Create a new job queue.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    fn stream_name(&self, kind: QueueKind) -> &str {
        match kind {
            QueueKind::Downloads => &self.config.downloads_stream,
            QueueKind::Scans => &self.config.scans_stream,
        }
    }

    fn task_key(&self, job_key: &str) -> String {
        format!("{}:{}", self.config.task_key_prefix, job_key)
    }

    /// Initialize the queue (create consumer groups if not exist).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        for kind in [QueueKind::Downloads, QueueKind::Scans] {
            let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
                .arg("CREATE")
                .arg(self.stream_name(kind))
                .arg(&self.config.consumer_group)
                .arg("$")
                .arg("MKSTREAM")
                .query_async(&mut conn)
                .await;

            match result {
                Ok(_) => info!(
                    "Created consumer group {} on {}",
                    self.config.consumer_group,
                    self.stream_name(kind)
                ),
                Err(e) if e.to_string().contains("BUSYGROUP") => {
                    debug!(
                        "Consumer group already exists on {}",
                        self.stream_name(kind)
                    );
                }
                Err(e) => return Err(QueueError::Redis(e)),
            }
        }

        Ok(())
    }

    /// Acknowledge a task (mark as completed) and drop its marker.
    pub async fn ack(&self, kind: QueueKind, message_id: &str, job_key: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        redis::cmd("XACK")
            .arg(self.stream_name(kind))
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(self.stream_name(kind))
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        conn.del::<_, ()>(self.task_key(job_key)).await?;

        debug!("Acknowledged task {} for job {}", message_id, job_key);
        Ok(())
    }

    /// Move a task to the dead letter stream.
    pub async fn dlq(
        &self,
        kind: QueueKind,
        message_id: &str,
        task: &QueueTask,
        error: &str,
    ) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let payload = serde_json::to_string(task)?;
        redis::cmd("XADD")
            .arg(&self.config.dlq_stream)
            .arg("*")
            .arg("task")
            .arg(&payload)
            .arg("error")
            .arg(error)
            .arg("original_id")
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        self.ack(kind, message_id, task.job_key()).await?;

        warn!("Moved task for job {} to DLQ: {}", task.job_key(), error);
        Ok(())
    }

    /// Get queue length.
    pub async fn len(&self, kind: QueueKind) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.xlen(self.stream_name(kind)).await?;
        Ok(len)
    }

    /// Consume tasks from one stream.
    /// Returns (message_id, task) pairs.
    pub async fn consume(
        &self,
        kind: QueueKind,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, QueueTask)>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(self.stream_name(kind))
            .arg(">") // Only new messages
            .query_async(&mut conn)
            .await?;

        let mut tasks = Vec::new();

        for stream_key in result.keys {
            for entry in stream_key.ids {
                let message_id = entry.id.clone();

                if let Some(redis::Value::BulkString(payload)) = entry.map.get("task") {
                    let payload_str = String::from_utf8_lossy(payload);
                    match serde_json::from_str::<QueueTask>(&payload_str) {
                        Ok(task) => {
                            debug!("Consumed task for job {}", task.job_key());
                            tasks.push((message_id, task));
                        }
                        Err(e) => {
                            warn!("Failed to parse task payload: {}", e);
                            // Ack the malformed message to prevent reprocessing
                            self.ack_message_only(kind, &message_id).await.ok();
                        }
                    }
                }
            }
        }

        Ok(tasks)
    }

    /// Ack a message without touching any marker key (malformed payloads).
    async fn ack_message_only(&self, kind: QueueKind, message_id: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("XACK")
            .arg(self.stream_name(kind))
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;
        redis::cmd("XDEL")
            .arg(self.stream_name(kind))
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    /// Claim pending tasks that have been idle for too long.
    /// This handles tasks from crashed workers.
    pub async fn claim_pending(
        &self,
        kind: QueueKind,
        consumer_name: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, QueueTask)>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let pending: redis::streams::StreamPendingReply = redis::cmd("XPENDING")
            .arg(self.stream_name(kind))
            .arg(&self.config.consumer_group)
            .query_async(&mut conn)
            .await?;

        if pending.count() == 0 {
            return Ok(Vec::new());
        }

        let result: redis::streams::StreamClaimReply = redis::cmd("XCLAIM")
            .arg(self.stream_name(kind))
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg(min_idle_ms)
            .arg("0-0") // Claim messages with this ID or later
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        let mut tasks = Vec::new();

        for entry in result.ids {
            let message_id = entry.id.clone();

            if let Some(redis::Value::BulkString(payload)) = entry.map.get("task") {
                let payload_str = String::from_utf8_lossy(payload);
                match serde_json::from_str::<QueueTask>(&payload_str) {
                    Ok(task) => {
                        info!("Claimed pending task for job {}", task.job_key());
                        tasks.push((message_id, task));
                    }
                    Err(e) => {
                        warn!("Failed to parse claimed task payload: {}", e);
                        self.ack_message_only(kind, &message_id).await.ok();
                    }
                }
            }
        }

        Ok(tasks)
    }

    /// Get retry count for a message.
    pub async fn get_retry_count(&self, message_id: &str) -> QueueResult<u32> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("{}:retry:{}", self.config.task_key_prefix, message_id);
        let count: Option<u32> = conn.get(&key).await?;
        Ok(count.unwrap_or(0))
    }

    /// Increment retry count for a message.
    pub async fn increment_retry(&self, message_id: &str) -> QueueResult<u32> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("{}:retry:{}", self.config.task_key_prefix, message_id);
        let count: u32 = conn.incr(&key, 1).await?;
        // Retry bookkeeping expires after a day
        conn.expire::<_, ()>(&key, 86400).await?;
        Ok(count)
    }

    /// Get max retries from config.
    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }
}

#[async_trait]
impl TaskQueue for JobQueue {
    async fn submit(&self, task: &QueueTask) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let kind = QueueKind::for_task(task);
        let payload = serde_json::to_string(task)?;
        let job_key = task.job_key();

        let message_id: String = redis::cmd("XADD")
            .arg(self.stream_name(kind))
            .arg("*")
            .arg("task")
            .arg(&payload)
            .arg("key")
            .arg(job_key)
            .query_async(&mut conn)
            .await?;

        // Pending-task marker, removed on ack. Its absence while the job
        // record is still active is the orphaned-job signal.
        conn.set::<_, _, ()>(self.task_key(job_key), &message_id)
            .await?;

        info!(
            "Submitted {} task for job {} as message {}",
            kind.as_str(),
            job_key,
            message_id
        );

        Ok(())
    }

    async fn exists(&self, job_key: &str) -> QueueResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let exists: bool = conn.exists(self.task_key(job_key)).await?;
        Ok(exists)
    }
}

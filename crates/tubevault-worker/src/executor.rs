//! Job executor.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use tubevault_core::CatalogService;
use tubevault_queue::{JobQueue, QueueKind, QueueTask};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};

const QUEUE_KINDS: [QueueKind; 2] = [QueueKind::Downloads, QueueKind::Scans];

/// Job executor that processes tasks from both queues.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    service: Arc<CatalogService>,
    job_semaphore: Arc<Semaphore>,
    shutdown: tokio::sync::watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    /// Create a new job executor.
    pub fn new(config: WorkerConfig, queue: Arc<JobQueue>, service: Arc<CatalogService>) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = tokio::sync::watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            queue,
            service,
            job_semaphore,
            shutdown,
            consumer_name,
        }
    }

    /// Start the executor.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting job executor '{}' with {} max concurrent jobs",
            self.consumer_name, self.config.max_concurrent_jobs
        );

        self.queue.init().await?;

        let mut shutdown_rx = self.shutdown.subscribe();

        // Periodically claim tasks stranded by crashed workers
        let queue_clone = Arc::clone(&self.queue);
        let service_clone = Arc::clone(&self.service);
        let semaphore_clone = Arc::clone(&self.job_semaphore);
        let consumer_name = self.consumer_name.clone();
        let claim_interval = self.config.claim_interval;
        let claim_min_idle_ms = self.config.claim_min_idle.as_millis() as u64;
        let mut shutdown_rx_claim = self.shutdown.subscribe();

        let claim_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(claim_interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx_claim.changed() => {
                        if *shutdown_rx_claim.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        for kind in QUEUE_KINDS {
                            match queue_clone.claim_pending(kind, &consumer_name, claim_min_idle_ms, 5).await {
                                Ok(tasks) if !tasks.is_empty() => {
                                    info!("Claimed {} pending {} tasks", tasks.len(), kind.as_str());
                                    for (message_id, task) in tasks {
                                        let service = Arc::clone(&service_clone);
                                        let queue = Arc::clone(&queue_clone);
                                        let Ok(permit) = semaphore_clone.clone().acquire_owned().await else {
                                            return;
                                        };

                                        tokio::spawn(async move {
                                            let _permit = permit;
                                            Self::execute_task(service, queue, kind, message_id, task).await;
                                        });
                                    }
                                }
                                Ok(_) => {}
                                Err(e) => {
                                    warn!("Failed to claim pending {} tasks: {}", kind.as_str(), e);
                                }
                            }
                        }
                    }
                }
            }
        });

        // Main task consumption loop
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_tasks() => {
                    if let Err(e) = result {
                        error!("Error consuming tasks: {}", e);
                        // Back off on error
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();

        info!("Waiting for in-flight jobs to complete...");
        let _ = tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs()).await;

        info!("Job executor stopped");
        Ok(())
    }

    /// Consume and process tasks from both queues.
    async fn consume_tasks(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            // All slots busy, wait a bit
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let block_ms = self.config.consume_block.as_millis() as u64;

        for kind in QUEUE_KINDS {
            let tasks = self
                .queue
                .consume(kind, &self.consumer_name, block_ms, available.min(5))
                .await?;

            if tasks.is_empty() {
                continue;
            }

            debug!("Consumed {} {} tasks", tasks.len(), kind.as_str());

            for (message_id, task) in tasks {
                let service = Arc::clone(&self.service);
                let queue = Arc::clone(&self.queue);
                let permit = self
                    .job_semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| WorkerError::job_failed("Semaphore closed"))?;

                tokio::spawn(async move {
                    let _permit = permit;
                    Self::execute_task(service, queue, kind, message_id, task).await;
                });
            }
        }

        Ok(())
    }

    /// Execute a single task with retry and DLQ handling.
    ///
    /// The orchestrator already marked the job record failed before the
    /// error reaches us; re-raising here only drives the queue's own
    /// retry/dead-letter policy.
    async fn execute_task(
        service: Arc<CatalogService>,
        queue: Arc<JobQueue>,
        kind: QueueKind,
        message_id: String,
        task: QueueTask,
    ) {
        let job_key = task.job_key().to_string();
        info!("Executing {} task for job {}", kind.as_str(), job_key);

        let result = match &task {
            QueueTask::Download(t) => service.downloads().run(t).await,
            QueueTask::Scan(t) => service.scanner().run(t).await,
        };

        match result {
            Ok(()) => {
                info!("Job {} completed successfully", job_key);
                counter!("tubevault_jobs_completed_total", "kind" => kind.as_str()).increment(1);
                if let Err(e) = queue.ack(kind, &message_id, &job_key).await {
                    error!("Failed to ack job {}: {}", job_key, e);
                }
            }
            Err(e) => {
                error!("Job {} failed: {}", job_key, e);
                counter!("tubevault_jobs_failed_total", "kind" => kind.as_str()).increment(1);

                let retry_count = queue.increment_retry(&message_id).await.unwrap_or(999);
                let max_retries = queue.max_retries();

                if retry_count >= max_retries {
                    warn!(
                        "Job {} exceeded max retries ({}), moving to DLQ",
                        job_key, max_retries
                    );
                    if let Err(dlq_err) = queue.dlq(kind, &message_id, &task, &e.to_string()).await
                    {
                        error!("Failed to move job {} to DLQ: {}", job_key, dlq_err);
                    }
                } else {
                    info!(
                        "Job {} will be retried (attempt {}/{})",
                        job_key, retry_count, max_retries
                    );
                    // Redelivered after the visibility timeout
                }
            }
        }
    }

    /// Wait for all in-flight jobs to complete.
    async fn wait_for_jobs(&self) {
        loop {
            let available = self.job_semaphore.available_permits();
            if available == self.config.max_concurrent_jobs {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Core error: {0}")]
    Core(#[from] tubevault_core::CoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] tubevault_queue::QueueError),

    #[error("Store error: {0}")]
    Store(#[from] tubevault_store::StoreError),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }
}

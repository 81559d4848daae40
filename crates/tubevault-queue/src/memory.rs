//! In-memory queue double for orchestrator tests.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::QueueResult;
use crate::queue::TaskQueue;
use crate::task::QueueTask;

/// In-process task queue.
///
/// Mirrors the marker semantics of the Redis queue: a submitted task leaves
/// a pending marker that `exists` probes, and `ack` removes it. `forget`
/// simulates a queue backend that lost its state (the orphaned-job case).
#[derive(Default)]
pub struct MemoryQueue {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    tasks: VecDeque<QueueTask>,
    markers: HashSet<String>,
    submitted: u64,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pop the next task, as a worker would.
    pub fn take(&self) -> Option<QueueTask> {
        self.inner.lock().unwrap().tasks.pop_front()
    }

    /// Acknowledge a task, dropping its pending marker.
    pub fn ack(&self, job_key: &str) {
        self.inner.lock().unwrap().markers.remove(job_key);
    }

    /// Drop a pending marker without delivering the task, simulating a
    /// queue backend restart that lost the task.
    pub fn forget(&self, job_key: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.markers.remove(job_key);
        inner.tasks.retain(|t| t.job_key() != job_key);
    }

    /// Number of submissions since creation.
    pub fn submitted_count(&self) -> u64 {
        self.inner.lock().unwrap().submitted
    }

    /// Number of tasks waiting to be taken.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TaskQueue for MemoryQueue {
    async fn submit(&self, task: &QueueTask) -> QueueResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.markers.insert(task.job_key().to_string());
        inner.tasks.push_back(task.clone());
        inner.submitted += 1;
        Ok(())
    }

    async fn exists(&self, job_key: &str) -> QueueResult<bool> {
        Ok(self.inner.lock().unwrap().markers.contains(job_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{DownloadTask, QueueTask};
    use tubevault_models::{JobId, VideoId};

    #[tokio::test]
    async fn test_submit_take_ack() {
        let queue = MemoryQueue::new();
        let task = QueueTask::Download(DownloadTask::new(
            JobId::new(),
            VideoId::from("abc123def45"),
        ));
        let key = task.job_key().to_string();

        queue.submit(&task).await.unwrap();
        assert!(queue.exists(&key).await.unwrap());
        assert_eq!(queue.len(), 1);

        let taken = queue.take().unwrap();
        assert_eq!(taken.job_key(), key);
        // Marker survives until ack, like a pending stream entry
        assert!(queue.exists(&key).await.unwrap());

        queue.ack(&key);
        assert!(!queue.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_forget_simulates_lost_task() {
        let queue = MemoryQueue::new();
        let task = QueueTask::Download(DownloadTask::new(
            JobId::new(),
            VideoId::from("abc123def45"),
        ));
        let key = task.job_key().to_string();

        queue.submit(&task).await.unwrap();
        queue.forget(&key);

        assert!(!queue.exists(&key).await.unwrap());
        assert!(queue.take().is_none());
    }
}

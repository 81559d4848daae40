//! Redis Streams task queue.
//!
//! This crate provides:
//! - Task submission keyed by job id, with a pending-task marker the
//!   orchestrator probes for orphan detection
//! - Worker consumption via consumer groups with at-least-once delivery
//! - Crash recovery by claiming idle pending messages
//! - Queue-level retry counting with a dead-letter stream

pub mod error;
pub mod memory;
pub mod queue;
pub mod task;

pub use error::{QueueError, QueueResult};
pub use memory::MemoryQueue;
pub use queue::{JobQueue, QueueConfig, QueueKind, TaskQueue};
pub use task::{DownloadTask, QueueTask, ScanTask};

//! Shared data models for the TubeVault backend.
//!
//! This crate provides Serde-serializable types for:
//! - Catalog video records and extracted metadata
//! - Download and scan job records with their status state machine
//! - Channel handle normalization and canonical watch URLs

pub mod channel;
pub mod download_job;
pub mod metadata;
pub mod scan_job;
pub mod status;
pub mod video;

// Re-export common types
pub use channel::{
    channel_base_url, is_absolute_url, normalize_channel_handle, watch_url, ChannelError,
};
pub use download_job::{DownloadJob, JobId};
pub use metadata::{FlatEntry, ItemMetadata};
pub use scan_job::{ScanCategory, ScanId, ScanJob, ScanRequest};
pub use status::JobStatus;
pub use video::{classify_short, Video, VideoId, SHORT_MAX_SECS};

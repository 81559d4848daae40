//! Job orchestration core.
//!
//! Turns client requests ("download this video", "scan this channel") into
//! deduplicated, resumable, progress-tracked background jobs:
//!
//! - `DownloadOrchestrator` — dedup/orphan-repair on request, and the
//!   worker-side download state machine
//! - `ScanOrchestrator` — scan creation and the two-phase
//!   enumerate-then-detail execution
//! - `catalog` — idempotent metadata upsert and catalog queries
//! - `CatalogService` — the surface consumed by the HTTP layer

pub mod catalog;
pub mod config;
pub mod download;
pub mod error;
pub mod scan;
pub mod service;
pub mod views;

pub use catalog::{add_video_by_url, list_videos, upsert_video, UpsertMode, VideoFilter};
pub use config::CoreConfig;
pub use download::DownloadOrchestrator;
pub use error::{CoreError, CoreResult};
pub use scan::ScanOrchestrator;
pub use service::CatalogService;
pub use views::{DownloadJobView, ScanJobView};

//! Channel scan job records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::status::JobStatus;

/// Unique identifier for a scan job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ScanId(pub String);

impl ScanId {
    /// Generate a new random scan ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ScanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ScanId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ScanId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Channel sub-page a scan enumerates.
///
/// Categories are always processed in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScanCategory {
    Shorts,
    Videos,
    Streams,
}

impl ScanCategory {
    /// Label used as the key in `ScanJob::counts`.
    pub fn label(&self) -> &'static str {
        match self {
            ScanCategory::Shorts => "shorts",
            ScanCategory::Videos => "videos",
            ScanCategory::Streams => "streams",
        }
    }

    /// Channel sub-page path segment for this category.
    pub fn tab(&self) -> &'static str {
        // Tab path happens to match the label on the platform
        self.label()
    }
}

impl fmt::Display for ScanCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Parameters for creating a channel scan.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScanRequest {
    /// Channel handle or URL, normalized by the orchestrator
    pub channel: String,

    /// Enumerate the shorts tab
    #[serde(default = "default_true")]
    pub include_shorts: bool,

    /// Enumerate the long-form videos tab
    #[serde(default = "default_true")]
    pub include_videos: bool,

    /// Enumerate the live streams tab
    #[serde(default)]
    pub include_streams: bool,

    /// Per-category item cap; 0 means no explicit limit
    #[serde(default)]
    pub max_items: u32,
}

fn default_true() -> bool {
    true
}

impl ScanRequest {
    /// Categories enabled by this request, in scan order.
    pub fn categories(&self) -> Vec<ScanCategory> {
        let mut out = Vec::new();
        if self.include_shorts {
            out.push(ScanCategory::Shorts);
        }
        if self.include_videos {
            out.push(ScanCategory::Videos);
        }
        if self.include_streams {
            out.push(ScanCategory::Streams);
        }
        out
    }
}

/// Durable record of a channel scan job.
///
/// Counter invariant: `inserted + updated <= unique_videos <= sum(counts)`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScanJob {
    /// Unique scan ID
    pub scan_id: ScanId,

    /// Normalized channel handle (no leading `@`)
    pub channel: String,

    /// Enumerate the shorts tab
    pub include_shorts: bool,

    /// Enumerate the long-form videos tab
    pub include_videos: bool,

    /// Enumerate the live streams tab
    pub include_streams: bool,

    /// Effective per-category cap after clamping
    pub max_items: u32,

    /// Current status
    #[serde(default)]
    pub status: JobStatus,

    /// Progress (0-100)
    #[serde(default)]
    pub progress: u8,

    /// Entries found per category label, persisted after enumeration
    #[serde(default)]
    pub counts: HashMap<String, u32>,

    /// Distinct item ids seen so far
    #[serde(default)]
    pub unique_videos: u32,

    /// Catalog records created by this scan
    #[serde(default)]
    pub inserted: u32,

    /// Catalog records updated by this scan
    #[serde(default)]
    pub updated: u32,

    /// Error text, set only on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// When a worker picked the scan up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the scan reached a terminal status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ScanJob {
    /// Create a new queued scan for a normalized handle.
    pub fn new(channel: impl Into<String>, request: &ScanRequest, effective_max_items: u32) -> Self {
        let now = Utc::now();
        Self {
            scan_id: ScanId::new(),
            channel: channel.into(),
            include_shorts: request.include_shorts,
            include_videos: request.include_videos,
            include_streams: request.include_streams,
            max_items: effective_max_items,
            status: JobStatus::Queued,
            progress: 0,
            counts: HashMap::new(),
            unique_videos: 0,
            inserted: 0,
            updated: 0,
            error_message: None,
            started_at: None,
            finished_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Categories this scan enumerates, in scan order.
    pub fn categories(&self) -> Vec<ScanCategory> {
        let mut out = Vec::new();
        if self.include_shorts {
            out.push(ScanCategory::Shorts);
        }
        if self.include_videos {
            out.push(ScanCategory::Videos);
        }
        if self.include_streams {
            out.push(ScanCategory::Streams);
        }
        out
    }

    /// Worker picked the scan up.
    pub fn start(&mut self) {
        self.status = JobStatus::Running;
        self.progress = 1;
        self.started_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    /// Raise progress; values never move down within a run.
    pub fn set_progress(&mut self, progress: u8) {
        self.progress = self.progress.max(progress.min(100));
        self.updated_at = Utc::now();
    }

    /// All items processed.
    pub fn complete(&mut self) {
        self.status = JobStatus::Success;
        self.progress = 100;
        self.finished_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    /// Abort the scan; committed counters stay visible.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error_message = Some(error.into());
        self.finished_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    /// Total entries found across categories.
    pub fn total_enumerated(&self) -> u32 {
        self.counts.values().sum()
    }
}

//! Catalog video records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::download_job::JobId;

/// Maximum duration (exclusive, in seconds) for a video to classify as
/// short-form. A 60-second video is a short; a 61-second one is not.
pub const SHORT_MAX_SECS: i64 = 61;

/// Classify a video as short-form from its duration.
///
/// Unknown duration classifies as not-short.
pub fn classify_short(duration: Option<i64>) -> bool {
    matches!(duration, Some(d) if d < SHORT_MAX_SECS)
}

/// Natural identifier of a video on the source platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A cataloged video.
///
/// Upserted by both channel scans and direct add-by-url; never deleted by
/// the job core. `last_download_job_id`/`downloaded_at` are stamped by the
/// download worker on success and are how "already downloaded" surfaces to
/// catalog queries.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Video {
    /// Natural id from the source platform
    pub video_id: VideoId,

    /// Canonical page URL on the source platform
    pub source_url: String,

    /// Video title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Duration in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,

    /// View count at extraction time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_count: Option<i64>,

    /// Upload date as reported by the platform (YYYYMMDD)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_date: Option<String>,

    /// Uploader / channel display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploader: Option<String>,

    /// Short-form classification derived from duration
    #[serde(default)]
    pub is_short: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Job that most recently downloaded this video
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_download_job_id: Option<JobId>,

    /// When the video was last downloaded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloaded_at: Option<DateTime<Utc>>,
}

impl Video {
    /// Create a new catalog record with only identity fields set.
    pub fn new(video_id: VideoId, source_url: impl Into<String>) -> Self {
        Self {
            video_id,
            source_url: source_url.into(),
            title: None,
            duration: None,
            view_count: None,
            upload_date: None,
            uploader: None,
            is_short: false,
            created_at: Utc::now(),
            last_download_job_id: None,
            downloaded_at: None,
        }
    }

    /// Stamp the record after a successful download.
    pub fn mark_downloaded(&mut self, job_id: JobId) {
        self.last_download_job_id = Some(job_id);
        self.downloaded_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_classification() {
        assert!(classify_short(Some(60)));
        assert!(classify_short(Some(1)));
        assert!(!classify_short(Some(61)));
        assert!(!classify_short(Some(3600)));
        assert!(!classify_short(None));
    }

    #[test]
    fn test_mark_downloaded() {
        let mut v = Video::new(
            VideoId::from("abc123def45"),
            "https://www.youtube.com/watch?v=abc123def45",
        );
        assert!(v.downloaded_at.is_none());

        let job_id = JobId::new();
        v.mark_downloaded(job_id.clone());
        assert_eq!(v.last_download_job_id, Some(job_id));
        assert!(v.downloaded_at.is_some());
    }
}

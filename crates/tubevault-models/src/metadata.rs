//! Extracted metadata shapes at the extractor boundary.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One entry of a shallow (flat) channel listing.
///
/// Flat extraction returns minimal per-item fields; either may be missing
/// for degraded entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct FlatEntry {
    /// Item id on the source platform
    #[serde(default)]
    pub id: Option<String>,

    /// Item URL as reported by the listing; not always absolute
    #[serde(default)]
    pub url: Option<String>,
}

/// Full metadata for a single item.
///
/// Mirrors the subset of the extractor's info output the catalog keeps.
/// The extractor returns this whole or not at all, never partial.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ItemMetadata {
    /// Item id on the source platform; records without one are unusable
    #[serde(default)]
    pub id: Option<String>,

    /// Canonical page URL
    #[serde(default)]
    pub webpage_url: Option<String>,

    /// Title
    #[serde(default)]
    pub title: Option<String>,

    /// Duration in seconds
    #[serde(default)]
    pub duration: Option<i64>,

    /// View count
    #[serde(default)]
    pub view_count: Option<i64>,

    /// Upload date (YYYYMMDD)
    #[serde(default)]
    pub upload_date: Option<String>,

    /// Uploader / channel display name
    #[serde(default)]
    pub uploader: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_entry_tolerates_missing_fields() {
        let e: FlatEntry = serde_json::from_str(r#"{"id": "abc123def45"}"#).unwrap();
        assert_eq!(e.id.as_deref(), Some("abc123def45"));
        assert!(e.url.is_none());

        let e: FlatEntry = serde_json::from_str("{}").unwrap();
        assert!(e.id.is_none());
    }

    #[test]
    fn test_metadata_parses_extractor_output() {
        let json = r#"{
            "id": "abc123def45",
            "webpage_url": "https://www.youtube.com/watch?v=abc123def45",
            "title": "A video",
            "duration": 42,
            "view_count": 1000,
            "upload_date": "20250101",
            "uploader": "Example",
            "formats": [{"ignored": true}]
        }"#;
        let m: ItemMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(m.id.as_deref(), Some("abc123def45"));
        assert_eq!(m.duration, Some(42));
        assert_eq!(m.uploader.as_deref(), Some("Example"));
    }
}

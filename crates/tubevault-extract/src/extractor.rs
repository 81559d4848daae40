//! The extraction collaborator interface.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use tubevault_models::{FlatEntry, ItemMetadata};

use crate::error::ExtractResult;

/// Extraction and download operations the orchestrators depend on.
///
/// `extract_detail` returns `Ok(None)` when the item could not be
/// extracted; callers skip such items rather than failing a whole scan.
/// Transport-level problems (the binary missing, spawn failures) surface
/// as errors.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Shallow listing of up to `limit` entries from a channel sub-page.
    async fn extract_flat(&self, listing_url: &str, limit: u32) -> ExtractResult<Vec<FlatEntry>>;

    /// Full metadata for one item; `None` when extraction failed.
    async fn extract_detail(&self, item_url: &str) -> ExtractResult<Option<ItemMetadata>>;

    /// Download the media for one item and return the file path.
    ///
    /// Files land under `output_dir/<sanitized uploader>/<item_id>.<ext>`.
    async fn download_media(
        &self,
        url: &str,
        output_dir: &Path,
        item_id: &str,
        uploader_hint: Option<&str>,
        max_height: u32,
    ) -> ExtractResult<PathBuf>;
}

//! Idempotent catalog upsert and queries.

use tracing::debug;

use tubevault_extract::Extractor;
use tubevault_models::{classify_short, watch_url, ItemMetadata, Video, VideoId};
use tubevault_store::VideoStore;

use crate::error::{CoreError, CoreResult};

/// How extracted fields merge into an existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertMode {
    /// Scan path: extracted fields overwrite unconditionally.
    Replace,
    /// Direct add-by-url path: a field is overwritten only when the new
    /// metadata provides a value, so a degraded extraction response cannot
    /// clobber good data.
    Merge,
}

/// Merge extracted metadata into the catalog.
///
/// Returns `true` when a new record was created, `false` when an existing
/// one was updated. Metadata without an id is a no-op returning `false`.
pub async fn upsert_video(
    store: &dyn VideoStore,
    meta: &ItemMetadata,
    mode: UpsertMode,
) -> CoreResult<bool> {
    let Some(id) = meta.id.as_deref() else {
        return Ok(false);
    };
    let video_id = VideoId::from(id);

    let existing = store.get(&video_id).await?;
    let inserted = existing.is_none();

    let mut video = existing.unwrap_or_else(|| {
        let url = meta
            .webpage_url
            .clone()
            .unwrap_or_else(|| watch_url(id));
        Video::new(video_id.clone(), url)
    });

    match mode {
        UpsertMode::Replace => {
            if let Some(url) = &meta.webpage_url {
                video.source_url = url.clone();
            }
            video.title = meta.title.clone();
            video.duration = meta.duration;
            video.view_count = meta.view_count;
            video.upload_date = meta.upload_date.clone();
            video.uploader = meta.uploader.clone();
        }
        UpsertMode::Merge => {
            if let Some(url) = &meta.webpage_url {
                video.source_url = url.clone();
            }
            if meta.title.is_some() {
                video.title = meta.title.clone();
            }
            if meta.duration.is_some() {
                video.duration = meta.duration;
            }
            if meta.view_count.is_some() {
                video.view_count = meta.view_count;
            }
            if meta.upload_date.is_some() {
                video.upload_date = meta.upload_date.clone();
            }
            if meta.uploader.is_some() {
                video.uploader = meta.uploader.clone();
            }
        }
    }
    video.is_short = classify_short(video.duration);

    store.put(&video).await?;
    debug!(
        "Upserted video {} ({})",
        video.video_id,
        if inserted { "inserted" } else { "updated" }
    );
    Ok(inserted)
}

/// Extract a URL and merge the result into the catalog.
///
/// Returns the catalog id of the video. Extraction problems surface
/// synchronously; there is no job involved.
pub async fn add_video_by_url(
    extractor: &dyn Extractor,
    store: &dyn VideoStore,
    url: &str,
) -> CoreResult<VideoId> {
    let url = url.trim();
    if url.is_empty() {
        return Err(CoreError::invalid_argument("url is required"));
    }

    let Some(mut meta) = extractor.extract_detail(url).await? else {
        return Err(CoreError::invalid_argument(format!(
            "extraction returned nothing for {url}"
        )));
    };
    let Some(id) = meta.id.clone() else {
        return Err(CoreError::invalid_argument(
            "extractor did not return a video id",
        ));
    };

    // Keep the caller's URL when the extractor omits a canonical one
    if meta.webpage_url.is_none() {
        meta.webpage_url = Some(url.to_string());
    }

    upsert_video(store, &meta, UpsertMode::Merge).await?;
    Ok(VideoId::from_string(id))
}

/// Catalog listing filters.
#[derive(Debug, Clone, Default)]
pub struct VideoFilter {
    /// Title substring
    pub q: Option<String>,
    /// Short-form classification
    pub is_short: Option<bool>,
    /// Minimum view count (unknown view counts excluded)
    pub min_views: Option<i64>,
    /// Maximum duration in seconds (unknown durations excluded)
    pub max_duration: Option<i64>,
}

/// List catalog videos, newest first, applying the filter.
pub async fn list_videos(
    store: &dyn VideoStore,
    filter: &VideoFilter,
) -> CoreResult<Vec<Video>> {
    let videos = store.list().await?;
    Ok(videos
        .into_iter()
        .filter(|v| {
            if let Some(q) = &filter.q {
                match &v.title {
                    Some(t) if t.contains(q.as_str()) => {}
                    _ => return false,
                }
            }
            if let Some(is_short) = filter.is_short {
                if v.is_short != is_short {
                    return false;
                }
            }
            if let Some(min_views) = filter.min_views {
                match v.view_count {
                    Some(views) if views >= min_views => {}
                    _ => return false,
                }
            }
            if let Some(max_duration) = filter.max_duration {
                match v.duration {
                    Some(d) if d <= max_duration => {}
                    _ => return false,
                }
            }
            true
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tubevault_store::MemoryStore;

    fn meta(id: &str, duration: Option<i64>) -> ItemMetadata {
        ItemMetadata {
            id: Some(id.to_string()),
            webpage_url: Some(format!("https://www.youtube.com/watch?v={id}")),
            title: Some("A title".to_string()),
            duration,
            view_count: Some(100),
            upload_date: Some("20250101".to_string()),
            uploader: Some("Example".to_string()),
        }
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_updates() {
        let store = MemoryStore::new();
        let m = meta("abc123def45", Some(30));

        assert!(upsert_video(&store, &m, UpsertMode::Replace).await.unwrap());
        assert!(!upsert_video(&store, &m, UpsertMode::Replace).await.unwrap());

        let v = VideoStore::get(&store, &VideoId::from("abc123def45"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(v.title.as_deref(), Some("A title"));
        assert!(v.is_short);
    }

    #[tokio::test]
    async fn test_upsert_without_id_is_noop() {
        let store = MemoryStore::new();
        let m = ItemMetadata::default();

        assert!(!upsert_video(&store, &m, UpsertMode::Replace).await.unwrap());
        assert!(VideoStore::list(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_mode_clobbers_with_null() {
        let store = MemoryStore::new();
        upsert_video(&store, &meta("abc123def45", Some(30)), UpsertMode::Replace)
            .await
            .unwrap();

        let degraded = ItemMetadata {
            id: Some("abc123def45".to_string()),
            ..ItemMetadata::default()
        };
        upsert_video(&store, &degraded, UpsertMode::Replace)
            .await
            .unwrap();

        let v = VideoStore::get(&store, &VideoId::from("abc123def45"))
            .await
            .unwrap()
            .unwrap();
        assert!(v.title.is_none());
        assert!(v.duration.is_none());
        assert!(!v.is_short);
    }

    #[tokio::test]
    async fn test_merge_mode_preserves_prior_values() {
        let store = MemoryStore::new();
        upsert_video(&store, &meta("abc123def45", Some(30)), UpsertMode::Merge)
            .await
            .unwrap();

        let degraded = ItemMetadata {
            id: Some("abc123def45".to_string()),
            view_count: Some(250),
            ..ItemMetadata::default()
        };
        upsert_video(&store, &degraded, UpsertMode::Merge)
            .await
            .unwrap();

        let v = VideoStore::get(&store, &VideoId::from("abc123def45"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(v.title.as_deref(), Some("A title"));
        assert_eq!(v.duration, Some(30));
        assert_eq!(v.view_count, Some(250));
        assert!(v.is_short);
    }

    #[tokio::test]
    async fn test_short_classification_boundary() {
        let store = MemoryStore::new();

        upsert_video(&store, &meta("aaaaaaaaaaa", Some(60)), UpsertMode::Replace)
            .await
            .unwrap();
        upsert_video(&store, &meta("bbbbbbbbbbb", Some(61)), UpsertMode::Replace)
            .await
            .unwrap();
        upsert_video(&store, &meta("ccccccccccc", None), UpsertMode::Replace)
            .await
            .unwrap();

        let get = |id: &str| {
            let store = &store;
            let id = VideoId::from(id);
            async move { VideoStore::get(store, &id).await.unwrap().unwrap() }
        };
        assert!(get("aaaaaaaaaaa").await.is_short);
        assert!(!get("bbbbbbbbbbb").await.is_short);
        assert!(!get("ccccccccccc").await.is_short);
    }

    #[tokio::test]
    async fn test_list_videos_filters() {
        let store = MemoryStore::new();
        upsert_video(&store, &meta("aaaaaaaaaaa", Some(30)), UpsertMode::Replace)
            .await
            .unwrap();
        upsert_video(&store, &meta("bbbbbbbbbbb", Some(600)), UpsertMode::Replace)
            .await
            .unwrap();

        let shorts = list_videos(
            &store,
            &VideoFilter {
                is_short: Some(true),
                ..VideoFilter::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(shorts.len(), 1);
        assert_eq!(shorts[0].video_id.as_str(), "aaaaaaaaaaa");

        let long = list_videos(
            &store,
            &VideoFilter {
                max_duration: Some(60),
                ..VideoFilter::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(long.len(), 1);

        let titled = list_videos(
            &store,
            &VideoFilter {
                q: Some("A tit".to_string()),
                ..VideoFilter::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(titled.len(), 2);
    }
}

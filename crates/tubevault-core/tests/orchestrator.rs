//! End-to-end orchestrator tests against the in-memory store/queue and a
//! scripted extractor.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use tubevault_core::{CatalogService, CoreConfig, CoreError};
use tubevault_extract::{ExtractError, ExtractResult, Extractor};
use tubevault_models::{
    watch_url, FlatEntry, ItemMetadata, JobStatus, ScanRequest, Video, VideoId,
};
use tubevault_queue::{MemoryQueue, TaskQueue};
use tubevault_store::{DownloadJobStore, MemoryStore, ScanJobStore, VideoStore};

/// Scripted extractor double.
#[derive(Default)]
struct FakeExtractor {
    /// Flat listings keyed by listing URL
    listings: HashMap<String, Vec<FlatEntry>>,
    /// Listing URLs that error out
    failing_listings: HashSet<String>,
    /// Detail metadata keyed by item URL; absent means `Ok(None)`
    details: HashMap<String, ItemMetadata>,
    /// Item URLs whose detail fetch errors out
    failing_details: HashSet<String>,
    /// Error text for download attempts; `None` means downloads succeed
    download_error: Option<String>,
    download_calls: AtomicU32,
    detail_calls: Mutex<Vec<String>>,
}

impl FakeExtractor {
    fn download_calls(&self) -> u32 {
        self.download_calls.load(Ordering::SeqCst)
    }

    fn detail_calls(&self) -> Vec<String> {
        self.detail_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn extract_flat(&self, listing_url: &str, limit: u32) -> ExtractResult<Vec<FlatEntry>> {
        if self.failing_listings.contains(listing_url) {
            return Err(ExtractError::extract_failed("listing unavailable"));
        }
        let mut entries = self.listings.get(listing_url).cloned().unwrap_or_default();
        entries.truncate(limit as usize);
        Ok(entries)
    }

    async fn extract_detail(&self, item_url: &str) -> ExtractResult<Option<ItemMetadata>> {
        self.detail_calls.lock().unwrap().push(item_url.to_string());
        if self.failing_details.contains(item_url) {
            return Err(ExtractError::extract_failed("detail unavailable"));
        }
        Ok(self.details.get(item_url).cloned())
    }

    async fn download_media(
        &self,
        _url: &str,
        output_dir: &Path,
        item_id: &str,
        _uploader_hint: Option<&str>,
        _max_height: u32,
    ) -> ExtractResult<PathBuf> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.download_error {
            return Err(ExtractError::download_failed(err.clone()));
        }
        std::fs::create_dir_all(output_dir)?;
        let path = output_dir.join(format!("{item_id}.mp4"));
        std::fs::write(&path, b"media")?;
        Ok(path)
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    queue: Arc<MemoryQueue>,
    extractor: Arc<FakeExtractor>,
    service: CatalogService,
    _outdir: tempfile::TempDir,
}

fn harness(extractor: FakeExtractor) -> Harness {
    let outdir = tempfile::tempdir().unwrap();
    let config = CoreConfig {
        output_dir: outdir.path().to_path_buf(),
        max_height: 1080,
        scan_items_cap: 5000,
    };

    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryQueue::new());
    let extractor = Arc::new(extractor);

    let service = CatalogService::new(
        Arc::clone(&store) as Arc<dyn VideoStore>,
        Arc::clone(&store) as Arc<dyn DownloadJobStore>,
        Arc::clone(&store) as Arc<dyn ScanJobStore>,
        Arc::clone(&queue) as Arc<dyn TaskQueue>,
        Arc::clone(&extractor) as Arc<dyn Extractor>,
        config,
    );

    Harness {
        store,
        queue,
        extractor,
        service,
        _outdir: outdir,
    }
}

async fn seed_video(h: &Harness, id: &str) -> VideoId {
    let video_id = VideoId::from(id);
    let mut video = Video::new(video_id.clone(), watch_url(id));
    video.uploader = Some("Example".to_string());
    VideoStore::put(h.store.as_ref(), &video).await.unwrap();
    video_id
}

fn meta(id: &str, duration: Option<i64>) -> ItemMetadata {
    ItemMetadata {
        id: Some(id.to_string()),
        webpage_url: Some(watch_url(id)),
        title: Some(format!("Video {id}")),
        duration,
        view_count: Some(1000),
        upload_date: Some("20250101".to_string()),
        uploader: Some("Example".to_string()),
    }
}

// ---------------------------------------------------------------------------
// Download orchestration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn download_request_for_unknown_video_fails() {
    let h = harness(FakeExtractor::default());
    let err = h
        .service
        .create_download(&VideoId::from("missing00000"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
    assert_eq!(h.queue.submitted_count(), 0);
}

#[tokio::test]
async fn download_request_reuses_active_job() {
    let h = harness(FakeExtractor::default());
    let video_id = seed_video(&h, "abc123def45").await;

    let first = h.service.create_download(&video_id).await.unwrap();
    assert_eq!(first.status, JobStatus::Queued);
    assert_eq!(h.queue.submitted_count(), 1);

    let second = h.service.create_download(&video_id).await.unwrap();
    assert_eq!(second.job_id, first.job_id);
    // No second job, no second submission
    assert_eq!(h.queue.submitted_count(), 1);
}

#[tokio::test]
async fn download_request_repairs_orphaned_job() {
    let h = harness(FakeExtractor::default());
    let video_id = seed_video(&h, "abc123def45").await;

    let first = h.service.create_download(&video_id).await.unwrap();

    // The queue backend lost the task
    h.queue.forget(&first.job_id);

    let repaired = h.service.create_download(&video_id).await.unwrap();
    assert_eq!(repaired.job_id, first.job_id);
    assert_eq!(repaired.status, JobStatus::Queued);
    assert_eq!(repaired.progress, 0);
    assert_eq!(h.queue.submitted_count(), 2);
    assert!(h.queue.exists(&repaired.job_id).await.unwrap());
}

#[tokio::test]
async fn download_request_returns_finished_job_with_existing_file() {
    let h = harness(FakeExtractor::default());
    let video_id = seed_video(&h, "abc123def45").await;

    // Run a job to completion
    let created = h.service.create_download(&video_id).await.unwrap();
    let task = match h.queue.take().unwrap() {
        tubevault_queue::QueueTask::Download(t) => t,
        other => panic!("unexpected task: {other:?}"),
    };
    h.service.downloads().run(&task).await.unwrap();
    h.queue.ack(&created.job_id);

    let again = h.service.create_download(&video_id).await.unwrap();
    assert_eq!(again.job_id, created.job_id);
    assert_eq!(again.status, JobStatus::Success);
    assert!(again.output_path.is_some());
    // Finished job with a file on disk: nothing new submitted
    assert_eq!(h.queue.submitted_count(), 1);
}

#[tokio::test]
async fn download_request_creates_fresh_job_when_output_vanished() {
    let h = harness(FakeExtractor::default());
    let video_id = seed_video(&h, "abc123def45").await;

    let created = h.service.create_download(&video_id).await.unwrap();
    let task = match h.queue.take().unwrap() {
        tubevault_queue::QueueTask::Download(t) => t,
        other => panic!("unexpected task: {other:?}"),
    };
    h.service.downloads().run(&task).await.unwrap();
    h.queue.ack(&created.job_id);

    // Stale success record: the file is gone
    let done = h.service.get_download(&created.job_id.clone().into()).await;
    let path = done.unwrap().output_path.unwrap();
    std::fs::remove_file(&path).unwrap();

    let fresh = h.service.create_download(&video_id).await.unwrap();
    assert_ne!(fresh.job_id, created.job_id);
    assert_eq!(fresh.status, JobStatus::Queued);
    assert_eq!(h.queue.submitted_count(), 2);
}

#[tokio::test]
async fn download_run_completes_job_and_stamps_video() {
    let h = harness(FakeExtractor::default());
    let video_id = seed_video(&h, "abc123def45").await;

    let created = h.service.create_download(&video_id).await.unwrap();
    let task = match h.queue.take().unwrap() {
        tubevault_queue::QueueTask::Download(t) => t,
        other => panic!("unexpected task: {other:?}"),
    };
    h.service.downloads().run(&task).await.unwrap();

    let job = h
        .service
        .get_download(&created.job_id.clone().into())
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Success);
    assert_eq!(job.progress, 100);
    let out = job.output_path.unwrap();
    assert!(std::path::Path::new(&out).exists());
    assert!(job.started_at.is_some());
    assert!(job.finished_at.is_some());

    let video = VideoStore::get(h.store.as_ref(), &video_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        video.last_download_job_id.map(|j| j.0),
        Some(job.job_id.clone())
    );
    assert!(video.downloaded_at.is_some());
}

#[tokio::test]
async fn download_run_failure_marks_job_failed_and_propagates() {
    let h = harness(FakeExtractor {
        download_error: Some("yt-dlp failed: HTTP Error 403".to_string()),
        ..FakeExtractor::default()
    });
    let video_id = seed_video(&h, "abc123def45").await;

    let created = h.service.create_download(&video_id).await.unwrap();
    let task = match h.queue.take().unwrap() {
        tubevault_queue::QueueTask::Download(t) => t,
        other => panic!("unexpected task: {other:?}"),
    };

    // The error propagates so the queue's retry policy still applies
    assert!(h.service.downloads().run(&task).await.is_err());

    let job = h
        .service
        .get_download(&created.job_id.into())
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.progress, 0);
    let msg = job.error_message.unwrap();
    assert!(msg.contains("yt-dlp failed: HTTP Error 403"), "got: {msg}");

    // The video was never stamped
    let video = VideoStore::get(h.store.as_ref(), &video_id)
        .await
        .unwrap()
        .unwrap();
    assert!(video.downloaded_at.is_none());
}

#[tokio::test]
async fn download_run_skips_download_when_output_already_on_disk() {
    let h = harness(FakeExtractor::default());
    let video_id = seed_video(&h, "abc123def45").await;

    let created = h.service.create_download(&video_id).await.unwrap();
    let task = match h.queue.take().unwrap() {
        tubevault_queue::QueueTask::Download(t) => t,
        other => panic!("unexpected task: {other:?}"),
    };
    h.service.downloads().run(&task).await.unwrap();
    assert_eq!(h.extractor.download_calls(), 1);

    // Re-running the same job finds the file and does not download again
    h.service.downloads().run(&task).await.unwrap();
    assert_eq!(h.extractor.download_calls(), 1);

    let job = h.service.get_download(&created.job_id.into()).await.unwrap();
    assert_eq!(job.status, JobStatus::Success);
}

#[tokio::test]
async fn download_file_path_distinguishes_not_ready_from_missing() {
    let h = harness(FakeExtractor::default());
    let video_id = seed_video(&h, "abc123def45").await;

    let created = h.service.create_download(&video_id).await.unwrap();
    let job_id: tubevault_models::JobId = created.job_id.clone().into();

    // Queued job: not ready
    assert!(matches!(
        h.service.download_file_path(&job_id).await.unwrap_err(),
        CoreError::FileNotReady(_)
    ));

    let task = match h.queue.take().unwrap() {
        tubevault_queue::QueueTask::Download(t) => t,
        other => panic!("unexpected task: {other:?}"),
    };
    h.service.downloads().run(&task).await.unwrap();

    let path = h.service.download_file_path(&job_id).await.unwrap();
    assert!(path.exists());

    std::fs::remove_file(&path).unwrap();
    assert!(matches!(
        h.service.download_file_path(&job_id).await.unwrap_err(),
        CoreError::FileMissing(_)
    ));

    assert!(matches!(
        h.service
            .download_file_path(&tubevault_models::JobId::new())
            .await
            .unwrap_err(),
        CoreError::NotFound(_)
    ));
}

// ---------------------------------------------------------------------------
// Scan orchestration
// ---------------------------------------------------------------------------

fn shorts_listing_url(handle: &str) -> String {
    format!("https://www.youtube.com/@{handle}/shorts")
}

fn videos_listing_url(handle: &str) -> String {
    format!("https://www.youtube.com/@{handle}/videos")
}

fn scan_request(channel: &str, max_items: u32) -> ScanRequest {
    ScanRequest {
        channel: channel.to_string(),
        include_shorts: true,
        include_videos: false,
        include_streams: false,
        max_items,
    }
}

#[tokio::test]
async fn scan_rejects_empty_category_selection() {
    let h = harness(FakeExtractor::default());
    let err = h
        .service
        .create_scan(&ScanRequest {
            channel: "@Example".to_string(),
            include_shorts: false,
            include_videos: false,
            include_streams: false,
            max_items: 10,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::InvalidArgument(_)));
    // Rejected before any job was created or submitted
    assert_eq!(h.queue.submitted_count(), 0);
}

#[tokio::test]
async fn scan_rejects_malformed_channel() {
    let h = harness(FakeExtractor::default());
    for channel in ["", "two words", "a/b"] {
        let err = h
            .service
            .create_scan(&scan_request(channel, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)), "{channel:?}");
    }
    assert_eq!(h.queue.submitted_count(), 0);
}

#[tokio::test]
async fn scan_clamps_max_items() {
    let h = harness(FakeExtractor::default());

    let unlimited = h
        .service
        .create_scan(&scan_request("@Example", 0))
        .await
        .unwrap();
    assert_eq!(unlimited.effective_max_items, 5000);

    let over = h
        .service
        .create_scan(&scan_request("@Example", 10000))
        .await
        .unwrap();
    assert_eq!(over.effective_max_items, 5000);

    let under = h
        .service
        .create_scan(&scan_request("@Example", 10))
        .await
        .unwrap();
    assert_eq!(under.effective_max_items, 10);
}

#[tokio::test]
async fn scan_normalizes_channel_forms() {
    let h = harness(FakeExtractor::default());
    for channel in ["Example", "@Example", "https://www.youtube.com/@Example"] {
        let view = h
            .service
            .create_scan(&scan_request(channel, 5))
            .await
            .unwrap();
        assert_eq!(view.channel, "Example", "{channel:?}");
    }
}

#[tokio::test]
async fn scan_end_to_end_two_shorts() {
    let mut fake = FakeExtractor::default();
    fake.listings.insert(
        shorts_listing_url("Example"),
        vec![
            FlatEntry {
                id: Some("shrtaaaaaaa".to_string()),
                url: Some(watch_url("shrtaaaaaaa")),
            },
            FlatEntry {
                id: Some("shrtbbbbbbb".to_string()),
                url: Some(watch_url("shrtbbbbbbb")),
            },
        ],
    );
    fake.details
        .insert(watch_url("shrtaaaaaaa"), meta("shrtaaaaaaa", Some(30)));
    fake.details
        .insert(watch_url("shrtbbbbbbb"), meta("shrtbbbbbbb", Some(45)));

    let h = harness(fake);
    let created = h
        .service
        .create_scan(&scan_request("@Example", 2))
        .await
        .unwrap();

    let task = match h.queue.take().unwrap() {
        tubevault_queue::QueueTask::Scan(t) => t,
        other => panic!("unexpected task: {other:?}"),
    };
    h.service.scanner().run(&task).await.unwrap();

    let scan = h
        .service
        .get_scan(&created.scan_id.clone().into())
        .await
        .unwrap();
    assert_eq!(scan.status, JobStatus::Success);
    assert_eq!(scan.progress, 100);
    assert_eq!(scan.counts.get("shorts"), Some(&2));
    assert_eq!(scan.unique_videos, 2);
    assert_eq!(scan.inserted, 2);
    assert_eq!(scan.updated, 0);

    // Both landed in the catalog, classified as shorts
    let v = VideoStore::get(h.store.as_ref(), &VideoId::from("shrtaaaaaaa"))
        .await
        .unwrap()
        .unwrap();
    assert!(v.is_short);

    // Re-scanning updates instead of inserting
    let second = h
        .service
        .create_scan(&scan_request("@Example", 2))
        .await
        .unwrap();
    let task = match h.queue.take().unwrap() {
        tubevault_queue::QueueTask::Scan(t) => t,
        other => panic!("unexpected task: {other:?}"),
    };
    h.service.scanner().run(&task).await.unwrap();

    let rescan = h.service.get_scan(&second.scan_id.into()).await.unwrap();
    assert_eq!(rescan.inserted, 0);
    assert_eq!(rescan.updated, 2);
}

#[tokio::test]
async fn scan_tolerates_category_enumeration_failure() {
    let mut fake = FakeExtractor::default();
    fake.failing_listings.insert(shorts_listing_url("Example"));
    fake.listings.insert(
        videos_listing_url("Example"),
        vec![FlatEntry {
            id: Some("vidaaaaaaaa".to_string()),
            url: Some(watch_url("vidaaaaaaaa")),
        }],
    );
    fake.details
        .insert(watch_url("vidaaaaaaaa"), meta("vidaaaaaaaa", Some(600)));

    let h = harness(fake);
    let created = h
        .service
        .create_scan(&ScanRequest {
            channel: "@Example".to_string(),
            include_shorts: true,
            include_videos: true,
            include_streams: false,
            max_items: 10,
        })
        .await
        .unwrap();

    let task = match h.queue.take().unwrap() {
        tubevault_queue::QueueTask::Scan(t) => t,
        other => panic!("unexpected task: {other:?}"),
    };
    h.service.scanner().run(&task).await.unwrap();

    let scan = h.service.get_scan(&created.scan_id.into()).await.unwrap();
    assert_eq!(scan.status, JobStatus::Success);
    assert_eq!(scan.counts.get("shorts"), Some(&0));
    assert_eq!(scan.counts.get("videos"), Some(&1));
    assert_eq!(scan.inserted, 1);
}

#[tokio::test]
async fn scan_skips_duplicates_and_idless_entries_and_reconstructs_urls() {
    let mut fake = FakeExtractor::default();
    fake.listings.insert(
        shorts_listing_url("Example"),
        vec![
            // Listing URL is relative: must be reconstructed from the id
            FlatEntry {
                id: Some("shrtaaaaaaa".to_string()),
                url: Some("shorts/shrtaaaaaaa".to_string()),
            },
            // No id: skipped entirely
            FlatEntry {
                id: None,
                url: Some(watch_url("whoknowswhat")),
            },
            // Duplicate id: counted once
            FlatEntry {
                id: Some("shrtaaaaaaa".to_string()),
                url: Some(watch_url("shrtaaaaaaa")),
            },
        ],
    );
    fake.details
        .insert(watch_url("shrtaaaaaaa"), meta("shrtaaaaaaa", Some(30)));

    let h = harness(fake);
    let created = h
        .service
        .create_scan(&scan_request("@Example", 10))
        .await
        .unwrap();

    let task = match h.queue.take().unwrap() {
        tubevault_queue::QueueTask::Scan(t) => t,
        other => panic!("unexpected task: {other:?}"),
    };
    h.service.scanner().run(&task).await.unwrap();

    let scan = h.service.get_scan(&created.scan_id.into()).await.unwrap();
    assert_eq!(scan.status, JobStatus::Success);
    assert_eq!(scan.counts.get("shorts"), Some(&3));
    assert_eq!(scan.unique_videos, 1);
    assert_eq!(scan.inserted, 1);

    // The relative URL was replaced by the canonical watch URL
    let calls = h.extractor.detail_calls();
    assert_eq!(calls, vec![watch_url("shrtaaaaaaa")]);
}

#[tokio::test]
async fn scan_tolerates_single_item_detail_failure() {
    let mut fake = FakeExtractor::default();
    fake.listings.insert(
        shorts_listing_url("Example"),
        vec![
            FlatEntry {
                id: Some("shrtaaaaaaa".to_string()),
                url: Some(watch_url("shrtaaaaaaa")),
            },
            FlatEntry {
                id: Some("shrtbbbbbbb".to_string()),
                url: Some(watch_url("shrtbbbbbbb")),
            },
        ],
    );
    // First item's detail call errors, second succeeds
    fake.failing_details.insert(watch_url("shrtaaaaaaa"));
    fake.details
        .insert(watch_url("shrtbbbbbbb"), meta("shrtbbbbbbb", Some(45)));

    let h = harness(fake);
    let created = h
        .service
        .create_scan(&scan_request("@Example", 10))
        .await
        .unwrap();

    let task = match h.queue.take().unwrap() {
        tubevault_queue::QueueTask::Scan(t) => t,
        other => panic!("unexpected task: {other:?}"),
    };
    h.service.scanner().run(&task).await.unwrap();

    let scan = h.service.get_scan(&created.scan_id.into()).await.unwrap();
    assert_eq!(scan.status, JobStatus::Success);
    assert_eq!(scan.unique_videos, 2);
    assert_eq!(scan.inserted, 1);
    assert!(scan.inserted + scan.updated <= scan.unique_videos);
}

#[tokio::test]
async fn scan_get_unknown_id_fails() {
    let h = harness(FakeExtractor::default());
    let err = h
        .service
        .get_scan(&tubevault_models::ScanId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

// ---------------------------------------------------------------------------
// Batch job lookup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn latest_downloads_for_videos_skips_blank_and_joblesss_ids() {
    let h = harness(FakeExtractor::default());
    let with_job = seed_video(&h, "abc123def45").await;
    let _without_job = seed_video(&h, "xyz987uvw21").await;

    let created = h.service.create_download(&with_job).await.unwrap();

    let views = h
        .service
        .latest_downloads_for_videos(&[
            with_job.clone(),
            VideoId::from(""),
            VideoId::from("xyz987uvw21"),
        ])
        .await
        .unwrap();

    assert_eq!(views.len(), 1);
    assert_eq!(views[0].job_id, created.job_id);
}

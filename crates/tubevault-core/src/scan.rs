//! Channel scan orchestration.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{info, warn};

use tubevault_extract::Extractor;
use tubevault_models::{
    channel_base_url, is_absolute_url, normalize_channel_handle, watch_url, FlatEntry,
    ScanCategory, ScanJob, ScanRequest,
};
use tubevault_queue::{QueueTask, ScanTask, TaskQueue};
use tubevault_store::{ScanJobStore, VideoStore};

use crate::catalog::{upsert_video, UpsertMode};
use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};

/// Progress reserved for the enumeration phase.
const ENUM_PROGRESS: u8 = 10;
/// Highest progress the detail phase may report; 100 is terminal only.
const DETAIL_PROGRESS_CEIL: u8 = 99;

/// Orchestrates channel scans.
///
/// Scans run in two phases: cheap category-scoped flat listings first, so
/// the total work size is known and per-category failures stay isolated,
/// then the expensive per-item detail fetch with accurate progress.
pub struct ScanOrchestrator {
    scans: Arc<dyn ScanJobStore>,
    videos: Arc<dyn VideoStore>,
    queue: Arc<dyn TaskQueue>,
    extractor: Arc<dyn Extractor>,
    config: CoreConfig,
}

impl ScanOrchestrator {
    pub fn new(
        scans: Arc<dyn ScanJobStore>,
        videos: Arc<dyn VideoStore>,
        queue: Arc<dyn TaskQueue>,
        extractor: Arc<dyn Extractor>,
        config: CoreConfig,
    ) -> Self {
        Self {
            scans,
            videos,
            queue,
            extractor,
            config,
        }
    }

    /// Validate a scan request, create the job and submit its task.
    pub async fn create_scan(&self, request: &ScanRequest) -> CoreResult<ScanJob> {
        if request.categories().is_empty() {
            return Err(CoreError::invalid_argument(
                "select at least one of include_shorts/include_videos/include_streams",
            ));
        }

        let handle = normalize_channel_handle(&request.channel)?;
        let effective_max_items = self.config.effective_max_items(request.max_items);

        let scan = ScanJob::new(handle, request, effective_max_items);
        self.scans.put(&scan).await?;
        self.queue
            .submit(&QueueTask::Scan(ScanTask::new(scan.scan_id.clone())))
            .await?;

        info!(
            "Created scan {} for channel @{} (max {} per category)",
            scan.scan_id, scan.channel, scan.max_items
        );
        Ok(scan)
    }

    /// Execute a scan task on a worker.
    ///
    /// Unhandled failures abort the remaining work; counters already
    /// committed stay visible on the failed record.
    pub async fn run(&self, task: &ScanTask) -> CoreResult<()> {
        match self.execute(task).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if let Ok(Some(mut scan)) = self.scans.get(&task.scan_id).await {
                    scan.fail(e.to_string());
                    if let Err(put_err) = self.scans.put(&scan).await {
                        warn!(
                            "Failed to persist failure of scan {}: {}",
                            task.scan_id, put_err
                        );
                    }
                }
                Err(e)
            }
        }
    }

    async fn execute(&self, task: &ScanTask) -> CoreResult<()> {
        let mut scan = self
            .scans
            .get(&task.scan_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("scan job not found: {}", task.scan_id)))?;

        info!("Scan start scan={} channel=@{}", scan.scan_id, scan.channel);

        scan.start();
        // A redelivered scan restarts accounting from scratch
        scan.counts = HashMap::new();
        scan.unique_videos = 0;
        scan.inserted = 0;
        scan.updated = 0;
        self.scans.put(&scan).await?;

        // Enumeration phase: shallow listings per category. One category
        // failing records zero entries and the scan continues.
        let base = channel_base_url(&scan.channel);
        let mut listings: Vec<(ScanCategory, Vec<FlatEntry>)> = Vec::new();

        for category in scan.categories() {
            let listing_url = format!("{}/{}", base, category.tab());
            let entries = match self
                .extractor
                .extract_flat(&listing_url, scan.max_items)
                .await
            {
                Ok(mut entries) => {
                    entries.truncate(scan.max_items as usize);
                    entries
                }
                Err(e) => {
                    warn!(
                        "Enumeration of {} failed for scan {}: {}",
                        listing_url, scan.scan_id, e
                    );
                    Vec::new()
                }
            };

            scan.counts
                .insert(category.label().to_string(), entries.len() as u32);
            listings.push((category, entries));
        }

        // Persist counts before any detail fetch so pollers see partial
        // progress immediately
        scan.set_progress(ENUM_PROGRESS);
        self.scans.put(&scan).await?;

        let total: u32 = scan.total_enumerated();
        let mut processed: u32 = 0;
        let mut seen: HashSet<String> = HashSet::new();

        // Detail + upsert phase
        for (category, entries) in listings {
            for entry in entries {
                processed += 1;

                if let Some(id) = entry.id.as_deref() {
                    if seen.insert(id.to_string()) {
                        scan.unique_videos += 1;

                        let item_url = match entry.url.as_deref() {
                            Some(u) if is_absolute_url(u) => u.to_string(),
                            _ => watch_url(id),
                        };

                        match self.extractor.extract_detail(&item_url).await {
                            Ok(Some(meta)) => {
                                let inserted =
                                    upsert_video(self.videos.as_ref(), &meta, UpsertMode::Replace)
                                        .await?;
                                if meta.id.is_some() {
                                    if inserted {
                                        scan.inserted += 1;
                                    } else {
                                        scan.updated += 1;
                                    }
                                }
                            }
                            Ok(None) => {
                                warn!(
                                    "Detail fetch returned nothing for {} ({} tab), skipping",
                                    item_url, category
                                );
                            }
                            Err(e) => {
                                warn!(
                                    "Detail fetch failed for {} ({} tab), skipping: {}",
                                    item_url, category, e
                                );
                            }
                        }
                    }
                }

                let progress = ENUM_PROGRESS
                    + ((u32::from(DETAIL_PROGRESS_CEIL - ENUM_PROGRESS) * processed)
                        / total.max(1)) as u8;
                scan.set_progress(progress.min(DETAIL_PROGRESS_CEIL));
                self.scans.put(&scan).await?;
            }
        }

        scan.complete();
        self.scans.put(&scan).await?;

        info!(
            "Scan success scan={} unique={} inserted={} updated={}",
            scan.scan_id, scan.unique_videos, scan.inserted, scan.updated
        );
        Ok(())
    }
}

//! TubeVault worker binary.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tubevault_core::{CatalogService, CoreConfig};
use tubevault_extract::{Extractor, YtDlp};
use tubevault_queue::{JobQueue, TaskQueue};
use tubevault_store::{DownloadJobStore, RedisStore, ScanJobStore, VideoStore};
use tubevault_worker::{JobExecutor, WorkerConfig};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("tubevault=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting tubevault-worker");

    let worker_config = WorkerConfig::from_env();
    info!("Worker config: {:?}", worker_config);
    let core_config = CoreConfig::from_env();

    let store = match RedisStore::from_env() {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Failed to create record store: {}", e);
            std::process::exit(1);
        }
    };

    let queue = match JobQueue::from_env() {
        Ok(q) => Arc::new(q),
        Err(e) => {
            error!("Failed to create job queue: {}", e);
            std::process::exit(1);
        }
    };

    let extractor = match YtDlp::new() {
        Ok(x) => Arc::new(x),
        Err(e) => {
            error!("Failed to set up extractor: {}", e);
            std::process::exit(1);
        }
    };

    let service = Arc::new(CatalogService::new(
        Arc::clone(&store) as Arc<dyn VideoStore>,
        Arc::clone(&store) as Arc<dyn DownloadJobStore>,
        Arc::clone(&store) as Arc<dyn ScanJobStore>,
        Arc::clone(&queue) as Arc<dyn TaskQueue>,
        extractor as Arc<dyn Extractor>,
        core_config,
    ));

    let executor = Arc::new(JobExecutor::new(worker_config, queue, service));

    // Graceful shutdown on ctrl-c
    let shutdown_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown_executor.shutdown();
    });

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}

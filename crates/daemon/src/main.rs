//! Background Sync Service - Main Entry Point
//! HTTP dispatch endpoint + queue workers in one process

mod settings;
mod telemetry;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use bgsync_api_http::{HttpServer, HttpState};
use bgsync_core::application::retry::RetryPolicy;
use bgsync_core::application::{
    shutdown_channel, BackgroundSyncTask, DispatchService, HandlerRegistry, RecoveryService,
    RetentionSweeper, Worker,
};
use bgsync_core::port::id_provider::UuidProvider;
use bgsync_core::port::time_provider::SystemTimeProvider;
use bgsync_core::port::{JobQueue, TimeProvider};
use bgsync_infra_memory::MemoryJobQueue;
use bgsync_infra_sqlite::{create_pool, run_migrations, SqliteJobQueue};
use settings::{QueueBackend, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration (fails fast on invalid values)
    let settings = Settings::load()?;

    // 2. Initialize logging
    let _log_guard = telemetry::init_logging(&settings.log)?;
    info!("Background Sync Service v{} starting...", bgsync_core::VERSION);

    // 3. Open the queue transport
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let backend = settings.queue_backend()?;
    let job_queue = open_queue(&backend, time_provider.clone()).await?;

    // 4. Crash recovery (durable transport only)
    if matches!(backend, QueueBackend::Sqlite { .. }) {
        info!("Running crash recovery...");
        let recovery = RecoveryService::new(job_queue.clone(), time_provider.clone(), None);
        match recovery.recover_orphaned_jobs().await {
            Ok(count) => info!(recovered_jobs = count, "Crash recovery completed"),
            Err(e) => error!(error = %e, "Crash recovery failed"),
        }
    }

    // 5. Dependencies (DI wiring)
    let queue_config = settings.queue_config();
    let handlers = Arc::new(
        HandlerRegistry::new().with(Arc::new(BackgroundSyncTask::new(settings.sync_delay()))),
    );
    let retry_policy = Arc::new(
        RetryPolicy::new(time_provider.clone(), settings.worker.retry_base_delay_ms)
            .with_max_delay_ms(settings.worker.max_retry_delay_ms),
    );
    let dispatch = Arc::new(
        DispatchService::new(
            job_queue.clone(),
            Arc::new(UuidProvider),
            time_provider.clone(),
            queue_config.name.clone(),
        )
        .with_max_attempts(settings.worker.max_attempts),
    );

    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    // 6. Start HTTP server
    let http = HttpServer::new(settings.http_server_config(), HttpState::new(dispatch))
        .start(shutdown_tx.subscribe())
        .await
        .context("HTTP server start failed")?;

    // 7. Start workers
    info!(
        concurrency = queue_config.concurrency,
        queue = %queue_config.name,
        "Starting workers..."
    );
    let worker_handles: Vec<_> = (0..queue_config.concurrency)
        .map(|_| {
            let worker = Worker::new(
                queue_config.name.clone(),
                job_queue.clone(),
                handlers.clone(),
                retry_policy.clone(),
                time_provider.clone(),
            );
            let shutdown = shutdown_rx.clone();
            tokio::spawn(async move {
                if let Err(e) = worker.run(shutdown).await {
                    error!(error = %e, "Worker failed");
                }
            })
        })
        .collect();

    // 8. Start retention sweeper
    let sweeper = RetentionSweeper::new(
        job_queue.clone(),
        time_provider.clone(),
        settings.retention(),
        settings.retention_interval(),
    );
    let sweeper_handle = tokio::spawn(sweeper.run(shutdown_tx.subscribe()));

    info!(addr = %http.local_addr(), "System ready. Waiting for requests...");
    info!("Press Ctrl+C to shutdown");

    // 9. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 10. Graceful shutdown: stop accepting, then let in-flight jobs finish
    shutdown_tx.shutdown();
    http.stopped().await;
    join_task("retention sweeper", sweeper_handle).await;

    let timeout = settings.shutdown_timeout();
    let workers = worker_handles.into_iter().map(|h| join_task("worker", h));
    if tokio::time::timeout(timeout, futures::future::join_all(workers))
        .await
        .is_err()
    {
        warn!(
            timeout_secs = timeout.as_secs(),
            "Workers did not finish in time, abandoning in-flight jobs"
        );
    }

    info!("Shutdown complete.");
    Ok(())
}

async fn open_queue(
    backend: &QueueBackend,
    time_provider: Arc<dyn TimeProvider>,
) -> Result<Arc<dyn JobQueue>> {
    match backend {
        QueueBackend::Memory => {
            info!("Using in-memory queue (jobs do not survive restarts)");
            Ok(Arc::new(MemoryJobQueue::new(time_provider)))
        }
        QueueBackend::Sqlite { url } => {
            info!(url = %url, "Initializing SQLite queue...");
            let pool = create_pool(url)
                .await
                .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
            run_migrations(&pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;
            Ok(Arc::new(SqliteJobQueue::new(pool, time_provider)))
        }
    }
}

/// Wait for a background task; a panic or cancellation is logged, not propagated
async fn join_task(name: &str, handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            error!(task = name, error = %e, "Background task ended abnormally");
            false
        }
    }
}

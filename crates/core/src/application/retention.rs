// Retention sweeper
// Deletes finished job records so the status table stays bounded

use crate::application::worker::ShutdownToken;
use crate::error::Result;
use crate::port::{JobQueue, TimeProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

/// Retention sweeper
///
/// Runs periodically in the background and purges DONE/FAILED jobs that
/// finished longer than `retention` ago.
pub struct RetentionSweeper {
    job_queue: Arc<dyn JobQueue>,
    time_provider: Arc<dyn TimeProvider>,
    retention: Duration,
    interval: Duration,
}

impl RetentionSweeper {
    /// Create a new retention sweeper
    ///
    /// # Arguments
    /// * `job_queue` - Queue transport holding the job records
    /// * `time_provider` - Time provider
    /// * `retention` - How long finished records are kept
    /// * `interval` - How often to sweep
    pub fn new(
        job_queue: Arc<dyn JobQueue>,
        time_provider: Arc<dyn TimeProvider>,
        retention: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            job_queue,
            time_provider,
            retention,
            interval,
        }
    }

    /// Run sweep loop until shutdown (background task)
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            retention_secs = self.retention.as_secs(),
            "Retention sweeper started"
        );

        let mut tick = interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if let Err(e) = self.sweep_now().await {
                        error!(error = %e, "Retention sweep failed");
                    }
                }
                _ = shutdown.wait() => break,
            }
        }

        info!("Retention sweeper stopped");
    }

    /// Purge now; returns number of records deleted
    pub async fn sweep_now(&self) -> Result<u64> {
        let cutoff = self.time_provider.now_millis() - self.retention.as_millis() as i64;
        let purged = self.job_queue.purge_finished(cutoff).await?;

        if purged > 0 {
            info!(purged = purged, cutoff = cutoff, "Purged finished jobs");
        }
        Ok(purged)
    }
}

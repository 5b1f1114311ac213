// Background Sync Task - the job body run by the queue consumer

use crate::application::worker::constants::DEFAULT_SYNC_DELAY;
use crate::domain::{Job, BACKGROUND_SYNC};
use crate::port::{ExecutionError, JobHandler};
use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

pub const SYNC_STARTED: &str = "Background Sync Started";
pub const SYNC_COMPLETED: &str = "Background Sync Completed";

/// Logs a start event, simulates work for a fixed delay, logs a completion event.
///
/// Produces no result and has no failure path of its own.
pub struct BackgroundSyncTask {
    delay: Duration,
}

impl BackgroundSyncTask {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for BackgroundSyncTask {
    fn default() -> Self {
        Self::new(DEFAULT_SYNC_DELAY)
    }
}

#[async_trait]
impl JobHandler for BackgroundSyncTask {
    fn job_type(&self) -> &str {
        BACKGROUND_SYNC
    }

    async fn handle(&self, job: &Job) -> Result<(), ExecutionError> {
        info!(job_id = %job.id, "{}", SYNC_STARTED);

        // stand-in for real work
        tokio::time::sleep(self.delay).await;

        info!(job_id = %job.id, "{}", SYNC_COMPLETED);
        Ok(())
    }
}

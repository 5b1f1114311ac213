// Crash recovery logic
use crate::domain::JobState;
use crate::port::{JobQueue, TimeProvider};
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::worker::constants::DEFAULT_RECOVERY_WINDOW_MS;

/// Crash recovery service
///
/// On daemon startup, puts back jobs that were RUNNING when the previous
/// process died. Only meaningful for durable transports; an in-memory queue
/// starts empty.
pub struct RecoveryService {
    job_queue: Arc<dyn JobQueue>,
    time_provider: Arc<dyn TimeProvider>,
    recovery_window_ms: i64,
}

impl RecoveryService {
    /// Create a new recovery service
    ///
    /// # Arguments
    /// * `job_queue` - Queue transport
    /// * `time_provider` - Time provider
    /// * `recovery_window_ms` - Optional custom recovery window (default: 5 minutes)
    pub fn new(
        job_queue: Arc<dyn JobQueue>,
        time_provider: Arc<dyn TimeProvider>,
        recovery_window_ms: Option<i64>,
    ) -> Self {
        Self {
            job_queue,
            time_provider,
            recovery_window_ms: recovery_window_ms.unwrap_or(DEFAULT_RECOVERY_WINDOW_MS),
        }
    }

    /// Recover orphaned jobs on daemon startup
    ///
    /// 1. Find all RUNNING jobs with `started_at < now - recovery_window`
    /// 2. Requeue them, available immediately
    /// 3. RUNNING jobs without `started_at` are inconsistent and marked FAILED
    ///
    /// # Returns
    /// Number of jobs recovered
    pub async fn recover_orphaned_jobs(&self) -> crate::error::Result<usize> {
        let now = self.time_provider.now_millis();
        let cutoff = now - self.recovery_window_ms;

        info!(
            cutoff_time = %cutoff,
            recovery_window_ms = %self.recovery_window_ms,
            "Starting orphaned job recovery"
        );

        let running_jobs = self.job_queue.find_by_state(JobState::Running).await?;
        let mut recovered_count = 0;

        for mut job in running_jobs {
            match job.started_at {
                Some(started_at) if started_at < cutoff => {
                    info!(
                        job_id = %job.id,
                        started_at = %started_at,
                        cutoff = %cutoff,
                        "Requeueing orphaned job"
                    );
                    job.requeue(now)?;
                }
                Some(_) => continue,
                None => {
                    warn!(job_id = %job.id, "RUNNING job without started_at, marking as FAILED");
                    job.fail(now, "orphaned without start time");
                }
            }

            self.job_queue.update(&job).await?;
            recovered_count += 1;
        }

        info!(recovered_count = %recovered_count, "Orphaned job recovery complete");
        Ok(recovered_count)
    }
}

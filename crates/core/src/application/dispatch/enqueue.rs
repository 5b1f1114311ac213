// Enqueue Use Case

use crate::domain::{Job, JobId, JobMessage};
use crate::error::Result;
use crate::port::{IdProvider, JobQueue, TimeProvider};
use tracing::info;

/// Enqueue request
#[derive(Debug, Clone)]
pub struct EnqueueRequest {
    pub queue: String,
    pub message: JobMessage,
    /// Attempts allowed before the job is marked FAILED (clamped to >= 1)
    pub max_attempts: i32,
}

/// Execute enqueue use case
///
/// # Arguments
///
/// * `job_queue` - Queue transport
/// * `id_provider` - ID generator (injected for determinism)
/// * `time_provider` - Time provider (injected for determinism)
/// * `req` - Enqueue request
pub async fn execute(
    job_queue: &dyn JobQueue,
    id_provider: &dyn IdProvider,
    time_provider: &dyn TimeProvider,
    req: EnqueueRequest,
) -> Result<JobId> {
    let job_id = id_provider.generate_id();
    let created_at = time_provider.now_millis();

    let mut job = Job::new(job_id.clone(), created_at, req.queue, req.message);
    job.max_attempts = req.max_attempts.max(1);

    job_queue.enqueue(&job).await?;

    info!(
        job_id = %job.id,
        queue = %job.queue,
        job_type = %job.job_type().as_str(),
        "Job enqueued"
    );

    Ok(job_id)
}

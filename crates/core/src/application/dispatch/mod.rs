// Dispatch Service - the queue client handed to the HTTP layer

pub mod enqueue;

pub use enqueue::EnqueueRequest;

use crate::application::worker::constants::DEFAULT_MAX_ATTEMPTS;
use crate::domain::{Job, JobId, JobMessage, JobState};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, JobQueue, TimeProvider};
use std::sync::Arc;

/// Snapshot of a queue's backlog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    pub queued: i64,
    pub running: i64,
}

/// Dispatch Service
///
/// Holds the queue transport explicitly; handlers receive it through shared
/// state instead of reaching for a global dispatcher.
pub struct DispatchService {
    job_queue: Arc<dyn JobQueue>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    queue: String,
    max_attempts: i32,
}

impl DispatchService {
    pub fn new(
        job_queue: Arc<dyn JobQueue>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        queue: impl Into<String>,
    ) -> Self {
        Self {
            job_queue,
            id_provider,
            time_provider,
            queue: queue.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Attempts allowed per dispatched job
    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Enqueue a message on the configured queue
    pub async fn enqueue(&self, message: JobMessage) -> Result<JobId> {
        enqueue::execute(
            self.job_queue.as_ref(),
            self.id_provider.as_ref(),
            self.time_provider.as_ref(),
            EnqueueRequest {
                queue: self.queue.clone(),
                message,
                max_attempts: self.max_attempts,
            },
        )
        .await
    }

    /// Enqueue one background sync job
    pub async fn start_sync(&self) -> Result<JobId> {
        self.enqueue(JobMessage::background_sync()).await
    }

    /// Current status record of a job
    pub async fn job_status(&self, id: &JobId) -> Result<Job> {
        self.job_queue
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))
    }

    pub async fn queue_stats(&self) -> Result<QueueStats> {
        Ok(QueueStats {
            queued: self.job_queue.count_by_state(&self.queue, JobState::Queued).await?,
            running: self.job_queue.count_by_state(&self.queue, JobState::Running).await?,
        })
    }
}

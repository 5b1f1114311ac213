// Job Queue Port (Interface)
//
// The queue transport is an external collaborator: adapters decide durability,
// the core only relies on the contract below.

use crate::domain::{Job, JobId, JobState};
use crate::error::Result;
use async_trait::async_trait;

/// Queue transport with enqueue/consume semantics and a status record per job
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Place a new QUEUED job on its queue
    async fn enqueue(&self, job: &Job) -> Result<()>;

    /// Pop the oldest available job (FIFO by creation time)
    ///
    /// Atomically moves the job to RUNNING and counts an attempt, so two
    /// consumers never receive the same job. Jobs whose `available_at` lies in
    /// the future are skipped.
    async fn pop_next(&self, queue: &str) -> Result<Option<Job>>;

    /// Persist the job's current state (completion, failure, requeue)
    async fn update(&self, job: &Job) -> Result<()>;

    /// Find job by ID
    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>>;

    /// Count jobs by state
    async fn count_by_state(&self, queue: &str, state: JobState) -> Result<i64>;

    /// Find all jobs by state, oldest first (recovery)
    async fn find_by_state(&self, state: JobState) -> Result<Vec<Job>>;

    /// Delete DONE/FAILED jobs finished before `finished_before` (epoch ms)
    async fn purge_finished(&self, finished_before: i64) -> Result<u64>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::Mutex;

    /// Records enqueued jobs; can be switched to reject every call to
    /// simulate an unreachable transport. Never hands jobs to consumers.
    #[derive(Default)]
    pub struct RecordingJobQueue {
        jobs: Mutex<Vec<Job>>,
        unavailable: bool,
    }

    impl RecordingJobQueue {
        pub fn new() -> Self {
            Self::default()
        }

        /// A queue whose every operation fails with `AppError::Queue`
        pub fn unavailable() -> Self {
            Self {
                jobs: Mutex::new(Vec::new()),
                unavailable: true,
            }
        }

        pub fn enqueued(&self) -> Vec<Job> {
            self.jobs.lock().map(|jobs| jobs.clone()).unwrap_or_default()
        }

        fn check(&self) -> Result<std::sync::MutexGuard<'_, Vec<Job>>> {
            if self.unavailable {
                return Err(AppError::Queue("queue transport unavailable".to_string()));
            }
            self.jobs
                .lock()
                .map_err(|_| AppError::Queue("lock poisoned".to_string()))
        }
    }

    #[async_trait]
    impl JobQueue for RecordingJobQueue {
        async fn enqueue(&self, job: &Job) -> Result<()> {
            self.check()?.push(job.clone());
            Ok(())
        }

        async fn pop_next(&self, _queue: &str) -> Result<Option<Job>> {
            self.check()?;
            Ok(None)
        }

        async fn update(&self, job: &Job) -> Result<()> {
            let mut jobs = self.check()?;
            match jobs.iter_mut().find(|j| j.id == job.id) {
                Some(existing) => {
                    *existing = job.clone();
                    Ok(())
                }
                None => Err(AppError::NotFound(format!("Job {} not found", job.id))),
            }
        }

        async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
            Ok(self.check()?.iter().find(|j| &j.id == id).cloned())
        }

        async fn count_by_state(&self, queue: &str, state: JobState) -> Result<i64> {
            let count = self
                .check()?
                .iter()
                .filter(|j| j.queue == queue && j.state == state)
                .count();
            Ok(count as i64)
        }

        async fn find_by_state(&self, state: JobState) -> Result<Vec<Job>> {
            Ok(self
                .check()?
                .iter()
                .filter(|j| j.state == state)
                .cloned()
                .collect())
        }

        async fn purge_finished(&self, finished_before: i64) -> Result<u64> {
            let mut jobs = self.check()?;
            let before = jobs.len();
            jobs.retain(|j| {
                !(j.state.is_finished() && j.finished_at.is_some_and(|t| t < finished_before))
            });
            Ok((before - jobs.len()) as u64)
        }
    }
}

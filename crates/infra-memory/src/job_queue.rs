// In-memory JobQueue Implementation

use async_trait::async_trait;
use bgsync_core::domain::{Job, JobId, JobState};
use bgsync_core::error::{AppError, Result};
use bgsync_core::port::{JobQueue, TimeProvider};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

// (created_at, arrival, id), ordered the way the SQLite transport orders rows
type PendingKey = (i64, u64, JobId);

#[derive(Default)]
struct Inner {
    jobs: HashMap<JobId, Job>,
    // Enqueue sequence number per job, stable across requeues
    arrival: HashMap<JobId, u64>,
    next_arrival: u64,
    pending: BTreeSet<PendingKey>,
}

impl Inner {
    fn pending_key(&self, job: &Job) -> Option<PendingKey> {
        self.arrival
            .get(&job.id)
            .map(|arrival| (job.created_at, *arrival, job.id.clone()))
    }
}

/// Process-local queue transport
///
/// Jobs live in a map keyed by id, with an ordered set of QUEUED ids in front
/// of it. All operations take a single lock, so popping is atomic across
/// workers. Nothing survives a restart.
pub struct MemoryJobQueue {
    inner: Mutex<Inner>,
    time_provider: Arc<dyn TimeProvider>,
}

impl MemoryJobQueue {
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            time_provider,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| AppError::Queue("Lock poisoned".to_string()))
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, job: &Job) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.jobs.contains_key(&job.id) {
            return Err(AppError::Queue(format!("Duplicate job id: {}", job.id)));
        }
        let arrival = inner.next_arrival;
        inner.next_arrival += 1;
        inner.arrival.insert(job.id.clone(), arrival);
        if job.state == JobState::Queued {
            inner.pending.insert((job.created_at, arrival, job.id.clone()));
        }
        inner.jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn pop_next(&self, queue: &str) -> Result<Option<Job>> {
        let now = self.time_provider.now_millis();
        let mut guard = self.lock()?;
        let inner = &mut *guard;

        let key = inner
            .pending
            .iter()
            .find(|(_, _, id)| {
                inner
                    .jobs
                    .get(id)
                    .is_some_and(|j| j.queue == queue && j.available_at <= now)
            })
            .cloned();
        let Some(key) = key else {
            return Ok(None);
        };
        inner.pending.remove(&key);
        let (_, _, id) = key;

        let job = inner
            .jobs
            .get_mut(&id)
            .ok_or_else(|| AppError::Internal(format!("Pending job {} has no record", id)))?;
        job.start(now)?;

        debug!(job_id = %job.id, queue = %queue, "Popped job");
        Ok(Some(job.clone()))
    }

    async fn update(&self, job: &Job) -> Result<()> {
        let mut inner = self.lock()?;
        let (Some(previous), Some(key)) = (inner.jobs.get(&job.id), inner.pending_key(job)) else {
            return Err(AppError::NotFound(format!("Job {} not found", job.id)));
        };

        // A requeued job keeps its original place in line
        let previous_key = (previous.created_at, key.1, job.id.clone());
        inner.pending.remove(&previous_key);
        if job.state == JobState::Queued {
            inner.pending.insert(key);
        }

        inner.jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
        Ok(self.lock()?.jobs.get(id).cloned())
    }

    async fn count_by_state(&self, queue: &str, state: JobState) -> Result<i64> {
        let count = self
            .lock()?
            .jobs
            .values()
            .filter(|j| j.queue == queue && j.state == state)
            .count();
        Ok(count as i64)
    }

    async fn find_by_state(&self, state: JobState) -> Result<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .lock()?
            .jobs
            .values()
            .filter(|j| j.state == state)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(jobs)
    }

    async fn purge_finished(&self, finished_before: i64) -> Result<u64> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let before = inner.jobs.len();
        inner.jobs.retain(|_, j| {
            !(j.state.is_finished() && j.finished_at.is_some_and(|t| t < finished_before))
        });
        let jobs = &inner.jobs;
        inner.arrival.retain(|id, _| jobs.contains_key(id));
        Ok((before - inner.jobs.len()) as u64)
    }
}

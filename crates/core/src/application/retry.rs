// Retry logic
use crate::application::worker::constants::DEFAULT_MAX_RETRY_DELAY_MS;
use crate::domain::Job;
use crate::port::TimeProvider;
use std::sync::Arc;
use tracing::{info, warn};

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the job (with backoff delay in ms)
    Retry(i64),
    /// Do not retry, job has failed permanently
    Failed,
}

/// Retry policy
///
/// Retries are a configuration point: with the default of one attempt per job
/// every failure is final. When a job allows more attempts, the delay grows as
/// `base_delay * backoff_factor ^ (attempts - 1)`, capped at `max_delay_ms`.
pub struct RetryPolicy {
    time_provider: Arc<dyn TimeProvider>,
    base_delay_ms: i64,
    max_delay_ms: i64,
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// # Arguments
    /// * `time_provider` - Time provider for current time
    /// * `base_delay_ms` - Base delay in milliseconds (default: 1000)
    pub fn new(time_provider: Arc<dyn TimeProvider>, base_delay_ms: i64) -> Self {
        Self {
            time_provider,
            base_delay_ms,
            max_delay_ms: DEFAULT_MAX_RETRY_DELAY_MS,
        }
    }

    /// Override the cap on a single retry delay
    pub fn with_max_delay_ms(mut self, max_delay_ms: i64) -> Self {
        self.max_delay_ms = max_delay_ms.max(0);
        self
    }

    /// Determine if a job should be retried after a failed attempt
    ///
    /// `job.attempts` already counts the attempt that just failed.
    ///
    /// Returns:
    /// - `RetryDecision::Retry(delay_ms)` if the job has attempts left
    /// - `RetryDecision::Failed` if max attempts reached
    pub fn should_retry(&self, job: &Job) -> RetryDecision {
        if !job.has_attempts_left() {
            if job.max_attempts > 1 {
                warn!(
                    job_id = %job.id,
                    attempts = %job.attempts,
                    max_attempts = %job.max_attempts,
                    "Max retry attempts reached"
                );
            }
            return RetryDecision::Failed;
        }

        let exponent = (job.attempts - 1).max(0);
        let base_delay_ms = self.base_delay_ms as f64 * job.backoff_factor.powi(exponent);

        // ±10% jitter, seeded by the job id so a given job always gets the same delay
        let jitter_seed = job.id.chars().map(|c| c as u32).sum::<u32>();
        let jitter_factor = 0.9 + ((jitter_seed % 21) as f64 / 100.0); // 0.9 to 1.1

        let delay_ms = (base_delay_ms * jitter_factor).min(self.max_delay_ms as f64) as i64;

        info!(
            job_id = %job.id,
            attempt = %job.attempts,
            max_attempts = %job.max_attempts,
            delay_ms = %delay_ms,
            "Scheduling retry"
        );

        RetryDecision::Retry(delay_ms)
    }

    /// Prepare a job for retry: back to QUEUED, held back by `delay_ms`
    pub fn prepare_for_retry(&self, job: &mut Job, delay_ms: i64) -> crate::error::Result<()> {
        let available_at = self.time_provider.now_millis().saturating_add(delay_ms);
        job.requeue(available_at)?;

        info!(
            job_id = %job.id,
            attempt = %job.attempts,
            available_at = %available_at,
            "Job prepared for retry"
        );
        Ok(())
    }
}

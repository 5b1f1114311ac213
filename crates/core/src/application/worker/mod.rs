// Worker - Job consumption loop

pub mod constants;
mod registry;
mod shutdown;

use constants::*;
pub use registry::HandlerRegistry;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::retry::{RetryDecision, RetryPolicy};
use crate::domain::Job;
use crate::error::Result;
use crate::port::{ExecutionError, JobQueue, TimeProvider};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{error, info, info_span, warn, Instrument};

/// Worker consumes jobs from one queue and runs their handlers
pub struct Worker {
    queue: String,
    job_queue: Arc<dyn JobQueue>,
    handlers: Arc<HandlerRegistry>,
    retry_policy: Arc<RetryPolicy>,
    time_provider: Arc<dyn TimeProvider>,
}

impl Worker {
    pub fn new(
        queue: impl Into<String>,
        job_queue: Arc<dyn JobQueue>,
        handlers: Arc<HandlerRegistry>,
        retry_policy: Arc<RetryPolicy>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            queue: queue.into(),
            job_queue,
            handlers,
            retry_policy,
            time_provider,
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Run worker loop with graceful shutdown support
    ///
    /// Shutdown is observed between jobs; a job already executing runs to the end.
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!(queue = %self.queue, handlers = ?self.handlers.job_types(), "Worker started");
        loop {
            if shutdown.is_shutdown() {
                info!(queue = %self.queue, "Worker shutting down");
                break;
            }
            match self.process_next_job().await {
                Ok(true) => {}
                Ok(false) => {
                    // No job available, sleep briefly (or wait for shutdown)
                    tokio::select! {
                        _ = sleep(IDLE_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => {
                            info!(queue = %self.queue, "Worker interrupted during idle");
                            break;
                        }
                    }
                }
                Err(e) => {
                    error!(queue = %self.queue, error = %e, "Worker error");
                    tokio::select! {
                        _ = sleep(ERROR_RECOVERY_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => {
                            info!(queue = %self.queue, "Worker interrupted during error recovery");
                            break;
                        }
                    }
                }
            }
        }
        info!(queue = %self.queue, "Worker stopped");
        Ok(())
    }

    /// Process next job from queue (returns true if a job was taken)
    pub async fn process_next_job(&self) -> Result<bool> {
        // Pop next job (already atomically set to RUNNING by the transport)
        let job = match self.job_queue.pop_next(&self.queue).await? {
            Some(j) => j,
            None => return Ok(false),
        };

        info!(
            job_id = %job.id,
            job_type = %job.job_type().as_str(),
            attempt = %job.attempts,
            "Processing job"
        );

        let outcome = self.execute(&job).await;
        self.settle(job, outcome).await?;
        Ok(true)
    }

    /// Run the job's handler in its own task so a panic only fails this job
    async fn execute(&self, job: &Job) -> std::result::Result<(), ExecutionError> {
        let handler = self
            .handlers
            .get(job.job_type().as_str())
            .ok_or_else(|| ExecutionError::NoHandler(job.job_type().as_str().to_string()))?;

        let span = info_span!("job", job_id = %job.id, job_type = %job.job_type().as_str());
        let job_for_exec = job.clone();
        let handle = tokio::task::spawn(
            async move { handler.handle(&job_for_exec).await }.instrument(span),
        );

        match handle.await {
            Ok(result) => result,
            Err(join_err) if join_err.is_panic() => {
                Err(ExecutionError::Panicked(panic_message(join_err.into_panic())))
            }
            Err(join_err) => Err(ExecutionError::Failed(format!("cancelled: {}", join_err))),
        }
    }

    /// Record the outcome on the job's status record
    async fn settle(
        &self,
        mut job: Job,
        outcome: std::result::Result<(), ExecutionError>,
    ) -> Result<()> {
        let now = self.time_provider.now_millis();

        match outcome {
            Ok(()) => {
                job.complete(now)?;
                info!(job_id = %job.id, "Job completed");
            }
            Err(ExecutionError::NoHandler(job_type)) => {
                error!(job_id = %job.id, job_type = %job_type, "No handler registered, failing job");
                job.fail(now, ExecutionError::NoHandler(job_type).to_string());
            }
            Err(e) => match self.retry_policy.should_retry(&job) {
                RetryDecision::Retry(delay_ms) => {
                    warn!(
                        job_id = %job.id,
                        attempt = %job.attempts,
                        delay_ms = %delay_ms,
                        error = %e,
                        "Retrying job after failure"
                    );
                    job.last_error = Some(e.to_string());
                    self.retry_policy.prepare_for_retry(&mut job, delay_ms)?;
                }
                RetryDecision::Failed => {
                    error!(job_id = %job.id, attempts = %job.attempts, error = %e, "Job failed");
                    job.fail(now, e.to_string());
                }
            },
        }

        self.job_queue.update(&job).await
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

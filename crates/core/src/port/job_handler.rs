// Job Handler Port
// Abstraction for the code a queue consumer runs when a message is dequeued

use crate::domain::Job;
use async_trait::async_trait;
use thiserror::Error;

/// Execution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Job failed: {0}")]
    Failed(String),

    #[error("No handler registered for job type: {0}")]
    NoHandler(String),

    #[error("Job panicked: {0}")]
    Panicked(String),
}

/// Job Handler trait
///
/// Implementations:
/// - BackgroundSyncTask: log, simulated work, log
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Job type this handler consumes (matches `JobMessage::job_type`)
    fn job_type(&self) -> &str;

    /// Run the job to completion
    ///
    /// # Errors
    /// - ExecutionError::Failed if the job did not finish its work
    async fn handle(&self, job: &Job) -> Result<(), ExecutionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Mock handler behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Always succeed
        Success,
        /// Always fail with message
        Fail(String),
        /// Panic with message (for panic isolation testing)
        Panic(String),
        /// Fail the first N calls, then succeed
        FailTimes(usize, String),
        /// Sleep, then succeed
        Delay(Duration),
    }

    /// Mock Job Handler for testing
    pub struct MockJobHandler {
        job_type: String,
        behavior: MockBehavior,
        call_count: AtomicUsize,
    }

    impl MockJobHandler {
        pub fn new(job_type: impl Into<String>, behavior: MockBehavior) -> Self {
            Self {
                job_type: job_type.into(),
                behavior,
                call_count: AtomicUsize::new(0),
            }
        }

        pub fn new_success(job_type: impl Into<String>) -> Self {
            Self::new(job_type, MockBehavior::Success)
        }

        pub fn new_fail(job_type: impl Into<String>, message: impl Into<String>) -> Self {
            Self::new(job_type, MockBehavior::Fail(message.into()))
        }

        pub fn new_panic_inducing(job_type: impl Into<String>, message: impl Into<String>) -> Self {
            Self::new(job_type, MockBehavior::Panic(message.into()))
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl JobHandler for MockJobHandler {
        fn job_type(&self) -> &str {
            &self.job_type
        }

        async fn handle(&self, _job: &Job) -> Result<(), ExecutionError> {
            let call = self.call_count.fetch_add(1, Ordering::SeqCst);

            match &self.behavior {
                MockBehavior::Success => Ok(()),
                MockBehavior::Fail(msg) => Err(ExecutionError::Failed(msg.clone())),
                MockBehavior::Panic(msg) => {
                    panic!("{}", msg); // Actually panic for panic isolation testing
                }
                MockBehavior::FailTimes(times, msg) => {
                    if call < *times {
                        Err(ExecutionError::Failed(msg.clone()))
                    } else {
                        Ok(())
                    }
                }
                MockBehavior::Delay(duration) => {
                    tokio::time::sleep(*duration).await;
                    Ok(())
                }
            }
        }
    }
}

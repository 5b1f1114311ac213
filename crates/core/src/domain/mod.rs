// Domain Layer - Pure business logic and entities

pub mod error;
pub mod job;
pub mod queue;

// Re-exports
pub use error::DomainError;
pub use job::{
    Job, JobId, JobMessage, JobPayload, JobState, JobType, QueueId, BACKGROUND_SYNC,
};
pub use queue::{QueueConfig, DEFAULT_QUEUE};

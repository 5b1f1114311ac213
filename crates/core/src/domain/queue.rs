// Queue Domain Model

use crate::domain::job::QueueId;

/// Name of the queue used when none is configured
pub const DEFAULT_QUEUE: &str = "default";

/// Queue configuration: which queue to consume and how many worker loops
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub name: QueueId,
    pub concurrency: usize,
}

impl QueueConfig {
    pub fn new(name: impl Into<String>, concurrency: usize) -> Self {
        Self {
            name: name.into(),
            concurrency: concurrency.max(1),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE, 1)
    }
}

//! HTTP Request/Response Types

use bgsync_core::application::QueueStats;
use bgsync_core::domain::Job;
use serde::Serialize;

/// Body of the dispatch acknowledgment
pub const SYNC_STARTED_STATUS: &str = "Background Sync Started";

/// Header carrying the id of the job a dispatch created
pub const JOB_ID_HEADER: &str = "x-job-id";

/// GET /start-sync
#[derive(Debug, Clone, Serialize)]
pub struct StartSyncResponse {
    pub status: &'static str,
}

impl StartSyncResponse {
    pub fn started() -> Self {
        Self {
            status: SYNC_STARTED_STATUS,
        }
    }
}

/// GET /jobs/{id}
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusResponse {
    pub id: String,
    pub queue: String,
    pub job_type: String,
    pub state: String,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub attempts: i32,
    pub max_attempts: i32,
    pub last_error: Option<String>,
}

impl From<Job> for JobStatusResponse {
    fn from(job: Job) -> Self {
        Self {
            job_type: job.job_type().as_str().to_string(),
            state: job.state.to_string(),
            id: job.id,
            queue: job.queue,
            created_at: job.created_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
            attempts: job.attempts,
            max_attempts: job.max_attempts,
            last_error: job.last_error,
        }
    }
}

/// GET /health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub queue: QueueBacklog,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueBacklog {
    pub name: String,
    pub queued: i64,
    pub running: i64,
}

impl QueueBacklog {
    pub fn new(name: impl Into<String>, stats: QueueStats) -> Self {
        Self {
            name: name.into(),
            queued: stats.queued,
            running: stats.running,
        }
    }
}

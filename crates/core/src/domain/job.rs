// Job Domain Model

use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Job ID (UUID v4, assigned at enqueue)
pub type JobId = String;

/// Queue identifier
pub type QueueId = String;

/// Job type tag of the background sync task
pub const BACKGROUND_SYNC: &str = "background_sync";

/// Job State
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Queued,
    Running,
    Done,
    Failed,
}

impl JobState {
    /// Finished jobs are never popped again and may be purged.
    pub fn is_finished(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Queued => write!(f, "QUEUED"),
            JobState::Running => write!(f, "RUNNING"),
            JobState::Done => write!(f, "DONE"),
            JobState::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for JobState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "QUEUED" => Ok(JobState::Queued),
            "RUNNING" => Ok(JobState::Running),
            "DONE" => Ok(JobState::Done),
            "FAILED" => Ok(JobState::Failed),
            other => Err(DomainError::UnknownJobState(other.to_string())),
        }
    }
}

/// Job Type (routes a message to its handler)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobType(String);

impl JobType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn background_sync() -> Self {
        Self::new(BACKGROUND_SYNC)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Job Payload (JSON serializable, `{}` when the job takes no input)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobPayload(serde_json::Value);

impl JobPayload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn empty() -> Self {
        Self(serde_json::Value::Object(serde_json::Map::new()))
    }

    pub fn to_json_string(&self) -> String {
        self.0.to_string()
    }

    pub fn from_json_str(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw).map(Self)
    }
}

impl Default for JobPayload {
    fn default() -> Self {
        Self::empty()
    }
}

/// Job Message: the unit of work placed on the queue.
///
/// `encode`/`decode` define the logical message schema as JSON:
/// `{"job_type": "background_sync", "payload": {}}`. A missing `payload`
/// decodes as `{}` and unknown fields are ignored.
///
/// Transports are not required to store the encoded form. The memory queue
/// keeps the struct as is, and the SQLite queue stores `job_type` and the
/// payload JSON as separate columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMessage {
    pub job_type: JobType,
    #[serde(default)]
    pub payload: JobPayload,
}

impl JobMessage {
    pub fn new(job_type: JobType, payload: JobPayload) -> Self {
        Self { job_type, payload }
    }

    /// The "run the sync task" message. It carries no fields.
    pub fn background_sync() -> Self {
        Self::new(JobType::background_sync(), JobPayload::empty())
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn decode(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

/// Job record: the queue's envelope around a [`JobMessage`].
///
/// Doubles as the job-status record: the worker updates it on start and
/// completion, and the HTTP layer reads it back by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub queue: QueueId,
    pub message: JobMessage,
    pub state: JobState,

    pub created_at: i64, // epoch ms
    pub available_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,

    // Retry bookkeeping
    pub attempts: i32,
    pub max_attempts: i32,
    pub backoff_factor: f64,
    pub last_error: Option<String>,
}

impl Job {
    /// Create a test job with deterministic ID and timestamp.
    ///
    /// Uses a simple counter for deterministic test IDs (test-1, test-2, ...).
    /// Timestamps start at 1000 and increment by 1000.
    ///
    /// **Note**: production code injects ID and time via providers.
    pub fn new_test(queue: impl Into<String>, message: JobMessage) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static TEST_COUNTER: AtomicU64 = AtomicU64::new(1);

        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let id = format!("test-{}", counter);
        let created_at = (counter * 1000) as i64;

        Self::new(id, created_at, queue, message)
    }

    /// Create a new QUEUED job
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    /// * `queue` - Queue name
    /// * `message` - The message to deliver
    pub fn new(
        id: impl Into<String>,
        created_at: i64,
        queue: impl Into<String>,
        message: JobMessage,
    ) -> Self {
        Self {
            id: id.into(),
            queue: queue.into(),
            message,
            state: JobState::Queued,
            created_at,
            available_at: created_at,
            started_at: None,
            finished_at: None,
            attempts: 0,
            max_attempts: 1,
            backoff_factor: 2.0,
            last_error: None,
        }
    }

    pub fn job_type(&self) -> &JobType {
        &self.message.job_type
    }

    /// Transition to Running state; counts one attempt
    pub fn start(&mut self, now_millis: i64) -> Result<()> {
        if self.state != JobState::Queued {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: JobState::Running.to_string(),
            });
        }
        self.state = JobState::Running;
        self.started_at = Some(now_millis);
        self.attempts += 1;
        Ok(())
    }

    /// Transition to Done state
    pub fn complete(&mut self, now_millis: i64) -> Result<()> {
        if self.state != JobState::Running {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: JobState::Done.to_string(),
            });
        }
        self.state = JobState::Done;
        self.finished_at = Some(now_millis);
        Ok(())
    }

    /// Mark as Failed, keeping the failure reason
    pub fn fail(&mut self, now_millis: i64, error: impl Into<String>) {
        self.state = JobState::Failed;
        self.finished_at = Some(now_millis);
        self.last_error = Some(error.into());
    }

    /// Put a running job back on the queue, held until `available_at`
    pub fn requeue(&mut self, available_at: i64) -> Result<()> {
        if self.state != JobState::Running {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: JobState::Queued.to_string(),
            });
        }
        self.state = JobState::Queued;
        self.started_at = None;
        self.available_at = available_at;
        Ok(())
    }

    /// Whether another attempt is allowed after the current one failed
    pub fn has_attempts_left(&self) -> bool {
        self.attempts < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_background_sync_message_wire_format() {
        let encoded = JobMessage::background_sync().encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value, json!({"job_type": "background_sync", "payload": {}}));
    }

    #[test]
    fn test_decode_tolerates_missing_payload_and_unknown_fields() {
        let msg = JobMessage::decode(r#"{"job_type":"background_sync","trace":"abc"}"#).unwrap();
        assert_eq!(msg, JobMessage::background_sync());
    }

    #[test]
    fn test_decode_rejects_missing_job_type() {
        assert!(JobMessage::decode(r#"{"payload":{}}"#).is_err());
    }

    #[test]
    fn test_lifecycle_queued_running_done() {
        let mut job = Job::new("j1", 1_000, "default", JobMessage::background_sync());
        assert_eq!(job.state, JobState::Queued);
        assert_eq!(job.available_at, 1_000);

        job.start(2_000).unwrap();
        assert_eq!(job.state, JobState::Running);
        assert_eq!(job.started_at, Some(2_000));
        assert_eq!(job.attempts, 1);

        job.complete(3_000).unwrap();
        assert_eq!(job.state, JobState::Done);
        assert_eq!(job.finished_at, Some(3_000));
        assert!(job.state.is_finished());
    }

    #[test]
    fn test_invalid_transitions() {
        let mut job = Job::new("j2", 1_000, "default", JobMessage::background_sync());
        assert_eq!(
            job.complete(2_000),
            Err(DomainError::InvalidStateTransition {
                from: "QUEUED".to_string(),
                to: "DONE".to_string(),
            })
        );
        assert!(job.requeue(2_000).is_err());

        job.start(2_000).unwrap();
        assert!(job.start(2_500).is_err());
    }

    #[test]
    fn test_fail_then_requeue_is_rejected() {
        let mut job = Job::new("j3", 1_000, "default", JobMessage::background_sync());
        job.start(1_500).unwrap();
        job.fail(2_000, "boom");
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.last_error.as_deref(), Some("boom"));
        assert!(job.requeue(3_000).is_err());
    }

    #[test]
    fn test_requeue_holds_job_until_available_at() {
        let mut job = Job::new("j4", 1_000, "default", JobMessage::background_sync());
        job.max_attempts = 2;
        job.start(1_100).unwrap();
        assert!(job.has_attempts_left());

        job.requeue(5_000).unwrap();
        assert_eq!(job.state, JobState::Queued);
        assert_eq!(job.started_at, None);
        assert_eq!(job.available_at, 5_000);

        job.start(5_000).unwrap();
        assert_eq!(job.attempts, 2);
        assert!(!job.has_attempts_left());
    }

    #[test]
    fn test_state_string_round_trip() {
        for state in [JobState::Queued, JobState::Running, JobState::Done, JobState::Failed] {
            assert_eq!(state.to_string().parse::<JobState>().unwrap(), state);
        }
        assert_eq!(
            "PAUSED".parse::<JobState>(),
            Err(DomainError::UnknownJobState("PAUSED".to_string()))
        );
    }
}

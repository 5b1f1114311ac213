// SQLite JobQueue Implementation

use async_trait::async_trait;
use bgsync_core::domain::{Job, JobId, JobMessage, JobPayload, JobState, JobType};
use bgsync_core::error::{AppError, Result};
use bgsync_core::port::{JobQueue, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::debug;

// Helper to convert sqlx::Error to AppError with structured information
fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            // SQLite error codes: https://www.sqlite.org/rescode.html
            match db_err.code().as_deref() {
                Some("2067") | Some("1555") => AppError::Queue(format!(
                    "Unique constraint violation: {}",
                    db_err.message()
                )),
                Some("5") => AppError::Queue(format!(
                    "Database locked (SQLITE_BUSY): {}",
                    db_err.message()
                )),
                Some("13") => AppError::Queue(format!("Database full: {}", db_err.message())),
                Some(code) => {
                    AppError::Queue(format!("Database error [{}]: {}", code, db_err.message()))
                }
                None => AppError::Queue(format!("Database error: {}", db_err.message())),
            }
        }
        sqlx::Error::RowNotFound => AppError::Queue("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => AppError::Queue(format!("Column not found: {}", col)),
        // Connection, pool, protocol errors
        _ => AppError::Queue(err.to_string()),
    }
}

/// Durable queue transport backed by a single `jobs` table
///
/// Every job row is also its status record. `pop_next` claims a row with a
/// single `UPDATE ... RETURNING`, which SQLite executes atomically, so
/// concurrent workers (even in separate processes) never claim the same job.
pub struct SqliteJobQueue {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteJobQueue {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    async fn enqueue(&self, job: &Job) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, queue, job_type, payload, state,
                created_at, available_at, started_at, finished_at,
                attempts, max_attempts, backoff_factor, last_error
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.queue)
        .bind(job.job_type().as_str())
        .bind(job.message.payload.to_json_string())
        .bind(job.state.to_string())
        .bind(job.created_at)
        .bind(job.available_at)
        .bind(job.started_at)
        .bind(job.finished_at)
        .bind(job.attempts)
        .bind(job.max_attempts)
        .bind(job.backoff_factor)
        .bind(&job.last_error)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn pop_next(&self, queue: &str) -> Result<Option<Job>> {
        let now = self.time_provider.now_millis();

        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs
            SET state = ?, started_at = ?, attempts = attempts + 1
            WHERE id = (
                SELECT id FROM jobs
                WHERE queue = ? AND state = ? AND available_at <= ?
                ORDER BY created_at ASC, rowid ASC
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(JobState::Running.to_string())
        .bind(now)
        .bind(queue)
        .bind(JobState::Queued.to_string())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let job = row.map(JobRow::into_job).transpose()?;
        if let Some(job) = &job {
            debug!(job_id = %job.id, queue = %queue, "Popped job");
        }
        Ok(job)
    }

    async fn update(&self, job: &Job) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = ?, available_at = ?, started_at = ?, finished_at = ?,
                attempts = ?, last_error = ?
            WHERE id = ?
            "#,
        )
        .bind(job.state.to_string())
        .bind(job.available_at)
        .bind(job.started_at)
        .bind(job.finished_at)
        .bind(job.attempts)
        .bind(&job.last_error)
        .bind(&job.id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Job {} not found", job.id)));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn count_by_state(&self, queue: &str, state: JobState) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE queue = ? AND state = ?")
                .bind(queue)
                .bind(state.to_string())
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        Ok(count)
    }

    async fn find_by_state(&self, state: JobState) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM jobs
            WHERE state = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(state.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn purge_finished(&self, finished_before: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE state IN (?, ?) AND finished_at IS NOT NULL AND finished_at < ?
            "#,
        )
        .bind(JobState::Done.to_string())
        .bind(JobState::Failed.to_string())
        .bind(finished_before)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    queue: String,
    job_type: String,
    payload: String,
    state: String,
    created_at: i64,
    available_at: i64,
    started_at: Option<i64>,
    finished_at: Option<i64>,
    attempts: i32,
    max_attempts: i32,
    backoff_factor: f64,
    last_error: Option<String>,
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        let state: JobState = self.state.parse()?;
        // job_type has its own column; only the payload is stored as JSON text
        let payload = JobPayload::from_json_str(&self.payload)?;

        Ok(Job {
            id: self.id,
            queue: self.queue,
            message: JobMessage::new(JobType::new(self.job_type), payload),
            state,
            created_at: self.created_at,
            available_at: self.available_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            backoff_factor: self.backoff_factor,
            last_error: self.last_error,
        })
    }
}

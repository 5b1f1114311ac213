//! Shared fixtures: in-process service wiring and a log-capturing subscriber.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use bgsync_api_http::{build_router, HttpServerConfig, HttpState};
use bgsync_core::application::retry::RetryPolicy;
use bgsync_core::application::{DispatchService, HandlerRegistry, Worker};
use bgsync_core::domain::{JobId, JobState};
use bgsync_core::port::id_provider::UuidProvider;
use bgsync_core::port::{JobQueue, TimeProvider};
use http_body_util::BodyExt;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tower::ServiceExt;
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

pub const QUEUE: &str = "default";

// ---------------------------------------------------------------------------
// Log capture
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub message: String,
    pub job_id: Option<String>,
    pub at: Instant,
}

/// Records every event's message and `job_id` field in arrival order
#[derive(Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl LogCapture {
    /// Install as the thread's default subscriber.
    ///
    /// Only sees events emitted on the current thread, so tests using it run
    /// on the current-thread runtime.
    pub fn install() -> (Self, DefaultGuard) {
        let capture = Self::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Events carrying `job_id`, in order
    pub fn for_job(&self, job_id: &str) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.job_id.as_deref() == Some(job_id))
            .collect()
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    job_id: Option<String>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = Some(value.to_string()),
            "job_id" => self.job_id = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        match field.name() {
            "message" => self.message = Some(format!("{:?}", value)),
            "job_id" => self.job_id = Some(format!("{:?}", value)),
            _ => {}
        }
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        if let Some(message) = visitor.message {
            self.events.lock().unwrap().push(CapturedEvent {
                message,
                job_id: visitor.job_id,
                at: Instant::now(),
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Service wiring
// ---------------------------------------------------------------------------

pub fn dispatch(
    job_queue: Arc<dyn JobQueue>,
    time_provider: Arc<dyn TimeProvider>,
    max_attempts: i32,
) -> Arc<DispatchService> {
    Arc::new(
        DispatchService::new(job_queue, Arc::new(UuidProvider), time_provider, QUEUE)
            .with_max_attempts(max_attempts),
    )
}

pub fn app(dispatch: Arc<DispatchService>) -> Router {
    build_router(HttpState::new(dispatch), &HttpServerConfig::default())
}

pub fn worker(
    job_queue: Arc<dyn JobQueue>,
    time_provider: Arc<dyn TimeProvider>,
    handlers: HandlerRegistry,
    retry_base_delay_ms: i64,
) -> Worker {
    let retry_policy = Arc::new(RetryPolicy::new(time_provider.clone(), retry_base_delay_ms));
    Worker::new(QUEUE, job_queue, Arc::new(handlers), retry_policy, time_provider)
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn job_id_of(response: &Response<Body>) -> JobId {
    response.headers()["x-job-id"].to_str().unwrap().to_string()
}

// ---------------------------------------------------------------------------
// Polling
// ---------------------------------------------------------------------------

/// Wait until `count` jobs of the queue sit in `state`
pub async fn wait_for_state_count(job_queue: &dyn JobQueue, state: JobState, count: i64) {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let current = job_queue.count_by_state(QUEUE, state).await.unwrap();
        if current == count {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "timed out waiting for {count} {state} jobs (have {current})"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

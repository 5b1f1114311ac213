//! Worker behavior when a job fails: retry policy, panic isolation, missing handlers.

mod common;

use bgsync_core::application::{BackgroundSyncTask, DispatchService, HandlerRegistry};
use bgsync_core::domain::{JobMessage, JobPayload, JobState, JobType};
use bgsync_core::port::job_handler::mocks::{MockBehavior, MockJobHandler};
use bgsync_core::port::time_provider::ManualTimeProvider;
use bgsync_core::port::{JobQueue, TimeProvider};
use bgsync_infra_memory::MemoryJobQueue;
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    clock: Arc<ManualTimeProvider>,
    job_queue: Arc<dyn JobQueue>,
}

impl Fixture {
    fn new() -> Self {
        let clock = Arc::new(ManualTimeProvider::new(1_000_000));
        let job_queue: Arc<dyn JobQueue> = Arc::new(MemoryJobQueue::new(clock.clone()));
        Self { clock, job_queue }
    }

    fn time_provider(&self) -> Arc<dyn TimeProvider> {
        self.clock.clone()
    }

    fn dispatch(&self, max_attempts: i32) -> Arc<DispatchService> {
        common::dispatch(self.job_queue.clone(), self.time_provider(), max_attempts)
    }
}

fn message(job_type: &str) -> JobMessage {
    JobMessage::new(JobType::new(job_type), JobPayload::empty())
}

#[tokio::test]
async fn failing_job_without_retries_ends_failed() {
    let fx = Fixture::new();
    let handler = Arc::new(MockJobHandler::new_fail("flaky", "upstream timed out"));
    let worker = common::worker(
        fx.job_queue.clone(),
        fx.time_provider(),
        HandlerRegistry::new().with(handler.clone()),
        1000,
    );

    let job_id = fx.dispatch(1).enqueue(message("flaky")).await.unwrap();
    assert!(worker.process_next_job().await.unwrap());

    let job = fx.job_queue.find_by_id(&job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.attempts, 1);
    assert_eq!(job.last_error.as_deref(), Some("Job failed: upstream timed out"));
    assert_eq!(handler.call_count(), 1);

    // Not redelivered
    assert!(!worker.process_next_job().await.unwrap());
}

#[tokio::test]
async fn failing_job_is_retried_until_attempts_run_out() {
    let fx = Fixture::new();
    let handler = Arc::new(MockJobHandler::new_fail("flaky", "still broken"));
    let worker = common::worker(
        fx.job_queue.clone(),
        fx.time_provider(),
        HandlerRegistry::new().with(handler.clone()),
        1000,
    );

    let job_id = fx.dispatch(3).enqueue(message("flaky")).await.unwrap();

    assert!(worker.process_next_job().await.unwrap());
    let job = fx.job_queue.find_by_id(&job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Queued);
    assert_eq!(job.attempts, 1);
    assert!(job.available_at > fx.clock.now_millis());
    assert_eq!(job.last_error.as_deref(), Some("Job failed: still broken"));

    // Held back by the backoff until the clock moves
    assert!(!worker.process_next_job().await.unwrap());

    for _ in 0..2 {
        fx.clock.advance(60_000);
        assert!(worker.process_next_job().await.unwrap());
    }

    let job = fx.job_queue.find_by_id(&job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.attempts, 3);
    assert_eq!(handler.call_count(), 3);
}

#[tokio::test]
async fn retried_job_can_succeed() {
    let fx = Fixture::new();
    let handler = Arc::new(MockJobHandler::new(
        "flaky",
        MockBehavior::FailTimes(1, "first try fails".to_string()),
    ));
    let worker = common::worker(
        fx.job_queue.clone(),
        fx.time_provider(),
        HandlerRegistry::new().with(handler.clone()),
        0,
    );

    let job_id = fx.dispatch(2).enqueue(message("flaky")).await.unwrap();
    assert!(worker.process_next_job().await.unwrap());
    assert!(worker.process_next_job().await.unwrap());

    let job = fx.job_queue.find_by_id(&job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Done);
    assert_eq!(job.attempts, 2);
}

#[tokio::test]
async fn panicking_job_fails_alone() {
    let fx = Fixture::new();
    let handlers = HandlerRegistry::new()
        .with(Arc::new(MockJobHandler::new_panic_inducing("explode", "kaboom")))
        .with(Arc::new(BackgroundSyncTask::new(Duration::ZERO)));
    let worker = common::worker(fx.job_queue.clone(), fx.time_provider(), handlers, 0);
    let dispatch = fx.dispatch(1);

    let bad = dispatch.enqueue(message("explode")).await.unwrap();
    let good = dispatch.start_sync().await.unwrap();

    assert!(worker.process_next_job().await.unwrap());
    assert!(worker.process_next_job().await.unwrap());

    let bad = fx.job_queue.find_by_id(&bad).await.unwrap().unwrap();
    assert_eq!(bad.state, JobState::Failed);
    assert!(bad.last_error.unwrap().contains("kaboom"));

    let good = fx.job_queue.find_by_id(&good).await.unwrap().unwrap();
    assert_eq!(good.state, JobState::Done);
}

#[tokio::test]
async fn job_without_handler_fails_without_retry() {
    let fx = Fixture::new();
    let worker = common::worker(
        fx.job_queue.clone(),
        fx.time_provider(),
        HandlerRegistry::new().with(Arc::new(BackgroundSyncTask::new(Duration::ZERO))),
        0,
    );

    let job_id = fx.dispatch(3).enqueue(message("unknown_type")).await.unwrap();
    assert!(worker.process_next_job().await.unwrap());

    let job = fx.job_queue.find_by_id(&job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.attempts, 1);
    assert!(job.last_error.unwrap().contains("unknown_type"));
}

#[tokio::test]
async fn slow_job_holds_only_its_worker() {
    let fx = Fixture::new();
    let slow = Arc::new(MockJobHandler::new(
        "slow",
        MockBehavior::Delay(Duration::from_millis(300)),
    ));
    let handlers = Arc::new(
        HandlerRegistry::new()
            .with(slow)
            .with(Arc::new(BackgroundSyncTask::new(Duration::ZERO))),
    );
    let dispatch = fx.dispatch(1);
    let slow_id = dispatch.enqueue(message("slow")).await.unwrap();
    let fast_id = dispatch.start_sync().await.unwrap();

    let make_worker = || {
        bgsync_core::application::Worker::new(
            common::QUEUE,
            fx.job_queue.clone(),
            handlers.clone(),
            Arc::new(bgsync_core::application::retry::RetryPolicy::new(fx.time_provider(), 0)),
            fx.time_provider(),
        )
    };
    let (first, second) = (make_worker(), make_worker());

    let (a, b) = tokio::join!(first.process_next_job(), async {
        // let the first worker claim the slow job
        tokio::task::yield_now().await;
        let taken = second.process_next_job().await;
        let fast = fx.job_queue.find_by_id(&fast_id).await.unwrap().unwrap();
        let slow = fx.job_queue.find_by_id(&slow_id).await.unwrap().unwrap();
        (taken, fast.state, slow.state)
    });

    assert!(a.unwrap());
    let (taken, fast_state, slow_state_then) = b;
    assert!(taken.unwrap());
    assert_eq!(fast_state, JobState::Done);
    assert_eq!(slow_state_then, JobState::Running);
}

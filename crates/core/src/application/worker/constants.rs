// Worker constants (no magic values)
use std::time::Duration;

/// Sleep duration when no jobs are available (100ms)
pub const IDLE_SLEEP_DURATION: Duration = Duration::from_millis(100);

/// Sleep duration after a queue error before polling again (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Simulated work duration of the background sync task (5s)
pub const DEFAULT_SYNC_DELAY: Duration = Duration::from_secs(5);

/// Attempts per job; 1 means a failed job is not retried
pub const DEFAULT_MAX_ATTEMPTS: i32 = 1;

/// Default retry base delay (1000ms = 1s)
pub const DEFAULT_RETRY_BASE_DELAY_MS: i64 = 1000;

/// Upper bound on a single retry delay (1 hour)
pub const DEFAULT_MAX_RETRY_DELAY_MS: i64 = 60 * 60 * 1000;

/// How long shutdown waits for in-flight jobs (10s)
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Default recovery window for orphaned RUNNING jobs (5 minutes)
pub const DEFAULT_RECOVERY_WINDOW_MS: i64 = 5 * 60 * 1000;

/// Finished job records are kept this long (24 hours)
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 3600);

/// How often the retention sweeper runs (1 hour)
pub const DEFAULT_RETENTION_INTERVAL: Duration = Duration::from_secs(3600);

// Application Layer - Use Cases

pub mod dispatch;
pub mod recovery;
pub mod retention;
pub mod retry;
pub mod sync_task;
pub mod worker;

// Re-exports
pub use dispatch::{DispatchService, QueueStats};
pub use recovery::RecoveryService;
pub use retention::RetentionSweeper;
pub use sync_task::BackgroundSyncTask;
pub use worker::{shutdown_channel, HandlerRegistry, ShutdownSender, ShutdownToken, Worker};

// Background Sync Infrastructure - In-Memory Adapter
// Implements: JobQueue (process-local, not durable)

mod job_queue;

pub use job_queue::MemoryJobQueue;

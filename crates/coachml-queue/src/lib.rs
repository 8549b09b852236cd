//! Task queue client trait and backends.
//!
//! The queue is the only shared mutable resource in the system. It is always
//! reached through an injectable [`QueueClient`] handle scoped to the calling
//! context, never an ambient global, so tests can substitute the in-memory
//! backend without process-wide state.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use coachml_core::{JobId, JobRecord, NewJob, TaskOutcome};

pub use memory::MemoryQueue;
pub use postgres::PgQueue;

#[derive(Debug, Error)]
pub enum QueueError {
    /// The backing store is temporarily unreachable. Retryable; never
    /// conflated with an absent job.
    #[error("queue unavailable: {0}")]
    Unavailable(String),

    /// A stored payload could not be serialized or deserialized.
    #[error("queue serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Attempted to finalize a job that already holds a terminal outcome.
    /// Terminal statuses never revert.
    #[error("job {0} is already finalized")]
    AlreadyFinalized(JobId),
}

pub type QueueResult<T> = std::result::Result<T, QueueError>;

/// Client handle for the shared task queue and its job record store.
///
/// Single-writer discipline: after `claim`, exactly one worker owns a job
/// record until `finalize`, so no locking is required on the record itself,
/// only on id allocation and claim (delegated to the backend).
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Allocate a fresh job id, persist the record with state Queued, and
    /// stamp `enqueued_at`. Two enqueues never share an id, even with
    /// identical input.
    async fn enqueue(&self, job: NewJob) -> QueueResult<JobRecord>;

    /// Pure read of a job record. `Ok(None)` means the id was never allocated
    /// or has expired per the store's retention policy.
    async fn fetch(&self, id: JobId) -> QueueResult<Option<JobRecord>>;

    /// Claim the oldest Queued job for a worker, moving it to Started and
    /// stamping `started_at` and `claimed_by`. Returns `None` when nothing is
    /// pending.
    async fn claim(&self, worker_id: &str) -> QueueResult<Option<JobRecord>>;

    /// Write the terminal outcome, stamp `ended_at`, and move the record to
    /// the state matching the outcome variant. Errors with
    /// `AlreadyFinalized` if the job is already terminal.
    async fn finalize(&self, id: JobId, outcome: TaskOutcome) -> QueueResult<()>;
}

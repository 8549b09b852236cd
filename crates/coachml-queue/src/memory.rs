//! In-memory queue backend.
//!
//! Used by tests and single-process deployments. Behaves like the Postgres
//! backend: FIFO claim order, id allocation at enqueue, monotonic terminal
//! writes.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use coachml_core::{JobId, JobRecord, NativeState, NewJob, TaskOutcome};

use crate::{QueueClient, QueueError, QueueResult};

#[derive(Default)]
struct Inner {
    jobs: HashMap<JobId, JobRecord>,
    pending: VecDeque<JobId>,
}

/// In-process job record store guarded by a mutex.
#[derive(Default)]
pub struct MemoryQueue {
    inner: Mutex<Inner>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> QueueResult<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| QueueError::Unavailable("queue state lock poisoned".to_string()))
    }

    /// Number of records in the store. Lets tests assert that a rejected
    /// submission allocated nothing.
    pub fn job_count(&self) -> usize {
        self.inner.lock().map(|inner| inner.jobs.len()).unwrap_or(0)
    }
}

#[async_trait]
impl QueueClient for MemoryQueue {
    async fn enqueue(&self, job: NewJob) -> QueueResult<JobRecord> {
        let record = JobRecord {
            id: JobId::new(),
            task_kind: job.task_kind,
            input: job.input,
            dependency_ids: job.dependency_ids,
            state: NativeState::Queued,
            outcome: None,
            enqueued_at: Utc::now(),
            started_at: None,
            ended_at: None,
            claimed_by: None,
        };

        let mut inner = self.lock()?;
        inner.pending.push_back(record.id);
        inner.jobs.insert(record.id, record.clone());
        Ok(record)
    }

    async fn fetch(&self, id: JobId) -> QueueResult<Option<JobRecord>> {
        let inner = self.lock()?;
        Ok(inner.jobs.get(&id).cloned())
    }

    async fn claim(&self, worker_id: &str) -> QueueResult<Option<JobRecord>> {
        let mut inner = self.lock()?;
        let Some(id) = inner.pending.pop_front() else {
            return Ok(None);
        };

        let Some(record) = inner.jobs.get_mut(&id) else {
            return Ok(None);
        };
        record.state = NativeState::Started;
        record.started_at = Some(Utc::now());
        record.claimed_by = Some(worker_id.to_string());
        Ok(Some(record.clone()))
    }

    async fn finalize(&self, id: JobId, outcome: TaskOutcome) -> QueueResult<()> {
        let mut inner = self.lock()?;
        let Some(record) = inner.jobs.get_mut(&id) else {
            // Finalizing an evicted record is a no-op for the store; the
            // caller already owns the only claim on it.
            return Ok(());
        };

        if record.state.is_terminal() {
            return Err(QueueError::AlreadyFinalized(id));
        }

        record.state = outcome.native_state();
        record.outcome = Some(outcome);
        record.ended_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coachml_core::{ErrorCategory, ErrorInfo, TaskInput, TaskKind};

    fn text_job(text: &str) -> NewJob {
        NewJob::root(
            TaskKind::TextStructure,
            TaskInput::new(serde_json::json!({ "text": text })),
        )
    }

    #[tokio::test]
    async fn test_enqueue_allocates_distinct_ids_for_identical_input() {
        let queue = MemoryQueue::new();
        let a = queue.enqueue(text_job("same payload")).await.unwrap();
        let b = queue.enqueue(text_job("same payload")).await.unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(queue.job_count(), 2);
    }

    #[tokio::test]
    async fn test_fetch_unknown_id_is_none() {
        let queue = MemoryQueue::new();
        assert!(queue.fetch(JobId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_is_fifo_and_stamps_start() {
        let queue = MemoryQueue::new();
        let first = queue.enqueue(text_job("first")).await.unwrap();
        let second = queue.enqueue(text_job("second")).await.unwrap();

        let claimed = queue.claim("w1").await.unwrap().unwrap();
        assert_eq!(claimed.id, first.id);
        assert_eq!(claimed.state, NativeState::Started);
        assert!(claimed.started_at.is_some());
        assert_eq!(claimed.claimed_by.as_deref(), Some("w1"));

        let claimed = queue.claim("w2").await.unwrap().unwrap();
        assert_eq!(claimed.id, second.id);

        assert!(queue.claim("w1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_finalize_is_monotonic() {
        let queue = MemoryQueue::new();
        let job = queue.enqueue(text_job("payload")).await.unwrap();
        queue.claim("w1").await.unwrap();

        queue
            .finalize(job.id, TaskOutcome::Completed {
                result: serde_json::json!({"ok": true}),
            })
            .await
            .unwrap();

        let stored = queue.fetch(job.id).await.unwrap().unwrap();
        assert_eq!(stored.state, NativeState::Finished);
        assert!(stored.ended_at.is_some());

        let again = queue
            .finalize(job.id, TaskOutcome::Failed {
                error: ErrorInfo::new(ErrorCategory::TaskError, "late failure"),
            })
            .await;
        assert!(matches!(again, Err(QueueError::AlreadyFinalized(_))));

        // The terminal payload never reverted.
        let stored = queue.fetch(job.id).await.unwrap().unwrap();
        assert_eq!(stored.state, NativeState::Finished);
    }
}

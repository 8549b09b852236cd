//! Status resolution: native queue state to the domain lifecycle.

use std::sync::Arc;
use std::time::Duration;

use coachml_core::{
    Error, ErrorCategory, ErrorInfo, JobId, JobRecord, JobStatusRecord, NativeState, Result,
    TaskOutcome, TaskRegistry,
};
use coachml_queue::{QueueClient, QueueError};
use tokio::time::sleep;
use tracing::{debug, warn};

pub(crate) fn map_queue_error(e: QueueError) -> Error {
    match e {
        QueueError::Unavailable(msg) => Error::QueueUnavailable(msg),
        QueueError::Serialization(e) => Error::Internal(format!("queue serialization: {e}")),
        QueueError::AlreadyFinalized(id) => {
            Error::Internal(format!("job {id} finalized twice"))
        }
    }
}

/// Reads a job id's record and produces a normalized, immutable status
/// snapshot. A pure read: never mutates the stored record.
#[derive(Clone)]
pub struct StatusResolver {
    queue: Arc<dyn QueueClient>,
    registry: Arc<TaskRegistry>,
}

impl StatusResolver {
    pub fn new(queue: Arc<dyn QueueClient>, registry: Arc<TaskRegistry>) -> Self {
        Self { queue, registry }
    }

    /// Resolve the current status of a job.
    ///
    /// `Error::NotFound` means the id was never allocated or has expired per
    /// the store's retention policy; a transient queue failure surfaces as
    /// `Error::QueueUnavailable` and is never conflated with absence.
    pub async fn get_status(&self, job_id: JobId) -> Result<JobStatusRecord> {
        let record = self
            .queue
            .fetch(job_id)
            .await
            .map_err(map_queue_error)?
            .ok_or_else(|| Error::NotFound(format!("job {job_id}")))?;

        Ok(self.normalize(&record))
    }

    /// Poll until the job reaches a terminal status. This is the explicit
    /// wait-for-prerequisite barrier used by workers before consuming a
    /// dependency's result.
    pub async fn wait_terminal(
        &self,
        job_id: JobId,
        poll_interval: Duration,
    ) -> Result<JobStatusRecord> {
        loop {
            let status = self.get_status(job_id).await?;
            if status.status().is_terminal() {
                return Ok(status);
            }
            debug!(job_id = %job_id, status = ?status.status(), "Waiting for terminal status");
            sleep(poll_interval).await;
        }
    }

    fn normalize(&self, record: &JobRecord) -> JobStatusRecord {
        match record.state {
            NativeState::Queued => JobStatusRecord::pending(record.id),
            NativeState::Started => JobStatusRecord::processing(record.id),
            NativeState::Failed => {
                let error = match &record.outcome {
                    Some(TaskOutcome::Failed { error }) => error.clone(),
                    // A failed record without a stored error violates the
                    // finalize contract; still surface a Failed status.
                    _ => ErrorInfo::new(ErrorCategory::TaskError, "job failed with no stored error"),
                };
                JobStatusRecord::failed(record.id, error)
            }
            NativeState::Finished => self.normalize_finished(record),
        }
    }

    /// Decode a finished job's stored payload into the task kind's expected
    /// structure. A payload that exists but does not match the contract is a
    /// decode error, never a silent substitution.
    fn normalize_finished(&self, record: &JobRecord) -> JobStatusRecord {
        let raw = match &record.outcome {
            Some(TaskOutcome::Completed { result }) => result,
            _ => {
                warn!(job_id = %record.id, "Finished job has no completed outcome");
                return JobStatusRecord::failed(
                    record.id,
                    ErrorInfo::new(
                        ErrorCategory::DecodeError,
                        "finished job has no stored result",
                    ),
                );
            }
        };

        let Some(task) = self.registry.get(record.task_kind) else {
            return JobStatusRecord::failed(
                record.id,
                ErrorInfo::new(
                    ErrorCategory::DecodeError,
                    format!("no task registered to decode kind {}", record.task_kind),
                ),
            );
        };

        match task.decode_result(raw) {
            Ok(decoded) => JobStatusRecord::completed(record.id, decoded),
            Err(e) => {
                warn!(job_id = %record.id, error = %e, "Stored result failed to decode");
                JobStatusRecord::failed(record.id, ErrorInfo::from(&e))
            }
        }
    }
}

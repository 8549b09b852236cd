//! Job records, the status lifecycle, and terminal outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::error::{Error, ErrorInfo, Result};
use crate::id::JobId;

/// Identifies which executable logic a worker must run for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Transcribe a media resource and analyze sentiment, highlights, and
    /// topic categories.
    AudioSentiment,
    /// Structural analysis of free text (paragraphs, transitions, variety).
    TextStructure,
    /// Big Five personality feedback from trait scores.
    BigFive,
    /// STAR (situation/task/action/result) classification of answer text.
    StarFeedback,
    /// Synthesize a full answer evaluation from upstream analysis results.
    CreateAnswer,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::AudioSentiment => "audio_sentiment",
            TaskKind::TextStructure => "text_structure",
            TaskKind::BigFive => "big_five",
            TaskKind::StarFeedback => "star_feedback",
            TaskKind::CreateAnswer => "create_answer",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "audio_sentiment" => Ok(TaskKind::AudioSentiment),
            "text_structure" => Ok(TaskKind::TextStructure),
            "big_five" => Ok(TaskKind::BigFive),
            "star_feedback" => Ok(TaskKind::StarFeedback),
            "create_answer" => Ok(TaskKind::CreateAnswer),
            other => Err(Error::InvalidArgument(format!("unknown task kind: {other}"))),
        }
    }
}

/// Serializable payload handed to a task. Each task kind deserializes this
/// into its own typed request at validation and execution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskInput(serde_json::Value);

impl TaskInput {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Build an input from any serializable request type.
    pub fn from_serialize<T: Serialize>(request: &T) -> Result<Self> {
        let value = serde_json::to_value(request)
            .map_err(|e| Error::Internal(format!("failed to serialize task input: {e}")))?;
        Ok(Self(value))
    }

    /// Decode the payload into a task kind's typed request.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.0.clone())
            .map_err(|e| Error::InvalidArgument(format!("malformed task input: {e}")))
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// An enqueue request. The job id is allocated by the queue, atomically, at
/// enqueue time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJob {
    pub task_kind: TaskKind,
    pub input: TaskInput,
    /// Prerequisite job ids, in submission order. Empty for a root job.
    pub dependency_ids: Vec<JobId>,
}

impl NewJob {
    pub fn root(task_kind: TaskKind, input: TaskInput) -> Self {
        Self {
            task_kind,
            input,
            dependency_ids: Vec::new(),
        }
    }
}

/// The queue's native execution vocabulary. The domain lifecycle is derived
/// from this by the status resolver; components outside the queue layer never
/// branch on it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeState {
    /// Enqueued, not yet picked up by a worker.
    Queued,
    /// Claimed by a worker, not yet finished.
    Started,
    /// Finished with a stored result.
    Finished,
    /// Finished with a stored error.
    Failed,
}

impl NativeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, NativeState::Finished | NativeState::Failed)
    }
}

/// Terminal outcome of a job, written exactly once by the single worker that
/// owns it. A successful job carries a typed result and a failed job carries
/// only an error channel; the two never share a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskOutcome {
    Completed { result: serde_json::Value },
    Failed { error: ErrorInfo },
}

impl TaskOutcome {
    /// The native state this outcome finalizes the job into.
    pub fn native_state(&self) -> NativeState {
        match self {
            TaskOutcome::Completed { .. } => NativeState::Finished,
            TaskOutcome::Failed { .. } => NativeState::Failed,
        }
    }
}

/// The persisted state backing a job id.
///
/// Invariants, enforced by the queue client:
/// - `outcome` is present iff `state` is terminal, and its variant matches
///   the state.
/// - `started_at` and `ended_at` are each written exactly once, in order,
///   by the one worker owning the job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub task_kind: TaskKind,
    pub input: TaskInput,
    pub dependency_ids: Vec<JobId>,
    pub state: NativeState,
    pub outcome: Option<TaskOutcome>,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub claimed_by: Option<String>,
}

/// Domain-level job lifecycle, independent of the queue's native vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Normalized, immutable status snapshot produced per read by the status
/// resolver. Constructed once through the constructors below and never
/// mutated afterwards; exactly one of result/error is populated, and only in
/// a terminal status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatusRecord {
    job_id: JobId,
    status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorInfo>,
}

impl JobStatusRecord {
    pub fn pending(job_id: JobId) -> Self {
        Self {
            job_id,
            status: JobStatus::Pending,
            result: None,
            error: None,
        }
    }

    pub fn processing(job_id: JobId) -> Self {
        Self {
            job_id,
            status: JobStatus::Processing,
            result: None,
            error: None,
        }
    }

    pub fn completed(job_id: JobId, result: serde_json::Value) -> Self {
        Self {
            job_id,
            status: JobStatus::Completed,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(job_id: JobId, error: ErrorInfo) -> Self {
        Self {
            job_id,
            status: JobStatus::Failed,
            result: None,
            error: Some(error),
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn result(&self) -> Option<&serde_json::Value> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        self.error.as_ref()
    }

    /// Decode the result into a task-specific structure. Only meaningful on a
    /// Completed record.
    pub fn decode_result<T: DeserializeOwned>(&self) -> Result<T> {
        let result = self
            .result
            .as_ref()
            .ok_or_else(|| Error::Decode(format!("job {} has no stored result", self.job_id)))?;
        serde_json::from_value(result.clone())
            .map_err(|e| Error::Decode(format!("job {} result mismatch: {e}", self.job_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    #[test]
    fn test_task_kind_roundtrip() {
        for kind in [
            TaskKind::AudioSentiment,
            TaskKind::TextStructure,
            TaskKind::BigFive,
            TaskKind::StarFeedback,
            TaskKind::CreateAnswer,
        ] {
            let parsed: TaskKind = kind.as_str().parse().unwrap();
            assert_eq!(kind, parsed);
        }
        assert!("facial_analysis".parse::<TaskKind>().is_err());
    }

    #[test]
    fn test_outcome_maps_to_matching_state() {
        let ok = TaskOutcome::Completed {
            result: serde_json::json!({"score": 1}),
        };
        assert_eq!(ok.native_state(), NativeState::Finished);

        let err = TaskOutcome::Failed {
            error: ErrorInfo::new(ErrorCategory::TaskError, "boom"),
        };
        assert_eq!(err.native_state(), NativeState::Failed);
    }

    #[test]
    fn test_status_record_exclusive_channels() {
        let id = JobId::new();

        let completed = JobStatusRecord::completed(id, serde_json::json!({"ok": true}));
        assert!(completed.result().is_some());
        assert!(completed.error().is_none());

        let failed =
            JobStatusRecord::failed(id, ErrorInfo::new(ErrorCategory::TaskError, "boom"));
        assert!(failed.result().is_none());
        assert!(failed.error().is_some());

        let pending = JobStatusRecord::pending(id);
        assert!(pending.result().is_none());
        assert!(pending.error().is_none());
        assert!(!pending.status().is_terminal());
    }

    #[test]
    fn test_status_record_serializes_without_empty_channels() {
        let record = JobStatusRecord::pending(JobId::new());
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["status"], "pending");
        assert!(value.get("result").is_none());
        assert!(value.get("error").is_none());
    }
}

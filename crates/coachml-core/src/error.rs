//! Error taxonomy for coachml.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed submission input, detected synchronously before any job id
    /// is allocated.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The queried job id was never allocated or has expired from the store.
    #[error("not found: {0}")]
    NotFound(String),

    /// A prerequisite job terminated Failed, so the dependent job cannot run.
    #[error("upstream failure: {0}")]
    UpstreamFailure(String),

    /// A terminal job's stored result does not match its task kind's schema.
    #[error("decode error: {0}")]
    Decode(String),

    /// The task queue is temporarily unreachable; retryable, distinct from
    /// NotFound.
    #[error("task queue unavailable: {0}")]
    QueueUnavailable(String),

    /// Task logic raised a reportable failure.
    #[error("task failed: {0}")]
    TaskFailed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Category attached to the stored error channel of a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    InvalidArgument,
    UpstreamFailure,
    DecodeError,
    TaskError,
}

/// The error channel of a failed job: a human-readable message plus a
/// category. Exactly one of result/error is ever populated on a terminal job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub category: ErrorCategory,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

impl Error {
    /// Map an operational error to the category stored in a job's error
    /// channel. Lookup-time errors (NotFound, QueueUnavailable) are returned
    /// to callers directly and never stored, so they fold into TaskError if a
    /// worker ever needs to persist them.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidArgument(_) => ErrorCategory::InvalidArgument,
            Error::UpstreamFailure(_) => ErrorCategory::UpstreamFailure,
            Error::Decode(_) => ErrorCategory::DecodeError,
            _ => ErrorCategory::TaskError,
        }
    }
}

impl From<&Error> for ErrorInfo {
    fn from(err: &Error) -> Self {
        ErrorInfo::new(err.category(), err.to_string())
    }
}

//! Core domain types and traits for the coachml analysis job service.
//!
//! This crate contains:
//! - Job identifiers
//! - The job record, status lifecycle, and terminal outcome types
//! - The task contract and task registry
//! - The domain error taxonomy

pub mod error;
pub mod id;
pub mod job;
pub mod task;

pub use error::{Error, ErrorCategory, ErrorInfo, Result};
pub use id::JobId;
pub use job::{JobRecord, JobStatus, JobStatusRecord, NativeState, NewJob, TaskInput, TaskKind, TaskOutcome};
pub use task::{DependencyResult, Task, TaskContext, TaskRegistry};

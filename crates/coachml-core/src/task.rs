//! Task contract and registry.
//!
//! Tasks are the opaque analysis functions workers invoke. They accept a
//! serializable input, return a serializable result, or raise a reportable
//! failure. Dependency results are resolved by the worker before `run` is
//! invoked; a task never polls the queue itself.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::id::JobId;
use crate::job::{TaskInput, TaskKind};

/// Terminal result of one prerequisite job, handed to a dependent task.
#[derive(Debug, Clone)]
pub struct DependencyResult {
    pub job_id: JobId,
    pub result: serde_json::Value,
}

/// Everything a task sees when it runs.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub input: TaskInput,
    /// Results of all prerequisite jobs, in dependency order. Every entry is
    /// a Completed terminal result; the worker fails the job upstream before
    /// invoking the task if any prerequisite failed.
    pub dependencies: Vec<DependencyResult>,
}

impl TaskContext {
    pub fn root(input: TaskInput) -> Self {
        Self {
            input,
            dependencies: Vec::new(),
        }
    }
}

/// Contract every task kind must satisfy.
#[async_trait]
pub trait Task: Send + Sync {
    /// The kind this task executes.
    fn kind(&self) -> TaskKind;

    /// Validate a submission payload before any job id is allocated.
    /// Returns `Error::InvalidArgument` on malformed input.
    fn validate_input(&self, input: &TaskInput) -> Result<()>;

    /// Execute the task logic. Errors are captured by the worker and written
    /// into the job's error channel, never rethrown across the poll boundary.
    async fn run(&self, ctx: TaskContext) -> Result<serde_json::Value>;

    /// Re-validate a stored terminal payload against this kind's expected
    /// structure, returning the decoded value. `Error::Decode` on mismatch,
    /// never a silent substitution.
    fn decode_result(&self, raw: &serde_json::Value) -> Result<serde_json::Value>;
}

/// Maps task kinds to their executable logic. Shared by the orchestrator
/// (input validation), the resolver (result decoding), and workers
/// (execution).
#[derive(Default)]
pub struct TaskRegistry {
    tasks: HashMap<TaskKind, Arc<dyn Task>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
        }
    }

    pub fn register(&mut self, task: Arc<dyn Task>) {
        self.tasks.insert(task.kind(), task);
    }

    pub fn get(&self, kind: TaskKind) -> Option<Arc<dyn Task>> {
        self.tasks.get(&kind).cloned()
    }

    pub fn kinds(&self) -> impl Iterator<Item = TaskKind> + '_ {
        self.tasks.keys().copied()
    }
}

//! Submission API: allocates jobs and wires dependency chains.

use std::sync::Arc;

use coachml_core::{Error, JobId, NewJob, Result, TaskInput, TaskKind, TaskRegistry};
use coachml_queue::QueueClient;
use tracing::info;

use crate::resolver::map_queue_error;

/// One step of a dependency chain. `build_input` receives the ids of all
/// prior steps so the payload can reference their eventual results.
pub struct ChainStep {
    pub kind: TaskKind,
    build_input: Box<dyn Fn(&[JobId]) -> TaskInput + Send + Sync>,
}

impl ChainStep {
    pub fn new<F>(kind: TaskKind, build_input: F) -> Self
    where
        F: Fn(&[JobId]) -> TaskInput + Send + Sync + 'static,
    {
        Self {
            kind,
            build_input: Box::new(build_input),
        }
    }

    /// A step whose input does not reference prior jobs.
    pub fn fixed(kind: TaskKind, input: TaskInput) -> Self {
        Self::new(kind, move |_| input.clone())
    }
}

/// Accepts submission requests, validates them against the task registry, and
/// enqueues jobs. Submission is bounded allocation plus enqueue; it never
/// waits on execution.
pub struct Orchestrator {
    queue: Arc<dyn QueueClient>,
    registry: Arc<TaskRegistry>,
}

impl Orchestrator {
    pub fn new(queue: Arc<dyn QueueClient>, registry: Arc<TaskRegistry>) -> Self {
        Self { queue, registry }
    }

    /// Submit one root job. Validation failures return before any job id is
    /// allocated; no partial state is left behind.
    pub async fn submit_single(&self, kind: TaskKind, input: TaskInput) -> Result<JobId> {
        self.validate(kind, &input)?;

        let record = self
            .queue
            .enqueue(NewJob::root(kind, input))
            .await
            .map_err(map_queue_error)?;

        info!(job_id = %record.id, task_kind = %kind, "Enqueued job");
        Ok(record.id)
    }

    /// Submit an ordered chain of dependent jobs, returning the id of the
    /// final step. Step *i* depends on every prior step; each step is
    /// enqueued immediately, in order, without waiting for predecessors to
    /// start or finish. The dependency barrier is enforced at execution time
    /// by the worker, not by enqueue order.
    pub async fn submit_chain(&self, steps: Vec<ChainStep>) -> Result<JobId> {
        if steps.is_empty() {
            return Err(Error::InvalidArgument("chain must have at least one step".into()));
        }

        let mut prior_ids: Vec<JobId> = Vec::with_capacity(steps.len());
        for step in &steps {
            let input = (step.build_input)(&prior_ids);
            self.validate(step.kind, &input)?;

            let record = self
                .queue
                .enqueue(NewJob {
                    task_kind: step.kind,
                    input,
                    dependency_ids: prior_ids.clone(),
                })
                .await
                .map_err(map_queue_error)?;

            info!(
                job_id = %record.id,
                task_kind = %step.kind,
                dependencies = prior_ids.len(),
                "Enqueued chain step"
            );
            prior_ids.push(record.id);
        }

        // Non-empty, checked above.
        Ok(*prior_ids.last().ok_or_else(|| Error::Internal("empty chain".into()))?)
    }

    fn validate(&self, kind: TaskKind, input: &TaskInput) -> Result<()> {
        let task = self
            .registry
            .get(kind)
            .ok_or_else(|| Error::InvalidArgument(format!("no task registered for kind {kind}")))?;
        task.validate_input(input)
    }
}

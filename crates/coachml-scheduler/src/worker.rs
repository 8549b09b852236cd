//! Worker that claims and executes analysis jobs.

use std::sync::Arc;
use std::time::Duration;

use coachml_core::{
    DependencyResult, Error, ErrorCategory, ErrorInfo, JobRecord, JobStatus, TaskContext,
    TaskOutcome, TaskRegistry,
};
use coachml_queue::QueueClient;
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use crate::resolver::StatusResolver;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Sleep between claim attempts when the queue is empty.
    pub poll_interval: Duration,
    /// Sleep between status polls while waiting on a prerequisite.
    pub dependency_poll_interval: Duration,
    /// Wall-clock limit on one task execution. `None` lets a task run
    /// unbounded.
    pub task_timeout: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            dependency_poll_interval: Duration::from_millis(250),
            task_timeout: Some(Duration::from_secs(600)),
        }
    }
}

/// Claims jobs from the shared queue and executes their task logic.
///
/// Each claimed job is owned by exactly one worker until it is finalized.
/// Enqueue order is not an execution barrier: before invoking task logic the
/// worker explicitly waits for every prerequisite to reach a terminal status,
/// and propagates an upstream failure without running the task if any
/// prerequisite failed.
pub struct Worker {
    id: String,
    queue: Arc<dyn QueueClient>,
    registry: Arc<TaskRegistry>,
    resolver: StatusResolver,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(
        id: impl Into<String>,
        queue: Arc<dyn QueueClient>,
        registry: Arc<TaskRegistry>,
        config: WorkerConfig,
    ) -> Self {
        let resolver = StatusResolver::new(queue.clone(), registry.clone());
        Self {
            id: id.into(),
            queue,
            registry,
            resolver,
            config,
        }
    }

    /// Run the worker loop.
    pub async fn run(&self) {
        info!(worker_id = %self.id, "Starting worker");

        loop {
            match self.tick().await {
                Ok(true) => {}
                Ok(false) => sleep(self.config.poll_interval).await,
                Err(e) => {
                    warn!(worker_id = %self.id, error = %e, "Failed to claim job");
                    sleep(self.config.poll_interval * 4).await;
                }
            }
        }
    }

    /// Claim and process at most one job. Returns whether a job was
    /// processed. Execution errors are written to the job's error channel and
    /// never surface here; only claim/finalize transport errors do.
    pub async fn tick(&self) -> Result<bool, coachml_queue::QueueError> {
        let Some(record) = self.queue.claim(&self.id).await? else {
            return Ok(false);
        };

        info!(worker_id = %self.id, job_id = %record.id, task_kind = %record.task_kind, "Claimed job");
        let outcome = self.process(&record).await;

        if let TaskOutcome::Failed { error } = &outcome {
            warn!(job_id = %record.id, category = ?error.category, message = %error.message, "Job failed");
        } else {
            info!(job_id = %record.id, "Job completed");
        }

        self.queue.finalize(record.id, outcome).await?;
        Ok(true)
    }

    async fn process(&self, record: &JobRecord) -> TaskOutcome {
        let dependencies = match self.wait_for_dependencies(record).await {
            Ok(deps) => deps,
            Err(error) => return TaskOutcome::Failed { error },
        };

        let Some(task) = self.registry.get(record.task_kind) else {
            return TaskOutcome::Failed {
                error: ErrorInfo::new(
                    ErrorCategory::TaskError,
                    format!("no task registered for kind {}", record.task_kind),
                ),
            };
        };

        let ctx = TaskContext {
            input: record.input.clone(),
            dependencies,
        };

        let run = task.run(ctx);
        let result = match self.config.task_timeout {
            Some(limit) => match timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => Err(Error::TaskFailed(format!(
                    "task exceeded {}s wall-clock limit",
                    limit.as_secs()
                ))),
            },
            None => run.await,
        };

        match result {
            Ok(value) => TaskOutcome::Completed { result: value },
            Err(e) => TaskOutcome::Failed {
                error: ErrorInfo::from(&e),
            },
        }
    }

    /// Block until every prerequisite reaches a terminal status, collecting
    /// their results. Any prerequisite that failed, or whose record is gone,
    /// aborts the job with an upstream failure before its task logic runs.
    async fn wait_for_dependencies(
        &self,
        record: &JobRecord,
    ) -> Result<Vec<DependencyResult>, ErrorInfo> {
        let mut results = Vec::with_capacity(record.dependency_ids.len());

        for dep_id in &record.dependency_ids {
            loop {
                match self.resolver.get_status(*dep_id).await {
                    Ok(status) if status.status() == JobStatus::Completed => {
                        results.push(DependencyResult {
                            job_id: *dep_id,
                            result: status.result().cloned().unwrap_or(serde_json::Value::Null),
                        });
                        break;
                    }
                    Ok(status) if status.status() == JobStatus::Failed => {
                        let upstream = status
                            .error()
                            .map(|e| e.message.clone())
                            .unwrap_or_else(|| "unknown error".to_string());
                        return Err(ErrorInfo::new(
                            ErrorCategory::UpstreamFailure,
                            format!("dependency {dep_id} failed: {upstream}"),
                        ));
                    }
                    Ok(_) => sleep(self.config.dependency_poll_interval).await,
                    Err(Error::NotFound(_)) => {
                        return Err(ErrorInfo::new(
                            ErrorCategory::UpstreamFailure,
                            format!("dependency {dep_id} no longer exists"),
                        ));
                    }
                    Err(e) => {
                        // Transient queue errors are retried, not stored.
                        warn!(job_id = %record.id, dependency = %dep_id, error = %e, "Dependency lookup failed, retrying");
                        sleep(self.config.dependency_poll_interval).await;
                    }
                }
            }
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use coachml_core::{JobId, NewJob, Result, Task, TaskInput, TaskKind};
    use coachml_queue::MemoryQueue;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_config() -> WorkerConfig {
        WorkerConfig {
            poll_interval: Duration::from_millis(5),
            dependency_poll_interval: Duration::from_millis(5),
            task_timeout: Some(Duration::from_secs(5)),
        }
    }

    struct CountingTask {
        kind: TaskKind,
        invocations: Arc<AtomicUsize>,
        outcome: Result<serde_json::Value>,
    }

    impl CountingTask {
        fn succeeding(kind: TaskKind, invocations: Arc<AtomicUsize>) -> Self {
            Self {
                kind,
                invocations,
                outcome: Ok(serde_json::json!({ "analyzed": true })),
            }
        }

        fn failing(kind: TaskKind, invocations: Arc<AtomicUsize>) -> Self {
            Self {
                kind,
                invocations,
                outcome: Err(Error::TaskFailed("provider rejected the media".into())),
            }
        }
    }

    #[async_trait]
    impl Task for CountingTask {
        fn kind(&self) -> TaskKind {
            self.kind
        }

        fn validate_input(&self, _input: &TaskInput) -> Result<()> {
            Ok(())
        }

        async fn run(&self, ctx: TaskContext) -> Result<serde_json::Value> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            match &self.outcome {
                Ok(value) => {
                    let mut value = value.clone();
                    if let Some(dep) = ctx.dependencies.first() {
                        value["from_dependency"] = dep.result.clone();
                    }
                    Ok(value)
                }
                Err(e) => Err(Error::TaskFailed(e.to_string())),
            }
        }

        fn decode_result(&self, raw: &serde_json::Value) -> Result<serde_json::Value> {
            Ok(raw.clone())
        }
    }

    struct Harness {
        queue: Arc<MemoryQueue>,
        registry: Arc<TaskRegistry>,
    }

    impl Harness {
        fn new(tasks: Vec<Arc<dyn Task>>) -> Self {
            let mut registry = TaskRegistry::new();
            for task in tasks {
                registry.register(task);
            }
            Self {
                queue: Arc::new(MemoryQueue::new()),
                registry: Arc::new(registry),
            }
        }

        fn worker(&self) -> Worker {
            Worker::new(
                "test-worker",
                self.queue.clone(),
                self.registry.clone(),
                test_config(),
            )
        }

        fn resolver(&self) -> StatusResolver {
            StatusResolver::new(self.queue.clone(), self.registry.clone())
        }
    }

    #[tokio::test]
    async fn test_worker_executes_root_job() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let harness = Harness::new(vec![Arc::new(CountingTask::succeeding(
            TaskKind::AudioSentiment,
            invocations.clone(),
        ))]);

        let job = harness
            .queue
            .enqueue(NewJob::root(
                TaskKind::AudioSentiment,
                TaskInput::new(serde_json::json!({ "media_url": "https://example.com/a.mp3" })),
            ))
            .await
            .unwrap();

        // Nothing has run yet: the job polls as Pending.
        let status = harness.resolver().get_status(job.id).await.unwrap();
        assert_eq!(status.status(), JobStatus::Pending);

        assert!(harness.worker().tick().await.unwrap());

        let status = harness.resolver().get_status(job.id).await.unwrap();
        assert_eq!(status.status(), JobStatus::Completed);
        assert_eq!(status.result().unwrap()["analyzed"], true);
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_dependency_skips_task_logic() {
        let upstream_calls = Arc::new(AtomicUsize::new(0));
        let dependent_calls = Arc::new(AtomicUsize::new(0));
        let harness = Harness::new(vec![
            Arc::new(CountingTask::failing(
                TaskKind::AudioSentiment,
                upstream_calls.clone(),
            )),
            Arc::new(CountingTask::succeeding(
                TaskKind::CreateAnswer,
                dependent_calls.clone(),
            )),
        ]);

        let upstream = harness
            .queue
            .enqueue(NewJob::root(
                TaskKind::AudioSentiment,
                TaskInput::new(serde_json::json!({})),
            ))
            .await
            .unwrap();
        let dependent = harness
            .queue
            .enqueue(NewJob {
                task_kind: TaskKind::CreateAnswer,
                input: TaskInput::new(serde_json::json!({})),
                dependency_ids: vec![upstream.id],
            })
            .await
            .unwrap();

        let worker = harness.worker();
        assert!(worker.tick().await.unwrap()); // upstream fails
        assert!(worker.tick().await.unwrap()); // dependent observes the failure

        let status = harness.resolver().get_status(dependent.id).await.unwrap();
        assert_eq!(status.status(), JobStatus::Failed);
        assert_eq!(
            status.error().unwrap().category,
            ErrorCategory::UpstreamFailure
        );
        assert_eq!(upstream_calls.load(Ordering::SeqCst), 1);
        // The dependent's task logic never ran.
        assert_eq!(dependent_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_chain_result_flows_downstream() {
        let calls = Arc::new(AtomicUsize::new(0));
        let harness = Harness::new(vec![
            Arc::new(CountingTask::succeeding(
                TaskKind::AudioSentiment,
                calls.clone(),
            )),
            Arc::new(CountingTask::succeeding(TaskKind::CreateAnswer, calls.clone())),
        ]);

        let upstream = harness
            .queue
            .enqueue(NewJob::root(
                TaskKind::AudioSentiment,
                TaskInput::new(serde_json::json!({})),
            ))
            .await
            .unwrap();
        let dependent = harness
            .queue
            .enqueue(NewJob {
                task_kind: TaskKind::CreateAnswer,
                input: TaskInput::new(serde_json::json!({})),
                dependency_ids: vec![upstream.id],
            })
            .await
            .unwrap();

        let worker = harness.worker();
        assert!(worker.tick().await.unwrap());
        assert!(worker.tick().await.unwrap());

        let status = harness.resolver().get_status(dependent.id).await.unwrap();
        assert_eq!(status.status(), JobStatus::Completed);
        // The dependent consumed the prerequisite's terminal result.
        assert_eq!(status.result().unwrap()["from_dependency"]["analyzed"], true);
    }

    #[tokio::test]
    async fn test_missing_dependency_record_is_upstream_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let harness = Harness::new(vec![Arc::new(CountingTask::succeeding(
            TaskKind::CreateAnswer,
            calls.clone(),
        ))]);

        let dependent = harness
            .queue
            .enqueue(NewJob {
                task_kind: TaskKind::CreateAnswer,
                input: TaskInput::new(serde_json::json!({})),
                dependency_ids: vec![JobId::new()],
            })
            .await
            .unwrap();

        assert!(harness.worker().tick().await.unwrap());

        let status = harness.resolver().get_status(dependent.id).await.unwrap();
        assert_eq!(status.status(), JobStatus::Failed);
        assert_eq!(
            status.error().unwrap().category,
            ErrorCategory::UpstreamFailure
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    struct StallingTask;

    #[async_trait]
    impl Task for StallingTask {
        fn kind(&self) -> TaskKind {
            TaskKind::AudioSentiment
        }

        fn validate_input(&self, _input: &TaskInput) -> Result<()> {
            Ok(())
        }

        async fn run(&self, _ctx: TaskContext) -> Result<serde_json::Value> {
            sleep(Duration::from_secs(60)).await;
            Ok(serde_json::Value::Null)
        }

        fn decode_result(&self, raw: &serde_json::Value) -> Result<serde_json::Value> {
            Ok(raw.clone())
        }
    }

    #[tokio::test]
    async fn test_task_timeout_fails_the_job() {
        let harness = Harness::new(vec![Arc::new(StallingTask)]);
        let job = harness
            .queue
            .enqueue(NewJob::root(
                TaskKind::AudioSentiment,
                TaskInput::new(serde_json::json!({})),
            ))
            .await
            .unwrap();

        let worker = Worker::new(
            "test-worker",
            harness.queue.clone(),
            harness.registry.clone(),
            WorkerConfig {
                task_timeout: Some(Duration::from_millis(20)),
                ..test_config()
            },
        );
        assert!(worker.tick().await.unwrap());

        let status = harness.resolver().get_status(job.id).await.unwrap();
        assert_eq!(status.status(), JobStatus::Failed);
        assert_eq!(status.error().unwrap().category, ErrorCategory::TaskError);
    }
}

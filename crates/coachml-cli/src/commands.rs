//! Command implementations for the coachml CLI.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use url::Url;

use coachml_config::{QueueConfig, SystemConfig, parse_system_config};
use coachml_core::{JobId, TaskInput, TaskKind, TaskRegistry};
use coachml_queue::{MemoryQueue, PgQueue, QueueClient};
use coachml_scheduler::{Orchestrator, StatusResolver, Worker, WorkerConfig};
use coachml_tasks::pipelines::submit_answer_analysis;

/// Shared wiring for every command: configuration, queue backend, and the
/// task registry.
pub struct Runtime {
    pub config: SystemConfig,
    pub queue: Arc<dyn QueueClient>,
    pub registry: Arc<TaskRegistry>,
    pub orchestrator: Orchestrator,
    pub resolver: StatusResolver,
}

impl Runtime {
    pub async fn build(config_path: &str, database_url: Option<String>) -> anyhow::Result<Self> {
        let mut config = load_config(config_path)?;

        if let Some(url) = database_url {
            config.queue = QueueConfig::Postgres { url };
        }

        let queue: Arc<dyn QueueClient> = match &config.queue {
            QueueConfig::Memory => {
                warn!("Using the in-memory queue; jobs are not visible to other processes");
                Arc::new(MemoryQueue::new())
            }
            QueueConfig::Postgres { url } => Arc::new(
                PgQueue::connect(url)
                    .await
                    .context("failed to connect to the job queue")?,
            ),
        };

        let registry = Arc::new(coachml_tasks::registry(&config.transcription));
        let orchestrator = Orchestrator::new(queue.clone(), registry.clone());
        let resolver = StatusResolver::new(queue.clone(), registry.clone());

        Ok(Self {
            config,
            queue,
            registry,
            orchestrator,
            resolver,
        })
    }

    fn worker_config(&self) -> WorkerConfig {
        let settings = &self.config.worker;
        WorkerConfig {
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            dependency_poll_interval: Duration::from_millis(settings.dependency_poll_ms),
            task_timeout: match settings.task_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}

fn load_config(path: &str) -> anyhow::Result<SystemConfig> {
    if !Path::new(path).exists() {
        info!(path, "No configuration file found, using defaults");
        return Ok(SystemConfig::default());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration file {path}"))?;
    parse_system_config(&text).with_context(|| format!("invalid configuration in {path}"))
}

/// Run a pool of workers until interrupted.
pub async fn worker(runtime: &Runtime, count: Option<usize>) {
    let count = count.unwrap_or(runtime.config.worker.count).max(1);
    info!(count, "Starting worker pool");

    let handles: Vec<_> = (0..count)
        .map(|i| {
            let worker = Worker::new(
                format!("worker-{i}"),
                runtime.queue.clone(),
                runtime.registry.clone(),
                runtime.worker_config(),
            );
            tokio::spawn(async move { worker.run().await })
        })
        .collect();

    futures::future::join_all(handles).await;
}

pub async fn submit_answer(runtime: &Runtime, media_url: &str) -> anyhow::Result<()> {
    let url = Url::parse(media_url).context("invalid media url")?;
    let job_id = submit_answer_analysis(&runtime.orchestrator, url).await?;
    println!("{job_id}");
    Ok(())
}

pub async fn submit_audio(runtime: &Runtime, media_url: &str) -> anyhow::Result<()> {
    let url = Url::parse(media_url).context("invalid media url")?;
    let input = TaskInput::new(serde_json::json!({ "media_url": url }));
    let job_id = runtime
        .orchestrator
        .submit_single(TaskKind::AudioSentiment, input)
        .await?;
    println!("{job_id}");
    Ok(())
}

pub async fn submit_text(runtime: &Runtime, kind: TaskKind, text: String) -> anyhow::Result<()> {
    let input = TaskInput::new(serde_json::json!({ "text": text }));
    let job_id = runtime.orchestrator.submit_single(kind, input).await?;
    println!("{job_id}");
    Ok(())
}

pub async fn submit_big_five(
    runtime: &Runtime,
    o: f64,
    c: f64,
    e: f64,
    a: f64,
    n: f64,
) -> anyhow::Result<()> {
    let input = TaskInput::new(serde_json::json!({ "o": o, "c": c, "e": e, "a": a, "n": n }));
    let job_id = runtime
        .orchestrator
        .submit_single(TaskKind::BigFive, input)
        .await?;
    println!("{job_id}");
    Ok(())
}

pub async fn status(runtime: &Runtime, id: &str, wait: bool) -> anyhow::Result<()> {
    let job_id: JobId = id.parse().context("invalid job id")?;

    let status = if wait {
        let poll = Duration::from_millis(runtime.config.worker.poll_interval_ms);
        runtime.resolver.wait_terminal(job_id, poll).await?
    } else {
        runtime.resolver.get_status(job_id).await?
    };

    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

//! Canned submission pipelines.

use url::Url;

use coachml_core::{JobId, Result, TaskInput, TaskKind};
use coachml_scheduler::{ChainStep, Orchestrator};

use crate::audio_sentiment::AudioSentimentRequest;
use crate::create_answer::CreateAnswerRequest;

/// Submit the full interview-answer analysis chain: an audio sentiment job
/// followed by an answer synthesis job depending on it. Returns the id of
/// the synthesis job, which callers poll for the final evaluation.
pub async fn submit_answer_analysis(orchestrator: &Orchestrator, media_url: Url) -> Result<JobId> {
    let audio_input = TaskInput::from_serialize(&AudioSentimentRequest {
        media_url: media_url.clone(),
    })?;

    orchestrator
        .submit_chain(vec![
            ChainStep::fixed(TaskKind::AudioSentiment, audio_input),
            ChainStep::new(TaskKind::CreateAnswer, move |prior| {
                TaskInput::new(serde_json::json!(CreateAnswerRequest {
                    media_url: media_url.clone(),
                    analysis_job_id: prior.first().copied(),
                }))
            }),
        ])
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use coachml_core::{
        JobStatus, Task, TaskContext, TaskOutcome, TaskRegistry,
    };
    use coachml_queue::{MemoryQueue, QueueClient};
    use coachml_scheduler::{StatusResolver, Worker, WorkerConfig};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::CreateAnswerTask;
    use crate::schemas::{AudioSentimentResult, SentimentLabel, SentimentResult};

    fn canned_analysis() -> AudioSentimentResult {
        AudioSentimentResult {
            sentiment_analysis: vec![SentimentResult {
                text: "First, I organized the rollout and then we delivered it on time overall."
                    .into(),
                sentiment: SentimentLabel::Positive,
                confidence: 0.92,
                start: 0,
                end: 5000,
            }],
            highlights: vec![],
            iab_results: Default::default(),
            clip_length_seconds: 5.0,
        }
    }

    /// Stands in for the provider-backed audio task so the chain can run
    /// without network access.
    struct CannedAudioTask;

    #[async_trait]
    impl Task for CannedAudioTask {
        fn kind(&self) -> TaskKind {
            TaskKind::AudioSentiment
        }

        fn validate_input(&self, input: &coachml_core::TaskInput) -> Result<()> {
            let request: AudioSentimentRequest = input.decode()?;
            crate::audio_sentiment::validate_media_url(&request.media_url)
        }

        async fn run(&self, _ctx: TaskContext) -> Result<serde_json::Value> {
            Ok(serde_json::to_value(canned_analysis()).expect("canned analysis serializes"))
        }

        fn decode_result(&self, raw: &serde_json::Value) -> Result<serde_json::Value> {
            crate::decode_as::<AudioSentimentResult>("audio_sentiment", raw)
        }
    }

    fn setup() -> (Arc<MemoryQueue>, Arc<TaskRegistry>, Orchestrator) {
        let queue = Arc::new(MemoryQueue::new());
        let mut registry = TaskRegistry::new();
        registry.register(Arc::new(CannedAudioTask));
        registry.register(Arc::new(CreateAnswerTask));
        let registry = Arc::new(registry);
        let orchestrator = Orchestrator::new(queue.clone(), registry.clone());
        (queue, registry, orchestrator)
    }

    fn media_url() -> Url {
        Url::parse("https://example.com/interviews/answer-1.mp4").unwrap()
    }

    #[tokio::test]
    async fn test_chain_returns_final_step_with_dependency() {
        let (queue, _, orchestrator) = setup();

        let final_id = submit_answer_analysis(&orchestrator, media_url()).await.unwrap();

        let record = queue.fetch(final_id).await.unwrap().unwrap();
        assert_eq!(record.task_kind, TaskKind::CreateAnswer);
        assert_eq!(record.dependency_ids.len(), 1);
        // The payload embeds the prerequisite id for the task to reference.
        assert_eq!(
            record.input.as_value()["analysis_job_id"],
            serde_json::json!(record.dependency_ids[0])
        );
    }

    #[tokio::test]
    async fn test_dependent_stays_pending_while_prerequisite_runs() {
        let (queue, registry, orchestrator) = setup();
        let resolver = StatusResolver::new(queue.clone(), registry.clone());

        let final_id = submit_answer_analysis(&orchestrator, media_url()).await.unwrap();
        let record = queue.fetch(final_id).await.unwrap().unwrap();
        let audio_id = record.dependency_ids[0];

        // A worker claims the audio job; the dependent has not started.
        let claimed = queue.claim("w1").await.unwrap().unwrap();
        assert_eq!(claimed.id, audio_id);

        let audio_status = resolver.get_status(audio_id).await.unwrap();
        assert_eq!(audio_status.status(), JobStatus::Processing);
        let dependent_status = resolver.get_status(final_id).await.unwrap();
        assert_eq!(dependent_status.status(), JobStatus::Pending);

        queue
            .finalize(audio_id, TaskOutcome::Completed {
                result: serde_json::to_value(canned_analysis()).unwrap(),
            })
            .await
            .unwrap();

        // Now the dependent runs to completion.
        let worker = Worker::new(
            "w2",
            queue.clone(),
            registry.clone(),
            WorkerConfig {
                poll_interval: Duration::from_millis(5),
                dependency_poll_interval: Duration::from_millis(5),
                task_timeout: Some(Duration::from_secs(5)),
            },
        );
        assert!(worker.tick().await.unwrap());

        let status = resolver.get_status(final_id).await.unwrap();
        assert_eq!(status.status(), JobStatus::Completed);
        let result = status.result().unwrap();
        assert!(result["transcript"]
            .as_str()
            .unwrap()
            .contains("organized the rollout"));
        assert_eq!(result["overall_sentiment"], "POSITIVE");
    }

    #[tokio::test]
    async fn test_full_chain_through_workers() {
        let (queue, registry, orchestrator) = setup();
        let resolver = StatusResolver::new(queue.clone(), registry.clone());

        let final_id = submit_answer_analysis(&orchestrator, media_url()).await.unwrap();
        let audio_id = queue.fetch(final_id).await.unwrap().unwrap().dependency_ids[0];

        let worker = Worker::new(
            "w1",
            queue.clone(),
            registry.clone(),
            WorkerConfig {
                poll_interval: Duration::from_millis(5),
                dependency_poll_interval: Duration::from_millis(5),
                task_timeout: Some(Duration::from_secs(5)),
            },
        );
        assert!(worker.tick().await.unwrap()); // audio sentiment
        let audio_status = resolver.get_status(audio_id).await.unwrap();
        assert_eq!(audio_status.status(), JobStatus::Completed);
        let audio_result = audio_status.result().unwrap();
        assert_eq!(audio_result["sentiment_analysis"].as_array().unwrap().len(), 1);
        assert!(audio_result["clip_length_seconds"].as_f64().unwrap() >= 0.0);

        assert!(worker.tick().await.unwrap()); // answer synthesis

        let status = resolver.get_status(final_id).await.unwrap();
        assert_eq!(status.status(), JobStatus::Completed);
        let result = status.result().unwrap();
        assert!(result["aggregate_score"].as_f64().unwrap() >= 0.0);
        assert_eq!(result["timeline"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_media_url_allocates_nothing() {
        let (queue, _, orchestrator) = setup();

        let bad = Url::parse("ftp://example.com/answer.mp4").unwrap();
        let result = submit_answer_analysis(&orchestrator, bad).await;
        assert!(result.is_err());
        assert_eq!(queue.job_count(), 0);
    }
}

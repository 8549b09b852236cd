//! Audio sentiment analysis via an AssemblyAI-compatible transcription API.
//!
//! Submits the media URL for transcription, polls until the provider
//! finishes, and maps the provider payload into [`AudioSentimentResult`].

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;
use url::Url;

use coachml_config::TranscriptionConfig;
use coachml_core::{Error, Result, Task, TaskContext, TaskInput, TaskKind};

use crate::schemas::{
    AudioSentimentResult, HighlightData, IabLabel, IabResult, SentimentLabel, SentimentResult,
    TimestampData,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct AudioSentimentRequest {
    pub media_url: Url,
}

pub(crate) fn validate_media_url(url: &Url) -> Result<()> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidArgument(format!(
            "media url must be http(s), got scheme '{}'",
            url.scheme()
        )));
    }
    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(Error::InvalidArgument("media url has no host".into()));
    }
    Ok(())
}

// Provider wire types, kept private to this module.

#[derive(Deserialize)]
struct TranscriptHandle {
    id: String,
}

#[derive(Deserialize)]
struct TranscriptPayload {
    status: String,
    error: Option<String>,
    audio_duration: Option<f64>,
    #[serde(default)]
    sentiment_analysis_results: Vec<ProviderSentiment>,
    auto_highlights_result: Option<ProviderHighlights>,
    iab_categories_result: Option<ProviderIab>,
}

#[derive(Deserialize)]
struct ProviderSentiment {
    text: String,
    sentiment: SentimentLabel,
    confidence: f64,
    start: u64,
    end: u64,
}

#[derive(Deserialize)]
struct ProviderHighlights {
    #[serde(default)]
    results: Vec<ProviderHighlight>,
}

#[derive(Deserialize)]
struct ProviderHighlight {
    text: String,
    rank: f64,
    count: u32,
    #[serde(default)]
    timestamps: Vec<ProviderTimestamp>,
}

#[derive(Deserialize)]
struct ProviderTimestamp {
    start: u64,
    end: u64,
}

#[derive(Deserialize)]
struct ProviderIab {
    #[serde(default)]
    summary: std::collections::HashMap<String, f64>,
}

fn map_payload(payload: TranscriptPayload) -> AudioSentimentResult {
    let sentiment_analysis = payload
        .sentiment_analysis_results
        .into_iter()
        .map(|s| SentimentResult {
            text: s.text,
            sentiment: s.sentiment,
            confidence: s.confidence,
            start: s.start,
            end: s.end,
        })
        .collect();

    let highlights = payload
        .auto_highlights_result
        .map(|h| {
            h.results
                .into_iter()
                .map(|r| HighlightData {
                    text: r.text,
                    rank: r.rank,
                    count: r.count,
                    timestamps: r
                        .timestamps
                        .into_iter()
                        .map(|t| TimestampData {
                            start: t.start,
                            end: t.end,
                        })
                        .collect(),
                })
                .collect()
        })
        .unwrap_or_default();

    let mut labels: Vec<IabLabel> = payload
        .iab_categories_result
        .map(|iab| {
            iab.summary
                .into_iter()
                .map(|(label, relevance)| IabLabel { label, relevance })
                .collect()
        })
        .unwrap_or_default();
    labels.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));

    AudioSentimentResult {
        sentiment_analysis,
        highlights,
        iab_results: IabResult {
            text: String::new(),
            labels,
        },
        clip_length_seconds: payload.audio_duration.unwrap_or(0.0).max(0.0),
    }
}

/// Transcribes a media resource and extracts sentiment, highlights, and
/// topic categories.
pub struct AudioSentimentTask {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    poll_interval: Duration,
}

impl AudioSentimentTask {
    pub fn new(config: &TranscriptionConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: std::env::var(&config.api_key_env).unwrap_or_default(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }

    async fn submit_transcript(&self, media_url: &Url) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/v2/transcript", self.base_url))
            .header("authorization", &self.api_key)
            .json(&serde_json::json!({
                "audio_url": media_url,
                "sentiment_analysis": true,
                "auto_highlights": true,
                "iab_categories": true,
            }))
            .send()
            .await
            .map_err(|e| Error::TaskFailed(format!("transcription submit failed: {e}")))?
            .error_for_status()
            .map_err(|e| Error::TaskFailed(format!("transcription submit rejected: {e}")))?;

        let handle: TranscriptHandle = response
            .json()
            .await
            .map_err(|e| Error::TaskFailed(format!("malformed transcript handle: {e}")))?;
        Ok(handle.id)
    }

    async fn poll_transcript(&self, transcript_id: &str) -> Result<TranscriptPayload> {
        loop {
            let payload: TranscriptPayload = self
                .client
                .get(format!("{}/v2/transcript/{transcript_id}", self.base_url))
                .header("authorization", &self.api_key)
                .send()
                .await
                .map_err(|e| Error::TaskFailed(format!("transcription poll failed: {e}")))?
                .json()
                .await
                .map_err(|e| Error::TaskFailed(format!("malformed transcript payload: {e}")))?;

            match payload.status.as_str() {
                "completed" => return Ok(payload),
                "error" => {
                    let reason = payload.error.unwrap_or_else(|| "unknown provider error".into());
                    return Err(Error::TaskFailed(format!("transcription failed: {reason}")));
                }
                status => {
                    debug!(transcript_id, status, "Transcript not ready");
                    sleep(self.poll_interval).await;
                }
            }
        }
    }
}

#[async_trait]
impl Task for AudioSentimentTask {
    fn kind(&self) -> TaskKind {
        TaskKind::AudioSentiment
    }

    fn validate_input(&self, input: &TaskInput) -> Result<()> {
        let request: AudioSentimentRequest = input.decode()?;
        validate_media_url(&request.media_url)
    }

    async fn run(&self, ctx: TaskContext) -> Result<serde_json::Value> {
        let request: AudioSentimentRequest = ctx.input.decode()?;
        validate_media_url(&request.media_url)?;

        let transcript_id = self.submit_transcript(&request.media_url).await?;
        let payload = self.poll_transcript(&transcript_id).await?;
        let result = map_payload(payload);

        serde_json::to_value(result).map_err(|e| Error::Internal(e.to_string()))
    }

    fn decode_result(&self, raw: &serde_json::Value) -> Result<serde_json::Value> {
        crate::decode_as::<AudioSentimentResult>("audio_sentiment", raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> AudioSentimentTask {
        AudioSentimentTask::new(&TranscriptionConfig::default())
    }

    #[test]
    fn test_non_http_url_is_rejected() {
        let input = TaskInput::new(serde_json::json!({ "media_url": "ftp://example.com/a.mp3" }));
        assert!(matches!(
            task().validate_input(&input),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_missing_url_is_rejected() {
        let input = TaskInput::new(serde_json::json!({}));
        assert!(matches!(
            task().validate_input(&input),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_valid_url_passes_validation() {
        let input = TaskInput::new(serde_json::json!({ "media_url": "https://example.com/a.mp3" }));
        task().validate_input(&input).unwrap();
    }

    #[test]
    fn test_decode_rejects_mismatched_payload() {
        let raw = serde_json::json!({ "sentiment_analysis": "not a list" });
        assert!(matches!(
            task().decode_result(&raw),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_map_payload_sorts_labels_and_clamps_duration() {
        let payload = TranscriptPayload {
            status: "completed".into(),
            error: None,
            audio_duration: Some(42.5),
            sentiment_analysis_results: vec![],
            auto_highlights_result: None,
            iab_categories_result: Some(ProviderIab {
                summary: [("Careers".to_string(), 0.2), ("Technology".to_string(), 0.9)]
                    .into_iter()
                    .collect(),
            }),
        };

        let result = map_payload(payload);
        assert_eq!(result.clip_length_seconds, 42.5);
        assert_eq!(result.iab_results.labels[0].label, "Technology");
    }
}

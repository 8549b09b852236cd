//! Analysis task implementations for coachml.
//!
//! Every task satisfies the `coachml_core::Task` contract: serializable
//! input in, serializable typed result out, reportable failure otherwise.

pub mod audio_sentiment;
pub mod big_five;
pub mod create_answer;
pub mod pipelines;
pub mod schemas;
pub mod star;
pub mod text_structure;

use std::sync::Arc;

use coachml_config::TranscriptionConfig;
use coachml_core::{Error, Result, TaskRegistry};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub use audio_sentiment::AudioSentimentTask;
pub use big_five::BigFiveTask;
pub use create_answer::CreateAnswerTask;
pub use star::StarFeedbackTask;
pub use text_structure::TextStructureTask;

/// Build the registry with every task kind wired.
pub fn registry(transcription: &TranscriptionConfig) -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    registry.register(Arc::new(AudioSentimentTask::new(transcription)));
    registry.register(Arc::new(TextStructureTask));
    registry.register(Arc::new(BigFiveTask));
    registry.register(Arc::new(StarFeedbackTask));
    registry.register(Arc::new(CreateAnswerTask));
    registry
}

/// Re-validate a stored payload against a typed schema, returning the decoded
/// value. Used by every task's `decode_result`.
pub(crate) fn decode_as<T>(kind: &str, raw: &serde_json::Value) -> Result<serde_json::Value>
where
    T: DeserializeOwned + Serialize,
{
    let decoded: T = serde_json::from_value(raw.clone())
        .map_err(|e| Error::Decode(format!("{kind} result does not match contract: {e}")))?;
    serde_json::to_value(decoded).map_err(|e| Error::Internal(e.to_string()))
}

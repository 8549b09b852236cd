//! Structural analysis of free text.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use coachml_core::{Error, Result, Task, TaskContext, TaskInput, TaskKind};

use crate::schemas::{StructureDetails, TextStructureResult};

static SENTENCE_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+\s+|[.!?]+$").expect("valid sentence regex"));

const TRANSITION_WORDS: &[&str] = &[
    "first",
    "second",
    "third",
    "then",
    "next",
    "finally",
    "however",
    "therefore",
    "moreover",
    "additionally",
    "furthermore",
    "consequently",
    "meanwhile",
    "afterwards",
];

const INTRO_MARKERS: &[&str] = &["to begin", "first", "let me start", "i will", "i would like"];

const CONCLUSION_MARKERS: &[&str] = &[
    "in conclusion",
    "to conclude",
    "in summary",
    "to sum up",
    "overall",
    "finally",
];

/// Minimum trimmed length for analyzable text.
pub const MIN_TEXT_LENGTH: usize = 10;

#[derive(Debug, Deserialize)]
pub struct TextStructureRequest {
    pub text: String,
}

pub(crate) fn validate_text(text: &str) -> Result<()> {
    if text.trim().len() < MIN_TEXT_LENGTH {
        return Err(Error::InvalidArgument(
            "text is too short for analysis; provide a more detailed response".into(),
        ));
    }
    Ok(())
}

/// Pure structural analysis; also used by the answer synthesis task on the
/// transcript.
pub(crate) fn analyze_structure(text: &str) -> TextStructureResult {
    let text = text.trim();
    let lower = text.to_lowercase();

    let paragraphs: Vec<&str> = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    let paragraph_count = paragraphs.len();
    let avg_paragraph_length = if paragraph_count == 0 {
        0
    } else {
        paragraphs
            .iter()
            .map(|p| p.split_whitespace().count())
            .sum::<usize>()
            / paragraph_count
    };

    let transition_words = lower
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| TRANSITION_WORDS.contains(w))
        .count();

    let first_paragraph = paragraphs.first().map(|p| p.to_lowercase()).unwrap_or_default();
    let last_paragraph = paragraphs.last().map(|p| p.to_lowercase()).unwrap_or_default();
    let has_intro = INTRO_MARKERS.iter().any(|m| first_paragraph.contains(m));
    let has_conclusion = CONCLUSION_MARKERS.iter().any(|m| last_paragraph.contains(m));

    let sentences: Vec<&str> = SENTENCE_SPLIT
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let mut buckets = [false; 3];
    for sentence in &sentences {
        let words = sentence.split_whitespace().count();
        let bucket = if words < 8 {
            0
        } else if words < 20 {
            1
        } else {
            2
        };
        buckets[bucket] = true;
    }
    let sentence_variety = buckets.iter().filter(|b| **b).count();

    let details = StructureDetails {
        paragraph_count,
        avg_paragraph_length,
        transition_words,
        has_intro,
        has_conclusion,
        sentence_variety,
    };

    let mut score = 0.0;
    if paragraph_count >= 2 {
        score += 25.0;
    }
    score += (transition_words.min(4) as f64 / 4.0) * 25.0;
    if has_intro {
        score += 15.0;
    }
    if has_conclusion {
        score += 15.0;
    }
    score += (sentence_variety as f64 / 3.0) * 20.0;

    TextStructureResult {
        prediction_score: score,
        binary_prediction: if score >= 50.0 { 1 } else { 0 },
        output_text: text.to_string(),
        details,
    }
}

/// Classifies whether free text reads as a structured answer.
pub struct TextStructureTask;

#[async_trait]
impl Task for TextStructureTask {
    fn kind(&self) -> TaskKind {
        TaskKind::TextStructure
    }

    fn validate_input(&self, input: &TaskInput) -> Result<()> {
        let request: TextStructureRequest = input.decode()?;
        validate_text(&request.text)
    }

    async fn run(&self, ctx: TaskContext) -> Result<serde_json::Value> {
        let request: TextStructureRequest = ctx.input.decode()?;
        validate_text(&request.text)?;
        let result = analyze_structure(&request.text);
        serde_json::to_value(result).map_err(|e| Error::Internal(e.to_string()))
    }

    fn decode_result(&self, raw: &serde_json::Value) -> Result<serde_json::Value> {
        crate::decode_as::<TextStructureResult>("text_structure", raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STRUCTURED: &str = "To begin, I want to describe the project I led last year.\n\n\
        First, we gathered requirements from every team. Then we built a prototype that the \
        stakeholders could try within two weeks. However, the initial feedback showed gaps.\n\n\
        In conclusion, iterating early saved us months of rework. Overall it was a success.";

    const RAMBLING: &str = "we did stuff and it worked out fine and everyone was happy and \
        that was that and nothing else happened really";

    #[test]
    fn test_structured_text_scores_high() {
        let result = analyze_structure(STRUCTURED);
        assert_eq!(result.binary_prediction, 1);
        assert!(result.prediction_score >= 50.0);
        assert!(result.details.paragraph_count >= 2);
        assert!(result.details.has_intro);
        assert!(result.details.has_conclusion);
        assert!(result.details.transition_words >= 2);
    }

    #[test]
    fn test_rambling_text_scores_low() {
        let result = analyze_structure(RAMBLING);
        assert_eq!(result.binary_prediction, 0);
        assert!(result.prediction_score < 50.0);
        assert!(!result.details.has_intro);
        assert!(!result.details.has_conclusion);
    }

    #[test]
    fn test_short_text_is_rejected() {
        let input = TaskInput::new(serde_json::json!({ "text": "  hi   " }));
        let result = TextStructureTask.validate_input(&input);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_run_produces_decodable_result() {
        let input = TaskInput::new(serde_json::json!({ "text": STRUCTURED }));
        let raw = TextStructureTask.run(TaskContext::root(input)).await.unwrap();
        TextStructureTask.decode_result(&raw).unwrap();
    }
}

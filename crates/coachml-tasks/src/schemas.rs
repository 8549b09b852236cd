//! Typed result structures for each task kind.
//!
//! These are the contracts a stored result must decode into before a job is
//! reported Completed.

use serde::{Deserialize, Serialize};

/// Audio sentiment label as reported by the transcription provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

/// Sentiment analysis for one transcript segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub text: String,
    pub sentiment: SentimentLabel,
    /// Confidence score 0.0-1.0.
    pub confidence: f64,
    /// Start time in milliseconds.
    pub start: u64,
    /// End time in milliseconds.
    pub end: u64,
}

/// Timestamp of one keyword occurrence, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampData {
    pub start: u64,
    pub end: u64,
}

/// An auto-highlighted keyword or phrase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightData {
    pub text: String,
    /// Importance ranking 0-1.
    pub rank: f64,
    /// Number of occurrences.
    pub count: u32,
    #[serde(default)]
    pub timestamps: Vec<TimestampData>,
}

/// IAB category label with relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IabLabel {
    pub label: String,
    /// Relevance score 0-1.
    pub relevance: f64,
}

/// IAB topic detection results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IabResult {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub labels: Vec<IabLabel>,
}

/// Result of the audio sentiment task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioSentimentResult {
    #[serde(default)]
    pub sentiment_analysis: Vec<SentimentResult>,
    #[serde(default)]
    pub highlights: Vec<HighlightData>,
    #[serde(default)]
    pub iab_results: IabResult,
    #[serde(default)]
    pub clip_length_seconds: f64,
}

/// Big Five trait scores, each 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BigFiveScores {
    /// Openness.
    pub o: f64,
    /// Conscientiousness.
    pub c: f64,
    /// Extraversion.
    pub e: f64,
    /// Agreeableness.
    pub a: f64,
    /// Neuroticism.
    pub n: f64,
}

/// Result of the Big Five feedback task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BigFiveFeedback {
    pub scores: BigFiveScores,
    pub feedback: Vec<String>,
    pub disclaimer: String,
}

/// Metrics behind a text structure verdict.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureDetails {
    pub paragraph_count: usize,
    /// Average paragraph length in words.
    pub avg_paragraph_length: usize,
    pub transition_words: usize,
    pub has_intro: bool,
    pub has_conclusion: bool,
    /// Distinct sentence-length buckets present (0-3).
    pub sentence_variety: usize,
}

/// Result of the text structure task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStructureResult {
    /// 0-100.
    pub prediction_score: f64,
    /// 1 if the text reads as structured, else 0.
    pub binary_prediction: u8,
    pub output_text: String,
    #[serde(default)]
    pub details: StructureDetails,
}

/// STAR component assigned to one sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StarCategory {
    Situation,
    Task,
    Action,
    Result,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarClassification {
    pub sentence: String,
    pub category: StarCategory,
}

/// Percentage breakdown of STAR components across the answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StarPercentages {
    pub situation: f64,
    pub task: f64,
    pub action: f64,
    pub result: f64,
}

/// Result of the STAR feedback task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarEvaluation {
    pub fulfilled_star: bool,
    pub percentages: StarPercentages,
    pub classifications: Vec<StarClassification>,
    pub feedback: Vec<String>,
}

/// One segment of the answer timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// Start time in milliseconds.
    pub start: u64,
    /// End time in milliseconds.
    pub end: u64,
    pub audio_sentiment: SentimentLabel,
}

/// Feedback for one competency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetencyFeedback {
    pub score: f64,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub areas_for_improvement: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Competency feedback across the whole answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallCompetencyFeedback {
    pub communication_clarity: CompetencyFeedback,
    pub confidence: CompetencyFeedback,
    pub engagement: CompetencyFeedback,
    pub overall_score: f64,
    pub summary: String,
    #[serde(default)]
    pub key_recommendations: Vec<String>,
}

/// Result of the answer synthesis task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerEvaluation {
    #[serde(default)]
    pub timeline: Vec<TimelineEntry>,
    /// 1 if the transcript reads as structured, else 0.
    pub is_structured: u8,
    /// 0-100.
    pub prediction_score: f64,
    pub overall_sentiment: SentimentLabel,
    #[serde(default)]
    pub top_five_keywords: Vec<HighlightData>,
    pub transcript: String,
    pub big_five: BigFiveScores,
    pub competency_feedback: OverallCompetencyFeedback,
    /// Overall score 0-100.
    pub aggregate_score: f64,
}

//! Answer synthesis: folds upstream audio analysis into a full evaluation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use coachml_core::{Error, JobId, Result, Task, TaskContext, TaskInput, TaskKind};

use crate::audio_sentiment::validate_media_url;
use crate::big_five::estimate_scores;
use crate::schemas::{
    AnswerEvaluation, AudioSentimentResult, CompetencyFeedback, HighlightData,
    OverallCompetencyFeedback, SentimentLabel, TimelineEntry,
};
use crate::text_structure::analyze_structure;

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateAnswerRequest {
    pub media_url: Url,
    /// Id of the audio analysis job whose result this step consumes. Present
    /// when submitted as a chain; informational, since the worker resolves
    /// dependency results before this task runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_job_id: Option<JobId>,
}

fn overall_sentiment(analysis: &AudioSentimentResult) -> SentimentLabel {
    let mut positive = 0usize;
    let mut negative = 0usize;
    let mut neutral = 0usize;
    for segment in &analysis.sentiment_analysis {
        match segment.sentiment {
            SentimentLabel::Positive => positive += 1,
            SentimentLabel::Negative => negative += 1,
            SentimentLabel::Neutral => neutral += 1,
        }
    }
    if positive > negative && positive > neutral {
        SentimentLabel::Positive
    } else if negative > positive && negative > neutral {
        SentimentLabel::Negative
    } else {
        SentimentLabel::Neutral
    }
}

fn top_keywords(analysis: &AudioSentimentResult, limit: usize) -> Vec<HighlightData> {
    let mut keywords = analysis.highlights.clone();
    keywords.sort_by(|a, b| b.rank.total_cmp(&a.rank));
    keywords.truncate(limit);
    keywords
}

fn competency(score: f64, strength: &str, area: &str, recommendation: &str) -> CompetencyFeedback {
    let score = score.clamp(0.0, 100.0);
    let mut feedback = CompetencyFeedback {
        score,
        strengths: Vec::new(),
        areas_for_improvement: Vec::new(),
        recommendations: Vec::new(),
    };
    if score >= 60.0 {
        feedback.strengths.push(strength.to_string());
    } else {
        feedback.areas_for_improvement.push(area.to_string());
        feedback.recommendations.push(recommendation.to_string());
    }
    feedback
}

fn build_competency_feedback(
    analysis: &AudioSentimentResult,
    structure_score: f64,
) -> OverallCompetencyFeedback {
    let segments = analysis.sentiment_analysis.len().max(1) as f64;
    let avg_confidence = analysis
        .sentiment_analysis
        .iter()
        .map(|s| s.confidence)
        .sum::<f64>()
        / segments;

    let positive_share = analysis
        .sentiment_analysis
        .iter()
        .filter(|s| s.sentiment == SentimentLabel::Positive)
        .count() as f64
        / segments;

    let communication_clarity = competency(
        structure_score,
        "Answer follows a clear, organized structure",
        "Answer structure is hard to follow",
        "Outline situation, actions, and results before recording",
    );
    let confidence = competency(
        avg_confidence * 100.0,
        "Speech is clear and confidently delivered",
        "Delivery comes across as hesitant",
        "Slow down and pause between points instead of trailing off",
    );
    let engagement = competency(
        (positive_share * 70.0) + (analysis.highlights.len().min(6) as f64 * 5.0),
        "Keeps an engaging, positive tone with memorable phrasing",
        "Tone stays flat through most of the answer",
        "Vary emphasis and highlight concrete wins to keep attention",
    );

    let overall_score =
        (communication_clarity.score + confidence.score + engagement.score) / 3.0;

    let key_recommendations: Vec<String> = [&communication_clarity, &confidence, &engagement]
        .iter()
        .flat_map(|c| c.recommendations.clone())
        .collect();

    let summary = format!(
        "Overall delivery scores {overall_score:.0}/100 across clarity, confidence, and engagement."
    );

    OverallCompetencyFeedback {
        communication_clarity,
        confidence,
        engagement,
        overall_score,
        summary,
        key_recommendations,
    }
}

pub(crate) fn synthesize(analysis: &AudioSentimentResult) -> AnswerEvaluation {
    let transcript = analysis
        .sentiment_analysis
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let timeline = analysis
        .sentiment_analysis
        .iter()
        .map(|s| TimelineEntry {
            start: s.start,
            end: s.end,
            audio_sentiment: s.sentiment,
        })
        .collect();

    let structure = analyze_structure(&transcript);
    let competency_feedback = build_competency_feedback(analysis, structure.prediction_score);
    let aggregate_score =
        (structure.prediction_score + competency_feedback.overall_score) / 2.0;

    AnswerEvaluation {
        timeline,
        is_structured: structure.binary_prediction,
        prediction_score: structure.prediction_score,
        overall_sentiment: overall_sentiment(analysis),
        top_five_keywords: top_keywords(analysis, 5),
        transcript,
        big_five: estimate_scores(&analysis.sentiment_analysis.iter().map(|s| s.text.clone()).collect::<Vec<_>>().join(" ")),
        competency_feedback,
        aggregate_score,
    }
}

/// Builds the final answer evaluation from the upstream audio analysis.
pub struct CreateAnswerTask;

#[async_trait]
impl Task for CreateAnswerTask {
    fn kind(&self) -> TaskKind {
        TaskKind::CreateAnswer
    }

    fn validate_input(&self, input: &TaskInput) -> Result<()> {
        let request: CreateAnswerRequest = input.decode()?;
        validate_media_url(&request.media_url)
    }

    async fn run(&self, ctx: TaskContext) -> Result<serde_json::Value> {
        let _request: CreateAnswerRequest = ctx.input.decode()?;

        let dependency = ctx
            .dependencies
            .first()
            .ok_or_else(|| Error::TaskFailed("missing upstream analysis result".into()))?;

        let analysis: AudioSentimentResult = serde_json::from_value(dependency.result.clone())
            .map_err(|e| {
                Error::Decode(format!(
                    "upstream result from job {} is not an audio analysis: {e}",
                    dependency.job_id
                ))
            })?;

        let evaluation = synthesize(&analysis);
        serde_json::to_value(evaluation).map_err(|e| Error::Internal(e.to_string()))
    }

    fn decode_result(&self, raw: &serde_json::Value) -> Result<serde_json::Value> {
        crate::decode_as::<AnswerEvaluation>("create_answer", raw)
    }
}

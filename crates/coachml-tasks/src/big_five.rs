//! Big Five personality feedback from trait scores.

use async_trait::async_trait;

use coachml_core::{Error, Result, Task, TaskContext, TaskInput, TaskKind};

use crate::schemas::{BigFiveFeedback, BigFiveScores};

const DISCLAIMER: &str = "Scores are indicative estimates derived from a single answer and \
should not be read as a clinical personality assessment.";

fn validate_scores(scores: &BigFiveScores) -> Result<()> {
    for (name, value) in [
        ("o", scores.o),
        ("c", scores.c),
        ("e", scores.e),
        ("a", scores.a),
        ("n", scores.n),
    ] {
        if !(0.0..=100.0).contains(&value) || !value.is_finite() {
            return Err(Error::InvalidArgument(format!(
                "trait score '{name}' must be between 0 and 100, got {value}"
            )));
        }
    }
    Ok(())
}

fn trait_feedback(name: &str, value: f64, low: &str, mid: &str, high: &str) -> String {
    let band = if value < 40.0 {
        low
    } else if value <= 70.0 {
        mid
    } else {
        high
    };
    format!("{name} ({value:.0}): {band}")
}

pub(crate) fn build_feedback(scores: &BigFiveScores) -> Vec<String> {
    vec![
        trait_feedback(
            "Openness",
            scores.o,
            "answers lean on familiar approaches; try exploring alternative angles",
            "balances proven methods with new ideas",
            "strong curiosity and willingness to explore novel approaches",
        ),
        trait_feedback(
            "Conscientiousness",
            scores.c,
            "responses could be more organized; outline key points before answering",
            "generally organized with room for tighter follow-through",
            "highly structured and dependable in how points are laid out",
        ),
        trait_feedback(
            "Extraversion",
            scores.e,
            "delivery is reserved; practice projecting energy when presenting",
            "comfortable engaging without dominating the conversation",
            "energetic, engaging delivery that holds attention",
        ),
        trait_feedback(
            "Agreeableness",
            scores.a,
            "consider acknowledging other perspectives more explicitly",
            "collaborative tone with occasional firmness",
            "warm, collaborative framing throughout",
        ),
        trait_feedback(
            "Neuroticism",
            scores.n,
            "composed under pressure",
            "mostly steady with occasional signs of tension",
            "noticeable tension; breathing pauses before answering may help",
        ),
    ]
}

/// Estimate trait scores from answer text. Used by the answer synthesis task
/// when no explicit scores are available.
pub(crate) fn estimate_scores(text: &str) -> BigFiveScores {
    let lower = text.to_lowercase();
    let words = lower.split_whitespace().count().max(1) as f64;

    let hits = |terms: &[&str]| -> f64 {
        terms
            .iter()
            .map(|t| lower.matches(t).count())
            .sum::<usize>() as f64
    };

    // Lexical densities scaled into a 0-100 band around a neutral midpoint.
    let scale = |density: f64| (50.0 + density * 2000.0).clamp(0.0, 100.0);

    BigFiveScores {
        o: scale(hits(&["idea", "imagine", "creative", "explore", "curious", "new"]) / words),
        c: scale(hits(&["plan", "organize", "detail", "deadline", "goal", "carefully"]) / words),
        e: scale(hits(&["team", "people", "talk", "present", "together", "energy"]) / words),
        a: scale(hits(&["help", "support", "agree", "listen", "thank", "we"]) / words),
        n: scale(hits(&["worried", "stress", "nervous", "afraid", "anxious", "pressure"]) / words),
    }
}

/// Generates personalized feedback from Big Five trait scores.
pub struct BigFiveTask;

#[async_trait]
impl Task for BigFiveTask {
    fn kind(&self) -> TaskKind {
        TaskKind::BigFive
    }

    fn validate_input(&self, input: &TaskInput) -> Result<()> {
        let scores: BigFiveScores = input.decode()?;
        validate_scores(&scores)
    }

    async fn run(&self, ctx: TaskContext) -> Result<serde_json::Value> {
        let scores: BigFiveScores = ctx.input.decode()?;
        validate_scores(&scores)?;

        let result = BigFiveFeedback {
            scores,
            feedback: build_feedback(&scores),
            disclaimer: DISCLAIMER.to_string(),
        };
        serde_json::to_value(result).map_err(|e| Error::Internal(e.to_string()))
    }

    fn decode_result(&self, raw: &serde_json::Value) -> Result<serde_json::Value> {
        crate::decode_as::<BigFiveFeedback>("big_five", raw)
    }
}

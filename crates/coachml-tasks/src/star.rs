//! STAR (situation/task/action/result) classification of answer text.

use async_trait::async_trait;

use coachml_core::{Error, Result, Task, TaskContext, TaskInput, TaskKind};

use crate::schemas::{StarCategory, StarClassification, StarEvaluation, StarPercentages};
use crate::text_structure::{TextStructureRequest, validate_text};

const SITUATION_TERMS: &[&str] = &[
    "when", "while", "during", "at the time", "situation", "faced", "encountered", "context",
    "last year", "previously",
];
const TASK_TERMS: &[&str] = &[
    "task", "goal", "objective", "responsible", "needed to", "had to", "required", "my role",
    "assigned",
];
const ACTION_TERMS: &[&str] = &[
    "i implemented",
    "i created",
    "i organized",
    "i led",
    "i developed",
    "i decided",
    "i coordinated",
    "i built",
    "took action",
    "i reached out",
];
const RESULT_TERMS: &[&str] = &[
    "result", "outcome", "achieved", "increased", "improved", "reduced", "learned", "delivered",
    "ultimately", "succeeded",
];

fn classify_sentence(sentence: &str) -> StarCategory {
    let lower = sentence.to_lowercase();
    let count = |terms: &[&str]| terms.iter().filter(|t| lower.contains(*t)).count();

    let scores = [
        (StarCategory::Situation, count(SITUATION_TERMS)),
        (StarCategory::Task, count(TASK_TERMS)),
        (StarCategory::Action, count(ACTION_TERMS)),
        (StarCategory::Result, count(RESULT_TERMS)),
    ];

    scores
        .into_iter()
        .filter(|(_, score)| *score > 0)
        .max_by_key(|(_, score)| *score)
        .map(|(category, _)| category)
        .unwrap_or(StarCategory::Other)
}

pub(crate) fn evaluate_star(text: &str) -> StarEvaluation {
    let sentences: Vec<&str> = text
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let classifications: Vec<StarClassification> = sentences
        .iter()
        .map(|s| StarClassification {
            sentence: s.to_string(),
            category: classify_sentence(s),
        })
        .collect();

    let total = classifications.len().max(1) as f64;
    let share = |category: StarCategory| -> f64 {
        let count = classifications
            .iter()
            .filter(|c| c.category == category)
            .count() as f64;
        (count / total) * 100.0
    };

    let percentages = StarPercentages {
        situation: share(StarCategory::Situation),
        task: share(StarCategory::Task),
        action: share(StarCategory::Action),
        result: share(StarCategory::Result),
    };

    let mut feedback = Vec::new();
    for (name, value, hint) in [
        ("situation", percentages.situation, "set the scene: when and where did this happen?"),
        ("task", percentages.task, "state what you were responsible for achieving"),
        ("action", percentages.action, "describe the concrete steps you personally took"),
        ("result", percentages.result, "quantify the outcome of your actions"),
    ] {
        if value == 0.0 {
            feedback.push(format!("Missing the {name} component: {hint}."));
        }
    }
    let fulfilled_star = feedback.is_empty();
    if fulfilled_star {
        feedback.push("Answer covers all four STAR components.".to_string());
    }

    StarEvaluation {
        fulfilled_star,
        percentages,
        classifications,
        feedback,
    }
}

/// Scores how well answer text follows the STAR method.
pub struct StarFeedbackTask;

#[async_trait]
impl Task for StarFeedbackTask {
    fn kind(&self) -> TaskKind {
        TaskKind::StarFeedback
    }

    fn validate_input(&self, input: &TaskInput) -> Result<()> {
        let request: TextStructureRequest = input.decode()?;
        validate_text(&request.text)
    }

    async fn run(&self, ctx: TaskContext) -> Result<serde_json::Value> {
        let request: TextStructureRequest = ctx.input.decode()?;
        validate_text(&request.text)?;
        serde_json::to_value(evaluate_star(&request.text)).map_err(|e| Error::Internal(e.to_string()))
    }

    fn decode_result(&self, raw: &serde_json::Value) -> Result<serde_json::Value> {
        crate::decode_as::<StarEvaluation>("star_feedback", raw)
    }
}

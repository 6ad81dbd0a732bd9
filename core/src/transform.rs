//! Conversion of raw evaluation records into view models.

use chrono::DateTime;

use crate::types::{
    Evaluation, EvaluationResponse, EvaluationScenario, EvaluationScenarioResponse, Variant,
};

impl From<EvaluationResponse> for Evaluation {
    fn from(raw: EvaluationResponse) -> Self {
        Self {
            id: raw.id,
            created_at: raw.created_at.as_deref().map(format_date).unwrap_or_default(),
            user: raw.user,
            variants: raw.variants.into_iter().map(Variant::named).collect(),
            evaluation_type: raw.evaluation_type,
            evaluation_type_settings: raw.evaluation_type_settings,
            status: raw.status,
            testset: raw.testset,
            app_name: raw.app_name,
            llm_app_prompt_template: raw.llm_app_prompt_template,
        }
    }
}

impl EvaluationScenario {
    /// Attach a raw scenario to the evaluation it belongs to.
    pub fn from_response(raw: EvaluationScenarioResponse, evaluation: &Evaluation) -> Self {
        Self {
            id: raw.id,
            evaluation_id: raw.evaluation_id,
            inputs: raw.inputs,
            outputs: raw.outputs,
            vote: raw.vote,
            score: raw.score,
            correct_answer: raw.correct_answer,
            is_pinned: raw.is_pinned,
            note: raw.note,
            evaluation: evaluation.clone(),
        }
    }
}

/// Render an RFC 3339 timestamp as `YYYY-MM-DD HH:MM`; anything else is kept.
pub fn format_date(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => ts.format("%Y-%m-%d %H:%M").to_string(),
        Err(_) => raw.to_string(),
    }
}

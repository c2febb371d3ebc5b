//! Text-generation backed explanations
//!
//! Prompts are built from already-computed assessments, baselines and
//! histories. Student ids never leave the crate: cards are referred to by
//! their pseudonym and assessments carry no identifier at all.

use super::ExplanationProvider;
use crate::error::RiskError;
use crate::types::{ClassroomBaseline, RiskAssessment, StudentRiskCard};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// Instructions prepended to every prompt
const SYSTEM_GUIDANCE: &str = "You help teachers read classroom behavioral observations. \
The data below compares one student's movement and attention with their classroom's average. \
Write two to four plain sentences for a teacher. Do not speculate about causes, do not name or \
suggest any medical or psychological condition, state that this is not a diagnosis, and \
recommend consulting a school counselor or other qualified professional when concerns persist.";

/// Maximum assessments included in a question prompt
const MAX_HISTORY_IN_PROMPT: usize = 10;

/// Backend that turns a prompt into text.
///
/// Implementations own their transport and retry policy; unreachable
/// backends should report [`RiskError::UpstreamUnavailable`].
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, prompt: &str) -> Result<String, RiskError>;
}

/// [`ExplanationProvider`] that delegates to a [`TextGenerator`]
pub struct GenerativeExplainer {
    generator: Arc<dyn TextGenerator>,
}

impl GenerativeExplainer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub fn explanation_prompt(
        assessment: &RiskAssessment,
        baseline: &ClassroomBaseline,
    ) -> Result<String, RiskError> {
        let data = json!({
            "assessment": assessment_summary(assessment),
            "baseline": baseline_summary(baseline),
        });
        render_prompt("Explain this assessment.", &data)
    }

    pub fn recommendation_prompt(card: &StudentRiskCard) -> Result<String, RiskError> {
        let recent: Vec<Value> = card
            .recent_features
            .iter()
            .map(|f| {
                json!({
                    "timestamp": f.timestamp,
                    "movementIntensity": f.movement_intensity.score,
                    "movementStatus": f.movement_intensity.status,
                    "eventCount": f.movement_intensity.event_count,
                    "attentionRatio": f.attention_duration.ratio,
                    "attentionStatus": f.attention_duration.status,
                })
            })
            .collect();

        let data = json!({
            "student": card.anonymized_id,
            "currentRisk": assessment_summary(&card.current_risk),
            "recentFeatures": recent,
            "baseline": baseline_summary(&card.baseline),
        });
        render_prompt(
            "Suggest a next step for the teacher regarding this student.",
            &data,
        )
    }

    pub fn question_prompt(
        question: &str,
        history: &[RiskAssessment],
    ) -> Result<String, RiskError> {
        let history: Vec<Value> = history
            .iter()
            .take(MAX_HISTORY_IN_PROMPT)
            .map(assessment_summary)
            .collect();

        let data = json!({ "history": history });
        render_prompt(
            &format!(
                "Answer the teacher's question using only the assessment history (most recent first).\n\
                 Question: {}",
                question.trim()
            ),
            &data,
        )
    }
}

#[async_trait]
impl ExplanationProvider for GenerativeExplainer {
    fn name(&self) -> &'static str {
        self.generator.name()
    }

    async fn explain(
        &self,
        assessment: &RiskAssessment,
        baseline: &ClassroomBaseline,
    ) -> Result<String, RiskError> {
        let prompt = Self::explanation_prompt(assessment, baseline)?;
        self.generator.generate(&prompt).await
    }

    async fn recommend(&self, card: &StudentRiskCard) -> Result<String, RiskError> {
        let prompt = Self::recommendation_prompt(card)?;
        self.generator.generate(&prompt).await
    }

    async fn answer_question(
        &self,
        question: &str,
        history: &[RiskAssessment],
    ) -> Result<String, RiskError> {
        let prompt = Self::question_prompt(question, history)?;
        self.generator.generate(&prompt).await
    }
}

fn render_prompt(task: &str, data: &Value) -> Result<String, RiskError> {
    Ok(format!(
        "{SYSTEM_GUIDANCE}\n\n{task}\n\nData:\n{}",
        serde_json::to_string_pretty(data)?
    ))
}

fn assessment_summary(assessment: &RiskAssessment) -> Value {
    json!({
        "timestamp": assessment.timestamp,
        "riskLevel": assessment.risk_level,
        "riskScore": assessment.risk_score,
        "riskCategory": assessment.risk_category,
        "riskFactors": assessment.risk_factors,
        "recommendation": assessment.recommendation,
        "deviations": assessment.deviations,
        "confidence": assessment.confidence,
    })
}

fn baseline_summary(baseline: &ClassroomBaseline) -> Value {
    json!({
        "averageMovementIntensity": baseline.average_movement_intensity,
        "averageAttentionRatio": baseline.average_attention_ratio,
        "studentCount": baseline.student_count,
        "timeWindow": baseline.time_window,
        "usingDefaults": baseline.is_cold_start(),
    })
}

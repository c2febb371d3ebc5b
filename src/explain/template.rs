//! Deterministic explanation templates
//!
//! Text is composed from values the scoring engine already produced: the
//! level, score, risk factors and fixed recommendation. No backend is involved,
//! so these never fail.

use super::{with_disclaimer, ExplanationProvider};
use crate::error::RiskError;
use crate::types::{ClassroomBaseline, RiskAssessment, RiskLevel, StudentRiskCard};
use async_trait::async_trait;

/// Number of assessments summarized when answering a question
const HISTORY_SUMMARY_LEN: usize = 5;

#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateExplainer;

impl TemplateExplainer {
    pub fn new() -> Self {
        Self
    }

    pub fn explanation(&self, assessment: &RiskAssessment, baseline: &ClassroomBaseline) -> String {
        let mut text = format!(
            "{} risk indicator (score {:.0}/100) compared with the classroom baseline.",
            level_label(assessment.risk_level),
            assessment.risk_score
        );

        if assessment.risk_factors.is_empty() {
            text.push_str(" No notable deviations from the classroom baseline were observed.");
        } else {
            text.push_str(" Observed: ");
            text.push_str(&assessment.risk_factors.join("; "));
            text.push('.');
        }

        if baseline.is_cold_start() {
            text.push_str(
                " No classroom data was available yet, so the comparison uses default baseline values.",
            );
        }

        text.push(' ');
        text.push_str(&assessment.recommendation);
        with_disclaimer(text)
    }

    pub fn recommendation(&self, card: &StudentRiskCard) -> String {
        let risk = &card.current_risk;
        let mut text = format!(
            "{}: {} risk indicator (score {:.0}/100) from {} recent observation{}.",
            card.anonymized_id,
            level_label(risk.risk_level),
            risk.risk_score,
            card.recent_features.len(),
            if card.recent_features.len() == 1 { "" } else { "s" }
        );
        if !risk.risk_factors.is_empty() {
            text.push_str(" Main factors: ");
            text.push_str(&risk.risk_factors.join("; "));
            text.push('.');
        }
        text.push(' ');
        text.push_str(&risk.recommendation);
        with_disclaimer(text)
    }

    /// Summary of `history` in place of a free-form answer.
    ///
    /// `history` is expected most-recent-first.
    pub fn answer(&self, question: &str, history: &[RiskAssessment]) -> String {
        let Some(latest) = history.first() else {
            return with_disclaimer(format!(
                "No assessments are available yet to answer \"{}\". \
                 Check back once the student has been observed in class.",
                question.trim()
            ));
        };

        let recent = &history[..history.len().min(HISTORY_SUMMARY_LEN)];
        let highest = recent
            .iter()
            .map(|a| a.risk_level)
            .max()
            .unwrap_or(latest.risk_level);
        let elevated = recent
            .iter()
            .filter(|a| a.risk_level != RiskLevel::Low)
            .count();

        let mut text = format!(
            "Automated answers are unavailable, so here is a summary of the {} most recent assessment{}. \
             Latest: {} risk (score {:.0}/100) at {}. Highest: {}. Elevated (medium or high) in {} of {}.",
            recent.len(),
            if recent.len() == 1 { "" } else { "s" },
            level_label(latest.risk_level),
            latest.risk_score,
            latest.timestamp.format("%Y-%m-%d %H:%M UTC"),
            level_label(highest),
            elevated,
            recent.len()
        );
        if !latest.risk_factors.is_empty() {
            text.push_str(" Latest factors: ");
            text.push_str(&latest.risk_factors.join("; "));
            text.push('.');
        }
        text.push(' ');
        text.push_str(&latest.recommendation);
        with_disclaimer(text)
    }
}

#[async_trait]
impl ExplanationProvider for TemplateExplainer {
    fn name(&self) -> &'static str {
        "template"
    }

    async fn explain(
        &self,
        assessment: &RiskAssessment,
        baseline: &ClassroomBaseline,
    ) -> Result<String, RiskError> {
        Ok(self.explanation(assessment, baseline))
    }

    async fn recommend(&self, card: &StudentRiskCard) -> Result<String, RiskError> {
        Ok(self.recommendation(card))
    }

    async fn answer_question(
        &self,
        question: &str,
        history: &[RiskAssessment],
    ) -> Result<String, RiskError> {
        Ok(self.answer(question, history))
    }
}

fn level_label(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::High => "High",
        RiskLevel::Medium => "Medium",
        RiskLevel::Low => "Low",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explain::DISCLAIMER;
    use crate::features::test_support::{sample, simple};
    use crate::scoring::RiskScoringEngine;
    use crate::types::{AttentionStatus, TimeWindow};
    use chrono::Utc;

    fn baseline(sample_count: u32) -> ClassroomBaseline {
        ClassroomBaseline {
            classroom_id: "room".to_string(),
            average_movement_intensity: 0.5,
            average_attention_ratio: 0.6,
            student_count: if sample_count == 0 { 0 } else { 3 },
            sample_count,
            calculated_at: Utc::now(),
            time_window: TimeWindow::MEDIUM,
        }
    }

    fn high_risk() -> RiskAssessment {
        let features = sample("s1", "sess", 0, 0.9, 25, 0.3, AttentionStatus::BelowThreshold);
        RiskScoringEngine::default().assess(&features, &baseline(12)).unwrap()
    }

    fn low_risk() -> RiskAssessment {
        RiskScoringEngine::default()
            .assess(&simple("s1", "sess", 0, 0.4, 0.65), &baseline(12))
            .unwrap()
    }

    #[test]
    fn test_explanation_lists_factors_and_recommendation() {
        let assessment = high_risk();
        let text = TemplateExplainer.explanation(&assessment, &baseline(12));

        assert!(text.starts_with("High risk indicator (score 95/100)"));
        for factor in &assessment.risk_factors {
            assert!(text.contains(factor.as_str()));
        }
        assert!(text.contains(&assessment.recommendation));
        assert!(text.ends_with(DISCLAIMER));
    }

    #[test]
    fn test_low_risk_still_carries_disclaimer() {
        let text = TemplateExplainer.explanation(&low_risk(), &baseline(12));
        assert!(text.contains("No notable deviations"));
        assert!(text.contains("not a diagnosis"));
    }

    #[test]
    fn test_cold_start_is_mentioned() {
        let text = TemplateExplainer.explanation(&low_risk(), &baseline(0));
        assert!(text.contains("default baseline values"));
    }

    #[test]
    fn test_answer_without_history() {
        let text = TemplateExplainer.answer("Is s1 doing ok?", &[]);
        assert!(text.contains("No assessments are available yet"));
        assert!(text.ends_with(DISCLAIMER));
    }

    #[test]
    fn test_answer_summarizes_recent_history() {
        let history = vec![low_risk(), high_risk(), low_risk()];
        let text = TemplateExplainer.answer("How has s1 been?", &history);

        assert!(text.contains("3 most recent assessments"));
        assert!(text.contains("Latest: Low risk"));
        assert!(text.contains("Highest: High"));
        assert!(text.contains("Elevated (medium or high) in 1 of 3"));
    }
}

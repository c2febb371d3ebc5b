//! Risk scoring
//!
//! Scores one student's sample against a classroom baseline. The score is
//! additive on a 0-100 scale:
//!
//! ```text
//! movement  = min((score - baseline_movement) * 100, 50)   if positive
//! attention = min((baseline_attention - ratio) * 100, 50)  if positive
//! bonuses   = +10 if event_count > 20, +15 if attention is below_threshold
//! risk      = clamp(movement + attention + bonuses, 0, 100)
//! ```
//!
//! Moving less or attending more than the classroom is never penalized.
//! Scoring is pure: the same sample and baseline always produce the same
//! assessment, so an engine can be shared freely across tasks.

use crate::config::ThresholdConfig;
use crate::error::RiskError;
use crate::features::{self, round_to};
use crate::types::{
    AttentionStatus, BehavioralFeatures, ClassroomBaseline, RiskAssessment, RiskCategory,
    RiskLevel,
};

/// Cap on the points a single deviation can contribute
const MAX_DEVIATION_POINTS: f64 = 50.0;

/// Event count above which the frequent-movement bonus applies
const EVENT_BONUS_MIN_COUNT: u32 = 20;
const EVENT_BONUS_POINTS: f64 = 10.0;
const BELOW_THRESHOLD_BONUS_POINTS: f64 = 15.0;

// Secondary thresholds that only produce risk factor descriptions
const MOVEMENT_FACTOR_DEVIATION: f64 = 0.2;
const FREQUENT_EVENTS_FACTOR_COUNT: u32 = 15;
const ATTENTION_FACTOR_DEVIATION: f64 = 0.15;

pub const HIGH_RISK_RECOMMENDATION: &str = "Patterns differ markedly from the classroom baseline. \
Consider consulting a school counselor or another qualified professional soon to review these observations. \
This indicator is not a diagnosis.";

pub const MEDIUM_RISK_RECOMMENDATION: &str = "Some patterns differ from the classroom baseline. \
Continue observation and schedule a follow-up review within 2 weeks; consult a school counselor if the pattern persists. \
This indicator is not a diagnosis.";

pub const LOW_RISK_RECOMMENDATION: &str = "Observed patterns are within the classroom's usual range. \
Continue standard classroom monitoring.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FactorKind {
    Movement,
    Attention,
}

/// Stateless scorer parameterized by the configured cutoffs
#[derive(Debug, Clone, Default)]
pub struct RiskScoringEngine {
    thresholds: ThresholdConfig,
}

impl RiskScoringEngine {
    pub fn new(thresholds: ThresholdConfig) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    /// Score `features` against `baseline`.
    ///
    /// Fails only when the sample or baseline holds values that cannot be
    /// scored (see [`features::validate`]).
    pub fn assess(
        &self,
        features: &BehavioralFeatures,
        baseline: &ClassroomBaseline,
    ) -> Result<RiskAssessment, RiskError> {
        features::validate(features)?;
        validate_baseline(baseline)?;

        let risk_score = self.score(features, baseline);
        let risk_level = self.classify(risk_score);
        let (risk_factors, risk_category) = risk_factors(features, baseline);

        Ok(RiskAssessment {
            student_id: features.student_id.clone(),
            session_id: features.session_id.clone(),
            timestamp: features.timestamp,
            risk_level,
            risk_score,
            risk_category,
            risk_factors,
            recommendation: recommendation_for(risk_level).to_string(),
            explanation: None,
            deviations: features::baseline_deviations(features, baseline),
            confidence: features::confidence(features, &self.thresholds),
        })
    }

    /// Risk score in [0, 100], rounded to 2 decimals
    pub fn score(&self, features: &BehavioralFeatures, baseline: &ClassroomBaseline) -> f64 {
        let movement = &features.movement_intensity;
        let attention = &features.attention_duration;

        let movement_dev = movement.score - baseline.average_movement_intensity;
        let attention_dev = baseline.average_attention_ratio - attention.ratio;

        let mut total = deviation_points(movement_dev) + deviation_points(attention_dev);
        if movement.event_count > EVENT_BONUS_MIN_COUNT {
            total += EVENT_BONUS_POINTS;
        }
        if attention.status == AttentionStatus::BelowThreshold {
            total += BELOW_THRESHOLD_BONUS_POINTS;
        }

        round_to(total.clamp(0.0, 100.0), 2)
    }

    /// Map a score onto a level using the configured cutoffs (inclusive)
    pub fn classify(&self, score: f64) -> RiskLevel {
        if score >= self.thresholds.high_risk_cutoff {
            RiskLevel::High
        } else if score >= self.thresholds.medium_risk_cutoff {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Points for a deviation where positive means "worse than the classroom"
fn deviation_points(deviation: f64) -> f64 {
    if deviation > 0.0 {
        (deviation * 100.0).min(MAX_DEVIATION_POINTS)
    } else {
        0.0
    }
}

fn validate_baseline(baseline: &ClassroomBaseline) -> Result<(), RiskError> {
    let values = [
        baseline.average_movement_intensity,
        baseline.average_attention_ratio,
    ];
    if values.iter().any(|v| !v.is_finite() || !(0.0..=1.0).contains(v)) {
        return Err(RiskError::InvalidFeatureData(format!(
            "baseline for {} must hold averages in [0, 1]",
            baseline.classroom_id
        )));
    }
    Ok(())
}

/// Human-readable factors in a fixed order, plus the category they imply
fn risk_factors(
    features: &BehavioralFeatures,
    baseline: &ClassroomBaseline,
) -> (Vec<String>, RiskCategory) {
    let movement = &features.movement_intensity;
    let attention = &features.attention_duration;
    // Compared at the precision deviations are reported with
    let movement_dev = round_to(movement.score - baseline.average_movement_intensity, 3);
    let attention_dev = round_to(baseline.average_attention_ratio - attention.ratio, 3);

    let mut factors: Vec<(FactorKind, String)> = Vec::new();

    if movement_dev > MOVEMENT_FACTOR_DEVIATION {
        factors.push((
            FactorKind::Movement,
            format!(
                "Movement intensity {:.0} points above classroom baseline",
                movement_dev * 100.0
            ),
        ));
    }
    if movement.event_count > FREQUENT_EVENTS_FACTOR_COUNT {
        factors.push((
            FactorKind::Movement,
            format!(
                "Frequent movement events ({} in {})",
                movement.event_count, movement.time_window
            ),
        ));
    }
    if attention_dev > ATTENTION_FACTOR_DEVIATION {
        factors.push((
            FactorKind::Attention,
            format!(
                "Attention ratio {:.0} points below classroom baseline",
                attention_dev * 100.0
            ),
        ));
    }
    if attention.status == AttentionStatus::BelowThreshold {
        factors.push((
            FactorKind::Attention,
            format!(
                "Attention below threshold ({:.2} vs {:.2})",
                attention.ratio, attention.threshold
            ),
        ));
    }

    let has_movement = factors.iter().any(|(k, _)| *k == FactorKind::Movement);
    let has_attention = factors.iter().any(|(k, _)| *k == FactorKind::Attention);
    let category = match (has_movement, has_attention) {
        (true, true) => RiskCategory::Combined,
        (true, false) => RiskCategory::Movement,
        (false, true) => RiskCategory::Attention,
        (false, false) => RiskCategory::Normal,
    };

    let mut descriptions: Vec<String> = factors.into_iter().map(|(_, d)| d).collect();
    if descriptions.len() >= 2 {
        descriptions.push("Multiple behavioral indicators observed together".to_string());
    }

    (descriptions, category)
}

/// Fixed, non-diagnostic guidance for a risk level
pub fn recommendation_for(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::High => HIGH_RISK_RECOMMENDATION,
        RiskLevel::Medium => MEDIUM_RISK_RECOMMENDATION,
        RiskLevel::Low => LOW_RISK_RECOMMENDATION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::{sample, simple};
    use crate::types::TimeWindow;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn baseline(movement: f64, attention: f64) -> ClassroomBaseline {
        ClassroomBaseline {
            classroom_id: "room-12".to_string(),
            average_movement_intensity: movement,
            average_attention_ratio: attention,
            student_count: 24,
            sample_count: 96,
            calculated_at: Utc::now(),
            time_window: TimeWindow::MEDIUM,
        }
    }

    fn engine() -> RiskScoringEngine {
        RiskScoringEngine::default()
    }

    #[test]
    fn test_scenario_high_risk_combined() {
        let features = sample("s1", "sess", 0, 0.9, 25, 0.3, AttentionStatus::BelowThreshold);
        let assessment = engine().assess(&features, &baseline(0.5, 0.6)).unwrap();

        // movement 40 + 10 bonus, attention 30 + 15 bonus
        assert_eq!(assessment.risk_score, 95.0);
        assert_eq!(assessment.risk_level, RiskLevel::High);
        assert_eq!(assessment.risk_category, RiskCategory::Combined);
        assert_eq!(
            assessment.risk_factors,
            vec![
                "Movement intensity 40 points above classroom baseline".to_string(),
                "Frequent movement events (25 in 120s)".to_string(),
                "Attention ratio 30 points below classroom baseline".to_string(),
                "Attention below threshold (0.30 vs 0.60)".to_string(),
                "Multiple behavioral indicators observed together".to_string(),
            ]
        );
        assert_eq!(assessment.recommendation, HIGH_RISK_RECOMMENDATION);
        assert!(assessment.explanation.is_none());
    }

    #[test]
    fn test_scenario_below_baseline_is_not_penalized() {
        let features = sample("s2", "sess", 0, 0.4, 12, 0.65, AttentionStatus::AboveThreshold);
        let assessment = engine().assess(&features, &baseline(0.5, 0.6)).unwrap();

        assert_eq!(assessment.risk_score, 0.0);
        assert_eq!(assessment.risk_level, RiskLevel::Low);
        assert_eq!(assessment.risk_category, RiskCategory::Normal);
        assert!(assessment.risk_factors.is_empty());
        assert_eq!(assessment.recommendation, LOW_RISK_RECOMMENDATION);
    }

    #[test]
    fn test_level_boundaries() {
        let e = engine();
        assert_eq!(e.classify(100.0), RiskLevel::High);
        assert_eq!(e.classify(70.0), RiskLevel::High);
        assert_eq!(e.classify(69.9), RiskLevel::Medium);
        assert_eq!(e.classify(40.0), RiskLevel::Medium);
        assert_eq!(e.classify(39.9), RiskLevel::Low);
        assert_eq!(e.classify(0.0), RiskLevel::Low);
    }

    #[test]
    fn test_custom_cutoffs() {
        let e = RiskScoringEngine::new(ThresholdConfig {
            high_risk_cutoff: 80.0,
            medium_risk_cutoff: 30.0,
            ..ThresholdConfig::default()
        });
        assert_eq!(e.classify(75.0), RiskLevel::Medium);
        assert_eq!(e.classify(30.0), RiskLevel::Medium);
        assert_eq!(e.classify(29.99), RiskLevel::Low);
    }

    #[test]
    fn test_deviation_contribution_is_capped() {
        // movement deviation 0.9 would be 90 points, capped at 50
        let features = simple("s", "sess", 0, 1.0, 0.6);
        let score = engine().score(&features, &baseline(0.1, 0.6));
        assert_eq!(score, 50.0);
    }

    #[test]
    fn test_score_is_clamped_to_100() {
        let features = sample("s", "sess", 0, 1.0, 40, 0.0, AttentionStatus::BelowThreshold);
        let score = engine().score(&features, &baseline(0.0, 1.0));
        assert_eq!(score, 100.0);
    }

    #[test]
    fn test_movement_only_category() {
        let features = sample("s", "sess", 0, 0.75, 18, 0.6, AttentionStatus::AboveThreshold);
        let assessment = engine().assess(&features, &baseline(0.5, 0.6)).unwrap();

        assert_eq!(assessment.risk_category, RiskCategory::Movement);
        assert_eq!(assessment.risk_score, 25.0);
        assert_eq!(assessment.risk_level, RiskLevel::Low);
        // two movement factors plus the composite marker
        assert_eq!(assessment.risk_factors.len(), 3);
    }

    #[test]
    fn test_attention_only_category() {
        let features = sample("s", "sess", 0, 0.5, 3, 0.4, AttentionStatus::Normal);
        let assessment = engine().assess(&features, &baseline(0.5, 0.6)).unwrap();

        assert_eq!(assessment.risk_category, RiskCategory::Attention);
        assert_eq!(assessment.risk_score, 20.0);
        assert_eq!(
            assessment.risk_factors,
            vec!["Attention ratio 20 points below classroom baseline".to_string()]
        );
    }

    #[test]
    fn test_medium_recommendation_mentions_follow_up() {
        let features = sample("s", "sess", 0, 0.8, 22, 0.6, AttentionStatus::AboveThreshold);
        let assessment = engine().assess(&features, &baseline(0.5, 0.6)).unwrap();

        assert_eq!(assessment.risk_score, 40.0);
        assert_eq!(assessment.risk_level, RiskLevel::Medium);
        assert!(assessment.recommendation.contains("2 weeks"));
    }

    #[test]
    fn test_recommendations_never_diagnose() {
        for level in [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High] {
            let text = recommendation_for(level).to_lowercase();
            assert!(!text.contains("adhd"));
            assert!(!text.contains("autism"));
            assert!(!text.contains("disorder"));
        }
        assert!(HIGH_RISK_RECOMMENDATION.contains("not a diagnosis"));
    }

    #[test]
    fn test_assessment_is_deterministic() {
        let features = sample("s", "sess", 0, 0.83, 19, 0.44, AttentionStatus::BelowThreshold);
        let b = baseline(0.52, 0.61);

        let first = engine().assess(&features, &b).unwrap();
        let second = engine().assess(&features, &b).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.timestamp, features.timestamp);
    }

    #[test]
    fn test_invalid_input_is_rejected() {
        let mut features = simple("s", "sess", 0, 0.5, 0.6);
        features.attention_duration.ratio = 2.0;
        assert!(matches!(
            engine().assess(&features, &baseline(0.5, 0.6)),
            Err(RiskError::InvalidFeatureData(_))
        ));

        let features = simple("s", "sess", 0, 0.5, 0.6);
        assert!(engine().assess(&features, &baseline(f64::NAN, 0.6)).is_err());
    }

    #[test]
    fn test_assessment_carries_deviations_and_confidence() {
        let features = sample("s1", "sess", 0, 0.9, 25, 0.3, AttentionStatus::BelowThreshold);
        let assessment = engine().assess(&features, &baseline(0.5, 0.6)).unwrap();

        assert_eq!(assessment.deviations.movement, 0.4);
        assert_eq!(assessment.deviations.attention, -0.3);
        assert_eq!(assessment.confidence.movement, 0.9);
        assert_eq!(assessment.confidence.attention, 1.0);
    }

    #[test]
    fn test_factor_thresholds_are_strict() {
        // movement deviation exactly 0.2, attention deviation exactly 0.15
        let features = sample("s", "sess", 0, 0.8, 3, 0.45, AttentionStatus::Normal);
        let assessment = engine().assess(&features, &baseline(0.6, 0.6)).unwrap();

        assert_eq!(assessment.deviations.movement, 0.2);
        assert!(assessment.risk_factors.is_empty());
        assert_eq!(assessment.risk_category, RiskCategory::Normal);

        let features = sample("s", "sess", 0, 0.81, 3, 0.44, AttentionStatus::Normal);
        let assessment = engine().assess(&features, &baseline(0.6, 0.6)).unwrap();
        assert_eq!(assessment.risk_category, RiskCategory::Combined);
        assert_eq!(assessment.risk_factors.len(), 3);
    }

    #[test]
    fn test_configured_thresholds_change_confidence() {
        let features = sample("s", "sess", 0, 0.9, 25, 0.3, AttentionStatus::BelowThreshold);
        let tuned = RiskScoringEngine::new(ThresholdConfig {
            movement: 0.95,
            attention: 0.2,
            ..ThresholdConfig::default()
        });

        let default = engine().assess(&features, &baseline(0.5, 0.6)).unwrap();
        let adjusted = tuned.assess(&features, &baseline(0.5, 0.6)).unwrap();

        assert_eq!(default.confidence.movement, 0.9);
        assert_eq!(adjusted.confidence.movement, 0.6);
        assert_eq!(adjusted.confidence.attention, 0.7);
        assert_eq!(default.risk_score, adjusted.risk_score);
    }

    #[test]
    fn test_assessment_wire_format() {
        let features = sample("s1", "sess", 0, 0.9, 25, 0.3, AttentionStatus::BelowThreshold);
        let assessment = engine().assess(&features, &baseline(0.5, 0.6)).unwrap();
        let json = serde_json::to_value(&assessment).unwrap();

        assert_eq!(json["riskLevel"], "HIGH");
        assert_eq!(json["riskCategory"], "Combined");
        assert_eq!(json["riskScore"], 95.0);
        assert!(json["riskFactors"].is_array());
        assert!(json.get("explanation").is_none());
        assert_eq!(json["deviations"]["movementStatus"], "elevated");
    }
}

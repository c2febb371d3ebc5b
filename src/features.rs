//! Feature measurement helpers
//!
//! Status classification for extractor measurements, validation of incoming
//! samples, and the deviation and confidence metrics derived from a sample
//! and its classroom baseline.

use crate::config::ThresholdConfig;
use crate::error::RiskError;
use crate::types::{
    AttentionDeviationStatus, AttentionDuration, AttentionStatus, BaselineDeviations,
    BehavioralFeatures, ClassroomBaseline, Confidence, MovementDeviationStatus,
    MovementIntensity, MovementStatus, TimeWindow,
};

/// Fraction of the threshold above which a measurement still counts as normal
const NORMAL_BAND_FACTOR: f64 = 0.8;

/// Movement deviation above which a student is elevated relative to the class
const MOVEMENT_ELEVATED_DEVIATION: f64 = 0.2;

/// Attention deviation below which a student is significantly below the class
const ATTENTION_SIGNIFICANT_DEVIATION: f64 = 0.2;

/// Deviation band treated as "near the baseline"
const BASELINE_BAND: f64 = 0.1;

impl MovementIntensity {
    /// Build a measurement from a raw score, classifying it against `threshold`.
    ///
    /// `elevated` above the threshold, `normal` above 80% of it, `low` otherwise.
    pub fn from_score(
        score: f64,
        event_count: u32,
        time_window: TimeWindow,
        threshold: f64,
    ) -> Self {
        let score = round_to(score.clamp(0.0, 1.0), 3);
        Self {
            score,
            threshold,
            status: classify_movement(score, threshold),
            event_count,
            time_window,
        }
    }

    /// Measurement for a window with no usable pose data
    pub fn no_data(threshold: f64) -> Self {
        Self {
            score: 0.0,
            threshold,
            status: MovementStatus::NoData,
            event_count: 0,
            time_window: TimeWindow::ZERO,
        }
    }
}

impl AttentionDuration {
    /// Build a measurement from an on-task ratio, classifying it against `threshold`.
    ///
    /// `above_threshold` at or above the threshold, `normal` at or above 80% of
    /// it, `below_threshold` otherwise.
    pub fn from_ratio(
        ratio: f64,
        longest_focus: TimeWindow,
        average_focus: TimeWindow,
        time_window: TimeWindow,
        threshold: f64,
    ) -> Self {
        let ratio = round_to(ratio.clamp(0.0, 1.0), 3);
        Self {
            ratio,
            threshold,
            status: classify_attention(ratio, threshold),
            longest_focus_duration: longest_focus,
            average_focus_duration: average_focus,
            time_window,
        }
    }

    /// Measurement for a window with no usable head-pose data
    pub fn no_data(threshold: f64) -> Self {
        Self {
            ratio: 0.0,
            threshold,
            status: AttentionStatus::NoData,
            longest_focus_duration: TimeWindow::ZERO,
            average_focus_duration: TimeWindow::ZERO,
            time_window: TimeWindow::ZERO,
        }
    }
}

pub fn classify_movement(score: f64, threshold: f64) -> MovementStatus {
    if score > threshold {
        MovementStatus::Elevated
    } else if score > threshold * NORMAL_BAND_FACTOR {
        MovementStatus::Normal
    } else {
        MovementStatus::Low
    }
}

pub fn classify_attention(ratio: f64, threshold: f64) -> AttentionStatus {
    if ratio >= threshold {
        AttentionStatus::AboveThreshold
    } else if ratio >= threshold * NORMAL_BAND_FACTOR {
        AttentionStatus::Normal
    } else {
        AttentionStatus::BelowThreshold
    }
}

/// Reject samples that cannot be scored meaningfully.
///
/// Identifiers must be non-empty and every measured value finite and in [0, 1].
pub fn validate(features: &BehavioralFeatures) -> Result<(), RiskError> {
    if features.student_id.trim().is_empty() {
        return Err(RiskError::InvalidFeatureData(
            "studentId must not be empty".to_string(),
        ));
    }
    if features.session_id.trim().is_empty() {
        return Err(RiskError::InvalidFeatureData(
            "sessionId must not be empty".to_string(),
        ));
    }

    let movement = &features.movement_intensity;
    let attention = &features.attention_duration;
    check_unit("movementIntensity.score", movement.score)?;
    check_unit("movementIntensity.threshold", movement.threshold)?;
    check_unit("attentionDuration.ratio", attention.ratio)?;
    check_unit("attentionDuration.threshold", attention.threshold)?;
    Ok(())
}

fn check_unit(field: &str, value: f64) -> Result<(), RiskError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(RiskError::InvalidFeatureData(format!(
            "{field} must be a finite value in [0, 1], got {value}"
        )));
    }
    Ok(())
}

/// Compute signed deviations from the baseline with their status bands
pub fn baseline_deviations(
    features: &BehavioralFeatures,
    baseline: &ClassroomBaseline,
) -> BaselineDeviations {
    let movement =
        round_to(features.movement_intensity.score - baseline.average_movement_intensity, 3);
    let attention =
        round_to(features.attention_duration.ratio - baseline.average_attention_ratio, 3);

    BaselineDeviations {
        movement,
        movement_status: movement_deviation_status(movement),
        attention,
        attention_status: attention_deviation_status(attention),
    }
}

fn movement_deviation_status(deviation: f64) -> MovementDeviationStatus {
    if deviation > MOVEMENT_ELEVATED_DEVIATION {
        MovementDeviationStatus::Elevated
    } else if deviation > BASELINE_BAND {
        MovementDeviationStatus::AboveBaseline
    } else if deviation < -BASELINE_BAND {
        MovementDeviationStatus::BelowBaseline
    } else {
        MovementDeviationStatus::Normal
    }
}

fn attention_deviation_status(deviation: f64) -> AttentionDeviationStatus {
    if deviation < -ATTENTION_SIGNIFICANT_DEVIATION {
        AttentionDeviationStatus::SignificantlyBelowBaseline
    } else if deviation < -BASELINE_BAND {
        AttentionDeviationStatus::BelowBaseline
    } else if deviation > BASELINE_BAND {
        AttentionDeviationStatus::AboveBaseline
    } else {
        AttentionDeviationStatus::Normal
    }
}

/// Certainty of a thresholded measurement.
///
/// Formula: `min(0.5 + |value - threshold| * 2, 1.0)`, rounded to 2 decimals.
/// Values sitting on the threshold are a coin flip; values far from it are certain.
pub fn measurement_confidence(value: f64, threshold: f64) -> f64 {
    round_to((0.5 + (value - threshold).abs() * 2.0).min(1.0), 2)
}

/// Confidence of both measurements against the engine's configured thresholds
pub fn confidence(features: &BehavioralFeatures, thresholds: &ThresholdConfig) -> Confidence {
    Confidence {
        movement: measurement_confidence(
            features.movement_intensity.score,
            thresholds.movement,
        ),
        attention: measurement_confidence(
            features.attention_duration.ratio,
            thresholds.attention,
        ),
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use chrono::Utc;

    fn baseline(movement: f64, attention: f64) -> ClassroomBaseline {
        ClassroomBaseline {
            classroom_id: "room".to_string(),
            average_movement_intensity: movement,
            average_attention_ratio: attention,
            student_count: 10,
            sample_count: 40,
            calculated_at: Utc::now(),
            time_window: TimeWindow::MEDIUM,
        }
    }

    #[test]
    fn test_movement_status_bands() {
        // threshold 0.7: normal band is (0.56, 0.7]
        assert_eq!(classify_movement(0.75, 0.7), MovementStatus::Elevated);
        assert_eq!(classify_movement(0.70, 0.7), MovementStatus::Normal);
        assert_eq!(classify_movement(0.60, 0.7), MovementStatus::Normal);
        assert_eq!(classify_movement(0.50, 0.7), MovementStatus::Low);
    }

    #[test]
    fn test_attention_status_bands() {
        // threshold 0.6: normal band is [0.48, 0.6)
        assert_eq!(classify_attention(0.60, 0.6), AttentionStatus::AboveThreshold);
        assert_eq!(classify_attention(0.50, 0.6), AttentionStatus::Normal);
        assert_eq!(classify_attention(0.30, 0.6), AttentionStatus::BelowThreshold);
    }

    #[test]
    fn test_from_score_rounds_and_clamps() {
        let m = MovementIntensity::from_score(0.81234, 12, TimeWindow::MEDIUM, 0.7);
        assert_eq!(m.score, 0.812);
        assert_eq!(m.status, MovementStatus::Elevated);

        let m = MovementIntensity::from_score(1.7, 0, TimeWindow::SHORT, 0.7);
        assert_eq!(m.score, 1.0);

        let a = AttentionDuration::from_ratio(
            0.25,
            TimeWindow::from_secs(4),
            TimeWindow::from_secs(2),
            TimeWindow::MEDIUM,
            0.6,
        );
        assert_eq!(a.status, AttentionStatus::BelowThreshold);
    }

    #[test]
    fn test_no_data_measurements() {
        let m = MovementIntensity::no_data(0.7);
        assert_eq!(m.status, MovementStatus::NoData);
        assert_eq!(m.time_window, TimeWindow::ZERO);

        let a = AttentionDuration::no_data(0.6);
        assert_eq!(a.status, AttentionStatus::NoData);
        assert_eq!(a.ratio, 0.0);
    }

    #[test]
    fn test_validation_rejects_out_of_range_values() {
        let mut features = simple("s1", "sess", 0, 0.5, 0.6);
        assert!(validate(&features).is_ok());

        features.movement_intensity.score = 1.2;
        assert!(matches!(
            validate(&features),
            Err(RiskError::InvalidFeatureData(_))
        ));

        let mut features = simple("s1", "sess", 0, 0.5, 0.6);
        features.attention_duration.ratio = f64::NAN;
        assert!(validate(&features).is_err());

        let features = simple("  ", "sess", 0, 0.5, 0.6);
        assert!(validate(&features).is_err());
    }

    #[test]
    fn test_deviation_statuses() {
        let b = baseline(0.5, 0.6);

        let d = baseline_deviations(&simple("s", "x", 0, 0.9, 0.3), &b);
        assert_eq!(d.movement, 0.4);
        assert_eq!(d.movement_status, MovementDeviationStatus::Elevated);
        assert_eq!(d.attention, -0.3);
        assert_eq!(d.attention_status, AttentionDeviationStatus::SignificantlyBelowBaseline);

        let d = baseline_deviations(&simple("s", "x", 0, 0.65, 0.45), &b);
        assert_eq!(d.movement_status, MovementDeviationStatus::AboveBaseline);
        assert_eq!(d.attention_status, AttentionDeviationStatus::BelowBaseline);

        let d = baseline_deviations(&simple("s", "x", 0, 0.35, 0.75), &b);
        assert_eq!(d.movement_status, MovementDeviationStatus::BelowBaseline);
        assert_eq!(d.attention_status, AttentionDeviationStatus::AboveBaseline);

        let d = baseline_deviations(&simple("s", "x", 0, 0.52, 0.58), &b);
        assert_eq!(d.movement_status, MovementDeviationStatus::Normal);
        assert_eq!(d.attention_status, AttentionDeviationStatus::Normal);
    }

    #[test]
    fn test_measurement_confidence() {
        assert_eq!(measurement_confidence(0.7, 0.7), 0.5);
        assert_eq!(measurement_confidence(0.8, 0.7), 0.7);
        assert_eq!(measurement_confidence(0.1, 0.7), 1.0);
    }

    #[test]
    fn test_confidence_uses_configured_thresholds() {
        let features = simple("s", "x", 0, 0.9, 0.3);

        let c = confidence(&features, &ThresholdConfig::default());
        assert_eq!(c.movement, 0.9);
        assert_eq!(c.attention, 1.0);

        let tuned = ThresholdConfig {
            movement: 0.85,
            attention: 0.25,
            ..ThresholdConfig::default()
        };
        let c = confidence(&features, &tuned);
        assert_eq!(c.movement, 0.6);
        assert_eq!(c.attention, 0.6);
    }
}

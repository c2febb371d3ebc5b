//! Core data types
//!
//! This module defines the records that flow through the engine: per-student
//! feature samples, classroom baselines, risk assessments and risk cards.
//! Field names and enum strings are the wire format consumed by the API layer.

use crate::error::RiskError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A span of time expressed in whole seconds, serialized as `"120s"`.
///
/// Used for feature windows, baseline windows and focus durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeWindow {
    seconds: u32,
}

impl TimeWindow {
    /// Short analysis window (30 seconds)
    pub const SHORT: TimeWindow = TimeWindow { seconds: 30 };
    /// Medium analysis window (120 seconds), the default for baselines
    pub const MEDIUM: TimeWindow = TimeWindow { seconds: 120 };
    /// Long analysis window (300 seconds)
    pub const LONG: TimeWindow = TimeWindow { seconds: 300 };
    /// Empty window reported by measurements without data
    pub const ZERO: TimeWindow = TimeWindow { seconds: 0 };

    pub const fn from_secs(seconds: u32) -> Self {
        Self { seconds }
    }

    pub const fn as_secs(&self) -> u32 {
        self.seconds
    }

    /// Window length as a chrono duration
    pub fn to_duration(self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.seconds))
    }
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self::MEDIUM
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.seconds)
    }
}

impl FromStr for TimeWindow {
    type Err = RiskError;

    /// Accepts `"120s"`, `"2m"` or a bare number of seconds.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (digits, multiplier) = if let Some(rest) = trimmed.strip_suffix('s') {
            (rest, 1)
        } else if let Some(rest) = trimmed.strip_suffix('m') {
            (rest, 60)
        } else {
            (trimmed, 1)
        };

        let value: u32 = digits
            .trim()
            .parse()
            .map_err(|_| RiskError::InvalidTimeWindow(s.to_string()))?;
        let seconds = value
            .checked_mul(multiplier)
            .ok_or_else(|| RiskError::InvalidTimeWindow(s.to_string()))?;

        Ok(Self { seconds })
    }
}

impl TryFrom<String> for TimeWindow {
    type Error = RiskError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeWindow> for String {
    fn from(window: TimeWindow) -> Self {
        window.to_string()
    }
}

/// Movement status reported by the feature extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementStatus {
    Elevated,
    Normal,
    Low,
    NoData,
}

/// Attention status reported by the feature extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttentionStatus {
    AboveThreshold,
    Normal,
    BelowThreshold,
    NoData,
}

/// Movement Intensity Index for one time window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementIntensity {
    /// Normalized displacement score (0-1)
    pub score: f64,
    /// Threshold the status was classified against
    pub threshold: f64,
    pub status: MovementStatus,
    /// Significant movement events in the window
    pub event_count: u32,
    pub time_window: TimeWindow,
}

/// Attention Duration Ratio for one time window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttentionDuration {
    /// Fraction of the window spent on-task (0-1)
    pub ratio: f64,
    /// Threshold the status was classified against
    pub threshold: f64,
    pub status: AttentionStatus,
    pub longest_focus_duration: TimeWindow,
    pub average_focus_duration: TimeWindow,
    pub time_window: TimeWindow,
}

/// One feature sample for a tracked student, produced by the extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehavioralFeatures {
    pub student_id: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub movement_intensity: MovementIntensity,
    pub attention_duration: AttentionDuration,
}

/// Population averages for a classroom over a recent window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassroomBaseline {
    pub classroom_id: String,
    pub average_movement_intensity: f64,
    pub average_attention_ratio: f64,
    /// Distinct students observed in the window
    pub student_count: u32,
    /// Samples the averages were computed from (0 on cold start)
    #[serde(default)]
    pub sample_count: u32,
    pub calculated_at: DateTime<Utc>,
    pub time_window: TimeWindow,
}

impl ClassroomBaseline {
    /// True when the baseline holds the configured defaults rather than data
    pub fn is_cold_start(&self) -> bool {
        self.sample_count == 0
    }
}

/// Categorical risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        };
        f.write_str(label)
    }
}

/// Which kind of deviation drives the assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskCategory {
    Movement,
    Attention,
    Combined,
    Normal,
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskCategory::Movement => "Movement",
            RiskCategory::Attention => "Attention",
            RiskCategory::Combined => "Combined",
            RiskCategory::Normal => "Normal",
        };
        f.write_str(label)
    }
}

/// Movement relative to the classroom baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementDeviationStatus {
    Elevated,
    AboveBaseline,
    BelowBaseline,
    Normal,
}

/// Attention relative to the classroom baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttentionDeviationStatus {
    SignificantlyBelowBaseline,
    BelowBaseline,
    AboveBaseline,
    Normal,
}

/// Signed deviations of a sample from its baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineDeviations {
    /// `score - baseline movement`
    pub movement: f64,
    pub movement_status: MovementDeviationStatus,
    /// `ratio - baseline attention` (negative when below the classroom)
    pub attention: f64,
    pub attention_status: AttentionDeviationStatus,
}

/// Measurement certainty, independent of the risk score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Confidence {
    pub movement: f64,
    pub attention: f64,
}

/// Result of scoring one sample against a baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub student_id: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub risk_level: RiskLevel,
    /// Bounded score (0-100)
    pub risk_score: f64,
    pub risk_category: RiskCategory,
    pub risk_factors: Vec<String>,
    pub recommendation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub deviations: BaselineDeviations,
    pub confidence: Confidence,
}

impl RiskAssessment {
    /// Return a copy of this assessment carrying an explanation
    pub fn with_explanation(self, explanation: String) -> Self {
        Self {
            explanation: Some(explanation),
            ..self
        }
    }
}

/// Anonymized per-student summary for dashboards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRiskCard {
    pub student_id: String,
    /// Keyed one-way pseudonym of `student_id`
    pub anonymized_id: String,
    pub current_risk: RiskAssessment,
    /// Most recent samples first, capped by configuration
    pub recent_features: Vec<BehavioralFeatures>,
    pub baseline: ClassroomBaseline,
    pub last_updated: DateTime<Utc>,
}

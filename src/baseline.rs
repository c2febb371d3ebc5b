//! Classroom baseline computation
//!
//! A baseline is the population average of movement intensity and attention
//! ratio across the samples observed in a classroom (or session) over a recent
//! window. Baselines are recomputed on demand and never cached.
//!
//! Averages are taken over samples, not over per-student means: a student with
//! more samples in the window weighs proportionally more.

use crate::config::{BaselineConfig, RiskConfig};
use crate::error::RiskError;
use crate::features;
use crate::store::{query_with_timeout, FeatureQuery, FeatureStore};
use crate::types::{BehavioralFeatures, ClassroomBaseline, TimeWindow};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Computes [`ClassroomBaseline`]s from stored samples
pub struct BaselineCalculator {
    store: Arc<dyn FeatureStore>,
    defaults: BaselineConfig,
    store_timeout: Duration,
}

impl BaselineCalculator {
    pub fn new(store: Arc<dyn FeatureStore>, config: &RiskConfig) -> Self {
        Self {
            store,
            defaults: config.baseline.clone(),
            store_timeout: config.store.timeout(),
        }
    }

    /// Baseline for `classroom_id` over the window ending now.
    ///
    /// `window` falls back to the configured default (120s).
    pub async fn compute_baseline(
        &self,
        classroom_id: &str,
        window: Option<TimeWindow>,
    ) -> Result<ClassroomBaseline, RiskError> {
        self.compute_baseline_at(classroom_id, window, Utc::now()).await
    }

    /// Baseline for `classroom_id` over the window ending at `now`.
    ///
    /// An empty window yields the default baseline. A store failure is
    /// returned as an error rather than masked by defaults.
    pub async fn compute_baseline_at(
        &self,
        classroom_id: &str,
        window: Option<TimeWindow>,
        now: DateTime<Utc>,
    ) -> Result<ClassroomBaseline, RiskError> {
        let window = window.unwrap_or(self.defaults.default_window);
        let query =
            FeatureQuery::for_classroom(classroom_id).between(now - window.to_duration(), now);

        let samples = query_with_timeout(self.store.as_ref(), &query, self.store_timeout)
            .await
            .map_err(|e| {
                warn!(classroom_id, error = %e, "Baseline computation failed to read samples");
                e
            })?;

        Ok(Self::from_samples(classroom_id, &samples, window, now, &self.defaults))
    }

    /// Baseline over every sample recorded for a session.
    ///
    /// The reported window spans the earliest to the latest sample.
    pub async fn compute_session_baseline(
        &self,
        session_id: &str,
    ) -> Result<ClassroomBaseline, RiskError> {
        let query = FeatureQuery::for_session(session_id);
        let samples = query_with_timeout(self.store.as_ref(), &query, self.store_timeout)
            .await
            .map_err(|e| {
                warn!(session_id, error = %e, "Session baseline failed to read samples");
                e
            })?;

        Ok(Self::session_baseline_from_samples(session_id, &samples, Utc::now(), &self.defaults))
    }

    /// Baseline over a whole session's samples, computed without touching the store
    pub fn session_baseline_from_samples(
        session_id: &str,
        samples: &[BehavioralFeatures],
        calculated_at: DateTime<Utc>,
        defaults: &BaselineConfig,
    ) -> ClassroomBaseline {
        let first = samples.iter().map(|s| s.timestamp).min();
        let last = samples.iter().map(|s| s.timestamp).max();
        let window = match (first, last) {
            (Some(first), Some(last)) => {
                let span = (last - first).num_seconds().max(0);
                TimeWindow::from_secs(u32::try_from(span).unwrap_or(u32::MAX))
            }
            _ => defaults.default_window,
        };

        Self::from_samples(session_id, samples, window, calculated_at, defaults)
    }

    /// Aggregate samples into a baseline.
    ///
    /// Samples that fail validation are left out of the population. With no
    /// usable samples the configured defaults are returned with
    /// `student_count == 0`.
    pub fn from_samples(
        classroom_id: &str,
        samples: &[BehavioralFeatures],
        window: TimeWindow,
        calculated_at: DateTime<Utc>,
        defaults: &BaselineConfig,
    ) -> ClassroomBaseline {
        let usable: Vec<&BehavioralFeatures> = samples
            .iter()
            .filter(|s| match features::validate(s) {
                Ok(()) => true,
                Err(e) => {
                    warn!(classroom_id, error = %e, "Excluding invalid sample from baseline");
                    false
                }
            })
            .collect();

        if usable.is_empty() {
            debug!(classroom_id, window = %window, "No samples in window, using default baseline");
            return Self::default_baseline(classroom_id, window, calculated_at, defaults);
        }

        let n = usable.len() as f64;
        let movement_sum: f64 = usable.iter().map(|s| s.movement_intensity.score).sum();
        let attention_sum: f64 = usable.iter().map(|s| s.attention_duration.ratio).sum();
        let students: HashSet<&str> = usable.iter().map(|s| s.student_id.as_str()).collect();

        let baseline = ClassroomBaseline {
            classroom_id: classroom_id.to_string(),
            average_movement_intensity: movement_sum / n,
            average_attention_ratio: attention_sum / n,
            student_count: students.len() as u32,
            sample_count: usable.len() as u32,
            calculated_at,
            time_window: window,
        };

        debug!(
            classroom_id,
            samples = baseline.sample_count,
            students = baseline.student_count,
            movement = baseline.average_movement_intensity,
            attention = baseline.average_attention_ratio,
            "Computed classroom baseline"
        );

        baseline
    }

    /// Neutral baseline used when a classroom has no data yet
    pub fn default_baseline(
        classroom_id: &str,
        window: TimeWindow,
        calculated_at: DateTime<Utc>,
        defaults: &BaselineConfig,
    ) -> ClassroomBaseline {
        ClassroomBaseline {
            classroom_id: classroom_id.to_string(),
            average_movement_intensity: defaults.default_movement,
            average_attention_ratio: defaults.default_attention,
            student_count: 0,
            sample_count: 0,
            calculated_at,
            time_window: window,
        }
    }
}

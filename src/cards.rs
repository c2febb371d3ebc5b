//! Risk card aggregation
//!
//! Groups a session's samples by student, scores each student's most recent
//! sample against the session population observed in the baseline window
//! before the latest sample, and bundles the result with a bounded history
//! into an anonymized [`StudentRiskCard`].

use crate::anonymize::Anonymizer;
use crate::baseline::BaselineCalculator;
use crate::config::{BaselineConfig, RiskConfig};
use crate::error::RiskError;
use crate::features;
use crate::scoring::RiskScoringEngine;
use crate::store::{query_with_timeout, FeatureQuery, FeatureStore};
use crate::types::{BehavioralFeatures, StudentRiskCard};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct RiskCardAggregator {
    store: Arc<dyn FeatureStore>,
    scorer: RiskScoringEngine,
    anonymizer: Anonymizer,
    baseline_defaults: BaselineConfig,
    max_recent_features: usize,
    store_timeout: Duration,
}

impl RiskCardAggregator {
    pub fn new(store: Arc<dyn FeatureStore>, config: &RiskConfig, anonymizer: Anonymizer) -> Self {
        Self {
            store,
            scorer: RiskScoringEngine::new(config.thresholds.clone()),
            anonymizer,
            baseline_defaults: config.baseline.clone(),
            max_recent_features: config.cards.max_recent_features,
            store_timeout: config.store.timeout(),
        }
    }

    pub fn anonymizer(&self) -> &Anonymizer {
        &self.anonymizer
    }

    /// Cards for every student observed in `session_id`.
    ///
    /// A session without samples yields an empty list. Cards are ordered by
    /// descending risk score.
    pub async fn generate_risk_cards(
        &self,
        session_id: &str,
    ) -> Result<Vec<StudentRiskCard>, RiskError> {
        let query = FeatureQuery::for_session(session_id);
        let samples = query_with_timeout(self.store.as_ref(), &query, self.store_timeout)
            .await
            .map_err(|e| {
                warn!(session_id, error = %e, "Risk card generation failed to read samples");
                e
            })?;

        self.cards_from_samples(session_id, samples, Utc::now())
    }

    /// Build cards from already-fetched samples of one session
    pub fn cards_from_samples(
        &self,
        session_id: &str,
        samples: Vec<BehavioralFeatures>,
        calculated_at: DateTime<Utc>,
    ) -> Result<Vec<StudentRiskCard>, RiskError> {
        let samples: Vec<BehavioralFeatures> = samples
            .into_iter()
            .filter(|s| match features::validate(s) {
                Ok(()) => true,
                Err(e) => {
                    warn!(session_id, error = %e, "Skipping invalid sample in risk cards");
                    false
                }
            })
            .collect();

        if samples.is_empty() {
            return Ok(Vec::new());
        }

        // Population is the default window ending at the session's latest sample
        let window = self.baseline_defaults.default_window;
        let window_end = samples
            .iter()
            .map(|s| s.timestamp)
            .max()
            .unwrap_or(calculated_at);
        let window_start = window_end - window.to_duration();
        let population: Vec<BehavioralFeatures> = samples
            .iter()
            .filter(|s| s.timestamp >= window_start)
            .cloned()
            .collect();
        let baseline = BaselineCalculator::from_samples(
            session_id,
            &population,
            window,
            calculated_at,
            &self.baseline_defaults,
        );

        let mut by_student: BTreeMap<String, Vec<BehavioralFeatures>> = BTreeMap::new();
        for sample in samples {
            by_student
                .entry(sample.student_id.clone())
                .or_default()
                .push(sample);
        }

        let mut cards = Vec::with_capacity(by_student.len());
        for (student_id, mut history) in by_student {
            history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            let Some(latest) = history.first() else {
                continue;
            };
            let current_risk = self.scorer.assess(latest, &baseline)?;
            let last_updated = latest.timestamp;
            history.truncate(self.max_recent_features);

            cards.push(StudentRiskCard {
                anonymized_id: self.anonymizer.pseudonym(&student_id),
                student_id,
                current_risk,
                recent_features: history,
                baseline: baseline.clone(),
                last_updated,
            });
        }

        cards.sort_by(|a, b| {
            b.current_risk
                .risk_score
                .partial_cmp(&a.current_risk.risk_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.anonymized_id.cmp(&b.anonymized_id))
        });

        info!(
            session_id,
            students = cards.len(),
            samples = baseline.sample_count,
            "Generated risk cards"
        );

        Ok(cards)
    }
}

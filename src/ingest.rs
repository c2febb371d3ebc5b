//! Feature ingest
//!
//! Entry point for samples arriving from the feature extractor. Samples are
//! validated before they reach the store so malformed data never feeds a
//! baseline.

use crate::error::RiskError;
use crate::features;
use crate::store::FeatureStore;
use crate::types::BehavioralFeatures;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of a batch ingest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub accepted: usize,
    pub rejected: usize,
    /// One entry per rejected record: `"<index>: <reason>"`
    pub errors: Vec<String>,
}

/// Parse one feature record from JSON
pub fn parse_features(json: &str) -> Result<BehavioralFeatures, RiskError> {
    serde_json::from_str(json)
        .map_err(|e| RiskError::InvalidFeatureData(format!("Failed to parse features: {e}")))
}

/// Validating writer in front of a [`FeatureStore`]
pub struct FeatureIngest {
    store: Arc<dyn FeatureStore>,
}

impl FeatureIngest {
    pub fn new(store: Arc<dyn FeatureStore>) -> Self {
        Self { store }
    }

    /// Validate and store a single sample
    pub async fn ingest(
        &self,
        classroom_id: &str,
        features: BehavioralFeatures,
    ) -> Result<(), RiskError> {
        if let Err(e) = features::validate(&features) {
            warn!(
                classroom_id,
                student_id = %features.student_id,
                error = %e,
                "Rejected feature sample"
            );
            return Err(e);
        }
        debug!(
            classroom_id,
            session_id = %features.session_id,
            timestamp = %features.timestamp,
            "Ingesting feature sample"
        );
        self.store.append(classroom_id, features).await
    }

    /// Store every valid sample of a batch.
    ///
    /// Invalid samples are skipped and reported; a store failure aborts the
    /// batch and is returned as an error.
    pub async fn ingest_batch(
        &self,
        classroom_id: &str,
        batch: Vec<BehavioralFeatures>,
    ) -> Result<IngestReport, RiskError> {
        let mut report = IngestReport::default();

        for (index, features) in batch.into_iter().enumerate() {
            match self.ingest(classroom_id, features).await {
                Ok(()) => report.accepted += 1,
                Err(RiskError::InvalidFeatureData(reason)) => {
                    report.rejected += 1;
                    report.errors.push(format!("{index}: {reason}"));
                }
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }

    /// Ingest a JSON payload holding either one record or an array of records.
    ///
    /// A payload that is not valid JSON, or a record missing required fields,
    /// fails with [`RiskError::InvalidFeatureData`].
    pub async fn ingest_json(
        &self,
        classroom_id: &str,
        json: &str,
    ) -> Result<IngestReport, RiskError> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| RiskError::InvalidFeatureData(format!("Invalid JSON: {e}")))?;

        let batch: Vec<BehavioralFeatures> = match value {
            serde_json::Value::Array(_) => serde_json::from_value(value),
            _ => serde_json::from_value::<BehavioralFeatures>(value).map(|f| vec![f]),
        }
        .map_err(|e| RiskError::InvalidFeatureData(format!("Failed to parse features: {e}")))?;

        self.ingest_batch(classroom_id, batch).await
    }
}

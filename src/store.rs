//! Feature store interface
//!
//! The engine reads feature samples through [`FeatureStore`]; the persistent
//! time-series backend lives outside this crate. [`InMemoryFeatureStore`] is a
//! process-local implementation for embedding and tests.

use crate::error::RiskError;
use crate::types::BehavioralFeatures;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::time::Duration;

/// Filter for feature reads. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureQuery {
    pub classroom_id: Option<String>,
    pub session_id: Option<String>,
    pub student_id: Option<String>,
    /// Inclusive lower bound on sample timestamp
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper bound on sample timestamp
    pub until: Option<DateTime<Utc>>,
}

impl FeatureQuery {
    pub fn for_classroom(classroom_id: impl Into<String>) -> Self {
        Self {
            classroom_id: Some(classroom_id.into()),
            ..Self::default()
        }
    }

    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Self::default()
        }
    }

    pub fn student(mut self, student_id: impl Into<String>) -> Self {
        self.student_id = Some(student_id.into());
        self
    }

    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn between(mut self, since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self.until = Some(until);
        self
    }

    fn matches(&self, classroom_id: &str, features: &BehavioralFeatures) -> bool {
        self.classroom_id.as_deref().map_or(true, |c| c == classroom_id)
            && self
                .session_id
                .as_deref()
                .map_or(true, |s| s == features.session_id)
            && self
                .student_id
                .as_deref()
                .map_or(true, |s| s == features.student_id)
            && self.since.map_or(true, |t| features.timestamp >= t)
            && self.until.map_or(true, |t| features.timestamp <= t)
    }
}

/// Read/write access to stored feature samples.
///
/// Implementations own their retry policy. Errors that mean "could not reach
/// the store" should be reported as [`RiskError::UpstreamUnavailable`].
#[async_trait]
pub trait FeatureStore: Send + Sync {
    /// Samples matching `query`, in no particular order
    async fn query(&self, query: &FeatureQuery) -> Result<Vec<BehavioralFeatures>, RiskError>;

    /// Persist one sample observed in `classroom_id`
    async fn append(&self, classroom_id: &str, features: BehavioralFeatures)
        -> Result<(), RiskError>;
}

/// Run a store query with a bounded wait.
///
/// A timeout is reported as the store being unavailable.
pub async fn query_with_timeout(
    store: &dyn FeatureStore,
    query: &FeatureQuery,
    timeout: Duration,
) -> Result<Vec<BehavioralFeatures>, RiskError> {
    match tokio::time::timeout(timeout, store.query(query)).await {
        Ok(result) => result,
        Err(_) => Err(RiskError::upstream(
            "feature store",
            format!("query timed out after {}ms", timeout.as_millis()),
        )),
    }
}

#[derive(Debug, Clone)]
struct StoredSample {
    classroom_id: String,
    features: BehavioralFeatures,
}

/// Feature store held in process memory
#[derive(Debug, Default)]
pub struct InMemoryFeatureStore {
    samples: RwLock<Vec<StoredSample>>,
}

impl InMemoryFeatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored samples
    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.read().is_empty()
    }

    /// Remove all samples
    pub fn clear(&self) {
        self.samples.write().clear();
    }
}

#[async_trait]
impl FeatureStore for InMemoryFeatureStore {
    async fn query(&self, query: &FeatureQuery) -> Result<Vec<BehavioralFeatures>, RiskError> {
        let samples = self.samples.read();
        Ok(samples
            .iter()
            .filter(|s| query.matches(&s.classroom_id, &s.features))
            .map(|s| s.features.clone())
            .collect())
    }

    async fn append(
        &self,
        classroom_id: &str,
        features: BehavioralFeatures,
    ) -> Result<(), RiskError> {
        self.samples.write().push(StoredSample {
            classroom_id: classroom_id.to_string(),
            features,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::{base_time, simple};
    use chrono::Duration as ChronoDuration;

    async fn seeded_store() -> InMemoryFeatureStore {
        let store = InMemoryFeatureStore::new();
        store.append("room-a", simple("s1", "sess-1", 0, 0.5, 0.6)).await.unwrap();
        store.append("room-a", simple("s2", "sess-1", 60, 0.4, 0.7)).await.unwrap();
        store.append("room-a", simple("s1", "sess-2", 600, 0.6, 0.5)).await.unwrap();
        store.append("room-b", simple("s9", "sess-9", 30, 0.3, 0.8)).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_query_by_classroom() {
        let store = seeded_store().await;
        let result = store.query(&FeatureQuery::for_classroom("room-a")).await.unwrap();
        assert_eq!(result.len(), 3);
        assert!(result.iter().all(|f| f.student_id != "s9"));
    }

    #[tokio::test]
    async fn test_query_by_session_and_student() {
        let store = seeded_store().await;

        let result = store.query(&FeatureQuery::for_session("sess-1")).await.unwrap();
        assert_eq!(result.len(), 2);

        let result = store
            .query(&FeatureQuery::for_classroom("room-a").student("s1"))
            .await
            .unwrap();
        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn test_query_time_range_is_inclusive() {
        let store = seeded_store().await;
        let query = FeatureQuery::for_classroom("room-a")
            .between(base_time(), base_time() + ChronoDuration::seconds(60));

        let result = store.query(&query).await.unwrap();
        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn test_len_and_clear() {
        let store = seeded_store().await;
        assert_eq!(store.len(), 4);
        store.clear();
        assert!(store.is_empty());
    }

    struct StalledStore;

    #[async_trait]
    impl FeatureStore for StalledStore {
        async fn query(&self, _query: &FeatureQuery) -> Result<Vec<BehavioralFeatures>, RiskError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }

        async fn append(&self, _: &str, _: BehavioralFeatures) -> Result<(), RiskError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_query_timeout_reports_upstream_unavailable() {
        let result = query_with_timeout(
            &StalledStore,
            &FeatureQuery::default(),
            Duration::from_millis(20),
        )
        .await;

        assert!(matches!(result, Err(ref e) if e.is_upstream()));
    }
}

//! Pipeline orchestration
//!
//! [`RiskEngine`] is the public entry point. It wires the configured store,
//! baseline calculator, scoring engine, card aggregator and explainer:
//! samples are ingested into the store, baselines are recomputed from the
//! store on demand, and every assessment leaving the engine carries an
//! explanation.

use crate::anonymize::Anonymizer;
use crate::baseline::BaselineCalculator;
use crate::cards::RiskCardAggregator;
use crate::config::RiskConfig;
use crate::error::RiskError;
use crate::explain::{Explainer, GenerativeExplainer, TextGenerator};
use crate::features;
use crate::ingest::{FeatureIngest, IngestReport};
use crate::scoring::RiskScoringEngine;
use crate::store::{query_with_timeout, FeatureQuery, FeatureStore, InMemoryFeatureStore};
use crate::types::{
    BehavioralFeatures, ClassroomBaseline, RiskAssessment, StudentRiskCard, TimeWindow,
};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info};

pub struct RiskEngine {
    config: RiskConfig,
    store: Arc<dyn FeatureStore>,
    ingest: FeatureIngest,
    baselines: BaselineCalculator,
    scorer: RiskScoringEngine,
    cards: RiskCardAggregator,
    explainer: Explainer,
}

impl RiskEngine {
    /// Engine backed by a process-local [`InMemoryFeatureStore`]
    pub fn new(config: RiskConfig) -> Result<Self, RiskError> {
        Self::with_store(config, Arc::new(InMemoryFeatureStore::new()))
    }

    /// Engine reading and writing samples through `store`.
    ///
    /// Explanations use templates until a generator is attached with
    /// [`RiskEngine::with_text_generator`].
    pub fn with_store(config: RiskConfig, store: Arc<dyn FeatureStore>) -> Result<Self, RiskError> {
        config.validate()?;

        let anonymizer = Anonymizer::from_config(config.anonymization.secret.as_deref());
        let engine = Self {
            ingest: FeatureIngest::new(store.clone()),
            baselines: BaselineCalculator::new(store.clone(), &config),
            scorer: RiskScoringEngine::new(config.thresholds.clone()),
            cards: RiskCardAggregator::new(store.clone(), &config, anonymizer),
            explainer: Explainer::template_only(),
            store,
            config,
        };

        info!(
            ai_enabled = engine.config.explanations.ai_enabled,
            max_recent_features = engine.config.cards.max_recent_features,
            "Risk engine initialized"
        );
        Ok(engine)
    }

    /// Attach a text-generation backend for explanations.
    ///
    /// Ignored unless `explanations.ai_enabled` is set.
    pub fn with_text_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        if !self.config.explanations.ai_enabled {
            debug!(
                generator = generator.name(),
                "AI explanations disabled, keeping template explainer"
            );
            return self;
        }
        self.explainer = Explainer::with_primary(
            Arc::new(GenerativeExplainer::new(generator)),
            self.config.explanations.timeout(),
        );
        self
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn FeatureStore> {
        &self.store
    }

    pub fn explainer(&self) -> &Explainer {
        &self.explainer
    }

    pub async fn ingest(
        &self,
        classroom_id: &str,
        features: BehavioralFeatures,
    ) -> Result<(), RiskError> {
        self.ingest.ingest(classroom_id, features).await
    }

    pub async fn ingest_batch(
        &self,
        classroom_id: &str,
        batch: Vec<BehavioralFeatures>,
    ) -> Result<IngestReport, RiskError> {
        self.ingest.ingest_batch(classroom_id, batch).await
    }

    /// Ingest one JSON record or an array of records
    pub async fn ingest_json(
        &self,
        classroom_id: &str,
        json: &str,
    ) -> Result<IngestReport, RiskError> {
        self.ingest.ingest_json(classroom_id, json).await
    }

    /// Current baseline for a classroom; `None` uses the configured window
    pub async fn classroom_baseline(
        &self,
        classroom_id: &str,
        window: Option<TimeWindow>,
    ) -> Result<ClassroomBaseline, RiskError> {
        self.baselines.compute_baseline(classroom_id, window).await
    }

    pub async fn classroom_baseline_json(
        &self,
        classroom_id: &str,
        window: Option<TimeWindow>,
    ) -> Result<String, RiskError> {
        let baseline = self.classroom_baseline(classroom_id, window).await?;
        Ok(serde_json::to_string_pretty(&baseline)?)
    }

    /// Score a sample against a baseline and attach an explanation
    pub async fn assess(
        &self,
        features: &BehavioralFeatures,
        baseline: &ClassroomBaseline,
    ) -> Result<RiskAssessment, RiskError> {
        let assessment = self.scorer.assess(features, baseline)?;
        let explanation = self.explainer.explain(&assessment, baseline).await;
        Ok(assessment.with_explanation(explanation))
    }

    /// Assess a student's most recent sample in a session.
    ///
    /// The baseline is the classroom window ending at that sample. Returns
    /// `None` when the student has no samples in the session.
    pub async fn assess_student(
        &self,
        classroom_id: &str,
        session_id: &str,
        student_id: &str,
    ) -> Result<Option<RiskAssessment>, RiskError> {
        let query = FeatureQuery::for_classroom(classroom_id)
            .session(session_id)
            .student(student_id);
        let samples =
            query_with_timeout(self.store.as_ref(), &query, self.config.store.timeout()).await?;

        let Some(latest) = samples.into_iter().max_by_key(|s| s.timestamp) else {
            debug!(classroom_id, session_id, "No samples for student");
            return Ok(None);
        };

        let baseline = self
            .baselines
            .compute_baseline_at(classroom_id, None, latest.timestamp)
            .await?;

        self.assess(&latest, &baseline).await.map(Some)
    }

    pub async fn assess_student_json(
        &self,
        classroom_id: &str,
        session_id: &str,
        student_id: &str,
    ) -> Result<String, RiskError> {
        let assessment = self.assess_student(classroom_id, session_id, student_id).await?;
        Ok(serde_json::to_string_pretty(&assessment)?)
    }

    /// Risk cards for a session with explanations attached to each current risk.
    ///
    /// Explanations are requested concurrently, so a slow backend delays the
    /// call by at most one explanation timeout.
    pub async fn risk_cards(&self, session_id: &str) -> Result<Vec<StudentRiskCard>, RiskError> {
        let mut cards = self.cards.generate_risk_cards(session_id).await?;
        let explanations = join_all(
            cards
                .iter()
                .map(|card| self.explainer.explain(&card.current_risk, &card.baseline)),
        )
        .await;
        for (card, explanation) in cards.iter_mut().zip(explanations) {
            card.current_risk.explanation = Some(explanation);
        }
        Ok(cards)
    }

    pub async fn risk_cards_json(&self, session_id: &str) -> Result<String, RiskError> {
        let cards = self.risk_cards(session_id).await?;
        Ok(serde_json::to_string_pretty(&cards)?)
    }

    /// Assessments of each of a student's session samples against the session
    /// baseline, most recent first and capped like card histories
    pub async fn assessment_history(
        &self,
        session_id: &str,
        student_id: &str,
    ) -> Result<Vec<RiskAssessment>, RiskError> {
        let query = FeatureQuery::for_session(session_id);
        let samples =
            query_with_timeout(self.store.as_ref(), &query, self.config.store.timeout()).await?;
        let baseline = BaselineCalculator::session_baseline_from_samples(
            session_id,
            &samples,
            Utc::now(),
            &self.config.baseline,
        );

        let mut own: Vec<&BehavioralFeatures> = samples
            .iter()
            .filter(|s| s.student_id == student_id && features::validate(s).is_ok())
            .collect();
        own.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        own.truncate(self.config.cards.max_recent_features);

        own.into_iter()
            .map(|s| self.scorer.assess(s, &baseline))
            .collect()
    }

    pub async fn recommend(&self, card: &StudentRiskCard) -> String {
        self.explainer.recommend(card).await
    }

    pub async fn answer_question(&self, question: &str, history: &[RiskAssessment]) -> String {
        self.explainer.answer_question(question, history).await
    }

    /// Answer a question about one student using their session history
    pub async fn answer_student_question(
        &self,
        session_id: &str,
        student_id: &str,
        question: &str,
    ) -> Result<String, RiskError> {
        let history = self.assessment_history(session_id, student_id).await?;
        Ok(self.answer_question(question, &history).await)
    }
}

//! NeuraLens risk engine - classroom-relative behavioral baselines and
//! non-diagnostic risk scoring
//!
//! Per-student behavioral samples (movement intensity and attention ratio)
//! are compared against the population of the same classroom: ingest →
//! baseline computation → risk scoring → per-student risk cards → explanation.
//!
//! ## Modules
//!
//! - **Ingest & store**: validated sample intake behind the [`FeatureStore`] seam
//! - **Baseline & scoring**: population averages and the additive 0-100 risk score
//! - **Cards & explanations**: anonymized per-student summaries with template or
//!   generated text
//!
//! Risk indicators are observational aids for teachers. They are not a
//! diagnosis and every generated text says so.

pub mod anonymize;
pub mod baseline;
pub mod cards;
pub mod config;
pub mod error;
pub mod explain;
pub mod features;
pub mod ingest;
pub mod pipeline;
pub mod scoring;
pub mod store;
pub mod types;

pub use anonymize::Anonymizer;
pub use baseline::BaselineCalculator;
pub use cards::RiskCardAggregator;
pub use config::RiskConfig;
pub use error::{ConfigError, RiskError};
pub use explain::{
    Explainer, ExplanationProvider, GenerativeExplainer, TemplateExplainer, TextGenerator,
    DISCLAIMER,
};
pub use ingest::{FeatureIngest, IngestReport};
pub use pipeline::RiskEngine;
pub use scoring::RiskScoringEngine;
pub use store::{FeatureQuery, FeatureStore, InMemoryFeatureStore};
pub use types::{
    AttentionDuration, AttentionStatus, BehavioralFeatures, ClassroomBaseline, MovementIntensity,
    MovementStatus, RiskAssessment, RiskCategory, RiskLevel, StudentRiskCard, TimeWindow,
};

/// Engine version
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

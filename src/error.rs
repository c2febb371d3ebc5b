//! Error types for the NeuraLens risk engine

use thiserror::Error;

/// Errors that can occur while computing baselines, scores and explanations.
///
/// A classroom with no samples yet is not an error: it yields the default
/// baseline (see [`crate::baseline`]).
#[derive(Debug, Error)]
pub enum RiskError {
    #[error("Invalid feature data: {0}")]
    InvalidFeatureData(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("{component} unavailable: {reason}")]
    UpstreamUnavailable {
        component: &'static str,
        reason: String,
    },

    #[error("Invalid time window: {0}")]
    InvalidTimeWindow(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl RiskError {
    /// Store or text backend could not be reached.
    pub fn upstream(component: &'static str, reason: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            component,
            reason: reason.into(),
        }
    }

    /// Whether this error came from a collaborator rather than from the input.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable { .. })
    }
}

/// Errors raised while loading or validating [`crate::config::RiskConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    #[error("Config validation error: {0}")]
    Validation(String),
}

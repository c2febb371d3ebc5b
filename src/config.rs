//! Engine configuration
//!
//! Every tunable the engine depends on lives here so it can change without
//! touching scoring logic. Configuration loads from TOML with optional
//! `NEURALENS_*` environment overrides.

use crate::error::ConfigError;
use crate::types::TimeWindow;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "NEURALENS_";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub thresholds: ThresholdConfig,
    pub baseline: BaselineConfig,
    pub cards: CardConfig,
    pub explanations: ExplanationConfig,
    pub store: StoreConfig,
    pub anonymization: AnonymizationConfig,
}

/// Measurement thresholds and risk-level cutoffs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub movement: f64,
    pub attention: f64,
    /// Scores at or above this are HIGH
    pub high_risk_cutoff: f64,
    /// Scores at or above this (and below high) are MEDIUM
    pub medium_risk_cutoff: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            movement: 0.70,
            attention: 0.60,
            high_risk_cutoff: 70.0,
            medium_risk_cutoff: 40.0,
        }
    }
}

/// Cold-start values and the default population window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    pub default_movement: f64,
    pub default_attention: f64,
    pub default_window: TimeWindow,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            default_movement: 0.5,
            default_attention: 0.6,
            default_window: TimeWindow::MEDIUM,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardConfig {
    pub max_recent_features: usize,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            max_recent_features: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplanationConfig {
    /// Use the configured text-generation backend when one is attached
    pub ai_enabled: bool,
    pub timeout_ms: u64,
}

impl Default for ExplanationConfig {
    fn default() -> Self {
        Self {
            ai_enabled: false,
            timeout_ms: 5_000,
        }
    }
}

impl ExplanationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { timeout_ms: 3_000 }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnonymizationConfig {
    /// Secret the pseudonym key is derived from. When absent a random key is
    /// generated per process, so pseudonyms are stable only within one run.
    pub secret: Option<String>,
}

impl RiskConfig {
    /// Parse configuration from a TOML string and validate it
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RiskConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from a TOML file, then apply `NEURALENS_*` overrides
    pub fn from_file_with_env<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML string
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply environment variable overrides.
    ///
    /// Recognized variables: `NEURALENS_MOVEMENT_THRESHOLD`,
    /// `NEURALENS_ATTENTION_THRESHOLD`, `NEURALENS_HIGH_RISK_CUTOFF`,
    /// `NEURALENS_MEDIUM_RISK_CUTOFF`, `NEURALENS_DEFAULT_MOVEMENT`,
    /// `NEURALENS_DEFAULT_ATTENTION`, `NEURALENS_BASELINE_WINDOW`,
    /// `NEURALENS_MAX_RECENT_FEATURES`, `NEURALENS_AI_ENABLED`,
    /// `NEURALENS_EXPLANATION_TIMEOUT_MS`, `NEURALENS_STORE_TIMEOUT_MS`,
    /// `NEURALENS_ANONYMIZATION_SECRET`.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(v) = env_parse("MOVEMENT_THRESHOLD")? {
            self.thresholds.movement = v;
        }
        if let Some(v) = env_parse("ATTENTION_THRESHOLD")? {
            self.thresholds.attention = v;
        }
        if let Some(v) = env_parse("HIGH_RISK_CUTOFF")? {
            self.thresholds.high_risk_cutoff = v;
        }
        if let Some(v) = env_parse("MEDIUM_RISK_CUTOFF")? {
            self.thresholds.medium_risk_cutoff = v;
        }
        if let Some(v) = env_parse("DEFAULT_MOVEMENT")? {
            self.baseline.default_movement = v;
        }
        if let Some(v) = env_parse("DEFAULT_ATTENTION")? {
            self.baseline.default_attention = v;
        }
        if let Some(raw) = env_raw("BASELINE_WINDOW") {
            self.baseline.default_window = raw.parse().map_err(|_| {
                ConfigError::Validation(format!("Invalid {ENV_PREFIX}BASELINE_WINDOW"))
            })?;
        }
        if let Some(v) = env_parse("MAX_RECENT_FEATURES")? {
            self.cards.max_recent_features = v;
        }
        if let Some(v) = env_parse("AI_ENABLED")? {
            self.explanations.ai_enabled = v;
        }
        if let Some(v) = env_parse("EXPLANATION_TIMEOUT_MS")? {
            self.explanations.timeout_ms = v;
        }
        if let Some(v) = env_parse("STORE_TIMEOUT_MS")? {
            self.store.timeout_ms = v;
        }
        if let Some(raw) = env_raw("ANONYMIZATION_SECRET") {
            self.anonymization.secret = Some(raw);
        }
        Ok(())
    }

    /// Check ranges and cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        for (name, value) in [("movement", t.movement), ("attention", t.attention)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Validation(format!(
                    "thresholds.{name} must be within [0, 1], got {value}"
                )));
            }
        }
        for (name, value) in [
            ("high_risk_cutoff", t.high_risk_cutoff),
            ("medium_risk_cutoff", t.medium_risk_cutoff),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::Validation(format!(
                    "thresholds.{name} must be within [0, 100], got {value}"
                )));
            }
        }
        if t.medium_risk_cutoff >= t.high_risk_cutoff {
            return Err(ConfigError::Validation(
                "thresholds.medium_risk_cutoff must be below high_risk_cutoff".to_string(),
            ));
        }

        let b = &self.baseline;
        for (name, value) in [
            ("default_movement", b.default_movement),
            ("default_attention", b.default_attention),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Validation(format!(
                    "baseline.{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if b.default_window.as_secs() == 0 {
            return Err(ConfigError::Validation(
                "baseline.default_window must be non-empty".to_string(),
            ));
        }

        if self.cards.max_recent_features == 0 {
            return Err(ConfigError::Validation(
                "cards.max_recent_features must be at least 1".to_string(),
            ));
        }
        if self.explanations.timeout_ms == 0 || self.store.timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_raw(key: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}{key}")).ok()
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env_raw(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Validation(format!("Invalid {ENV_PREFIX}{key}"))),
        None => Ok(None),
    }
}

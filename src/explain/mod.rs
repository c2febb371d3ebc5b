//! Natural-language explanations
//!
//! Two providers implement [`ExplanationProvider`]: [`TemplateExplainer`]
//! composes text from the assessment itself and [`GenerativeExplainer`]
//! delegates to an injected [`TextGenerator`]. [`Explainer`] fronts both: it
//! tries the optional primary provider under a timeout and falls back to the
//! template on any failure, so callers always get text and never an error.

mod generative;
mod template;

pub use generative::{GenerativeExplainer, TextGenerator};
pub use template::TemplateExplainer;

use crate::error::RiskError;
use crate::types::{ClassroomBaseline, RiskAssessment, StudentRiskCard};
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Closing sentence carried by every generated text
pub const DISCLAIMER: &str = "This is not a diagnosis. \
Please consult a school counselor or other qualified professional before drawing conclusions.";

/// Source of explanation text
#[async_trait]
pub trait ExplanationProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Explain an assessment relative to the baseline it was scored against
    async fn explain(
        &self,
        assessment: &RiskAssessment,
        baseline: &ClassroomBaseline,
    ) -> Result<String, RiskError>;

    /// Suggest a next step for the student behind `card`
    async fn recommend(&self, card: &StudentRiskCard) -> Result<String, RiskError>;

    /// Answer a free-form question about a student's assessment history.
    ///
    /// `history` is ordered most recent first.
    async fn answer_question(
        &self,
        question: &str,
        history: &[RiskAssessment],
    ) -> Result<String, RiskError>;
}

/// Append [`DISCLAIMER`] unless `text` already carries it
pub fn with_disclaimer(text: String) -> String {
    if text.contains(DISCLAIMER) {
        return text;
    }
    let mut text = text.trim_end().to_string();
    if !text.is_empty() {
        text.push(' ');
    }
    text.push_str(DISCLAIMER);
    text
}

type ProviderFuture<'a> = Pin<Box<dyn Future<Output = Result<String, RiskError>> + Send + 'a>>;

/// Infallible explanation front-end with template fallback
pub struct Explainer {
    primary: Option<Arc<dyn ExplanationProvider>>,
    template: TemplateExplainer,
    timeout: Duration,
}

impl Explainer {
    /// Explainer that only ever uses templates
    pub fn template_only() -> Self {
        Self {
            primary: None,
            template: TemplateExplainer::new(),
            timeout: Duration::ZERO,
        }
    }

    /// Explainer that tries `primary` first, bounded by `timeout`
    pub fn with_primary(primary: Arc<dyn ExplanationProvider>, timeout: Duration) -> Self {
        Self {
            primary: Some(primary),
            template: TemplateExplainer::new(),
            timeout,
        }
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    pub async fn explain(
        &self,
        assessment: &RiskAssessment,
        baseline: &ClassroomBaseline,
    ) -> String {
        let attempt = self.primary.as_ref().map(|p| p.explain(assessment, baseline));
        self.resolve("explain", attempt, || {
            self.template.explanation(assessment, baseline)
        })
        .await
    }

    pub async fn recommend(&self, card: &StudentRiskCard) -> String {
        let attempt = self.primary.as_ref().map(|p| p.recommend(card));
        self.resolve("recommend", attempt, || self.template.recommendation(card))
            .await
    }

    pub async fn answer_question(&self, question: &str, history: &[RiskAssessment]) -> String {
        let attempt = self
            .primary
            .as_ref()
            .map(|p| p.answer_question(question, history));
        self.resolve("answer_question", attempt, || {
            self.template.answer(question, history)
        })
        .await
    }

    async fn resolve<'a>(
        &self,
        operation: &'static str,
        attempt: Option<ProviderFuture<'a>>,
        fallback: impl FnOnce() -> String,
    ) -> String {
        if let (Some(attempt), Some(primary)) = (attempt, self.primary.as_ref()) {
            let provider = primary.name();
            match tokio::time::timeout(self.timeout, attempt).await {
                Ok(Ok(text)) if !text.trim().is_empty() => {
                    debug!(operation, provider, "Explanation generated");
                    return with_disclaimer(text);
                }
                Ok(Ok(_)) => {
                    warn!(
                        operation,
                        provider,
                        "Explanation backend returned empty text, using template"
                    );
                }
                Ok(Err(e)) => {
                    warn!(
                        operation,
                        provider,
                        error = %e,
                        "Explanation backend failed, using template"
                    );
                }
                Err(_) => {
                    warn!(
                        operation,
                        provider,
                        timeout_ms = self.timeout.as_millis() as u64,
                        "Explanation backend timed out, using template"
                    );
                }
            }
        }
        fallback()
    }
}

impl Default for Explainer {
    fn default() -> Self {
        Self::template_only()
    }
}

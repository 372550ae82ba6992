//! Advice port: Trait for external free-text advice generation.

use crate::domain::{FeatureContribution, RiskClass};

/// Error from the advice backend. Never shown to the user.
#[derive(Debug, thiserror::Error)]
pub enum AdviceError {
    #[error("advice backend is not configured: {0}")]
    NotConfigured(String),

    #[error("advice request failed: {0}")]
    Transport(String),

    #[error("advice backend returned HTTP {status}")]
    Status { status: u16 },

    #[error("advice response could not be decoded: {0}")]
    Decode(String),

    #[error("advice response contained no text")]
    Empty,
}

/// What the advice prompt is conditioned on.
#[derive(Debug, Clone)]
pub struct AdviceRequest<'a> {
    pub class: RiskClass,
    /// Risk score in percent
    pub risk_score: f64,
    pub risk_factors: &'a [FeatureContribution],
    pub protective_factors: &'a [FeatureContribution],
}

impl AdviceRequest<'_> {
    /// Render the user-facing prompt.
    #[must_use]
    pub fn prompt(&self) -> String {
        let mut prompt = format!(
            "The screening model classified me as {} ({}) with a combined pre-diabetes and diabetes risk of {:.1}%.",
            self.class,
            self.class.description(),
            self.risk_score
        );
        if !self.risk_factors.is_empty() {
            prompt.push_str(" Factors raising my risk: ");
            prompt.push_str(&join_labels(self.risk_factors));
            prompt.push('.');
        }
        if !self.protective_factors.is_empty() {
            prompt.push_str(" Factors lowering my risk: ");
            prompt.push_str(&join_labels(self.protective_factors));
            prompt.push('.');
        }
        prompt.push_str(" What practical lifestyle steps should I take next?");
        prompt
    }
}

fn join_labels(factors: &[FeatureContribution]) -> String {
    factors
        .iter()
        .map(|f| f.label.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A source of advice text. Calls are blocking and must be time-bounded by
/// the implementation.
pub trait AdviceGenerator: Send + Sync {
    /// # Errors
    /// Any failure; callers treat it as "no advice".
    fn advise(&self, request: &AdviceRequest<'_>) -> Result<String, AdviceError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Feature;

    #[test]
    fn test_prompt_mentions_class_score_and_factors() {
        let risk = vec![FeatureContribution {
            feature: Feature::HighBp,
            label: Feature::HighBp.label().to_string(),
            contribution: 0.2,
        }];
        let request = AdviceRequest {
            class: RiskClass::Prediabetic,
            risk_score: 62.5,
            risk_factors: &risk,
            protective_factors: &[],
        };
        let prompt = request.prompt();
        assert!(prompt.contains("PRE-DIABETIC"));
        assert!(prompt.contains("62.5%"));
        assert!(prompt.contains("High blood pressure"));
        assert!(!prompt.contains("lowering"));
    }
}

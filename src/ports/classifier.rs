//! Classifier port: Trait for pre-trained three-class models.

use crate::domain::{FeatureVector, ModelId, N_CLASSES};

/// Error raised by a single model's inference.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("expected {expected} features, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("inference produced an invalid value: {0}")]
    InvalidOutput(String),
}

/// Error raised while building or running an explainer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExplainError {
    #[error("model {0} does not support additive explanations")]
    Unsupported(ModelId),

    #[error("expected {expected} features, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
}

/// A loaded classifier.
///
/// Implementations are immutable after loading and safe to share across threads.
pub trait Classifier: Send + Sync {
    fn id(&self) -> ModelId;

    /// Number of input columns the model was trained on.
    fn n_features(&self) -> usize;

    /// Class probabilities in `[0, 1]`, indexed by class, summing to one.
    ///
    /// # Errors
    /// Returns error if the input shape is wrong or the output is not a valid
    /// distribution.
    fn predict_proba(&self, features: &FeatureVector) -> Result<[f64; N_CLASSES], ModelError>;

    /// Build an additive explainer for this model.
    ///
    /// # Errors
    /// `Unsupported` for model families without a path decomposition.
    fn explainer(&self) -> Result<Box<dyn Explainer>, ExplainError> {
        Err(ExplainError::Unsupported(self.id()))
    }
}

/// Per-feature attribution for one model.
pub trait Explainer: Send + Sync {
    /// Contribution of each input column (schema order) to the model's risk
    /// output. Positive values push toward the pre-diabetic/diabetic classes.
    ///
    /// # Errors
    /// Returns error if the input shape does not match the model.
    fn contributions(&self, features: &FeatureVector) -> Result<Vec<f64>, ExplainError>;
}

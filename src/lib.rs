//! # Glycorisk
//!
//! Local diabetes-risk self-assessment.
//!
//! This crate provides:
//! - Mapping of raw health attributes onto the training-time feature schema
//! - Prediction with up to three pre-trained classifiers, tolerating partial failure
//! - Additive per-feature explanations for the primary tree ensemble
//! - Optional advice text from an external generation service
//! - Persisted history, daily health logs and a linear risk trend
//! - Terminal UI for local use
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core business types (feature schema, predictions, history, trend)
//! - `ports`: Trait definitions for classifiers, explainers, advice and storage
//! - `adapters`: Concrete implementations (tree/linear models, SQLite, HTTP advice)
//! - `application`: Use cases orchestrating domain and ports
//! - `tui`: Terminal user interface

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod tui;

pub use config::AppConfig;
pub use domain::{Caller, FeatureSchema, HistoryRecord, ModelId, RiskClass};

/// Result type for Glycorisk operations
pub type Result<T> = std::result::Result<T, GlycoriskError>;

/// Main error type for Glycorisk
#[derive(Debug, thiserror::Error)]
pub enum GlycoriskError {
    /// A startup-time dependency (column schema, model directory) is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No classifier could produce a result.
    #[error("No prediction model available: {0}")]
    ModelUnavailable(String),

    #[error("Invalid input: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage operation failed: {0}")]
    Storage(#[from] adapters::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GlycoriskError {
    /// Whether this error should be shown to the person using the app.
    ///
    /// Everything else is logged and degraded around.
    #[must_use]
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::ModelUnavailable(_) | Self::Conflict(_)
        )
    }
}

//! scikit-learn model artifacts.
//!
//! The training pipeline exports each fitted estimator as JSON next to the
//! column list it was trained on. This module validates those files and turns
//! them into [`Classifier`] implementations:
//! - `logistic.json`: multinomial logistic regression
//! - `random_forest.json`: random forest of flattened trees
//! - `gradient_boost.json`: multiclass gradient boosting
//!
//! # Security
//!
//! When a signed manifest is present only the files it binds are loaded. When
//! signing is required and no manifest verifies, nothing is loaded.

mod boosting;
mod forest;
mod linear;
pub mod manifest;
pub mod tree;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ed25519_dalek::VerifyingKey;

pub use boosting::{BoostingArtifact, BoostingExplainer, GradientBoostModel};
pub use forest::{ForestArtifact, ForestExplainer, RandomForestModel};
pub use linear::{LogisticArtifact, LogisticModel, Scaler};
pub use manifest::SignedManifest;

use crate::domain::{FeatureSchema, FeatureVector, ModelId, SchemaError, N_CLASSES};
use crate::ports::{Classifier, ModelError};

pub const COLUMNS_FILE: &str = "model_columns.json";

/// Errors raised while loading or validating model artifacts.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Feature count mismatch: schema has {expected}, model expects {actual}")]
    FeatureCount { expected: usize, actual: usize },

    #[error("Invalid column schema: {0}")]
    Schema(#[from] SchemaError),

    #[error("Signature error: {0}")]
    Signature(String),

    #[error("Manifest error: {0}")]
    Manifest(String),
}

pub(crate) fn check_shape(expected: usize, features: &FeatureVector) -> Result<(), ModelError> {
    if features.len() != expected {
        return Err(ModelError::ShapeMismatch {
            expected,
            actual: features.len(),
        });
    }
    Ok(())
}

/// Numerically stable softmax over class scores.
pub(crate) fn softmax(scores: [f64; N_CLASSES]) -> Result<[f64; N_CLASSES], ModelError> {
    if scores.iter().any(|s| !s.is_finite()) {
        return Err(ModelError::InvalidOutput("non-finite class score".into()));
    }
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exp = scores.map(|s| (s - max).exp());
    let total: f64 = exp.iter().sum();
    Ok(exp.map(|e| e / total))
}

/// Everything the loader could make usable.
#[derive(Default)]
pub struct LoadedArtifacts {
    pub schema: Option<FeatureSchema>,
    pub models: Vec<Arc<dyn Classifier>>,
    /// True when the artifacts were bound by a verified manifest.
    pub verified: bool,
}

/// Loads the column schema and model files from a directory.
pub struct ArtifactLoader {
    dir: PathBuf,
    require_signed: bool,
    verifying_key: Option<VerifyingKey>,
}

impl ArtifactLoader {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            require_signed: false,
            verifying_key: None,
        }
    }

    #[must_use]
    pub fn require_signed(mut self, required: bool) -> Self {
        self.require_signed = required;
        self
    }

    #[must_use]
    pub fn with_verifying_key(mut self, key: Option<VerifyingKey>) -> Self {
        self.verifying_key = key;
        self
    }

    /// Load whatever is usable.
    ///
    /// Never fails: a missing schema yields no schema and no models, and a
    /// missing or invalid model file drops only that model. Every problem is
    /// logged.
    #[must_use]
    pub fn load(&self) -> LoadedArtifacts {
        tracing::info!("Loading model artifacts from {:?}", self.dir);

        let manifest = match self.manifest() {
            Ok(m) => m,
            Err(e) => {
                tracing::error!("Refusing to load model artifacts: {e}");
                return LoadedArtifacts::default();
            }
        };
        let bound = |file: &str| manifest.as_ref().map_or(true, |m| m.binds(file));

        if !bound(COLUMNS_FILE) {
            tracing::error!("{COLUMNS_FILE} is not bound by the signed manifest");
            return LoadedArtifacts::default();
        }
        let schema = match self.load_schema() {
            Ok(schema) => schema,
            Err(e) => {
                tracing::error!("Column schema unavailable: {e}");
                return LoadedArtifacts::default();
            }
        };

        let mut models: Vec<Arc<dyn Classifier>> = Vec::new();
        for id in ModelId::ALL {
            let file = id.file_name();
            if !bound(file) {
                tracing::warn!("Skipping {file}: not bound by the signed manifest");
                continue;
            }
            match load_model(&self.dir, id, schema.len()) {
                Ok(model) => {
                    tracing::info!("Loaded {} model", id.display_name());
                    models.push(model);
                }
                Err(e) => tracing::warn!("{} model unavailable: {e}", id.display_name()),
            }
        }

        LoadedArtifacts {
            schema: Some(schema),
            models,
            verified: manifest.is_some(),
        }
    }

    fn manifest(&self) -> Result<Option<SignedManifest>, ArtifactError> {
        if !manifest::is_signed(&self.dir) {
            if self.require_signed {
                return Err(ArtifactError::Signature(format!(
                    "signed models required but no {} / {} in {:?}",
                    manifest::MANIFEST_FILE,
                    manifest::SIGNATURE_FILE,
                    self.dir
                )));
            }
            tracing::warn!("Loading unsigned model artifacts");
            return Ok(None);
        }
        let key = self.verifying_key.as_ref().ok_or_else(|| {
            ArtifactError::Signature("manifest present but no verifying key configured".into())
        })?;
        let manifest = manifest::verify(&self.dir, key)?;
        tracing::info!("Verified signed manifest ({} files)", manifest.files.len());
        Ok(Some(manifest))
    }

    fn load_schema(&self) -> Result<FeatureSchema, ArtifactError> {
        let bytes = fs::read(self.dir.join(COLUMNS_FILE))?;
        let columns: Vec<String> = serde_json::from_slice(&bytes)?;
        Ok(FeatureSchema::from_columns(&columns)?)
    }
}

fn load_model(dir: &Path, id: ModelId, n_features: usize) -> Result<Arc<dyn Classifier>, ArtifactError> {
    let bytes = fs::read(dir.join(id.file_name()))?;
    let model: Arc<dyn Classifier> = match id {
        ModelId::Logistic => Arc::new(LogisticModel::from_artifact(
            serde_json::from_slice(&bytes)?,
            n_features,
        )?),
        ModelId::RandomForest => Arc::new(RandomForestModel::from_artifact(
            serde_json::from_slice(&bytes)?,
            n_features,
        )?),
        ModelId::GradientBoost => Arc::new(GradientBoostModel::from_artifact(
            serde_json::from_slice(&bytes)?,
            n_features,
        )?),
    };
    Ok(model)
}

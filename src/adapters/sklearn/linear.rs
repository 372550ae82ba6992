//! Multinomial logistic regression.

use serde::{Deserialize, Serialize};

use super::{check_shape, softmax, ArtifactError};
use crate::domain::{FeatureVector, ModelId, N_CLASSES};
use crate::ports::{Classifier, ModelError};

/// Standardization applied before the linear layer (`StandardScaler`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Logistic regression artifact as serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticArtifact {
    pub n_features: usize,
    /// One coefficient row per class.
    pub coef: Vec<Vec<f64>>,
    pub intercept: Vec<f64>,
    #[serde(default)]
    pub scaler: Option<Scaler>,
}

#[derive(Debug, Clone)]
pub struct LogisticModel {
    n_features: usize,
    coef: Vec<Vec<f64>>,
    intercept: [f64; N_CLASSES],
    scaler: Option<Scaler>,
}

impl LogisticModel {
    /// # Errors
    /// Returns error if the artifact's shapes disagree with `n_features`.
    pub fn from_artifact(artifact: LogisticArtifact, n_features: usize) -> Result<Self, ArtifactError> {
        if artifact.n_features != n_features {
            return Err(ArtifactError::FeatureCount {
                expected: n_features,
                actual: artifact.n_features,
            });
        }
        if artifact.coef.len() != N_CLASSES
            || artifact.coef.iter().any(|row| row.len() != n_features)
        {
            return Err(ArtifactError::InvalidModel(format!(
                "coef must be {N_CLASSES} x {n_features}"
            )));
        }
        let intercept: [f64; N_CLASSES] = artifact
            .intercept
            .as_slice()
            .try_into()
            .map_err(|_| ArtifactError::InvalidModel(format!("intercept must have {N_CLASSES} entries")))?;
        if let Some(scaler) = &artifact.scaler {
            if scaler.mean.len() != n_features
                || scaler.scale.len() != n_features
                || scaler.scale.iter().any(|s| *s == 0.0 || !s.is_finite())
            {
                return Err(ArtifactError::InvalidModel(
                    "scaler must have one non-zero scale per feature".into(),
                ));
            }
        }
        let all_finite = artifact.coef.iter().flatten().chain(intercept.iter()).all(|v| v.is_finite());
        if !all_finite {
            return Err(ArtifactError::InvalidModel("non-finite coefficient".into()));
        }

        Ok(Self {
            n_features,
            coef: artifact.coef,
            intercept,
            scaler: artifact.scaler,
        })
    }
}

impl Classifier for LogisticModel {
    fn id(&self) -> ModelId {
        ModelId::Logistic
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, features: &FeatureVector) -> Result<[f64; N_CLASSES], ModelError> {
        check_shape(self.n_features, features)?;
        let x = features.as_slice();

        let scaled: Vec<f64> = match &self.scaler {
            Some(s) => x
                .iter()
                .zip(s.mean.iter().zip(&s.scale))
                .map(|(v, (m, sc))| (v - m) / sc)
                .collect(),
            None => x.to_vec(),
        };

        let mut logits = self.intercept;
        for (k, row) in self.coef.iter().enumerate() {
            logits[k] += row.iter().zip(&scaled).map(|(w, v)| w * v).sum::<f64>();
        }
        softmax(logits)
    }
}

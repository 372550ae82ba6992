//! Multiclass gradient boosting and its path explainer.
//!
//! Each boosting stage holds one regression tree per class. The raw score of
//! class `k` is `init[k] + learning_rate * sum(stage[k](x))`, and class
//! probabilities are the softmax of the raw scores.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::tree::{DecisionTree, RawTree};
use super::{check_shape, softmax, ArtifactError};
use crate::domain::{FeatureVector, ModelId, N_CLASSES};
use crate::ports::{Classifier, ExplainError, Explainer, ModelError};

/// Weights turning per-class raw scores into the risk margin
/// `(raw[1] + raw[2]) / 2 - raw[0]`.
const RISK_MARGIN_WEIGHTS: [f64; N_CLASSES] = [-1.0, 0.5, 0.5];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostingArtifact {
    pub n_features: usize,
    pub learning_rate: f64,
    /// Initial raw score per class (log prior).
    pub init: Vec<f64>,
    /// `stages[i][k]` is the regression tree for class `k` at stage `i`.
    pub stages: Vec<Vec<RawTree>>,
}

#[derive(Debug)]
struct Ensemble {
    learning_rate: f64,
    init: [f64; N_CLASSES],
    stages: Vec<[DecisionTree; N_CLASSES]>,
}

#[derive(Debug, Clone)]
pub struct GradientBoostModel {
    n_features: usize,
    ensemble: Arc<Ensemble>,
}

impl GradientBoostModel {
    /// # Errors
    /// Returns error if any stage or tree is malformed.
    pub fn from_artifact(artifact: BoostingArtifact, n_features: usize) -> Result<Self, ArtifactError> {
        if artifact.n_features != n_features {
            return Err(ArtifactError::FeatureCount {
                expected: n_features,
                actual: artifact.n_features,
            });
        }
        if !artifact.learning_rate.is_finite() || artifact.learning_rate <= 0.0 {
            return Err(ArtifactError::InvalidModel("learning_rate must be positive".into()));
        }
        let init: [f64; N_CLASSES] = artifact
            .init
            .as_slice()
            .try_into()
            .map_err(|_| ArtifactError::InvalidModel(format!("init must have {N_CLASSES} entries")))?;
        if artifact.stages.is_empty() {
            return Err(ArtifactError::InvalidModel("ensemble has no stages".into()));
        }

        let mut stages = Vec::with_capacity(artifact.stages.len());
        for (i, stage) in artifact.stages.into_iter().enumerate() {
            let trees = stage
                .into_iter()
                .map(|raw| DecisionTree::from_raw(raw, n_features, 1))
                .collect::<Result<Vec<_>, _>>()?;
            let trees: [DecisionTree; N_CLASSES] = trees.try_into().map_err(|_| {
                ArtifactError::InvalidModel(format!("stage {i} must have {N_CLASSES} trees"))
            })?;
            stages.push(trees);
        }

        Ok(Self {
            n_features,
            ensemble: Arc::new(Ensemble {
                learning_rate: artifact.learning_rate,
                init,
                stages,
            }),
        })
    }
}

impl Ensemble {
    fn raw_scores(&self, x: &[f64]) -> [f64; N_CLASSES] {
        let mut raw = self.init;
        for stage in &self.stages {
            for (score, tree) in raw.iter_mut().zip(stage) {
                *score += self.learning_rate * tree.leaf_value(x)[0];
            }
        }
        raw
    }
}

impl Classifier for GradientBoostModel {
    fn id(&self) -> ModelId {
        ModelId::GradientBoost
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, features: &FeatureVector) -> Result<[f64; N_CLASSES], ModelError> {
        check_shape(self.n_features, features)?;
        softmax(self.ensemble.raw_scores(features.as_slice()))
    }

    fn explainer(&self) -> Result<Box<dyn Explainer>, ExplainError> {
        Ok(Box::new(BoostingExplainer {
            n_features: self.n_features,
            ensemble: Arc::clone(&self.ensemble),
        }))
    }
}

/// Attributes the risk margin to features along each tree's decision path.
/// `bias + sum(contributions)` equals the margin computed from raw scores.
pub struct BoostingExplainer {
    n_features: usize,
    ensemble: Arc<Ensemble>,
}

impl BoostingExplainer {
    #[must_use]
    pub fn bias(&self) -> f64 {
        let e = &self.ensemble;
        let mut bias: f64 = e.init.iter().zip(RISK_MARGIN_WEIGHTS).map(|(v, w)| v * w).sum();
        for stage in &e.stages {
            for (tree, w) in stage.iter().zip(RISK_MARGIN_WEIGHTS) {
                bias += e.learning_rate * w * tree.value(0)[0];
            }
        }
        bias
    }
}

impl Explainer for BoostingExplainer {
    fn contributions(&self, features: &FeatureVector) -> Result<Vec<f64>, ExplainError> {
        if features.len() != self.n_features {
            return Err(ExplainError::ShapeMismatch {
                expected: self.n_features,
                actual: features.len(),
            });
        }
        let x = features.as_slice();
        let e = &self.ensemble;
        let mut contributions = vec![0.0; self.n_features];

        for stage in &e.stages {
            for (tree, w) in stage.iter().zip(RISK_MARGIN_WEIGHTS) {
                let path = tree.decision_path(x);
                for pair in path.windows(2) {
                    if let Some(feature) = tree.split_feature(pair[0]) {
                        let delta = tree.value(pair[1])[0] - tree.value(pair[0])[0];
                        contributions[feature] += e.learning_rate * w * delta;
                    }
                }
            }
        }
        Ok(contributions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sklearn::tree::tests::stump;

    fn model() -> GradientBoostModel {
        let artifact = BoostingArtifact {
            n_features: 2,
            learning_rate: 0.5,
            init: vec![0.2, -0.4, -0.8],
            stages: vec![vec![
                stump(0, 30.0, vec![0.0], vec![0.6], vec![-0.6]),
                stump(1, 0.5, vec![0.0], vec![-0.2], vec![0.4]),
                stump(0, 30.0, vec![0.0], vec![-0.5], vec![0.9]),
            ]],
        };
        GradientBoostModel::from_artifact(artifact, 2).expect("Should build")
    }

    #[test]
    fn test_raw_scores_and_softmax() {
        let m = model();
        let raw = m.ensemble.raw_scores(&[35.0, 1.0]);
        assert!((raw[0] - (0.2 - 0.3)).abs() < 1e-9);
        assert!((raw[1] - (-0.4 + 0.2)).abs() < 1e-9);
        assert!((raw[2] - (-0.8 + 0.45)).abs() < 1e-9);

        let p = m
            .predict_proba(&FeatureVector::from_values(vec![35.0, 1.0]))
            .expect("Should predict");
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_higher_feature_raises_risk() {
        let m = model();
        let low = m
            .predict_proba(&FeatureVector::from_values(vec![20.0, 0.0]))
            .expect("Should predict");
        let high = m
            .predict_proba(&FeatureVector::from_values(vec![40.0, 1.0]))
            .expect("Should predict");
        assert!(high[1] + high[2] > low[1] + low[2]);
    }

    #[test]
    fn test_explanation_is_additive_in_margin() {
        let m = model();
        let explainer = BoostingExplainer {
            n_features: 2,
            ensemble: Arc::clone(&m.ensemble),
        };
        let x = [40.0, 1.0];
        let contributions = explainer
            .contributions(&FeatureVector::from_values(x.to_vec()))
            .expect("Should explain");

        let raw = m.ensemble.raw_scores(&x);
        let margin = (raw[1] + raw[2]) / 2.0 - raw[0];
        let total = explainer.bias() + contributions.iter().sum::<f64>();
        assert!((total - margin).abs() < 1e-9);
        assert!(contributions[0] > 0.0);
        assert!(contributions[1] > 0.0);
    }

    #[test]
    fn test_stage_must_have_one_tree_per_class() {
        let artifact = BoostingArtifact {
            n_features: 1,
            learning_rate: 0.1,
            init: vec![0.0, 0.0, 0.0],
            stages: vec![vec![stump(0, 1.0, vec![0.0], vec![0.1], vec![0.2])]],
        };
        assert!(GradientBoostModel::from_artifact(artifact, 1).is_err());
    }
}

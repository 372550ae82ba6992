//! Random forest classifier and its path explainer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::tree::{DecisionTree, RawTree};
use super::{check_shape, ArtifactError};
use crate::domain::{FeatureVector, ModelId, N_CLASSES};
use crate::ports::{Classifier, ExplainError, Explainer, ModelError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestArtifact {
    pub n_features: usize,
    /// Node values are per-class sample counts or fractions.
    pub trees: Vec<RawTree>,
}

#[derive(Debug, Clone)]
pub struct RandomForestModel {
    n_features: usize,
    trees: Arc<[DecisionTree]>,
}

impl RandomForestModel {
    /// # Errors
    /// Returns error if any tree is malformed or the forest is empty.
    pub fn from_artifact(artifact: ForestArtifact, n_features: usize) -> Result<Self, ArtifactError> {
        if artifact.n_features != n_features {
            return Err(ArtifactError::FeatureCount {
                expected: n_features,
                actual: artifact.n_features,
            });
        }
        if artifact.trees.is_empty() {
            return Err(ArtifactError::InvalidModel("forest has no trees".into()));
        }
        let trees = artifact
            .trees
            .into_iter()
            .map(|raw| DecisionTree::from_raw(raw, n_features, N_CLASSES))
            .collect::<Result<Vec<_>, _>>()?;
        for tree in &trees {
            for node in 0..tree.node_count() {
                if normalized(tree.value(node)).is_none() {
                    return Err(ArtifactError::InvalidModel(format!(
                        "node {node} has a non-positive class total"
                    )));
                }
            }
        }
        Ok(Self {
            n_features,
            trees: trees.into(),
        })
    }
}

/// Class distribution of a node value.
fn normalized(value: &[f64]) -> Option<[f64; N_CLASSES]> {
    let total: f64 = value.iter().sum();
    if total <= 0.0 || value.iter().any(|v| *v < 0.0) {
        return None;
    }
    let mut out = [0.0; N_CLASSES];
    for (o, v) in out.iter_mut().zip(value) {
        *o = v / total;
    }
    Some(out)
}

/// P(class 1) + P(class 2) at a node.
fn node_risk(value: &[f64]) -> f64 {
    normalized(value).map_or(0.0, |p| p[1] + p[2])
}

impl Classifier for RandomForestModel {
    fn id(&self) -> ModelId {
        ModelId::RandomForest
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, features: &FeatureVector) -> Result<[f64; N_CLASSES], ModelError> {
        check_shape(self.n_features, features)?;
        let x = features.as_slice();

        let mut proba = [0.0; N_CLASSES];
        for tree in self.trees.iter() {
            let leaf = normalized(tree.leaf_value(x))
                .ok_or_else(|| ModelError::InvalidOutput("empty leaf".into()))?;
            for (p, l) in proba.iter_mut().zip(leaf) {
                *p += l;
            }
        }
        let n = self.trees.len() as f64;
        Ok(proba.map(|p| p / n))
    }

    fn explainer(&self) -> Result<Box<dyn Explainer>, ExplainError> {
        Ok(Box::new(ForestExplainer {
            n_features: self.n_features,
            trees: Arc::clone(&self.trees),
        }))
    }
}

/// Attributes the forest's risk probability to features along each decision
/// path. `bias + sum(contributions)` equals the forest's P(1) + P(2).
pub struct ForestExplainer {
    n_features: usize,
    trees: Arc<[DecisionTree]>,
}

impl ForestExplainer {
    /// Mean root risk over all trees.
    #[must_use]
    pub fn bias(&self) -> f64 {
        self.trees.iter().map(|t| node_risk(t.value(0))).sum::<f64>() / self.trees.len() as f64
    }
}

impl Explainer for ForestExplainer {
    fn contributions(&self, features: &FeatureVector) -> Result<Vec<f64>, ExplainError> {
        if features.len() != self.n_features {
            return Err(ExplainError::ShapeMismatch {
                expected: self.n_features,
                actual: features.len(),
            });
        }
        let x = features.as_slice();
        let mut contributions = vec![0.0; self.n_features];

        for tree in self.trees.iter() {
            let path = tree.decision_path(x);
            for pair in path.windows(2) {
                let (parent, child) = (pair[0], pair[1]);
                if let Some(feature) = tree.split_feature(parent) {
                    contributions[feature] +=
                        node_risk(tree.value(child)) - node_risk(tree.value(parent));
                }
            }
        }

        let n = self.trees.len() as f64;
        Ok(contributions.into_iter().map(|c| c / n).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sklearn::tree::tests::stump;

    fn forest() -> RandomForestModel {
        let artifact = ForestArtifact {
            n_features: 2,
            trees: vec![
                // Splits on BMI-like feature 0.
                stump(0, 30.0, vec![50.0, 20.0, 30.0], vec![80.0, 10.0, 10.0], vec![20.0, 30.0, 50.0]),
                // Splits on feature 1.
                stump(1, 0.5, vec![6.0, 2.0, 2.0], vec![9.0, 1.0, 0.0], vec![3.0, 3.0, 4.0]),
            ],
        };
        RandomForestModel::from_artifact(artifact, 2).expect("Should build")
    }

    #[test]
    fn test_forest_averages_leaf_distributions() {
        let model = forest();
        let p = model
            .predict_proba(&FeatureVector::from_values(vec![35.0, 1.0]))
            .expect("Should predict");
        // (0.2 + 0.3) / 2, (0.3 + 0.3) / 2, (0.5 + 0.4) / 2
        assert!((p[0] - 0.25).abs() < 1e-9);
        assert!((p[1] - 0.30).abs() < 1e-9);
        assert!((p[2] - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_explanation_is_additive() {
        let model = forest();
        let explainer = ForestExplainer {
            n_features: 2,
            trees: Arc::clone(&model.trees),
        };
        let x = FeatureVector::from_values(vec![35.0, 0.0]);
        let contributions = explainer.contributions(&x).expect("Should explain");
        let p = model.predict_proba(&x).expect("Should predict");

        let total = explainer.bias() + contributions.iter().sum::<f64>();
        assert!((total - (p[1] + p[2])).abs() < 1e-9);
        assert!(contributions[0] > 0.0);
        assert!(contributions[1] < 0.0);
    }

    #[test]
    fn test_explainer_rejects_wrong_shape() {
        let explainer = forest().explainer().expect("Should build explainer");
        assert!(explainer
            .contributions(&FeatureVector::from_values(vec![1.0]))
            .is_err());
    }

    #[test]
    fn test_rejects_empty_class_totals() {
        let artifact = ForestArtifact {
            n_features: 1,
            trees: vec![stump(0, 1.0, vec![0.0, 0.0, 0.0], vec![1.0, 0.0, 0.0], vec![0.0, 0.0, 1.0])],
        };
        assert!(RandomForestModel::from_artifact(artifact, 1).is_err());
    }
}

//! Flattened decision trees as exported from scikit-learn's `tree_` arrays.
//!
//! A tree arrives as parallel arrays indexed by node id: `children_left`,
//! `children_right` (`-1` for leaves), `feature`, `threshold` and `value`.
//! Every node carries a value, not just the leaves, which is what makes the
//! path decomposition in the explainers possible.

use serde::{Deserialize, Serialize};

use super::ArtifactError;

const LEAF: i64 = -1;

/// Tree exactly as serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf,
}

/// A validated tree. Samples go left when `x[feature] <= threshold`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    values: Vec<Vec<f64>>,
}

impl DecisionTree {
    /// Validate a raw tree.
    ///
    /// Children must point strictly forward (pre-order layout), which rules
    /// out cycles, and every node value must have `value_width` entries.
    ///
    /// # Errors
    /// Returns error on any structural problem.
    pub fn from_raw(
        raw: RawTree,
        n_features: usize,
        value_width: usize,
    ) -> Result<Self, ArtifactError> {
        let n = raw.children_left.len();
        if n == 0 {
            return Err(ArtifactError::InvalidModel("tree has no nodes".into()));
        }
        if raw.children_right.len() != n
            || raw.feature.len() != n
            || raw.threshold.len() != n
            || raw.value.len() != n
        {
            return Err(ArtifactError::InvalidModel(
                "tree arrays have different lengths".into(),
            ));
        }

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            if raw.value[i].len() != value_width || raw.value[i].iter().any(|v| !v.is_finite()) {
                return Err(ArtifactError::InvalidModel(format!(
                    "node {i}: expected {value_width} finite values"
                )));
            }

            let (left, right) = (raw.children_left[i], raw.children_right[i]);
            if left == LEAF && right == LEAF {
                nodes.push(Node::Leaf);
                continue;
            }

            let child = |c: i64| -> Result<usize, ArtifactError> {
                usize::try_from(c)
                    .ok()
                    .filter(|&c| c > i && c < n)
                    .ok_or_else(|| {
                        ArtifactError::InvalidModel(format!("node {i}: bad child index {c}"))
                    })
            };
            let feature = usize::try_from(raw.feature[i])
                .ok()
                .filter(|&f| f < n_features)
                .ok_or_else(|| {
                    ArtifactError::InvalidModel(format!(
                        "node {i}: feature index {} out of range",
                        raw.feature[i]
                    ))
                })?;
            if !raw.threshold[i].is_finite() {
                return Err(ArtifactError::InvalidModel(format!(
                    "node {i}: threshold is not finite"
                )));
            }

            nodes.push(Node::Split {
                feature,
                threshold: raw.threshold[i],
                left: child(left)?,
                right: child(right)?,
            });
        }

        Ok(Self {
            nodes,
            values: raw.value,
        })
    }

    /// Node ids visited from the root to the leaf reached by `x`.
    #[must_use]
    pub fn decision_path(&self, x: &[f64]) -> Vec<usize> {
        let mut path = vec![0];
        let mut current = 0;
        while let Node::Split {
            feature,
            threshold,
            left,
            right,
        } = self.nodes[current]
        {
            current = if x[feature] <= threshold { left } else { right };
            path.push(current);
        }
        path
    }

    #[must_use]
    pub fn leaf_value(&self, x: &[f64]) -> &[f64] {
        let path = self.decision_path(x);
        &self.values[path[path.len() - 1]]
    }

    #[must_use]
    pub fn value(&self, node: usize) -> &[f64] {
        &self.values[node]
    }

    /// Feature split on at `node`, if it is not a leaf.
    #[must_use]
    pub fn split_feature(&self, node: usize) -> Option<usize> {
        match self.nodes[node] {
            Node::Split { feature, .. } => Some(feature),
            Node::Leaf => None,
        }
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Stump on feature `feature`: left leaf `lo`, right leaf `hi`, root value `root`.
    pub(crate) fn stump(feature: i64, threshold: f64, root: Vec<f64>, lo: Vec<f64>, hi: Vec<f64>) -> RawTree {
        RawTree {
            children_left: vec![1, -1, -1],
            children_right: vec![2, -1, -1],
            feature: vec![feature, -2, -2],
            threshold: vec![threshold, -2.0, -2.0],
            value: vec![root, lo, hi],
        }
    }

    #[test]
    fn test_path_goes_left_on_equal() {
        let tree = DecisionTree::from_raw(stump(0, 1.5, vec![0.5], vec![0.1], vec![0.9]), 2, 1)
            .expect("Should validate");
        assert_eq!(tree.decision_path(&[1.5, 0.0]), vec![0, 1]);
        assert_eq!(tree.decision_path(&[2.0, 0.0]), vec![0, 2]);
        assert_eq!(tree.leaf_value(&[2.0, 0.0]), &[0.9]);
        assert_eq!(tree.split_feature(0), Some(0));
        assert_eq!(tree.split_feature(1), None);
    }

    #[test]
    fn test_rejects_backward_child() {
        let mut raw = stump(0, 1.0, vec![0.5], vec![0.1], vec![0.9]);
        raw.children_left[0] = 0;
        assert!(DecisionTree::from_raw(raw, 1, 1).is_err());
    }

    #[test]
    fn test_rejects_out_of_range_feature() {
        let raw = stump(5, 1.0, vec![0.5], vec![0.1], vec![0.9]);
        assert!(DecisionTree::from_raw(raw, 3, 1).is_err());
    }

    #[test]
    fn test_rejects_wrong_value_width() {
        let raw = stump(0, 1.0, vec![0.5], vec![0.1, 0.2], vec![0.9]);
        assert!(DecisionTree::from_raw(raw, 1, 1).is_err());
    }
}

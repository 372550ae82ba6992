//! Prediction result types.
//!
//! Probabilities, risk scores and confidences are all expressed in percent
//! (0 to 100) and rounded to two decimals, the unit history and trend use.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::features::{Feature, FeatureSchema};

/// Number of classes every model predicts.
pub const N_CLASSES: usize = 3;

/// Diabetes status predicted by a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskClass {
    /// Class 0
    Healthy,
    /// Class 1
    Prediabetic,
    /// Class 2
    Diabetic,
}

impl RiskClass {
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Healthy),
            1 => Some(Self::Prediabetic),
            2 => Some(Self::Diabetic),
            _ => None,
        }
    }

    #[must_use]
    pub fn index(&self) -> u8 {
        match self {
            Self::Healthy => 0,
            Self::Prediabetic => 1,
            Self::Diabetic => 2,
        }
    }

    /// Get a human-readable description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Healthy => "No diabetes indicators",
            Self::Prediabetic => "Pre-diabetes indicators - follow-up recommended",
            Self::Diabetic => "Diabetes indicators - consult a doctor",
        }
    }
}

impl std::fmt::Display for RiskClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "HEALTHY"),
            Self::Prediabetic => write!(f, "PRE-DIABETIC"),
            Self::Diabetic => write!(f, "DIABETIC"),
        }
    }
}

/// Identifier of one of the trained classifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelId {
    Logistic,
    RandomForest,
    GradientBoost,
}

impl ModelId {
    pub const ALL: [ModelId; 3] = [Self::Logistic, Self::RandomForest, Self::GradientBoost];

    /// Order in which a model is chosen as primary. The boosted ensemble was
    /// the most accurate at training time.
    pub const PRIMARY_ORDER: [ModelId; 3] =
        [Self::GradientBoost, Self::RandomForest, Self::Logistic];

    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Self::Logistic => "logistic",
            Self::RandomForest => "random_forest",
            Self::GradientBoost => "gradient_boost",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.key() == key)
    }

    /// Artifact file name inside the model directory.
    #[must_use]
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Logistic => "logistic.json",
            Self::RandomForest => "random_forest.json",
            Self::GradientBoost => "gradient_boost.json",
        }
    }

    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Logistic => "Logistic Regression",
            Self::RandomForest => "Random Forest",
            Self::GradientBoost => "Gradient Boosting",
        }
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Rounds to two decimals.
#[must_use]
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// One model's answer for one feature vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPrediction {
    pub class: RiskClass,
    /// Per-class probability in percent, indexed by class.
    pub probabilities: [f64; N_CLASSES],
    /// P(pre-diabetic) + P(diabetic), in percent.
    pub risk_score: f64,
    /// Probability of the predicted class, in percent.
    pub confidence: f64,
}

impl ModelPrediction {
    /// Build from raw class probabilities in `[0, 1]`.
    ///
    /// Returns `None` if the distribution is not finite or does not sum to one.
    #[must_use]
    pub fn from_probabilities(proba: [f64; N_CLASSES]) -> Option<Self> {
        let total: f64 = proba.iter().sum();
        if proba.iter().any(|p| !p.is_finite() || *p < 0.0) || (total - 1.0).abs() > 1e-6 {
            return None;
        }

        let (best, _) = proba
            .iter()
            .enumerate()
            .fold((0, f64::MIN), |acc, (i, &p)| if p > acc.1 { (i, p) } else { acc });
        let class = RiskClass::from_index(best)?;

        let probabilities = proba.map(|p| round2(p * 100.0));
        Some(Self {
            class,
            probabilities,
            risk_score: round2((proba[1] + proba[2]) * 100.0),
            confidence: probabilities[best],
        })
    }
}

/// Result of every loaded model for one request. A failed model maps to `None`.
pub type ModelResults = BTreeMap<ModelId, Option<ModelPrediction>>;

/// A feature's additive share of the primary model's risk output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature: Feature,
    pub label: String,
    pub contribution: f64,
}

/// Risk-raising and risk-lowering features for one prediction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// Largest positive contributions, descending.
    pub risk_factors: Vec<FeatureContribution>,
    /// Most negative contributions, most negative first.
    pub protective_factors: Vec<FeatureContribution>,
}

impl Explanation {
    pub const TOP_N: usize = 3;

    /// Rank per-column contributions (schema order) into factor lists.
    ///
    /// Returns an empty explanation if the lengths disagree.
    #[must_use]
    pub fn from_contributions(schema: &FeatureSchema, contributions: &[f64], n: usize) -> Self {
        if contributions.len() != schema.len() {
            return Self::default();
        }

        let mut ranked: Vec<FeatureContribution> = schema
            .columns()
            .iter()
            .zip(contributions)
            .filter(|(_, c)| c.is_finite())
            .map(|(feature, &contribution)| FeatureContribution {
                feature: *feature,
                label: feature.label().to_string(),
                contribution,
            })
            .collect();
        ranked.sort_by(|a, b| b.contribution.total_cmp(&a.contribution));

        let risk_factors = ranked
            .iter()
            .filter(|c| c.contribution > 0.0)
            .take(n)
            .cloned()
            .collect();
        let protective_factors = ranked
            .iter()
            .rev()
            .filter(|c| c.contribution < 0.0)
            .take(n)
            .cloned()
            .collect();

        Self {
            risk_factors,
            protective_factors,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.risk_factors.is_empty() && self.protective_factors.is_empty()
    }
}

/// Who is asking. Only identified callers get history, explanations and advice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Anonymous,
    Identified { user_id: String },
}

impl Caller {
    #[must_use]
    pub fn identified(user_id: impl Into<String>) -> Self {
        Self::Identified {
            user_id: user_id.into(),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::Identified { user_id } => Some(user_id),
        }
    }
}

/// What happened to the history record of a prediction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PersistenceStatus {
    Saved { id: String },
    /// Anonymous callers are never persisted.
    Skipped,
    /// The prediction succeeded but the write did not.
    Failed { reason: String },
}

/// Full answer to a prediction request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionOutcome {
    pub results: ModelResults,
    /// Model whose answer is stored and explained.
    pub primary: ModelId,
    pub explanation: Explanation,
    pub advice: Option<String>,
    pub persistence: PersistenceStatus,
}

impl PredictionOutcome {
    #[must_use]
    pub fn primary_prediction(&self) -> Option<&ModelPrediction> {
        self.results.get(&self.primary).and_then(Option::as_ref)
    }

    #[must_use]
    pub fn is_saved(&self) -> bool {
        matches!(self.persistence, PersistenceStatus::Saved { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_from_probabilities() {
        let p = ModelPrediction::from_probabilities([0.2, 0.1, 0.7]).expect("Should build");
        assert_eq!(p.class, RiskClass::Diabetic);
        assert!((p.risk_score - 80.0).abs() < f64::EPSILON);
        assert!((p.confidence - 70.0).abs() < f64::EPSILON);
        let total: f64 = p.probabilities.iter().sum();
        assert!((total - 100.0).abs() < 0.02);
    }

    #[test]
    fn test_risk_score_differs_from_confidence() {
        let p = ModelPrediction::from_probabilities([0.55, 0.25, 0.20]).expect("Should build");
        assert_eq!(p.class, RiskClass::Healthy);
        assert!((p.confidence - 55.0).abs() < f64::EPSILON);
        assert!((p.risk_score - 45.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_distribution_rejected() {
        assert!(ModelPrediction::from_probabilities([0.5, 0.5, 0.5]).is_none());
        assert!(ModelPrediction::from_probabilities([f64::NAN, 0.5, 0.5]).is_none());
    }

    #[test]
    fn test_model_keys_roundtrip() {
        for id in ModelId::ALL {
            assert_eq!(ModelId::from_key(id.key()), Some(id));
        }
        assert_eq!(ModelId::GradientBoost.file_name(), "gradient_boost.json");
    }

    #[test]
    fn test_explanation_ranking() {
        let schema = FeatureSchema::from_columns(&["HighBP", "BMI", "Age", "PhysActivity", "Fruits"])
            .expect("Should build schema");
        let explanation =
            Explanation::from_contributions(&schema, &[0.30, 0.10, 0.20, -0.15, -0.05], 3);

        let risk: Vec<Feature> = explanation.risk_factors.iter().map(|c| c.feature).collect();
        assert_eq!(risk, vec![Feature::HighBp, Feature::Age, Feature::Bmi]);

        let protective: Vec<Feature> = explanation
            .protective_factors
            .iter()
            .map(|c| c.feature)
            .collect();
        assert_eq!(protective, vec![Feature::PhysActivity, Feature::Fruits]);
    }

    #[test]
    fn test_explanation_length_mismatch_is_empty() {
        let schema = FeatureSchema::from_columns(&["HighBP", "BMI"]).expect("Should build schema");
        assert!(Explanation::from_contributions(&schema, &[0.1], 3).is_empty());
    }

    #[test]
    fn test_caller_identity() {
        assert!(Caller::Anonymous.user_id().is_none());
        assert_eq!(Caller::identified("u1").user_id(), Some("u1"));
    }
}

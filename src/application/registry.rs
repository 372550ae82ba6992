//! Model registry: the loaded schema and classifiers, immutable after startup.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use crate::adapters::sklearn::{manifest, ArtifactLoader, LoadedArtifacts};
use crate::config::AppConfig;
use crate::domain::{
    Explanation, FeatureMapper, FeatureSchema, FeatureVector, ModelId, ModelPrediction,
    ModelResults,
};
use crate::ports::{Classifier, Explainer};
use crate::GlycoriskError;

/// Loaded models, shared read-only across threads.
///
/// Inference takes `&self` only. Each model's explainer is built on first use
/// and cached for the life of the registry.
pub struct ModelRegistry {
    schema: Option<FeatureSchema>,
    models: Vec<Arc<dyn Classifier>>,
    verified: bool,
    explainers: BTreeMap<ModelId, OnceLock<Option<Box<dyn Explainer>>>>,
}

impl ModelRegistry {
    #[must_use]
    pub fn new(schema: Option<FeatureSchema>, models: Vec<Arc<dyn Classifier>>) -> Self {
        let explainers = models.iter().map(|m| (m.id(), OnceLock::new())).collect();
        Self {
            schema,
            models,
            verified: false,
            explainers,
        }
    }

    #[must_use]
    pub fn from_artifacts(artifacts: LoadedArtifacts) -> Self {
        let mut registry = Self::new(artifacts.schema, artifacts.models);
        registry.verified = artifacts.verified;
        registry
    }

    /// Load artifacts as configured. Never fails; see [`ModelRegistry::is_ready`].
    #[must_use]
    pub fn load(config: &AppConfig) -> Self {
        let key = config
            .model_pubkey_file
            .as_deref()
            .and_then(|path| match manifest::load_verifying_key(path) {
                Ok(key) => Some(key),
                Err(e) => {
                    tracing::warn!("Model verifying key unavailable: {e}");
                    None
                }
            });

        let artifacts = ArtifactLoader::new(config.model_dir.clone())
            .require_signed(config.require_signed_models)
            .with_verifying_key(key)
            .load();
        let registry = Self::from_artifacts(artifacts);

        if registry.is_ready() {
            tracing::info!(
                "Model registry ready: {} model(s), {} columns",
                registry.models.len(),
                registry.schema.as_ref().map_or(0, FeatureSchema::len)
            );
        } else {
            tracing::warn!("Model registry not ready; predictions are unavailable");
        }
        registry
    }

    /// A schema and at least one model are loaded.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.schema.is_some() && !self.models.is_empty()
    }

    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.verified
    }

    #[must_use]
    pub fn schema(&self) -> Option<&FeatureSchema> {
        self.schema.as_ref()
    }

    #[must_use]
    pub fn mapper(&self) -> FeatureMapper<'_> {
        FeatureMapper::new(self.schema.as_ref())
    }

    /// Ids of loaded models, in load order.
    #[must_use]
    pub fn model_ids(&self) -> Vec<ModelId> {
        self.models.iter().map(|m| m.id()).collect()
    }

    fn model(&self, id: ModelId) -> Option<&Arc<dyn Classifier>> {
        self.models.iter().find(|m| m.id() == id)
    }

    /// Run every loaded model. A model that fails is recorded as `None`.
    ///
    /// # Errors
    /// `ModelUnavailable` when no model is loaded or none succeeds.
    pub fn predict_all(&self, features: &FeatureVector) -> Result<ModelResults, GlycoriskError> {
        if self.models.is_empty() {
            return Err(GlycoriskError::ModelUnavailable(
                "no classifier is loaded".to_string(),
            ));
        }

        let mut results = ModelResults::new();
        for model in &self.models {
            let id = model.id();
            let prediction = match model.predict_proba(features) {
                Ok(proba) => {
                    let prediction = ModelPrediction::from_probabilities(proba);
                    if prediction.is_none() {
                        tracing::warn!("{id} returned an invalid distribution");
                    }
                    prediction
                }
                Err(e) => {
                    tracing::warn!("{id} inference failed: {e}");
                    None
                }
            };
            results.insert(id, prediction);
        }

        if results.values().all(Option::is_none) {
            return Err(GlycoriskError::ModelUnavailable(
                "every classifier failed".to_string(),
            ));
        }
        Ok(results)
    }

    /// Explain the risk output of model `id`, normally the request's primary
    /// model. Any failure yields an empty explanation.
    #[must_use]
    pub fn explain(&self, id: ModelId, features: &FeatureVector) -> Explanation {
        let (Some(schema), Some(model), Some(cell)) =
            (self.schema.as_ref(), self.model(id), self.explainers.get(&id))
        else {
            return Explanation::default();
        };
        let explainer = cell.get_or_init(|| match model.explainer() {
            Ok(explainer) => Some(explainer),
            Err(e) => {
                tracing::info!("No explanations available for {id}: {e}");
                None
            }
        });
        let Some(explainer) = explainer else {
            return Explanation::default();
        };

        match explainer.contributions(features) {
            Ok(contributions) => {
                Explanation::from_contributions(schema, &contributions, Explanation::TOP_N)
            }
            Err(e) => {
                tracing::warn!("Explanation failed: {e}");
                Explanation::default()
            }
        }
    }
}

/// First model in [`ModelId::PRIMARY_ORDER`] with a result.
#[must_use]
pub fn primary_of(results: &ModelResults) -> Option<ModelId> {
    ModelId::PRIMARY_ORDER
        .into_iter()
        .find(|id| matches!(results.get(id), Some(Some(_))))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::N_CLASSES;
    use crate::ports::{ExplainError, ModelError};

    /// Classifier returning a fixed distribution, or failing when `proba` is `None`.
    pub(crate) struct StubModel {
        pub id: ModelId,
        pub proba: Option<[f64; N_CLASSES]>,
        pub contributions: Option<Vec<f64>>,
    }

    struct StubExplainer(Vec<f64>);

    impl Explainer for StubExplainer {
        fn contributions(&self, _features: &FeatureVector) -> Result<Vec<f64>, ExplainError> {
            Ok(self.0.clone())
        }
    }

    impl Classifier for StubModel {
        fn id(&self) -> ModelId {
            self.id
        }

        fn n_features(&self) -> usize {
            3
        }

        fn predict_proba(&self, _features: &FeatureVector) -> Result<[f64; N_CLASSES], ModelError> {
            self.proba
                .ok_or_else(|| ModelError::InvalidOutput("stub failure".into()))
        }

        fn explainer(&self) -> Result<Box<dyn Explainer>, ExplainError> {
            match &self.contributions {
                Some(c) => Ok(Box::new(StubExplainer(c.clone()))),
                None => Err(ExplainError::Unsupported(self.id)),
            }
        }
    }

    pub(crate) fn schema() -> FeatureSchema {
        FeatureSchema::from_columns(&["BMI", "HighBP", "Age"]).expect("Should build schema")
    }

    pub(crate) fn stub(id: ModelId, proba: Option<[f64; N_CLASSES]>) -> Arc<dyn Classifier> {
        Arc::new(StubModel {
            id,
            proba,
            contributions: None,
        })
    }

    pub(crate) fn full_registry() -> ModelRegistry {
        ModelRegistry::new(
            Some(schema()),
            vec![
                stub(ModelId::Logistic, Some([0.5, 0.3, 0.2])),
                stub(ModelId::RandomForest, Some([0.4, 0.4, 0.2])),
                Arc::new(StubModel {
                    id: ModelId::GradientBoost,
                    proba: Some([0.1, 0.2, 0.7]),
                    contributions: Some(vec![0.4, 0.1, -0.2]),
                }),
            ],
        )
    }

    fn features() -> FeatureVector {
        FeatureVector::from_values(vec![30.0, 1.0, 9.0])
    }

    #[test]
    fn test_predict_all_runs_every_model() {
        let registry = full_registry();
        assert!(registry.is_ready());
        let results = registry.predict_all(&features()).expect("Should predict");
        assert_eq!(results.len(), 3);

        for prediction in results.values().flatten() {
            let total: f64 = prediction.probabilities.iter().sum();
            assert!((total - 100.0).abs() < 0.05);
            let risk = prediction.probabilities[1] + prediction.probabilities[2];
            assert!((prediction.risk_score - risk).abs() < 0.02);
        }
        assert_eq!(primary_of(&results), Some(ModelId::GradientBoost));
    }

    #[test]
    fn test_one_failing_model_keeps_the_others() {
        let registry = ModelRegistry::new(
            Some(schema()),
            vec![
                stub(ModelId::Logistic, Some([0.5, 0.3, 0.2])),
                stub(ModelId::RandomForest, Some([0.4, 0.4, 0.2])),
                stub(ModelId::GradientBoost, None),
            ],
        );
        let results = registry.predict_all(&features()).expect("Should predict");
        assert_eq!(results.get(&ModelId::GradientBoost), Some(&None));
        assert!(results[&ModelId::Logistic].is_some());
        assert!(results[&ModelId::RandomForest].is_some());
        assert_eq!(primary_of(&results), Some(ModelId::RandomForest));
    }

    #[test]
    fn test_invalid_distribution_counts_as_failure() {
        let registry = ModelRegistry::new(
            Some(schema()),
            vec![
                stub(ModelId::Logistic, Some([0.9, 0.9, 0.9])),
                stub(ModelId::RandomForest, Some([0.4, 0.4, 0.2])),
            ],
        );
        let results = registry.predict_all(&features()).expect("Should predict");
        assert_eq!(results.get(&ModelId::Logistic), Some(&None));
    }

    #[test]
    fn test_no_models_is_unavailable() {
        let registry = ModelRegistry::new(Some(schema()), Vec::new());
        assert!(!registry.is_ready());
        assert!(matches!(
            registry.predict_all(&features()),
            Err(GlycoriskError::ModelUnavailable(_))
        ));

        let all_failing = ModelRegistry::new(Some(schema()), vec![stub(ModelId::Logistic, None)]);
        assert!(matches!(
            all_failing.predict_all(&features()),
            Err(GlycoriskError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_explain_uses_primary_model() {
        let registry = full_registry();
        let results = registry.predict_all(&features()).expect("Should predict");
        let primary = primary_of(&results).expect("Should have a primary");
        assert_eq!(primary, ModelId::GradientBoost);
        let explanation = registry.explain(primary, &features());

        let risk: Vec<&str> = explanation.risk_factors.iter().map(|f| f.feature.column()).collect();
        assert_eq!(risk, vec!["BMI", "HighBP"]);
        assert_eq!(explanation.protective_factors.len(), 1);
        assert_eq!(explanation.protective_factors[0].feature.column(), "Age");
    }

    #[test]
    fn test_explain_without_tree_model_is_empty() {
        let registry = ModelRegistry::new(
            Some(schema()),
            vec![stub(ModelId::Logistic, Some([0.5, 0.3, 0.2]))],
        );
        assert!(registry.explain(ModelId::Logistic, &features()).is_empty());
        assert!(registry.explain(ModelId::GradientBoost, &features()).is_empty());
    }

    #[test]
    fn test_explanation_follows_fallback_primary() {
        let registry = ModelRegistry::new(
            Some(schema()),
            vec![
                Arc::new(StubModel {
                    id: ModelId::RandomForest,
                    proba: Some([0.4, 0.4, 0.2]),
                    contributions: Some(vec![-0.3, 0.0, 0.2]),
                }),
                Arc::new(StubModel {
                    id: ModelId::GradientBoost,
                    proba: None,
                    contributions: Some(vec![0.4, 0.1, -0.2]),
                }),
            ],
        );
        let results = registry.predict_all(&features()).expect("Should predict");
        let primary = primary_of(&results).expect("Should have a primary");
        assert_eq!(primary, ModelId::RandomForest);

        let explanation = registry.explain(primary, &features());
        let risk: Vec<&str> = explanation.risk_factors.iter().map(|f| f.feature.column()).collect();
        assert_eq!(risk, vec!["Age"]);
        assert_eq!(explanation.protective_factors[0].feature.column(), "BMI");

        // Cached per model: the gradient boost explainer is still its own.
        let other = registry.explain(ModelId::GradientBoost, &features());
        assert_eq!(other.risk_factors[0].feature.column(), "BMI");
    }

    #[test]
    fn test_shipped_models_load_and_predict() {
        let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/models");
        let registry = ModelRegistry::from_artifacts(ArtifactLoader::new(dir).load());
        assert!(registry.is_ready());
        assert_eq!(registry.model_ids().len(), 3);
        let schema = registry.schema().expect("Should load schema");
        assert_eq!(schema.len(), 16);

        let high_risk = serde_json::json!({
            "HighBP": 1, "HighChol": 1, "HeartDiseaseorAttack": 1, "DiffWalk": 1,
            "GenHlth": 5, "PhysHlth": 20, "PhysActivity": 0, "BMI": 38.0, "Age": 11
        });
        let high_risk = high_risk.as_object().cloned().expect("object");

        for input in [serde_json::Map::new(), high_risk.clone()] {
            let features = registry.mapper().map(&input).expect("Should map");
            assert_eq!(features.len(), schema.len());

            let results = registry.predict_all(&features).expect("Should predict");
            assert_eq!(results.len(), 3);
            for prediction in results.values() {
                let prediction = prediction.as_ref().expect("Every shipped model should predict");
                let total: f64 = prediction.probabilities.iter().sum();
                assert!((total - 100.0).abs() < 0.05);
                let risk = prediction.probabilities[1] + prediction.probabilities[2];
                assert!((prediction.risk_score - risk).abs() < 0.02);
            }
        }

        let features = registry.mapper().map(&high_risk).expect("Should map");
        let results = registry.predict_all(&features).expect("Should predict");
        assert_eq!(primary_of(&results), Some(ModelId::GradientBoost));
        let explanation = registry.explain(ModelId::GradientBoost, &features);
        assert!(!explanation.is_empty());
    }

    #[test]
    fn test_load_from_missing_directory_is_not_ready() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = AppConfig {
            model_dir: temp.path().join("absent"),
            ..AppConfig::default()
        };
        let registry = ModelRegistry::load(&config);
        assert!(!registry.is_ready());
        assert!(registry.mapper().map(&serde_json::Map::new()).is_err());
    }
}

//! Prediction service: Orchestrates one risk assessment.
//!
//! This service coordinates:
//! - Feature mapping
//! - Multi-model inference
//! - Explanation and advice (identified callers only)
//! - History persistence (identified callers only)
//!
//! Explanation, advice and persistence are best-effort: their failures are
//! logged and never undo the prediction.

use std::sync::Arc;

use serde_json::{Map, Value};

use super::registry::{primary_of, ModelRegistry};
use crate::domain::{
    Caller, Explanation, HistoryRecord, ModelPrediction, PersistenceStatus, PredictionOutcome,
};
use crate::ports::{AdviceGenerator, AdviceRequest, Storage};
use crate::GlycoriskError;

/// Pipeline stage, reported to progress observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionPhase {
    Mapping,
    Predicting,
    Explaining,
    Advising,
    Saving,
}

impl PredictionPhase {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Mapping => "Mapping attributes to features...",
            Self::Predicting => "Running models...",
            Self::Explaining => "Explaining the primary model...",
            Self::Advising => "Requesting advice...",
            Self::Saving => "Saving to history...",
        }
    }
}

/// Service for running risk assessments.
pub struct PredictionService<S>
where
    S: Storage,
{
    registry: Arc<ModelRegistry>,
    storage: Arc<S>,
    advisor: Option<Arc<dyn AdviceGenerator>>,
}

impl<S> PredictionService<S>
where
    S: Storage,
{
    pub fn new(
        registry: Arc<ModelRegistry>,
        storage: Arc<S>,
        advisor: Option<Arc<dyn AdviceGenerator>>,
    ) -> Self {
        Self {
            registry,
            storage,
            advisor,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    #[must_use]
    pub fn has_advisor(&self) -> bool {
        self.advisor.is_some()
    }

    /// Assess `input` for `caller`.
    ///
    /// # Errors
    /// `Configuration` without a schema, `Validation` for bad input,
    /// `ModelUnavailable` when no model produces a result.
    pub fn predict(
        &self,
        caller: &Caller,
        input: &Map<String, Value>,
    ) -> Result<PredictionOutcome, GlycoriskError> {
        self.predict_with_progress(caller, input, |_| {})
    }

    /// Same as [`PredictionService::predict`], reporting each stage as it starts.
    ///
    /// # Errors
    /// See [`PredictionService::predict`].
    pub fn predict_with_progress<F>(
        &self,
        caller: &Caller,
        input: &Map<String, Value>,
        mut on_phase: F,
    ) -> Result<PredictionOutcome, GlycoriskError>
    where
        F: FnMut(PredictionPhase),
    {
        on_phase(PredictionPhase::Mapping);
        let features = self.registry.mapper().map(input)?;

        on_phase(PredictionPhase::Predicting);
        let results = self.registry.predict_all(&features)?;
        let primary = primary_of(&results).ok_or_else(|| {
            GlycoriskError::ModelUnavailable("no primary model result".to_string())
        })?;

        let mut outcome = PredictionOutcome {
            results,
            primary,
            explanation: Explanation::default(),
            advice: None,
            persistence: PersistenceStatus::Skipped,
        };

        let Some(user_id) = caller.user_id() else {
            tracing::info!("Anonymous assessment complete (primary {primary})");
            return Ok(outcome);
        };

        on_phase(PredictionPhase::Explaining);
        outcome.explanation = self.registry.explain(primary, &features);

        if let Some(advisor) = &self.advisor {
            if let Some(prediction) = outcome.primary_prediction() {
                on_phase(PredictionPhase::Advising);
                let advice = self.advise(advisor.as_ref(), prediction, &outcome.explanation);
                outcome.advice = advice;
            }
        }

        on_phase(PredictionPhase::Saving);
        outcome.persistence = self.persist(user_id, input, &outcome);

        tracing::info!(
            "Assessment complete: primary={primary}, saved={}",
            outcome.is_saved()
        );
        Ok(outcome)
    }

    fn advise(
        &self,
        advisor: &dyn AdviceGenerator,
        prediction: &ModelPrediction,
        explanation: &Explanation,
    ) -> Option<String> {
        let request = AdviceRequest {
            class: prediction.class,
            risk_score: prediction.risk_score,
            risk_factors: &explanation.risk_factors,
            protective_factors: &explanation.protective_factors,
        };
        match advisor.advise(&request) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!("Advice unavailable: {e}");
                None
            }
        }
    }

    fn persist(
        &self,
        user_id: &str,
        input: &Map<String, Value>,
        outcome: &PredictionOutcome,
    ) -> PersistenceStatus {
        let Some(record) = HistoryRecord::from_outcome(user_id, input, outcome) else {
            return PersistenceStatus::Failed {
                reason: "primary model produced no result".to_string(),
            };
        };
        match self.storage.save_history(&record) {
            Ok(()) => PersistenceStatus::Saved { id: record.id },
            Err(e) => {
                tracing::error!("Failed to save history record: {e}");
                PersistenceStatus::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::SqliteStorage;
    use crate::adapters::StorageError;
    use crate::application::registry::tests::{full_registry, schema, stub};
    use crate::domain::{DailyLog, ModelId};
    use crate::ports::{AdviceError, HistoryPage};
    use chrono::{DateTime, Utc};
    use serde_json::json;
    use std::sync::Mutex;

    struct StubAdvisor {
        fail: bool,
        prompts: Mutex<Vec<String>>,
    }

    impl StubAdvisor {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    impl AdviceGenerator for StubAdvisor {
        fn advise(&self, request: &AdviceRequest<'_>) -> Result<String, AdviceError> {
            self.prompts.lock().expect("Lock failed").push(request.prompt());
            if self.fail {
                Err(AdviceError::Transport("connection reset".into()))
            } else {
                Ok("Take a 30 minute walk most days.".into())
            }
        }
    }

    /// Storage whose every write fails.
    struct FailingStorage;

    impl Storage for FailingStorage {
        type Error = StorageError;

        fn save_history(&self, _record: &HistoryRecord) -> Result<(), Self::Error> {
            Err(StorageError::Serialization("disk full".into()))
        }
        fn load_history(&self, _: &str, _: usize) -> Result<Vec<HistoryRecord>, Self::Error> {
            Ok(Vec::new())
        }
        fn load_history_page(&self, _: &str, o: usize, l: usize) -> Result<HistoryPage, Self::Error> {
            Ok(HistoryPage::new(Vec::new(), 0, o, l))
        }
        fn count_history(&self, _: &str) -> Result<usize, Self::Error> {
            Ok(0)
        }
        fn delete_history(&self, _: &str, _: &str) -> Result<bool, Self::Error> {
            Ok(false)
        }
        fn load_risk_series(&self, _: &str) -> Result<Vec<(DateTime<Utc>, f64)>, Self::Error> {
            Ok(Vec::new())
        }
        fn save_log(&self, _: &DailyLog) -> Result<(), Self::Error> {
            Err(StorageError::Serialization("disk full".into()))
        }
        fn load_logs(&self, _: &str, _: usize) -> Result<Vec<DailyLog>, Self::Error> {
            Ok(Vec::new())
        }
    }

    fn input() -> Map<String, Value> {
        json!({"bmi": 31.2, "high_bp": true, "age": 52})
            .as_object()
            .cloned()
            .expect("Should be object")
    }

    fn service(
        advisor: Option<Arc<dyn AdviceGenerator>>,
    ) -> (PredictionService<SqliteStorage>, Arc<SqliteStorage>) {
        let storage = Arc::new(SqliteStorage::in_memory().expect("Should create db"));
        let service = PredictionService::new(Arc::new(full_registry()), Arc::clone(&storage), advisor);
        (service, storage)
    }

    #[test]
    fn test_anonymous_gets_no_advice_and_no_history() {
        let advisor = StubAdvisor::new(false);
        let (service, storage) = service(Some(advisor.clone()));

        let outcome = service.predict(&Caller::Anonymous, &input()).expect("Should predict");
        assert_eq!(outcome.results.len(), 3);
        assert!(outcome.advice.is_none());
        assert!(outcome.explanation.is_empty());
        assert_eq!(outcome.persistence, PersistenceStatus::Skipped);
        assert!(!outcome.is_saved());
        assert!(advisor.prompts.lock().expect("Lock failed").is_empty());
        assert_eq!(storage.count_history("anyone").expect("Should count"), 0);
    }

    #[test]
    fn test_identified_gets_advice_and_history() {
        let advisor = StubAdvisor::new(false);
        let (service, storage) = service(Some(advisor.clone()));
        let caller = Caller::identified("alice");

        let outcome = service.predict(&caller, &input()).expect("Should predict");
        assert_eq!(outcome.primary, ModelId::GradientBoost);
        assert_eq!(outcome.advice.as_deref(), Some("Take a 30 minute walk most days."));
        assert!(outcome.is_saved());
        assert!(!outcome.explanation.risk_factors.is_empty());

        let prompts = advisor.prompts.lock().expect("Lock failed");
        assert!(prompts[0].contains("DIABETIC"));
        assert!(prompts[0].contains("90.0%"));

        let history = storage.load_history("alice", 10).expect("Should load");
        assert_eq!(history.len(), 1);
        assert!((history[0].risk_probability - 90.0).abs() < f64::EPSILON);
        assert_eq!(history[0].advice, outcome.advice);
        assert_eq!(history[0].input_snapshot, input());
        assert_eq!(history[0].model_scores, outcome.results);
    }

    #[test]
    fn test_advice_failure_still_saves() {
        let (service, storage) = service(Some(StubAdvisor::new(true)));
        let outcome = service
            .predict(&Caller::identified("alice"), &input())
            .expect("Should predict");
        assert!(outcome.advice.is_none());
        assert!(outcome.is_saved());
        assert_eq!(storage.count_history("alice").expect("Should count"), 1);
    }

    #[test]
    fn test_storage_failure_keeps_prediction() {
        let service = PredictionService::new(
            Arc::new(full_registry()),
            Arc::new(FailingStorage),
            None,
        );
        let outcome = service
            .predict(&Caller::identified("alice"), &input())
            .expect("Should predict");
        assert!(!outcome.is_saved());
        assert!(matches!(outcome.persistence, PersistenceStatus::Failed { .. }));
        assert!(outcome.primary_prediction().is_some());
    }

    #[test]
    fn test_history_falls_back_when_primary_fails() {
        let registry = ModelRegistry::new(
            Some(schema()),
            vec![
                stub(ModelId::Logistic, Some([0.5, 0.3, 0.2])),
                stub(ModelId::RandomForest, Some([0.4, 0.4, 0.2])),
                stub(ModelId::GradientBoost, None),
            ],
        );
        let storage = Arc::new(SqliteStorage::in_memory().expect("Should create db"));
        let service = PredictionService::new(Arc::new(registry), Arc::clone(&storage), None);

        let outcome = service
            .predict(&Caller::identified("alice"), &input())
            .expect("Should predict");
        assert_eq!(outcome.primary, ModelId::RandomForest);
        assert_eq!(outcome.results.get(&ModelId::GradientBoost), Some(&None));

        let history = storage.load_history("alice", 1).expect("Should load");
        assert!((history[0].risk_probability - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validation_errors_are_returned() {
        let (service, _) = service(None);
        let bad = json!({"high_bp": 3, "age": -4})
            .as_object()
            .cloned()
            .expect("Should be object");
        match service.predict(&Caller::Anonymous, &bad) {
            Err(GlycoriskError::Validation(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_progress_phases_in_order() {
        let (service, _) = service(Some(StubAdvisor::new(false)));
        let mut phases = Vec::new();
        service
            .predict_with_progress(&Caller::identified("alice"), &input(), |p| phases.push(p))
            .expect("Should predict");
        assert_eq!(
            phases,
            vec![
                PredictionPhase::Mapping,
                PredictionPhase::Predicting,
                PredictionPhase::Explaining,
                PredictionPhase::Advising,
                PredictionPhase::Saving,
            ]
        );
    }
}

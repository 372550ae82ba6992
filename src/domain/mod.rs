//! Domain layer: Core business types and logic.
//!
//! Pure types with no I/O. Everything here is serializable and validated at
//! construction or mapping time.

pub mod features;
mod health_log;
mod history;
mod prediction;
pub mod trend;

pub use features::{Feature, FeatureMapper, FeatureSchema, FeatureVector, SchemaError};
pub use health_log::{summarize_logs, DailyLog, DailyLogEntry};
pub use history::{uuid_v4, HistoryRecord};
pub use prediction::{
    round2, Caller, Explanation, FeatureContribution, ModelId, ModelPrediction, ModelResults,
    PersistenceStatus, PredictionOutcome, RiskClass, N_CLASSES,
};
pub use trend::{estimate_trend, TrendDirection, TrendPoint, TrendSummary};

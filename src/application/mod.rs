//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the core use cases of the application.

mod health_log;
mod history;
mod prediction;
mod registry;

pub use health_log::{HealthLogService, DEFAULT_LOG_WINDOW};
pub use history::HistoryService;
pub use prediction::{PredictionPhase, PredictionService};
pub use registry::{primary_of, ModelRegistry};

#[cfg(test)]
pub(crate) use registry::tests::full_registry as registry_for_tests;

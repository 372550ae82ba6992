//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the application and external systems (model artifacts, the advice
//! service, storage).

mod advice;
mod classifier;
mod storage;

pub use advice::{AdviceError, AdviceGenerator, AdviceRequest};
pub use classifier::{Classifier, ExplainError, Explainer, ModelError};
pub use storage::{HistoryPage, Storage};

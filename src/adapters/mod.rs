//! Adapters layer: Concrete implementations of ports.
//!
//! These modules contain the actual integration with external libraries:
//! - `sklearn`: scikit-learn model artifacts (loading, signature checks, inference)
//! - `gemini`: HTTP advice backend
//! - `sqlite`: SQLite for local storage
//! - `sanitize`: PII filtering for logs

pub mod gemini;
pub mod sanitize;
pub mod sklearn;
pub mod sqlite;

// Re-export storage error for lib.rs
pub use sqlite::StorageError;

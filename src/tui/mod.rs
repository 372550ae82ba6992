//! TUI module: Terminal User Interface using Ratatui.
//!
//! Screens:
//! - Dashboard with model and session status
//! - Assessment form (manual, sample or prefilled from daily logs)
//! - Result with per-model scores, factors and advice
//! - History with the fitted risk trend
//! - Daily log entry

mod app;
mod styles;
mod ui;
mod worker;

pub use app::App;
pub use styles::Theme;
pub use worker::{AssessmentProgress, AssessmentWorker, AssessmentWorkerHandle};

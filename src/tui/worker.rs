//! Background worker for assessments.
//!
//! Runs the prediction pipeline (including the advice request, which can take
//! seconds) off the TUI thread and streams phase changes back over a channel.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde_json::{Map, Value};

use crate::application::{PredictionPhase, PredictionService};
use crate::domain::{Caller, PredictionOutcome};
use crate::ports::Storage;

/// Progress updates from the assessment worker.
#[derive(Debug, Clone)]
pub enum AssessmentProgress {
    /// A pipeline stage started
    Phase(PredictionPhase),
    Complete(Box<PredictionOutcome>),
    /// Message safe to show to the user
    Error(String),
}

/// Handle to a running assessment worker.
pub struct AssessmentWorkerHandle {
    pub progress_rx: Receiver<AssessmentProgress>,
    _handle: JoinHandle<()>,
}

impl AssessmentWorkerHandle {
    /// Try to receive the next progress update (non-blocking).
    #[must_use]
    pub fn try_recv(&self) -> Option<AssessmentProgress> {
        self.progress_rx.try_recv().ok()
    }
}

pub struct AssessmentWorker;

impl AssessmentWorker {
    /// Spawn one assessment in the background.
    pub fn spawn<S>(
        service: Arc<PredictionService<S>>,
        caller: Caller,
        input: Map<String, Value>,
    ) -> AssessmentWorkerHandle
    where
        S: Storage + 'static,
    {
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            Self::run_with_progress(&service, &caller, &input, &tx);
        });

        AssessmentWorkerHandle {
            progress_rx: rx,
            _handle: handle,
        }
    }

    fn run_with_progress<S>(
        service: &PredictionService<S>,
        caller: &Caller,
        input: &Map<String, Value>,
        tx: &Sender<AssessmentProgress>,
    ) where
        S: Storage,
    {
        let result = service.predict_with_progress(caller, input, |phase| {
            let _ = tx.send(AssessmentProgress::Phase(phase));
        });

        let message = match result {
            Ok(outcome) => AssessmentProgress::Complete(Box::new(outcome)),
            Err(e) if e.is_user_facing() => AssessmentProgress::Error(e.to_string()),
            Err(e) => {
                tracing::error!("Assessment failed: {e}");
                AssessmentProgress::Error("The assessment could not be completed.".to_string())
            }
        };
        let _ = tx.send(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::SqliteStorage;
    use crate::application::registry_for_tests;
    use std::time::Duration;

    fn drain(handle: &AssessmentWorkerHandle) -> Vec<AssessmentProgress> {
        let mut out = Vec::new();
        while let Ok(msg) = handle.progress_rx.recv_timeout(Duration::from_secs(5)) {
            let done = !matches!(msg, AssessmentProgress::Phase(_));
            out.push(msg);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn test_worker_streams_phases_then_result() {
        let storage = Arc::new(SqliteStorage::in_memory().expect("Should create db"));
        let service = Arc::new(PredictionService::new(
            Arc::new(registry_for_tests()),
            storage,
            None,
        ));
        let mut input = Map::new();
        input.insert("BMI".into(), Value::from(31.0));

        let handle = AssessmentWorker::spawn(service, Caller::identified("alice"), input);
        let messages = drain(&handle);

        assert!(matches!(
            messages.first(),
            Some(AssessmentProgress::Phase(PredictionPhase::Mapping))
        ));
        match messages.last() {
            Some(AssessmentProgress::Complete(outcome)) => assert!(outcome.is_saved()),
            other => panic!("Expected completion, got {other:?}"),
        }
    }

    #[test]
    fn test_worker_reports_validation_errors() {
        let storage = Arc::new(SqliteStorage::in_memory().expect("Should create db"));
        let service = Arc::new(PredictionService::new(
            Arc::new(registry_for_tests()),
            storage,
            None,
        ));
        let mut input = Map::new();
        input.insert("HighBP".into(), Value::from(7));

        let handle = AssessmentWorker::spawn(service, Caller::Anonymous, input);
        match drain(&handle).last() {
            Some(AssessmentProgress::Error(message)) => assert!(message.contains("HighBP")),
            other => panic!("Expected error, got {other:?}"),
        }
    }
}

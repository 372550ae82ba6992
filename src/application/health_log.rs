//! Health log service: daily lifestyle entries and prefilled assessments.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::adapters::StorageError;
use crate::domain::{summarize_logs, DailyLog, DailyLogEntry};
use crate::ports::Storage;
use crate::GlycoriskError;

/// Default number of recent logs folded into an assessment.
pub const DEFAULT_LOG_WINDOW: usize = 30;

pub struct HealthLogService<S>
where
    S: Storage,
{
    storage: Arc<S>,
}

impl<S> HealthLogService<S>
where
    S: Storage,
    S::Error: Into<StorageError>,
{
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Record the user's log for `date`.
    ///
    /// # Errors
    /// `Validation` for an invalid entry, `Conflict` when the date is already
    /// logged, `Storage` for anything else.
    pub fn add(
        &self,
        user_id: &str,
        date: NaiveDate,
        entry: DailyLogEntry,
    ) -> Result<DailyLog, GlycoriskError> {
        let errors = entry.validate();
        if !errors.is_empty() {
            return Err(GlycoriskError::Validation(errors));
        }

        let log = DailyLog::new(user_id, date, entry);
        let saved: Result<(), StorageError> = self.storage.save_log(&log).map_err(Into::into);
        match saved {
            Ok(()) => {
                tracing::info!("Recorded daily log for {date}");
                Ok(log)
            }
            Err(StorageError::Conflict(msg)) => Err(GlycoriskError::Conflict(msg)),
            Err(e) => Err(GlycoriskError::Storage(e)),
        }
    }

    /// Most recent logs, latest date first.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    pub fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<DailyLog>, GlycoriskError> {
        self.storage
            .load_logs(user_id, limit)
            .map_err(|e| GlycoriskError::Storage(e.into()))
    }

    /// Fold the last `window` logs into raw assessment attributes.
    ///
    /// Empty when the user has no logs.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    pub fn input_from_recent_logs(
        &self,
        user_id: &str,
        window: usize,
    ) -> Result<Map<String, Value>, GlycoriskError> {
        let logs = self.recent(user_id, window)?;
        tracing::debug!("Summarizing {} daily log(s)", logs.len());
        Ok(summarize_logs(&logs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::SqliteStorage;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).expect("valid date")
    }

    fn create_test_service() -> HealthLogService<SqliteStorage> {
        HealthLogService::new(Arc::new(SqliteStorage::in_memory().expect("Should create db")))
    }

    #[test]
    fn test_second_log_same_day_is_conflict() {
        let service = create_test_service();
        service
            .add("alice", date(1), DailyLogEntry::default())
            .expect("Should add");
        let err = service
            .add("alice", date(1), DailyLogEntry::default())
            .expect_err("Should reject");
        assert!(matches!(err, GlycoriskError::Conflict(_)));
        assert!(err.is_user_facing());
    }

    #[test]
    fn test_invalid_entry_is_rejected() {
        let service = create_test_service();
        let entry = DailyLogEntry {
            weight: Some(-3.0),
            ..DailyLogEntry::default()
        };
        assert!(matches!(
            service.add("alice", date(1), entry),
            Err(GlycoriskError::Validation(_))
        ));
        assert!(service.recent("alice", 10).expect("Should load").is_empty());
    }

    #[test]
    fn test_input_from_recent_logs() {
        let service = create_test_service();
        for day in 1..=4 {
            let entry = DailyLogEntry {
                ate_fruit: day % 2 == 0,
                physical_activity: true,
                alcohol_drinks: 2,
                bad_mental_day: day == 1,
                weight: Some(80.0 + f64::from(day)),
                height: Some(175.0),
                ..DailyLogEntry::default()
            };
            service.add("alice", date(day), entry).expect("Should add");
        }

        let input = service
            .input_from_recent_logs("alice", DEFAULT_LOG_WINDOW)
            .expect("Should summarize");
        assert_eq!(input["physical_activity"], Value::from(1u8));
        assert_eq!(input["ate_fruit"], Value::from(1u8));
        assert_eq!(input["weight"], Value::from(84.0));
        assert_eq!(input["alcohol_drinks"], Value::from(14.0));
        assert_eq!(input["bad_mental_day"], Value::from(8.0));

        assert!(service
            .input_from_recent_logs("bob", DEFAULT_LOG_WINDOW)
            .expect("Should summarize")
            .is_empty());
    }
}

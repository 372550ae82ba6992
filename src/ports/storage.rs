//! Storage port: Trait for persistent storage operations.
//!
//! This trait abstracts the storage backend (SQLite) from the application logic.

use chrono::{DateTime, Utc};

use crate::domain::{DailyLog, HistoryRecord};

/// A page of history records with pagination metadata.
#[derive(Debug, Clone)]
pub struct HistoryPage {
    /// Records in this page, newest first
    pub items: Vec<HistoryRecord>,
    /// Total number of records for the user
    pub total_count: usize,
    pub offset: usize,
    pub limit: usize,
    pub has_more: bool,
}

impl HistoryPage {
    #[must_use]
    pub fn new(items: Vec<HistoryRecord>, total_count: usize, offset: usize, limit: usize) -> Self {
        let has_more = offset + items.len() < total_count;
        Self {
            items,
            total_count,
            offset,
            limit,
            has_more,
        }
    }

    /// Get the next page offset.
    #[must_use]
    pub fn next_offset(&self) -> Option<usize> {
        if self.has_more {
            Some(self.offset + self.limit)
        } else {
            None
        }
    }

    /// Get the previous page offset.
    #[must_use]
    pub fn prev_offset(&self) -> Option<usize> {
        if self.offset > 0 {
            Some(self.offset.saturating_sub(self.limit))
        } else {
            None
        }
    }
}

/// Trait for local storage operations.
///
/// Every query is scoped to one user.
pub trait Storage: Send + Sync {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Append a history record.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn save_history(&self, record: &HistoryRecord) -> Result<(), Self::Error>;

    /// Load up to `limit` records, newest first.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn load_history(&self, user_id: &str, limit: usize) -> Result<Vec<HistoryRecord>, Self::Error>;

    /// Load one page of records, newest first.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn load_history_page(
        &self,
        user_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<HistoryPage, Self::Error>;

    /// # Errors
    /// Returns error if storage operation fails.
    fn count_history(&self, user_id: &str) -> Result<usize, Self::Error>;

    /// Delete one record owned by `user_id`.
    ///
    /// # Returns
    /// `false` if no such record belongs to the user.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn delete_history(&self, user_id: &str, id: &str) -> Result<bool, Self::Error>;

    /// All `(created_at, risk_probability)` pairs, oldest first.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn load_risk_series(&self, user_id: &str) -> Result<Vec<(DateTime<Utc>, f64)>, Self::Error>;

    /// Store a daily log. A second log for the same user and date is rejected.
    ///
    /// # Errors
    /// Returns error if storage operation fails or the date is already logged.
    fn save_log(&self, log: &DailyLog) -> Result<(), Self::Error>;

    /// Load up to `limit` logs, most recent date first.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn load_logs(&self, user_id: &str, limit: usize) -> Result<Vec<DailyLog>, Self::Error>;
}

//! History service: a user's past assessments and their risk trend.

use std::sync::Arc;

use crate::adapters::StorageError;
use crate::domain::{estimate_trend, HistoryRecord, TrendSummary};
use crate::ports::{HistoryPage, Storage};
use crate::GlycoriskError;

/// Read access to stored assessments, always scoped to one user.
pub struct HistoryService<S>
where
    S: Storage,
{
    storage: Arc<S>,
}

impl<S> HistoryService<S>
where
    S: Storage,
    S::Error: Into<StorageError>,
{
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Most recent records, newest first.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    pub fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<HistoryRecord>, GlycoriskError> {
        self.storage
            .load_history(user_id, limit)
            .map_err(|e| GlycoriskError::Storage(e.into()))
    }

    /// # Errors
    /// Returns error if storage operation fails.
    pub fn page(
        &self,
        user_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<HistoryPage, GlycoriskError> {
        self.storage
            .load_history_page(user_id, offset, limit)
            .map_err(|e| GlycoriskError::Storage(e.into()))
    }

    /// # Errors
    /// Returns error if storage operation fails.
    pub fn count(&self, user_id: &str) -> Result<usize, GlycoriskError> {
        self.storage
            .count_history(user_id)
            .map_err(|e| GlycoriskError::Storage(e.into()))
    }

    /// Delete one of the user's own records.
    ///
    /// # Returns
    /// `false` if the user owns no record with that id.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    pub fn delete(&self, user_id: &str, id: &str) -> Result<bool, GlycoriskError> {
        self.storage
            .delete_history(user_id, id)
            .map_err(|e| GlycoriskError::Storage(e.into()))
    }

    /// Linear risk trend over all of the user's records.
    ///
    /// `Ok(None)` with fewer than two records.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    pub fn trend(&self, user_id: &str) -> Result<Option<TrendSummary>, GlycoriskError> {
        let series = self
            .storage
            .load_risk_series(user_id)
            .map_err(|e| GlycoriskError::Storage(e.into()))?;
        Ok(estimate_trend(&series))
    }
}

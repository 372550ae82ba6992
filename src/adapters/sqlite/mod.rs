//! SQLite adapter: Implementation of Storage.
//!
//! Provides local persistence for prediction history and daily health logs.
//! Both tables are append-only from the application's point of view; history
//! rows can be deleted by their owner but never updated.
//!
//! # Mutex Behavior
//!
//! Database connection is protected by `Mutex`. A poisoned mutex (from panic
//! in another thread) will cause panic.
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, Row};

use crate::domain::{DailyLog, DailyLogEntry, HistoryRecord, RiskClass};
use crate::ports::{HistoryPage, Storage};

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A uniqueness constraint was violated (e.g. a second log for one day).
    #[error("Conflict: {0}")]
    Conflict(String),
}

const HISTORY_COLUMNS: &str = "id, user_id, created_at, result, risk_probability, advice, \
                               input_snapshot, model_scores";

/// SQLite storage adapter.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Create a new SQLite storage with the given database path.
    ///
    /// # Errors
    /// Returns error if database cannot be opened or initialized.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    /// Create an in-memory SQLite database (for testing).
    ///
    /// # Errors
    /// Returns error if database cannot be created.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock().expect("Lock failed");

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS history (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                result INTEGER NOT NULL,
                risk_probability REAL NOT NULL,
                advice TEXT,
                input_snapshot TEXT NOT NULL,
                model_scores TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_history_user_created
                ON history(user_id, created_at DESC);

            CREATE TABLE IF NOT EXISTS daily_logs (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                log_date TEXT NOT NULL,
                ate_fruit INTEGER NOT NULL,
                ate_veggie INTEGER NOT NULL,
                physical_activity INTEGER NOT NULL,
                alcohol_drinks INTEGER NOT NULL,
                bad_mental_day INTEGER NOT NULL,
                bad_physical_day INTEGER NOT NULL,
                weight REAL,
                height REAL,
                UNIQUE(user_id, log_date)
            );
            ",
        )?;

        Ok(())
    }

    fn row_to_history(row: &Row<'_>) -> rusqlite::Result<HistoryRecord> {
        let created_at_str: String = row.get(2)?;
        let result: i64 = row.get(3)?;
        let input_json: String = row.get(6)?;
        let scores_json: String = row.get(7)?;

        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(2, e))?;
        let result = usize::try_from(result)
            .ok()
            .and_then(RiskClass::from_index)
            .ok_or_else(|| {
                conversion_error(3, StorageError::Serialization(format!("bad class {result}")))
            })?;

        Ok(HistoryRecord {
            id: row.get(0)?,
            user_id: row.get(1)?,
            created_at,
            result,
            risk_probability: row.get(4)?,
            advice: row.get(5)?,
            input_snapshot: serde_json::from_str(&input_json).map_err(|e| conversion_error(6, e))?,
            model_scores: serde_json::from_str(&scores_json).map_err(|e| conversion_error(7, e))?,
        })
    }

    fn row_to_log(row: &Row<'_>) -> rusqlite::Result<DailyLog> {
        let date_str: String = row.get(2)?;
        let log_date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
            .map_err(|e| conversion_error(2, e))?;
        let drinks: i64 = row.get(6)?;

        Ok(DailyLog {
            id: row.get(0)?,
            user_id: row.get(1)?,
            log_date,
            entry: DailyLogEntry {
                ate_fruit: row.get(3)?,
                ate_veggie: row.get(4)?,
                physical_activity: row.get(5)?,
                alcohol_drinks: u32::try_from(drinks).map_err(|e| conversion_error(6, e))?,
                bad_mental_day: row.get(7)?,
                bad_physical_day: row.get(8)?,
                weight: row.get(9)?,
                height: row.get(10)?,
            },
        })
    }
}

fn conversion_error<E>(column: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation
    )
}

impl Storage for SqliteStorage {
    type Error = StorageError;

    fn save_history(&self, record: &HistoryRecord) -> Result<(), Self::Error> {
        let input = serde_json::to_string(&record.input_snapshot)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let scores = serde_json::to_string(&record.model_scores)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let conn = self.conn.lock().expect("Lock failed");
        conn.execute(
            r"
            INSERT INTO history (
                id, user_id, created_at, result, risk_probability,
                advice, input_snapshot, model_scores
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
            params![
                record.id,
                record.user_id,
                // Fixed-width timestamps keep lexical order chronological.
                record.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
                i64::from(record.result.index()),
                record.risk_probability,
                record.advice,
                input,
                scores,
            ],
        )?;

        tracing::debug!("Saved history record {} to storage", record.id);
        Ok(())
    }

    fn load_history(&self, user_id: &str, limit: usize) -> Result<Vec<HistoryRecord>, Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");

        let mut stmt = conn.prepare(&format!(
            "SELECT {HISTORY_COLUMNS} FROM history WHERE user_id = ?1 \
             ORDER BY created_at DESC LIMIT ?2"
        ))?;

        let records = stmt
            .query_map(params![user_id, limit as i64], Self::row_to_history)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn load_history_page(
        &self,
        user_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<HistoryPage, Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");

        let total_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM history WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {HISTORY_COLUMNS} FROM history WHERE user_id = ?1 \
             ORDER BY created_at DESC LIMIT ?2 OFFSET ?3"
        ))?;

        let records = stmt
            .query_map(
                params![user_id, limit as i64, offset as i64],
                Self::row_to_history,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(HistoryPage::new(records, total_count as usize, offset, limit))
    }

    fn count_history(&self, user_id: &str) -> Result<usize, Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM history WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;

        Ok(count as usize)
    }

    fn delete_history(&self, user_id: &str, id: &str) -> Result<bool, Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");
        let deleted = conn.execute(
            "DELETE FROM history WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        if deleted > 0 {
            tracing::info!("Deleted history record {id}");
        }
        Ok(deleted > 0)
    }

    fn load_risk_series(&self, user_id: &str) -> Result<Vec<(DateTime<Utc>, f64)>, Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");

        let mut stmt = conn.prepare(
            r"
            SELECT created_at, risk_probability
            FROM history
            WHERE user_id = ?1
            ORDER BY created_at ASC
            ",
        )?;

        let series = stmt
            .query_map(params![user_id], |row| {
                let created_at_str: String = row.get(0)?;
                let created_at = DateTime::parse_from_rfc3339(&created_at_str)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| conversion_error(0, e))?;
                Ok((created_at, row.get(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(series)
    }

    fn save_log(&self, log: &DailyLog) -> Result<(), Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");
        let e = &log.entry;

        conn.execute(
            r"
            INSERT INTO daily_logs (
                id, user_id, log_date, ate_fruit, ate_veggie, physical_activity,
                alcohol_drinks, bad_mental_day, bad_physical_day, weight, height
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
            params![
                log.id,
                log.user_id,
                log.log_date.format("%Y-%m-%d").to_string(),
                e.ate_fruit,
                e.ate_veggie,
                e.physical_activity,
                i64::from(e.alcohol_drinks),
                e.bad_mental_day,
                e.bad_physical_day,
                e.weight,
                e.height,
            ],
        )
        .map_err(|err| {
            if is_unique_violation(&err) {
                StorageError::Conflict(format!("a log for {} already exists", log.log_date))
            } else {
                err.into()
            }
        })?;

        tracing::debug!("Saved daily log {} to storage", log.id);
        Ok(())
    }

    fn load_logs(&self, user_id: &str, limit: usize) -> Result<Vec<DailyLog>, Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");

        let mut stmt = conn.prepare(
            r"
            SELECT id, user_id, log_date, ate_fruit, ate_veggie, physical_activity,
                   alcohol_drinks, bad_mental_day, bad_physical_day, weight, height
            FROM daily_logs
            WHERE user_id = ?1
            ORDER BY log_date DESC
            LIMIT ?2
            ",
        )?;

        let logs = stmt
            .query_map(params![user_id, limit as i64], Self::row_to_log)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(logs)
    }
}

//! Daily health log entries.
//!
//! One entry per user per calendar day. Recent entries can be folded into a
//! prediction input so users do not have to re-enter lifestyle answers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::history::uuid_v4;

/// Fields a user fills in for one day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyLogEntry {
    pub ate_fruit: bool,
    pub ate_veggie: bool,
    pub physical_activity: bool,
    /// Drinks consumed that day
    pub alcohol_drinks: u32,
    pub bad_mental_day: bool,
    pub bad_physical_day: bool,
    /// Kilograms
    pub weight: Option<f64>,
    /// Centimetres or metres
    pub height: Option<f64>,
}

impl DailyLogEntry {
    /// Validate the entry.
    ///
    /// Returns a list of validation errors (empty if valid).
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.alcohol_drinks > 100 {
            errors.push(format!(
                "alcohol_drinks: implausible daily count ({})",
                self.alcohol_drinks
            ));
        }
        if let Some(w) = self.weight {
            if !w.is_finite() || w <= 0.0 || w > 500.0 {
                errors.push(format!("weight: must be in (0, 500] kg (got {w})"));
            }
        }
        if let Some(h) = self.height {
            if !h.is_finite() || h <= 0.0 || h > 300.0 {
                errors.push(format!("height: must be in (0, 300] (got {h})"));
            }
        }
        errors
    }
}

/// A stored daily log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyLog {
    pub id: String,
    pub user_id: String,
    pub log_date: NaiveDate,
    pub entry: DailyLogEntry,
}

impl DailyLog {
    #[must_use]
    pub fn new(user_id: impl Into<String>, log_date: NaiveDate, entry: DailyLogEntry) -> Self {
        Self {
            id: uuid_v4(),
            user_id: user_id.into(),
            log_date,
            entry,
        }
    }
}

/// Fold the most recent logs into raw prediction attributes.
///
/// Day counts are scaled from the covered window to the 30-day questionnaire
/// horizon, diet/activity flags take the majority answer, daily drinks are
/// averaged into a weekly figure, and the latest known weight and height are
/// carried over. Keys use the mapper's input aliases.
#[must_use]
pub fn summarize_logs(logs: &[DailyLog]) -> Map<String, Value> {
    let mut out = Map::new();
    if logs.is_empty() {
        return out;
    }

    let n = logs.len() as f64;
    let count = |f: fn(&DailyLogEntry) -> bool| logs.iter().filter(|l| f(&l.entry)).count() as f64;
    let majority = |f: fn(&DailyLogEntry) -> bool| u8::from(count(f) * 2.0 >= n);
    let days_of_30 = |f: fn(&DailyLogEntry) -> bool| ((count(f) / n) * 30.0).round().min(30.0);

    out.insert("ate_fruit".into(), Value::from(majority(|e| e.ate_fruit)));
    out.insert("ate_veggie".into(), Value::from(majority(|e| e.ate_veggie)));
    out.insert(
        "physical_activity".into(),
        Value::from(majority(|e| e.physical_activity)),
    );
    out.insert(
        "bad_mental_day".into(),
        Value::from(days_of_30(|e| e.bad_mental_day)),
    );
    out.insert(
        "bad_physical_day".into(),
        Value::from(days_of_30(|e| e.bad_physical_day)),
    );

    let drinks: f64 = logs.iter().map(|l| f64::from(l.entry.alcohol_drinks)).sum();
    out.insert(
        "alcohol_drinks".into(),
        Value::from((drinks / n * 7.0).round()),
    );

    let mut newest_first: Vec<&DailyLog> = logs.iter().collect();
    newest_first.sort_by(|a, b| b.log_date.cmp(&a.log_date));
    if let Some(w) = newest_first.iter().find_map(|l| l.entry.weight) {
        out.insert("weight".into(), Value::from(w));
    }
    if let Some(h) = newest_first.iter().find_map(|l| l.entry.height) {
        out.insert("height".into(), Value::from(h));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(day: u32, entry: DailyLogEntry) -> DailyLog {
        DailyLog::new(
            "u1",
            NaiveDate::from_ymd_opt(2024, 5, day).expect("valid date"),
            entry,
        )
    }

    #[test]
    fn test_entry_validation() {
        let ok = DailyLogEntry {
            weight: Some(70.0),
            height: Some(175.0),
            ..Default::default()
        };
        assert!(ok.validate().is_empty());

        let bad = DailyLogEntry {
            weight: Some(-1.0),
            height: Some(f64::NAN),
            alcohol_drinks: 500,
            ..Default::default()
        };
        assert_eq!(bad.validate().len(), 3);
    }

    #[test]
    fn test_summarize_empty() {
        assert!(summarize_logs(&[]).is_empty());
    }

    #[test]
    fn test_summarize_logs() {
        let logs = vec![
            log(1, DailyLogEntry {
                ate_fruit: true,
                bad_mental_day: true,
                alcohol_drinks: 2,
                weight: Some(82.0),
                height: Some(180.0),
                ..Default::default()
            }),
            log(2, DailyLogEntry {
                ate_fruit: true,
                physical_activity: true,
                alcohol_drinks: 0,
                weight: Some(81.0),
                ..Default::default()
            }),
            log(3, DailyLogEntry {
                alcohol_drinks: 1,
                ..Default::default()
            }),
        ];

        let summary = summarize_logs(&logs);
        assert_eq!(summary["ate_fruit"], Value::from(1u8));
        assert_eq!(summary["ate_veggie"], Value::from(0u8));
        assert_eq!(summary["physical_activity"], Value::from(0u8));
        assert_eq!(summary["bad_mental_day"], Value::from(10.0));
        assert_eq!(summary["alcohol_drinks"], Value::from(7.0));
        assert_eq!(summary["weight"], Value::from(81.0));
        assert_eq!(summary["height"], Value::from(180.0));
    }
}

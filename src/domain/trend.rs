//! Linear risk trend over a user's history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Slopes (percent per day) at or below this magnitude count as stable.
pub const STABLE_SLOPE: f64 = 0.01;

/// How far ahead the trend is projected.
pub const PROJECTION_DAYS: f64 = 30.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

impl TrendDirection {
    #[must_use]
    pub fn from_slope(slope: f64) -> Self {
        if slope.abs() <= STABLE_SLOPE {
            Self::Stable
        } else if slope > 0.0 {
            Self::Increasing
        } else {
            Self::Decreasing
        }
    }
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Increasing => write!(f, "increasing"),
            Self::Decreasing => write!(f, "decreasing"),
            Self::Stable => write!(f, "stable"),
        }
    }
}

/// One history point placed on the fitted line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// Days since the earliest record
    pub day: f64,
    pub observed: f64,
    pub fitted: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    /// Risk change in percentage points per day
    pub slope: f64,
    pub intercept: f64,
    pub direction: TrendDirection,
    pub latest_risk: f64,
    /// Fitted risk 30 days after the latest record, clamped to `[0, 100]`
    pub projected_risk: f64,
    pub points: Vec<TrendPoint>,
}

/// Fit risk against elapsed days by ordinary least squares.
///
/// Returns `None` with fewer than two records. When every record shares one
/// timestamp the slope is zero and the line sits at the mean risk.
#[must_use]
pub fn estimate_trend(series: &[(DateTime<Utc>, f64)]) -> Option<TrendSummary> {
    if series.len() < 2 {
        return None;
    }

    let mut sorted = series.to_vec();
    sorted.sort_by_key(|(at, _)| *at);
    let origin = sorted[0].0;

    let xs: Vec<f64> = sorted
        .iter()
        .map(|(at, _)| (*at - origin).num_seconds() as f64 / SECONDS_PER_DAY)
        .collect();
    let ys: Vec<f64> = sorted.iter().map(|(_, risk)| *risk).collect();

    let n = xs.len() as f64;
    let x_mean = xs.iter().sum::<f64>() / n;
    let y_mean = ys.iter().sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (&x, &y) in xs.iter().zip(ys.iter()) {
        let dx = x - x_mean;
        sxx += dx * dx;
        sxy += dx * (y - y_mean);
    }

    let slope = if sxx == 0.0 { 0.0 } else { sxy / sxx };
    let intercept = y_mean - slope * x_mean;
    let fit = |x: f64| slope * x + intercept;

    let last_day = xs[xs.len() - 1];
    let points = xs
        .iter()
        .zip(ys.iter())
        .map(|(&day, &observed)| TrendPoint {
            day,
            observed,
            fitted: fit(day),
        })
        .collect();

    Some(TrendSummary {
        slope,
        intercept,
        direction: TrendDirection::from_slope(slope),
        latest_risk: ys[ys.len() - 1],
        projected_risk: fit(last_day + PROJECTION_DAYS).clamp(0.0, 100.0),
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).single().expect("valid date") + Duration::days(n)
    }

    #[test]
    fn test_fewer_than_two_points_is_no_trend() {
        assert!(estimate_trend(&[]).is_none());
        assert!(estimate_trend(&[(day(0), 40.0)]).is_none());
    }

    #[test]
    fn test_two_points_fit_exactly() {
        let summary = estimate_trend(&[(day(0), 20.0), (day(10), 40.0)]).expect("Should fit");
        assert!((summary.slope - 2.0).abs() < 1e-9);
        assert_eq!(summary.direction, TrendDirection::Increasing);
        for p in &summary.points {
            assert!((p.fitted - p.observed).abs() < 1e-9);
        }
        assert!((summary.latest_risk - 40.0).abs() < f64::EPSILON);
        assert!((summary.projected_risk - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_decreasing_slope_sign() {
        let summary = estimate_trend(&[(day(5), 30.0), (day(0), 60.0)]).expect("Should fit");
        assert!(summary.slope < 0.0);
        assert_eq!(summary.direction, TrendDirection::Decreasing);
        assert!((summary.latest_risk - 30.0).abs() < f64::EPSILON);
        assert!((summary.projected_risk - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_small_slope_is_stable() {
        let summary = estimate_trend(&[(day(0), 50.0), (day(100), 50.5)]).expect("Should fit");
        assert!(summary.slope.abs() <= STABLE_SLOPE);
        assert_eq!(summary.direction, TrendDirection::Stable);
    }

    #[test]
    fn test_same_timestamp_gives_flat_mean() {
        let summary = estimate_trend(&[(day(0), 30.0), (day(0), 50.0)]).expect("Should fit");
        assert_eq!(summary.slope, 0.0);
        assert!((summary.intercept - 40.0).abs() < f64::EPSILON);
        assert_eq!(summary.direction, TrendDirection::Stable);
    }

    #[test]
    fn test_least_squares_with_noise() {
        let summary = estimate_trend(&[
            (day(0), 10.0),
            (day(1), 12.0),
            (day(2), 11.0),
            (day(3), 15.0),
        ])
        .expect("Should fit");
        // x_mean 1.5, y_mean 12, sxy 7, sxx 5
        assert!((summary.slope - 1.4).abs() < 1e-9);
        assert!((summary.intercept - 9.9).abs() < 1e-9);
        assert_eq!(summary.points.len(), 4);
    }
}

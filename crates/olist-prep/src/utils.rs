//! Shared utilities for the order preparation pipeline.
//!
//! Column extraction helpers used by the feature deriver, the prepared
//! table and the dashboard, plus the millisecond/day arithmetic the delivery
//! metrics rely on.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;

// =============================================================================
// Time Utilities
// =============================================================================

/// Milliseconds in one calendar day.
pub const MILLIS_PER_DAY: i64 = 86_400_000;

/// Reduce a millisecond duration to whole days, rounding toward negative infinity.
///
/// A delivery six hours after the estimate counts as one day late, six hours
/// before counts as zero days early.
///
/// # Example
///
/// ```rust,ignore
/// use olist_prep::utils::floor_days;
///
/// assert_eq!(floor_days(-6 * 3_600_000), -1);
/// assert_eq!(floor_days(6 * 3_600_000), 0);
/// ```
#[inline]
pub fn floor_days(duration_ms: i64) -> i64 {
    duration_ms.div_euclid(MILLIS_PER_DAY)
}

/// Convert a naive timestamp to epoch milliseconds (wall clock, no zone).
#[inline]
pub fn naive_to_millis(ts: NaiveDateTime) -> i64 {
    ts.and_utc().timestamp_millis()
}

/// Convert epoch milliseconds back to a naive timestamp.
#[inline]
pub fn millis_to_naive(ms: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
}

/// Epoch milliseconds of midnight at the start of `date`.
#[inline]
pub fn date_start_millis(date: NaiveDate) -> i64 {
    naive_to_millis(date.and_time(chrono::NaiveTime::MIN))
}

// =============================================================================
// Column Extraction Utilities
// =============================================================================

/// Fetch a column as a materialized series.
pub fn require_series<'a>(df: &'a DataFrame, name: &str) -> PolarsResult<&'a Series> {
    df.column(name).map(|c| c.as_materialized_series())
}

/// Read a datetime (or integer) column as epoch milliseconds.
pub fn column_millis(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<i64>>> {
    let series = require_series(df, name)?;
    let physical = match series.dtype() {
        DataType::Datetime(TimeUnit::Milliseconds, _) => series.cast(&DataType::Int64)?,
        DataType::Datetime(_, _) => series
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
            .cast(&DataType::Int64)?,
        _ => series.cast(&DataType::Int64)?,
    };
    Ok(physical.i64()?.into_iter().collect())
}

/// Read a column as floats.
pub fn column_f64(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let series = require_series(df, name)?.cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

/// Read a column as integers.
pub fn column_i64(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<i64>>> {
    let series = require_series(df, name)?.cast(&DataType::Int64)?;
    Ok(series.i64()?.into_iter().collect())
}

/// Read a column as owned strings.
pub fn column_strings(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    let series = require_series(df, name)?.cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_days_exact_days() {
        assert_eq!(floor_days(2 * MILLIS_PER_DAY), 2);
        assert_eq!(floor_days(-2 * MILLIS_PER_DAY), -2);
        assert_eq!(floor_days(0), 0);
    }

    #[test]
    fn test_floor_days_partial_days() {
        let six_hours = 6 * 3_600_000;
        assert_eq!(floor_days(six_hours), 0);
        assert_eq!(floor_days(-six_hours), -1);
        assert_eq!(floor_days(MILLIS_PER_DAY + six_hours), 1);
        assert_eq!(floor_days(-MILLIS_PER_DAY - six_hours), -2);
    }

    #[test]
    fn test_millis_roundtrip() {
        let ts = NaiveDate::from_ymd_opt(2018, 5, 10)
            .unwrap()
            .and_hms_opt(13, 45, 0)
            .unwrap();
        assert_eq!(millis_to_naive(naive_to_millis(ts)), Some(ts));
    }

    #[test]
    fn test_column_helpers() {
        let df = df![
            "id" => ["a", "b"],
            "score" => [Some(4i64), None],
            "price" => [1.5f64, 2.0],
        ]
        .unwrap();

        assert_eq!(
            column_strings(&df, "id").unwrap(),
            vec![Some("a".to_string()), Some("b".to_string())]
        );
        assert_eq!(column_i64(&df, "score").unwrap(), vec![Some(4), None]);
        assert_eq!(column_f64(&df, "score").unwrap(), vec![Some(4.0), None]);
        assert_eq!(column_f64(&df, "price").unwrap(), vec![Some(1.5), Some(2.0)]);
        assert!(column_f64(&df, "missing").is_err());
    }
}

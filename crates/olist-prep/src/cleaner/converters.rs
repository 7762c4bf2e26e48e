//! Timestamp conversion for the order date columns.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;

use crate::utils::naive_to_millis;

/// Naive layouts tried in order before the offset-aware ones.
const NAIVE_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Offset-aware layouts; the offset is discarded and the wall clock kept.
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Parse one timestamp string into a timezone-naive datetime.
///
/// Bare dates map to midnight. Returns `None` for anything unrecognised.
pub(crate) fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    for format in NAIVE_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Some(ts);
        }
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.naive_local());
    }

    for format in OFFSET_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(value, format) {
            return Some(ts.naive_local());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN))
}

/// Result of coercing one string column to timestamps.
#[derive(Debug)]
pub(crate) struct ParsedDates {
    /// `Datetime(Milliseconds, None)` series with the original name.
    pub series: Series,
    /// Non-empty values that could not be parsed.
    pub malformed: usize,
    /// Up to the requested number of malformed values, in row order.
    pub samples: Vec<String>,
}

/// Convert a string column to naive millisecond timestamps.
///
/// Nulls and blank strings stay null without counting as malformed.
/// Columns that already hold datetimes are only normalised to milliseconds.
pub(crate) fn string_to_datetime(series: &Series, sample_limit: usize) -> Result<ParsedDates> {
    let target = DataType::Datetime(TimeUnit::Milliseconds, None);

    if matches!(series.dtype(), DataType::Datetime(_, _)) {
        return Ok(ParsedDates {
            series: series.cast(&target)?,
            malformed: 0,
            samples: Vec::new(),
        });
    }

    let as_strings = series.cast(&DataType::String)?;
    let str_series = as_strings.str()?;
    let mut timestamps: Vec<Option<i64>> = Vec::with_capacity(str_series.len());
    let mut malformed = 0;
    let mut samples = Vec::new();

    for opt_val in str_series.into_iter() {
        match opt_val {
            Some(val) if !val.trim().is_empty() => match parse_timestamp(val) {
                Some(ts) => timestamps.push(Some(naive_to_millis(ts))),
                None => {
                    malformed += 1;
                    if samples.len() < sample_limit {
                        samples.push(val.to_string());
                    }
                    timestamps.push(None);
                }
            },
            _ => timestamps.push(None),
        }
    }

    let timestamp_series = Series::new(series.name().clone(), timestamps).cast(&target)?;
    Ok(ParsedDates {
        series: timestamp_series,
        malformed,
        samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::column_millis;

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    // ========================================================================
    // parse_timestamp() tests
    // ========================================================================

    #[test]
    fn test_parse_space_separated() {
        assert_eq!(
            parse_timestamp("2018-05-10 13:45:00"),
            Some(ts(2018, 5, 10, 13, 45, 0))
        );
    }

    #[test]
    fn test_parse_iso_t_separator_and_fraction() {
        assert_eq!(
            parse_timestamp("2018-05-10T13:45:00"),
            Some(ts(2018, 5, 10, 13, 45, 0))
        );
        let parsed = parse_timestamp("2018-05-10 13:45:00.250").unwrap();
        assert_eq!(parsed.and_utc().timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_parse_offset_keeps_wall_clock() {
        assert_eq!(
            parse_timestamp("2018-05-10T13:45:00-03:00"),
            Some(ts(2018, 5, 10, 13, 45, 0))
        );
        assert_eq!(
            parse_timestamp("2018-05-10 13:45:00+0200"),
            Some(ts(2018, 5, 10, 13, 45, 0))
        );
    }

    #[test]
    fn test_parse_bare_date_is_midnight() {
        assert_eq!(parse_timestamp(" 2018-05-10 "), Some(ts(2018, 5, 10, 0, 0, 0)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_timestamp("not a date"), None);
        assert_eq!(parse_timestamp("2018-13-40 00:00:00"), None);
        assert_eq!(parse_timestamp("10/05/2018"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    // ========================================================================
    // string_to_datetime() tests
    // ========================================================================

    #[test]
    fn test_string_to_datetime_counts_malformed() {
        let series = Series::new(
            "order_delivered_customer_date".into(),
            &[
                Some("2018-05-12 10:00:00"),
                Some("yesterday"),
                None,
                Some("  "),
                Some("2018-02-30 00:00:00"),
            ],
        );

        let parsed = string_to_datetime(&series, 1).unwrap();

        assert_eq!(
            parsed.series.dtype(),
            &DataType::Datetime(TimeUnit::Milliseconds, None)
        );
        assert_eq!(parsed.series.name().as_str(), "order_delivered_customer_date");
        assert_eq!(parsed.malformed, 2);
        assert_eq!(parsed.samples, vec!["yesterday".to_string()]);
        assert_eq!(parsed.series.null_count(), 4);
    }

    #[test]
    fn test_string_to_datetime_values() {
        let series = Series::new("d".into(), &["2018-05-10 00:00:00", "2018-05-10"]);
        let parsed = string_to_datetime(&series, 3).unwrap();
        let df = DataFrame::new(vec![parsed.series.into()]).unwrap();

        let expected = naive_to_millis(ts(2018, 5, 10, 0, 0, 0));
        assert_eq!(
            column_millis(&df, "d").unwrap(),
            vec![Some(expected), Some(expected)]
        );
    }

    #[test]
    fn test_string_to_datetime_passes_through_datetimes() {
        let series = Series::new("d".into(), &[Some(1_525_910_400_000i64), None])
            .cast(&DataType::Datetime(TimeUnit::Microseconds, None))
            .unwrap();
        let parsed = string_to_datetime(&series, 3).unwrap();

        assert_eq!(parsed.malformed, 0);
        assert_eq!(
            parsed.series.dtype(),
            &DataType::Datetime(TimeUnit::Milliseconds, None)
        );
    }
}

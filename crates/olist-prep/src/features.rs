//! Per-order delivery metrics.
//!
//! `Delivery Timeliness` is the estimated delivery date minus the actual
//! delivery date, reduced to whole days with floor division on millisecond
//! timestamps. Negative means late. `Delivery Status` labels it.

use crate::schema::*;
use crate::types::DeliveryStatus;
use crate::utils::{column_millis, floor_days};
use anyhow::Result;
use polars::prelude::*;
use tracing::debug;

/// Adds the delivery timeliness and status columns to the orders table.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureDeriver;

impl FeatureDeriver {
    pub fn new() -> Self {
        Self
    }

    /// Derive both delivery columns.
    ///
    /// Expects the date columns to be parsed already. A row with a null
    /// delivered or estimated date gets null features.
    pub fn derive(&self, mut orders: DataFrame) -> Result<DataFrame> {
        let delivered = column_millis(&orders, DELIVERED_CUSTOMER_DATE)?;
        let estimated = column_millis(&orders, ESTIMATED_DELIVERY_DATE)?;

        let timeliness: Vec<Option<i64>> = delivered
            .iter()
            .zip(estimated.iter())
            .map(|(delivered, estimated)| match (delivered, estimated) {
                (Some(delivered), Some(estimated)) => Some(floor_days(estimated - delivered)),
                _ => None,
            })
            .collect();

        let status: Vec<Option<&str>> = timeliness
            .iter()
            .map(|days| days.map(|d| DeliveryStatus::from_timeliness(d).as_str()))
            .collect();

        let late = status
            .iter()
            .filter(|s| **s == Some(DeliveryStatus::Late.as_str()))
            .count();
        debug!(
            "Derived delivery features for {} orders ({} late)",
            orders.height(),
            late
        );

        orders.with_column(Series::new(DELIVERY_TIMELINESS.into(), timeliness))?;
        orders.with_column(Series::new(DELIVERY_STATUS.into(), status))?;
        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::DataCleaner;
    use crate::utils::column_strings;

    fn dates_frame(pairs: &[(Option<&str>, Option<&str>)]) -> DataFrame {
        let delivered: Vec<Option<&str>> = pairs.iter().map(|p| p.0).collect();
        let estimated: Vec<Option<&str>> = pairs.iter().map(|p| p.1).collect();
        let raw = df![
            DELIVERED_CUSTOMER_DATE => delivered,
            ESTIMATED_DELIVERY_DATE => estimated,
        ]
        .unwrap();

        let (parsed, _) = DataCleaner::default().parse_order_dates(raw).unwrap();
        parsed
    }

    #[test]
    fn test_late_delivery() {
        let orders = dates_frame(&[(Some("2018-05-12 00:00:00"), Some("2018-05-10 00:00:00"))]);
        let derived = FeatureDeriver::new().derive(orders).unwrap();

        let values = column_i64_values(&derived);
        assert_eq!(values, vec![Some(-2)]);
        assert_eq!(
            column_strings(&derived, DELIVERY_STATUS).unwrap(),
            vec![Some("Late".to_string())]
        );
    }

    #[test]
    fn test_same_day_is_on_time() {
        let orders = dates_frame(&[(Some("2018-05-10 00:00:00"), Some("2018-05-10 00:00:00"))]);
        let derived = FeatureDeriver::new().derive(orders).unwrap();

        assert_eq!(column_i64_values(&derived), vec![Some(0)]);
        assert_eq!(
            column_strings(&derived, DELIVERY_STATUS).unwrap(),
            vec![Some("On-Time/Early".to_string())]
        );
    }

    #[test]
    fn test_partial_days_floor() {
        let orders = dates_frame(&[
            // six hours early
            (Some("2018-05-09 18:00:00"), Some("2018-05-10 00:00:00")),
            // six hours late
            (Some("2018-05-10 06:00:00"), Some("2018-05-10 00:00:00")),
            (Some("2018-05-01 12:00:00"), Some("2018-05-10 00:00:00")),
        ]);
        let derived = FeatureDeriver::new().derive(orders).unwrap();

        assert_eq!(column_i64_values(&derived), vec![Some(0), Some(-1), Some(8)]);
        assert_eq!(
            column_strings(&derived, DELIVERY_STATUS).unwrap(),
            vec![
                Some("On-Time/Early".to_string()),
                Some("Late".to_string()),
                Some("On-Time/Early".to_string()),
            ]
        );
    }

    #[test]
    fn test_null_dates_give_null_features() {
        let orders = dates_frame(&[(None, Some("2018-05-10 00:00:00"))]);
        let derived = FeatureDeriver::new().derive(orders).unwrap();

        assert_eq!(column_i64_values(&derived), vec![None]);
        assert_eq!(derived.column(DELIVERY_STATUS).unwrap().null_count(), 1);
    }

    fn column_i64_values(df: &DataFrame) -> Vec<Option<i64>> {
        crate::utils::column_i64(df, DELIVERY_TIMELINESS).unwrap()
    }
}

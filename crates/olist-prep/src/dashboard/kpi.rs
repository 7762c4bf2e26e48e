//! Headline metrics for a filtered order table.

use crate::error::{Result, ResultExt};
use crate::schema::{DELIVERY_STATUS, FREIGHT_VALUE, PRICE, REVIEW_SCORE_LABEL};
use crate::session::PreparedTable;
use crate::types::DeliveryStatus;
use crate::utils::{column_f64, column_i64};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

const AVG_REVIEW_SCORE: &str = "avg_review_score";
const LATE_DELIVERIES: &str = "late_deliveries";
const TOTAL_REVENUE: &str = "total_revenue";

/// Executive KPI summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiSummary {
    pub total_orders: usize,
    /// Mean review score, `None` for an empty table.
    pub avg_review_score: Option<f64>,
    pub late_deliveries: usize,
    /// Share of late orders (0.0 - 1.0), 0.0 for an empty table.
    pub late_delivery_rate: f64,
    /// Sum of item prices plus sum of freight values.
    pub total_revenue: f64,
}

impl KpiSummary {
    pub fn compute(table: &PreparedTable) -> Result<Self> {
        let df = table.dataframe();
        let total_orders = df.height();

        let totals = df
            .clone()
            .lazy()
            .select([
                col(REVIEW_SCORE_LABEL)
                    .cast(DataType::Float64)
                    .mean()
                    .alias(AVG_REVIEW_SCORE),
                col(DELIVERY_STATUS)
                    .eq(lit(DeliveryStatus::Late.as_str()))
                    .cast(DataType::UInt32)
                    .sum()
                    .alias(LATE_DELIVERIES),
                (col(PRICE).sum() + col(FREIGHT_VALUE).sum()).alias(TOTAL_REVENUE),
            ])
            .collect()
            .context("Computing headline metrics")?;

        let avg_review_score = first_value(column_f64(&totals, AVG_REVIEW_SCORE)?);
        let late_deliveries =
            first_value(column_i64(&totals, LATE_DELIVERIES)?).unwrap_or_default() as usize;
        let total_revenue = first_value(column_f64(&totals, TOTAL_REVENUE)?).unwrap_or_default();

        let late_delivery_rate = if total_orders > 0 {
            late_deliveries as f64 / total_orders as f64
        } else {
            0.0
        };

        Ok(Self {
            total_orders,
            avg_review_score,
            late_deliveries,
            late_delivery_rate,
            total_revenue,
        })
    }
}

fn first_value<T>(values: Vec<Option<T>>) -> Option<T> {
    values.into_iter().next().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::filter::DashboardFilter;
    use crate::dashboard::tests::sample_table;

    #[test]
    fn test_kpis() {
        let kpis = KpiSummary::compute(&sample_table()).unwrap();

        assert_eq!(kpis.total_orders, 4);
        assert_eq!(kpis.avg_review_score, Some(3.0));
        assert_eq!(kpis.late_deliveries, 2);
        assert!((kpis.late_delivery_rate - 0.5).abs() < 1e-9);
        assert!((kpis.total_revenue - 220.0).abs() < 1e-9);
    }

    #[test]
    fn test_kpis_of_empty_table() {
        let empty = DashboardFilter::new()
            .with_categories(Vec::<String>::new())
            .apply(&sample_table())
            .unwrap();
        let kpis = KpiSummary::compute(&empty).unwrap();

        assert_eq!(kpis.total_orders, 0);
        assert_eq!(kpis.avg_review_score, None);
        assert_eq!(kpis.late_delivery_rate, 0.0);
        assert_eq!(kpis.total_revenue, 0.0);
    }
}

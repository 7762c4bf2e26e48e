//! Dashboard views over a prepared order table.
//!
//! A view is computed in three steps:
//!
//! 1. [`DashboardFilter::apply`] narrows the table by purchase date and category
//! 2. [`KpiSummary::compute`] produces the headline numbers
//! 3. the [`charts`] functions produce one dataset per chart
//!
//! # Example
//!
//! ```rust,ignore
//! use olist_prep::dashboard::{DashboardFilter, DashboardView};
//!
//! let filter = DashboardFilter::full_range(&table)?;
//! let view = DashboardView::build(&table, filter)?;
//! if view.is_empty() {
//!     println!("No data available for the selected filters.");
//! }
//! ```

pub mod charts;
pub mod filter;
pub mod kpi;

pub use charts::{CategoryPerformance, MonthlyTrend, StateLateRate, StatusScore, TOP_STATES};
pub use filter::DashboardFilter;
pub use kpi::KpiSummary;

use crate::error::Result;
use crate::session::PreparedTable;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Everything the dashboard renders for one filter selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    pub filter: DashboardFilter,
    pub kpis: KpiSummary,
    pub score_by_status: Vec<StatusScore>,
    pub late_rate_by_state: Vec<StateLateRate>,
    pub category_performance: Vec<CategoryPerformance>,
    pub monthly_trend: Vec<MonthlyTrend>,
}

impl DashboardView {
    /// Filter `table` and compute the KPIs and chart datasets.
    ///
    /// An empty selection yields zeroed KPIs and empty datasets.
    pub fn build(table: &PreparedTable, filter: DashboardFilter) -> Result<Self> {
        let filtered = filter.apply(table)?;
        let kpis = KpiSummary::compute(&filtered)?;

        if filtered.is_empty() {
            debug!("No orders match the selected filters");
            return Ok(Self {
                filter,
                kpis,
                score_by_status: Vec::new(),
                late_rate_by_state: Vec::new(),
                category_performance: Vec::new(),
                monthly_trend: Vec::new(),
            });
        }

        Ok(Self {
            score_by_status: charts::score_by_status(&filtered)?,
            late_rate_by_state: charts::late_rate_by_state(&filtered, TOP_STATES)?,
            category_performance: charts::category_performance(&filtered)?,
            monthly_trend: charts::monthly_trend(&filtered)?,
            filter,
            kpis,
        })
    }

    /// True when no order matched the filter.
    pub fn is_empty(&self) -> bool {
        self.kpis.total_orders == 0
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::schema::*;
    use crate::utils::naive_to_millis;
    use chrono::NaiveDate;
    use polars::prelude::*;

    fn millis(y: i32, m: u32, d: u32, h: u32, min: u32) -> i64 {
        naive_to_millis(
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, min, 0)
                .unwrap(),
        )
    }

    /// Four orders over May and June 2018, two late.
    pub(crate) fn sample_table() -> PreparedTable {
        let purchased = Series::new(
            PURCHASE_TIMESTAMP.into(),
            [
                millis(2018, 5, 1, 10, 0),
                millis(2018, 5, 20, 23, 30),
                millis(2018, 6, 2, 8, 0),
                millis(2018, 6, 3, 12, 0),
            ],
        )
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
        .unwrap();

        let mut df = df![
            ORDER_ID => ["o1", "o2", "o3", "o4"],
            REVIEW_SCORE_LABEL => [5i64, 2, 4, 1],
            DELIVERY_TIMELINESS => [3i64, -2, 0, -5],
            DELIVERY_STATUS => ["On-Time/Early", "Late", "On-Time/Early", "Late"],
            PRICE => [100.0f64, 50.0, 30.0, 20.0],
            FREIGHT_VALUE => [10.0f64, 5.0, 3.0, 2.0],
            PRODUCT_CATEGORY => ["beleza_saude", "moveis_decoracao", "beleza_saude", "moveis_decoracao"],
            CUSTOMER_STATE => ["SP", "RJ", "SP", "SP"],
        ]
        .unwrap();
        df.insert_column(1, purchased).unwrap();

        PreparedTable::new(df).unwrap()
    }

    #[test]
    fn test_build_full_view() {
        let table = sample_table();
        let view = DashboardView::build(&table, DashboardFilter::new()).unwrap();

        assert!(!view.is_empty());
        assert_eq!(view.kpis.total_orders, 4);
        assert_eq!(view.score_by_status.len(), 2);
        assert_eq!(view.late_rate_by_state.len(), 2);
        assert_eq!(view.category_performance.len(), 2);
        assert_eq!(view.monthly_trend.len(), 2);
    }

    #[test]
    fn test_build_empty_view() {
        let table = sample_table();
        let filter = DashboardFilter::new().with_categories(["pet_shop"]);
        let view = DashboardView::build(&table, filter).unwrap();

        assert!(view.is_empty());
        assert!(view.score_by_status.is_empty());
        assert!(view.monthly_trend.is_empty());
    }

    #[test]
    fn test_view_serializes() {
        let view = DashboardView::build(&sample_table(), DashboardFilter::new()).unwrap();
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["kpis"]["total_orders"], 4);
        assert_eq!(json["score_by_status"][0]["delivery_status"], "Late");
        assert_eq!(json["monthly_trend"][1]["month"], "2018-06");
    }
}

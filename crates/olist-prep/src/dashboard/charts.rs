//! Datasets behind the four dashboard charts.
//!
//! Each function groups the (already filtered) prepared table with a lazy
//! polars query and returns plain rows ready for serialisation.

use crate::error::{PrepError, Result, ResultExt};
use crate::schema::{
    CUSTOMER_STATE, DELIVERY_STATUS, ORDER_ID, PRICE, PRODUCT_CATEGORY, PURCHASE_TIMESTAMP,
    REVIEW_SCORE_LABEL,
};
use crate::session::PreparedTable;
use crate::types::DeliveryStatus;
use crate::utils::{column_f64, column_i64, column_strings};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// States shown in the late-rate chart.
pub const TOP_STATES: usize = 15;

const TOTAL_ORDERS: &str = "total_orders";
const LATE_ORDERS: &str = "late_orders";
const LATE_RATE: &str = "late_rate";
const AVG_REVIEW_SCORE: &str = "avg_review_score";
const TOTAL_REVENUE: &str = "total_revenue";
const MONTH: &str = "month";

// =============================================================================
// Rows
// =============================================================================

/// Average review score for one delivery status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusScore {
    pub delivery_status: DeliveryStatus,
    pub avg_review_score: f64,
    pub total_orders: usize,
}

/// Late delivery share for one customer state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateLateRate {
    pub customer_state: String,
    pub total_orders: usize,
    pub late_orders: usize,
    pub late_rate: f64,
}

/// Revenue against satisfaction for one product category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPerformance {
    pub product_category_name: String,
    /// Sum of item prices, freight excluded.
    pub total_revenue: f64,
    pub avg_review_score: f64,
    pub total_orders: usize,
}

/// Orders and late deliveries in one purchase month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTrend {
    /// `YYYY-MM`
    pub month: String,
    pub total_orders: usize,
    pub late_orders: usize,
    pub late_rate: f64,
}

// =============================================================================
// Datasets
// =============================================================================

/// Chart 1: average review score by delivery status, "Late" first.
pub fn score_by_status(table: &PreparedTable) -> Result<Vec<StatusScore>> {
    let grouped = table
        .dataframe()
        .clone()
        .lazy()
        .group_by([col(DELIVERY_STATUS)])
        .agg([
            col(REVIEW_SCORE_LABEL)
                .cast(DataType::Float64)
                .mean()
                .alias(AVG_REVIEW_SCORE),
            col(ORDER_ID).count().alias(TOTAL_ORDERS),
        ])
        .sort([DELIVERY_STATUS], SortMultipleOptions::default())
        .collect()
        .context("Grouping review scores by delivery status")?;

    let statuses = column_strings(&grouped, DELIVERY_STATUS)?;
    let scores = column_f64(&grouped, AVG_REVIEW_SCORE)?;
    let counts = column_i64(&grouped, TOTAL_ORDERS)?;

    let mut rows = Vec::with_capacity(grouped.height());
    for ((status, score), count) in statuses.into_iter().zip(scores).zip(counts) {
        let Some(status) = status else { continue };
        rows.push(StatusScore {
            delivery_status: status
                .parse::<DeliveryStatus>()
                .map_err(|e| PrepError::AggregationFailed(e.to_string()))?,
            avg_review_score: score.unwrap_or_default(),
            total_orders: count.unwrap_or_default() as usize,
        });
    }
    Ok(rows)
}

/// Chart 2: late delivery rate by customer state, highest first, at most
/// `limit` states. Equal rates are ordered by state code.
pub fn late_rate_by_state(table: &PreparedTable, limit: usize) -> Result<Vec<StateLateRate>> {
    let grouped = table
        .dataframe()
        .clone()
        .lazy()
        .group_by([col(CUSTOMER_STATE)])
        .agg(late_counts())
        .with_column(late_rate())
        .sort(
            [LATE_RATE, CUSTOMER_STATE],
            SortMultipleOptions::default().with_order_descending_multi([true, false]),
        )
        .limit(limit as IdxSize)
        .collect()
        .context("Grouping late deliveries by state")?;

    let states = column_strings(&grouped, CUSTOMER_STATE)?;
    let totals = column_i64(&grouped, TOTAL_ORDERS)?;
    let lates = column_i64(&grouped, LATE_ORDERS)?;
    let rates = column_f64(&grouped, LATE_RATE)?;

    Ok(states
        .into_iter()
        .zip(totals)
        .zip(lates)
        .zip(rates)
        .filter_map(|(((state, total), late), rate)| {
            Some(StateLateRate {
                customer_state: state?,
                total_orders: total.unwrap_or_default() as usize,
                late_orders: late.unwrap_or_default() as usize,
                late_rate: rate.unwrap_or_default(),
            })
        })
        .collect())
}

/// Chart 3: revenue, average score and order count per product category,
/// ordered by category name.
pub fn category_performance(table: &PreparedTable) -> Result<Vec<CategoryPerformance>> {
    let grouped = table
        .dataframe()
        .clone()
        .lazy()
        .group_by([col(PRODUCT_CATEGORY)])
        .agg([
            col(PRICE).sum().alias(TOTAL_REVENUE),
            col(REVIEW_SCORE_LABEL)
                .cast(DataType::Float64)
                .mean()
                .alias(AVG_REVIEW_SCORE),
            col(ORDER_ID).count().alias(TOTAL_ORDERS),
        ])
        .sort([PRODUCT_CATEGORY], SortMultipleOptions::default())
        .collect()
        .context("Grouping revenue by product category")?;

    let categories = column_strings(&grouped, PRODUCT_CATEGORY)?;
    let revenues = column_f64(&grouped, TOTAL_REVENUE)?;
    let scores = column_f64(&grouped, AVG_REVIEW_SCORE)?;
    let counts = column_i64(&grouped, TOTAL_ORDERS)?;

    Ok(categories
        .into_iter()
        .zip(revenues)
        .zip(scores)
        .zip(counts)
        .filter_map(|(((category, revenue), score), count)| {
            Some(CategoryPerformance {
                product_category_name: category?,
                total_revenue: revenue.unwrap_or_default(),
                avg_review_score: score.unwrap_or_default(),
                total_orders: count.unwrap_or_default() as usize,
            })
        })
        .collect())
}

/// Chart 4: orders and late share per purchase month, oldest first.
///
/// Orders without a purchase time have no month and are left out.
pub fn monthly_trend(table: &PreparedTable) -> Result<Vec<MonthlyTrend>> {
    let grouped = table
        .dataframe()
        .clone()
        .lazy()
        .filter(col(PURCHASE_TIMESTAMP).is_not_null())
        .with_column(col(PURCHASE_TIMESTAMP).dt().strftime("%Y-%m").alias(MONTH))
        .group_by([col(MONTH)])
        .agg(late_counts())
        .with_column(late_rate())
        .sort([MONTH], SortMultipleOptions::default())
        .collect()
        .context("Grouping orders by purchase month")?;

    let months = column_strings(&grouped, MONTH)?;
    let totals = column_i64(&grouped, TOTAL_ORDERS)?;
    let lates = column_i64(&grouped, LATE_ORDERS)?;
    let rates = column_f64(&grouped, LATE_RATE)?;

    Ok(months
        .into_iter()
        .zip(totals)
        .zip(lates)
        .zip(rates)
        .filter_map(|(((month, total), late), rate)| {
            Some(MonthlyTrend {
                month: month?,
                total_orders: total.unwrap_or_default() as usize,
                late_orders: late.unwrap_or_default() as usize,
                late_rate: rate.unwrap_or_default(),
            })
        })
        .collect())
}

fn late_counts() -> [Expr; 2] {
    [
        col(ORDER_ID).count().alias(TOTAL_ORDERS),
        col(DELIVERY_STATUS)
            .eq(lit(DeliveryStatus::Late.as_str()))
            .cast(DataType::UInt32)
            .sum()
            .alias(LATE_ORDERS),
    ]
}

fn late_rate() -> Expr {
    (col(LATE_ORDERS).cast(DataType::Float64) / col(TOTAL_ORDERS).cast(DataType::Float64))
        .alias(LATE_RATE)
}

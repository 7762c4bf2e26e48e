//! Collapse of the merged rows to one row per order.

use crate::schema::*;
use crate::utils::{column_i64, column_strings};
use anyhow::Result;
use polars::prelude::*;
use tracing::debug;

/// Groups merged rows by `order_id`.
///
/// `review_score` is the first non-null score across all of the order's
/// reviews. After that only the rows of each order's first review are kept,
/// so every item contributes once to the sums however many reviews the order
/// has. Descriptive columns take the first non-null value of the group in row
/// order; `price` and `freight_value` are summed. `review_score` becomes
/// `Review Score` and the columns are projected in output order.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderAggregator;

impl OrderAggregator {
    pub fn new() -> Self {
        Self
    }

    pub fn aggregate(&self, merged: DataFrame) -> Result<DataFrame> {
        let rows_in = merged.height();
        let merged = first_review_rows(first_score_per_order(merged)?)?;

        let aggregated = merged
            .lazy()
            .group_by_stable([col(ORDER_ID)])
            .agg([
                col(PURCHASE_TIMESTAMP).drop_nulls().first(),
                col(REVIEW_SCORE).drop_nulls().first(),
                col(DELIVERY_TIMELINESS).drop_nulls().first(),
                col(DELIVERY_STATUS).drop_nulls().first(),
                col(PRICE).sum(),
                col(FREIGHT_VALUE).sum(),
                col(PRODUCT_CATEGORY).drop_nulls().first(),
                col(CUSTOMER_STATE).drop_nulls().first(),
            ])
            .rename([REVIEW_SCORE], [REVIEW_SCORE_LABEL], true)
            .select(
                PREPARED_COLUMNS
                    .iter()
                    .map(|name| col(*name))
                    .collect::<Vec<_>>(),
            )
            .collect()?;

        debug!(
            "Aggregated {} merged rows into {} orders",
            rows_in,
            aggregated.height()
        );
        Ok(aggregated)
    }
}

/// Broadcast the first non-null review score of each order to all its rows.
fn first_score_per_order(merged: DataFrame) -> Result<DataFrame> {
    Ok(merged
        .lazy()
        .with_column(
            col(REVIEW_SCORE)
                .drop_nulls()
                .first()
                .over([col(ORDER_ID)])
                .alias(REVIEW_SCORE),
        )
        .collect()?)
}

/// Keep the rows belonging to the first review of each order.
///
/// Input must be sorted by order and review position, as the merger leaves it.
fn first_review_rows(merged: DataFrame) -> Result<DataFrame> {
    if merged.column(REVIEW_SEQ).is_err() {
        return Ok(merged);
    }

    let order_ids = column_strings(&merged, ORDER_ID)?;
    let review_seq = column_i64(&merged, REVIEW_SEQ)?;

    let mut current: Option<(&Option<String>, Option<i64>)> = None;
    let keep: BooleanChunked = order_ids
        .iter()
        .zip(review_seq.iter())
        .map(|(order_id, seq)| match current {
            Some((id, first_seq)) if id == order_id => *seq == first_seq,
            _ => {
                current = Some((order_id, *seq));
                true
            }
        })
        .collect();

    let kept = merged.filter(&keep)?;
    if kept.height() < merged.height() {
        debug!(
            "Dropped {} rows repeated by additional reviews",
            merged.height() - kept.height()
        );
    }
    Ok(kept)
}

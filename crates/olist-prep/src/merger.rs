//! Inner joins of the cleaned tables.
//!
//! Orders are joined with reviews, then items, products and customers. Only
//! the columns the prepared table needs are carried through. Fan-out is
//! expected: an order with two reviews and three items yields six rows.

use crate::loader::SourceTables;
use crate::schema::*;
use anyhow::Result;
use polars::prelude::*;
use tracing::debug;

/// Joins the five tables into one row per (order, review, item).
#[derive(Debug, Clone, Copy, Default)]
pub struct TableMerger;

impl TableMerger {
    pub fn new() -> Self {
        Self
    }

    /// Merge the cleaned tables; the orders table must carry the derived
    /// delivery columns.
    ///
    /// The output is sorted by order, review file position and item number,
    /// so the first row of each order holds its first review and first item.
    pub fn merge(&self, tables: &SourceTables) -> Result<DataFrame> {
        let orders = tables.orders.clone().lazy().select([
            col(ORDER_ID),
            col(CUSTOMER_ID),
            col(PURCHASE_TIMESTAMP),
            col(DELIVERY_TIMELINESS),
            col(DELIVERY_STATUS),
        ]);

        let reviews = tables
            .reviews
            .clone()
            .lazy()
            .with_row_index(REVIEW_SEQ, None)
            .select([
                col(ORDER_ID),
                col(REVIEW_SEQ),
                col(REVIEW_SCORE).cast(DataType::Int64),
            ]);

        let items = tables.items.clone().lazy().select([
            col(ORDER_ID),
            col(ORDER_ITEM_ID).cast(DataType::Int64),
            col(PRODUCT_ID),
            col(PRICE).cast(DataType::Float64),
            col(FREIGHT_VALUE).cast(DataType::Float64),
        ]);

        let products = tables
            .products
            .clone()
            .lazy()
            .select([col(PRODUCT_ID), col(PRODUCT_CATEGORY)]);

        let customers = tables
            .customers
            .clone()
            .lazy()
            .select([col(CUSTOMER_ID), col(CUSTOMER_STATE)]);

        let merged = orders
            .join(
                reviews,
                [col(ORDER_ID)],
                [col(ORDER_ID)],
                JoinArgs::new(JoinType::Inner),
            )
            .join(
                items,
                [col(ORDER_ID)],
                [col(ORDER_ID)],
                JoinArgs::new(JoinType::Inner),
            )
            .join(
                products,
                [col(PRODUCT_ID)],
                [col(PRODUCT_ID)],
                JoinArgs::new(JoinType::Inner),
            )
            .join(
                customers,
                [col(CUSTOMER_ID)],
                [col(CUSTOMER_ID)],
                JoinArgs::new(JoinType::Inner),
            )
            .sort(
                [ORDER_ID, REVIEW_SEQ, ORDER_ITEM_ID],
                SortMultipleOptions::default().with_maintain_order(true),
            )
            .select([
                col(ORDER_ID),
                col(PURCHASE_TIMESTAMP),
                col(REVIEW_SEQ),
                col(REVIEW_SCORE),
                col(DELIVERY_TIMELINESS),
                col(DELIVERY_STATUS),
                col(ORDER_ITEM_ID),
                col(PRICE),
                col(FREIGHT_VALUE),
                col(PRODUCT_CATEGORY),
                col(CUSTOMER_STATE),
            ])
            .collect()?;

        debug!(
            "Merged tables: {} rows x {} columns",
            merged.height(),
            merged.width()
        );
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{column_f64, column_i64, column_strings};

    pub(crate) fn cleaned_tables() -> SourceTables {
        SourceTables {
            orders: df![
                ORDER_ID => ["o2", "o1", "o3"],
                CUSTOMER_ID => ["c2", "c1", "c3"],
                PURCHASE_TIMESTAMP => [1i64, 2, 3],
                DELIVERY_TIMELINESS => [0i64, -2, 4],
                DELIVERY_STATUS => ["On-Time/Early", "Late", "On-Time/Early"],
            ]
            .unwrap(),
            reviews: df![
                ORDER_ID => ["o2", "o1", "o2"],
                REVIEW_SCORE => [5i64, 3, 1],
            ]
            .unwrap(),
            items: df![
                ORDER_ID => ["o1", "o2", "o2", "o3"],
                ORDER_ITEM_ID => [1i64, 2, 1, 1],
                PRODUCT_ID => ["p1", "p2", "p1", "p1"],
                PRICE => [10.0f64, 15.0, 30.0, 8.0],
                FREIGHT_VALUE => [2.0f64, 3.0, 4.0, 1.0],
            ]
            .unwrap(),
            products: df![
                PRODUCT_ID => ["p1", "p2"],
                PRODUCT_CATEGORY => ["beleza_saude", "pet_shop"],
            ]
            .unwrap(),
            customers: df![
                CUSTOMER_ID => ["c1", "c2"],
                CUSTOMER_STATE => ["SP", "RJ"],
            ]
            .unwrap(),
        }
    }

    #[test]
    fn test_merge_fans_out_and_drops_unmatched() {
        let merged = TableMerger::new().merge(&cleaned_tables()).unwrap();

        // o1: 1 review x 1 item, o2: 2 reviews x 2 items, o3: no review and no customer
        assert_eq!(merged.height(), 5);
        let ids = column_strings(&merged, ORDER_ID).unwrap();
        assert!(!ids.contains(&Some("o3".to_string())));
    }

    #[test]
    fn test_merge_sorted_by_order_review_item() {
        let merged = TableMerger::new().merge(&cleaned_tables()).unwrap();

        assert_eq!(
            column_strings(&merged, ORDER_ID).unwrap(),
            vec![
                Some("o1".to_string()),
                Some("o2".to_string()),
                Some("o2".to_string()),
                Some("o2".to_string()),
                Some("o2".to_string()),
            ]
        );
        // o2's first review in file order scored 5, its item 1 is p1 at 30.0
        assert_eq!(
            column_i64(&merged, REVIEW_SCORE).unwrap(),
            vec![Some(3), Some(5), Some(5), Some(1), Some(1)]
        );
        assert_eq!(
            column_i64(&merged, ORDER_ITEM_ID).unwrap(),
            vec![Some(1), Some(1), Some(2), Some(1), Some(2)]
        );
        assert_eq!(
            column_f64(&merged, PRICE).unwrap(),
            vec![Some(10.0), Some(30.0), Some(15.0), Some(30.0), Some(15.0)]
        );
        assert_eq!(
            column_strings(&merged, PRODUCT_CATEGORY).unwrap()[1],
            Some("beleza_saude".to_string())
        );
    }
}

//! Data cleaning module for the raw source tables.
//!
//! This module provides functionality for:
//! - Treating blank text values as missing
//! - Dropping products without a category
//! - Parsing the order date columns into naive timestamps
//! - Dropping orders that lack a delivered or estimated date

mod converters;
mod sanitizers;

use crate::loader::SourceTables;
use crate::schema::*;
use anyhow::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// What the cleaner removed or coerced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningReport {
    /// Products dropped for a null or blank category.
    pub products_dropped: usize,
    /// Customers dropped for a null or blank state.
    pub customers_dropped: usize,
    /// Non-empty date strings that failed to parse, per column.
    pub malformed_dates: BTreeMap<String, usize>,
    /// Orders dropped for a missing delivered or estimated date.
    pub orders_dropped: usize,
}

impl CleaningReport {
    pub fn total_malformed(&self) -> usize {
        self.malformed_dates.values().sum()
    }
}

/// Data cleaner for the Olist source tables.
#[derive(Debug, Clone)]
pub struct DataCleaner {
    malformed_sample_limit: usize,
}

impl Default for DataCleaner {
    fn default() -> Self {
        Self {
            malformed_sample_limit: 3,
        }
    }
}

impl DataCleaner {
    pub fn new(malformed_sample_limit: usize) -> Self {
        Self {
            malformed_sample_limit,
        }
    }

    /// Clean all source tables.
    ///
    /// Reviews and items pass through untouched; the inner joins downstream
    /// drop whatever no longer matches.
    pub fn clean(&self, tables: SourceTables) -> Result<(SourceTables, CleaningReport)> {
        info!("Cleaning source tables...");
        let mut report = CleaningReport::default();

        let (products, dropped) = self.drop_uncategorized_products(tables.products)?;
        report.products_dropped = dropped;

        let (customers, dropped) = self.drop_stateless_customers(tables.customers)?;
        report.customers_dropped = dropped;

        let (orders, malformed) = self.parse_order_dates(tables.orders)?;
        report.malformed_dates = malformed;

        let (orders, dropped) = self.drop_undeliverable_orders(orders)?;
        report.orders_dropped = dropped;

        info!(
            "Cleaning done: {} products, {} customers and {} orders dropped, {} malformed dates",
            report.products_dropped,
            report.customers_dropped,
            report.orders_dropped,
            report.total_malformed()
        );

        Ok((
            SourceTables {
                orders,
                reviews: tables.reviews,
                items: tables.items,
                products,
                customers,
            },
            report,
        ))
    }

    /// Remove products whose category is null or blank.
    pub fn drop_uncategorized_products(&self, products: DataFrame) -> Result<(DataFrame, usize)> {
        drop_blank(products, PRODUCT_CATEGORY)
    }

    /// Remove customers whose state is null or blank.
    pub fn drop_stateless_customers(&self, customers: DataFrame) -> Result<(DataFrame, usize)> {
        drop_blank(customers, CUSTOMER_STATE)
    }

    /// Parse every order date column that is present.
    ///
    /// Unparseable values become null; the count per column is returned and
    /// a few samples are logged.
    pub fn parse_order_dates(
        &self,
        mut orders: DataFrame,
    ) -> Result<(DataFrame, BTreeMap<String, usize>)> {
        let mut malformed_by_column = BTreeMap::new();

        for name in ORDER_DATE_COLUMNS {
            let Ok(column) = orders.column(name) else {
                debug!("Order date column '{}' not present, skipping", name);
                continue;
            };

            let parsed = converters::string_to_datetime(
                column.as_materialized_series(),
                self.malformed_sample_limit,
            )?;

            if parsed.malformed > 0 {
                warn!(
                    "Column '{}': {} malformed date values set to null (e.g. {:?})",
                    name, parsed.malformed, parsed.samples
                );
                malformed_by_column.insert(name.to_string(), parsed.malformed);
            }

            orders.replace(name, parsed.series)?;
        }

        Ok((orders, malformed_by_column))
    }

    /// Remove orders without a delivered-customer or estimated-delivery date.
    pub fn drop_undeliverable_orders(&self, orders: DataFrame) -> Result<(DataFrame, usize)> {
        let before = orders.height();
        let orders = orders
            .lazy()
            .filter(
                col(DELIVERED_CUSTOMER_DATE)
                    .is_not_null()
                    .and(col(ESTIMATED_DELIVERY_DATE).is_not_null()),
            )
            .collect()?;

        let dropped = before - orders.height();
        debug!("Removed {} orders without delivery dates", dropped);
        Ok((orders, dropped))
    }
}

/// Sanitize a text column, then drop rows where it is null.
fn drop_blank(df: DataFrame, column: &str) -> Result<(DataFrame, usize)> {
    let before = df.height();
    let df = sanitizers::sanitize_text_columns(df, &[column])?;
    let mask = df.column(column)?.as_materialized_series().is_not_null();
    let df = df.filter(&mask)?;

    let dropped = before - df.height();
    if dropped > 0 {
        debug!("Removed {} rows with missing '{}'", dropped, column);
    }
    Ok((df, dropped))
}

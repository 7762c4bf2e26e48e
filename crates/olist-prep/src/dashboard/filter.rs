//! Purchase-date and category filters over the prepared table.

use crate::error::{Result, ResultExt};
use crate::schema::{PRODUCT_CATEGORY, PURCHASE_TIMESTAMP};
use crate::session::PreparedTable;
use crate::utils::{MILLIS_PER_DAY, date_start_millis};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Row filter applied before KPIs and charts are computed.
///
/// Both date bounds are inclusive calendar days: `end` keeps every order
/// purchased on that day. `categories: None` keeps all categories while an
/// empty set keeps none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardFilter {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub categories: Option<BTreeSet<String>>,
}

impl DashboardFilter {
    /// A filter that keeps every row.
    pub fn new() -> Self {
        Self::default()
    }

    /// The widest selection for `table`: its first and last purchase days and
    /// every category it contains.
    pub fn full_range(table: &PreparedTable) -> Result<Self> {
        let range = table.purchase_range()?;
        Ok(Self {
            start: range.map(|(min, _)| min.date()),
            end: range.map(|(_, max)| max.date()),
            categories: Some(table.categories()?.into_iter().collect()),
        })
    }

    pub fn with_date_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = Some(categories.into_iter().map(Into::into).collect());
        self
    }

    /// True when the filter keeps every row.
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none() && self.categories.is_none()
    }

    /// Keep the rows matching every bound.
    ///
    /// Rows without a purchase time are dropped as soon as a date bound is
    /// set. An empty result is not an error.
    pub fn apply(&self, table: &PreparedTable) -> Result<PreparedTable> {
        if self.is_unbounded() {
            return Ok(table.clone());
        }

        let df = table.dataframe();
        let filtered = df
            .clone()
            .lazy()
            .filter(self.predicate())
            .collect()
            .context("Filtering prepared orders")?;
        debug!(
            "Filter kept {} of {} orders",
            filtered.height(),
            df.height()
        );

        PreparedTable::new(filtered)
    }

    /// Row predicate for the bounds that are set. Null timestamps and null
    /// categories compare as null, which the filter drops.
    fn predicate(&self) -> Expr {
        let purchased = || col(PURCHASE_TIMESTAMP).cast(DataType::Int64);
        let mut predicate = lit(true);

        if let Some(start) = self.start {
            predicate = predicate.and(purchased().gt_eq(lit(date_start_millis(start))));
        }
        if let Some(end) = self.end {
            // Exclusive upper bound: midnight after the last selected day.
            predicate = predicate.and(purchased().lt(lit(date_start_millis(end) + MILLIS_PER_DAY)));
        }
        if let Some(categories) = &self.categories {
            let any_category = categories
                .iter()
                .map(|c| col(PRODUCT_CATEGORY).eq(lit(c.clone())))
                .reduce(|any, eq| any.or(eq))
                .unwrap_or_else(|| lit(false));
            predicate = predicate.and(any_category);
        }
        predicate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::tests::sample_table;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn order_ids(table: &PreparedTable) -> Vec<String> {
        table
            .records()
            .unwrap()
            .into_iter()
            .map(|r| r.order_id)
            .collect()
    }

    #[test]
    fn test_unbounded_filter_keeps_everything() {
        let table = sample_table();
        let filtered = DashboardFilter::new().apply(&table).unwrap();
        assert_eq!(filtered.height(), table.height());
    }

    #[test]
    fn test_end_date_is_inclusive() {
        let table = sample_table();
        // o2 is purchased at 23:30 on 2018-05-20.
        let filtered = DashboardFilter::new()
            .with_date_range(Some(day(2018, 5, 1)), Some(day(2018, 5, 20)))
            .apply(&table)
            .unwrap();

        assert_eq!(order_ids(&filtered), vec!["o1", "o2"]);
    }

    #[test]
    fn test_start_date_is_inclusive() {
        let table = sample_table();
        let filtered = DashboardFilter::new()
            .with_date_range(Some(day(2018, 5, 20)), None)
            .apply(&table)
            .unwrap();

        assert_eq!(order_ids(&filtered), vec!["o2", "o3", "o4"]);
    }

    #[test]
    fn test_category_filter() {
        let table = sample_table();
        let filtered = DashboardFilter::new()
            .with_categories(["moveis_decoracao"])
            .apply(&table)
            .unwrap();

        assert_eq!(order_ids(&filtered), vec!["o2", "o4"]);
    }

    #[test]
    fn test_empty_category_set_keeps_nothing() {
        let table = sample_table();
        let filtered = DashboardFilter::new()
            .with_categories(Vec::<String>::new())
            .apply(&table)
            .unwrap();

        assert!(filtered.is_empty());
    }

    #[test]
    fn test_inverted_range_is_empty_not_error() {
        let table = sample_table();
        let filtered = DashboardFilter::new()
            .with_date_range(Some(day(2018, 7, 1)), Some(day(2018, 5, 1)))
            .apply(&table)
            .unwrap();

        assert!(filtered.is_empty());
    }

    #[test]
    fn test_full_range_matches_table() {
        let table = sample_table();
        let filter = DashboardFilter::full_range(&table).unwrap();

        assert_eq!(filter.start, Some(day(2018, 5, 1)));
        assert_eq!(filter.end, Some(day(2018, 6, 3)));
        assert_eq!(filter.categories.as_ref().map(|c| c.len()), Some(2));
        assert_eq!(filter.apply(&table).unwrap().height(), table.height());
    }
}

//! Shared value types: the delivery status label, the typed prepared row and
//! the run summary handed to presentation layers.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Delivery Status
// ============================================================================

/// Whether an order arrived after its estimated delivery date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeliveryStatus {
    /// Delivered after the estimate (timeliness below zero).
    #[serde(rename = "Late")]
    Late,
    /// Delivered on the estimated day or before it.
    #[serde(rename = "On-Time/Early")]
    OnTimeOrEarly,
}

impl DeliveryStatus {
    /// Label stored in the `Delivery Status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Late => "Late",
            Self::OnTimeOrEarly => "On-Time/Early",
        }
    }

    /// Classify a timeliness value in whole days (estimated minus delivered).
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use olist_prep::DeliveryStatus;
    ///
    /// assert_eq!(DeliveryStatus::from_timeliness(-2), DeliveryStatus::Late);
    /// assert_eq!(DeliveryStatus::from_timeliness(0), DeliveryStatus::OnTimeOrEarly);
    /// ```
    pub fn from_timeliness(days: i64) -> Self {
        if days < 0 {
            Self::Late
        } else {
            Self::OnTimeOrEarly
        }
    }

    pub fn is_late(&self) -> bool {
        matches!(self, Self::Late)
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a known delivery status label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown delivery status '{0}'")]
pub struct ParseDeliveryStatusError(pub String);

impl FromStr for DeliveryStatus {
    type Err = ParseDeliveryStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Late" => Ok(Self::Late),
            "On-Time/Early" => Ok(Self::OnTimeOrEarly),
            other => Err(ParseDeliveryStatusError(other.to_string())),
        }
    }
}

// ============================================================================
// Prepared Order Record
// ============================================================================

/// One row of the prepared order table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedOrderRecord {
    pub order_id: String,
    /// Null only when every source value for the order was malformed.
    pub order_purchase_timestamp: Option<NaiveDateTime>,
    #[serde(rename = "Review Score")]
    pub review_score: i64,
    /// Whole days between the estimated and the actual delivery date.
    #[serde(rename = "Delivery Timeliness")]
    pub delivery_timeliness: i64,
    #[serde(rename = "Delivery Status")]
    pub delivery_status: DeliveryStatus,
    /// Sum of item prices.
    pub price: f64,
    /// Sum of item freight values.
    pub freight_value: f64,
    /// Category of the order's first item.
    pub product_category_name: String,
    pub customer_state: String,
}

impl PreparedOrderRecord {
    /// Price plus freight.
    pub fn revenue(&self) -> f64 {
        self.price + self.freight_value
    }
}

// ============================================================================
// Preparation Summary Types
// ============================================================================

/// Row counts of the five source tables as loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRowCounts {
    pub orders: usize,
    pub reviews: usize,
    pub items: usize,
    pub products: usize,
    pub customers: usize,
}

impl SourceRowCounts {
    pub fn total(&self) -> usize {
        self.orders + self.reviews + self.items + self.products + self.customers
    }
}

/// Human-readable summary of what a preparation run did.
///
/// Serialized alongside the dashboard output so a frontend can show how
/// many records each filter removed.
///
/// # Example
///
/// ```rust,ignore
/// let outcome = pipeline.run()?;
/// let summary = &outcome.summary;
/// println!(
///     "Prepared {} of {} orders in {}ms",
///     summary.orders_prepared, summary.source_rows.orders, summary.duration_ms
/// );
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreparationSummary {
    /// Total execution time in milliseconds.
    pub duration_ms: u64,

    /// Rows read from each source file.
    pub source_rows: SourceRowCounts,

    /// Products removed for a missing category.
    pub products_dropped: usize,
    /// Customers removed for a missing state.
    pub customers_dropped: usize,
    /// Unparseable date strings per order date column.
    pub malformed_dates: BTreeMap<String, usize>,
    /// Orders removed for a missing delivered or estimated date.
    pub orders_dropped_undelivered: usize,

    /// Rows produced by the join, before aggregation.
    pub merged_rows: usize,
    /// Rows in the prepared table (one per order).
    pub orders_prepared: usize,

    /// List of actions taken during preparation.
    pub actions: Vec<PreparationAction>,

    /// Warnings and notes generated during preparation.
    pub warnings: Vec<String>,
}

impl PreparationSummary {
    /// Create a new empty summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action to the summary.
    pub fn add_action(&mut self, action: PreparationAction) {
        self.actions.push(action);
    }

    /// Add a warning to the summary.
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Total malformed date values across all columns.
    pub fn total_malformed_dates(&self) -> usize {
        self.malformed_dates.values().sum()
    }

    /// Source orders that did not make it into the prepared table.
    pub fn orders_dropped(&self) -> usize {
        self.source_rows.orders.saturating_sub(self.orders_prepared)
    }

    /// Percentage of source orders missing from the prepared table.
    pub fn orders_dropped_percentage(&self) -> f64 {
        if self.source_rows.orders == 0 {
            0.0
        } else {
            (self.orders_dropped() as f64 / self.source_rows.orders as f64) * 100.0
        }
    }

    /// Average number of joined rows per prepared order.
    pub fn fan_out_ratio(&self) -> f64 {
        if self.orders_prepared == 0 {
            0.0
        } else {
            self.merged_rows as f64 / self.orders_prepared as f64
        }
    }
}

/// A single action taken during preparation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparationAction {
    /// Type of action performed.
    pub action_type: ActionType,
    /// Table or column the action applied to.
    pub target: String,
    /// Human-readable description of the action.
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl PreparationAction {
    pub fn new(
        action_type: ActionType,
        target: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            action_type,
            target: target.into(),
            description: description.into(),
            details: None,
        }
    }

    /// Add details to the action.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Types of actions recorded during preparation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Products without a category were removed.
    ProductsRemoved,
    /// Customers without a state were removed.
    CustomersRemoved,
    /// Unparseable date strings were replaced with nulls.
    DatesCoerced,
    /// Orders without delivery dates were removed.
    OrdersRemoved,
    /// Delivery timeliness and status were added.
    FeaturesDerived,
    /// The five tables were joined.
    TablesMerged,
    /// Joined rows were collapsed to one row per order.
    OrdersAggregated,
    /// A column was renamed.
    ColumnRenamed,
}

impl ActionType {
    /// Get a human-readable display name for the action type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::ProductsRemoved => "Products Removed",
            Self::CustomersRemoved => "Customers Removed",
            Self::DatesCoerced => "Dates Coerced",
            Self::OrdersRemoved => "Orders Removed",
            Self::FeaturesDerived => "Features Derived",
            Self::TablesMerged => "Tables Merged",
            Self::OrdersAggregated => "Orders Aggregated",
            Self::ColumnRenamed => "Column Renamed",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_status_from_timeliness() {
        assert_eq!(DeliveryStatus::from_timeliness(-2), DeliveryStatus::Late);
        assert_eq!(DeliveryStatus::from_timeliness(-1), DeliveryStatus::Late);
        assert_eq!(DeliveryStatus::from_timeliness(0), DeliveryStatus::OnTimeOrEarly);
        assert_eq!(DeliveryStatus::from_timeliness(7), DeliveryStatus::OnTimeOrEarly);
    }

    #[test]
    fn test_delivery_status_labels() {
        assert_eq!(DeliveryStatus::Late.as_str(), "Late");
        assert_eq!(DeliveryStatus::OnTimeOrEarly.to_string(), "On-Time/Early");
        assert_eq!("Late".parse::<DeliveryStatus>(), Ok(DeliveryStatus::Late));
        assert_eq!(
            "On-Time/Early".parse::<DeliveryStatus>(),
            Ok(DeliveryStatus::OnTimeOrEarly)
        );
        assert!("late".parse::<DeliveryStatus>().is_err());
    }

    #[test]
    fn test_delivery_status_serializes_as_label() {
        let json = serde_json::to_string(&DeliveryStatus::OnTimeOrEarly).unwrap();
        assert_eq!(json, "\"On-Time/Early\"");
        let parsed: DeliveryStatus = serde_json::from_str("\"Late\"").unwrap();
        assert_eq!(parsed, DeliveryStatus::Late);
    }

    #[test]
    fn test_summary_percentages() {
        let mut summary = PreparationSummary::new();
        summary.source_rows.orders = 10;
        summary.orders_prepared = 4;
        summary.merged_rows = 6;

        assert_eq!(summary.orders_dropped(), 6);
        assert!((summary.orders_dropped_percentage() - 60.0).abs() < 1e-9);
        assert!((summary.fan_out_ratio() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_summary_empty_source() {
        let summary = PreparationSummary::default();
        assert_eq!(summary.orders_dropped_percentage(), 0.0);
        assert_eq!(summary.fan_out_ratio(), 0.0);
        assert_eq!(summary.total_malformed_dates(), 0);
    }

    #[test]
    fn test_summary_add_action_and_warning() {
        let mut summary = PreparationSummary::new();
        summary.add_action(
            PreparationAction::new(
                ActionType::OrdersRemoved,
                "orders",
                "Removed 3 orders without delivery dates",
            )
            .with_details("order_delivered_customer_date: 2"),
        );
        summary.add_warning("High data loss");

        assert_eq!(summary.actions.len(), 1);
        assert_eq!(summary.actions[0].target, "orders");
        assert!(summary.actions[0].details.as_deref().unwrap().contains("2"));
        assert_eq!(summary.warnings, vec!["High data loss".to_string()]);
    }

    #[test]
    fn test_action_type_serialization() {
        let json = serde_json::to_string(&ActionType::DatesCoerced).unwrap();
        assert_eq!(json, "\"dates_coerced\"");
        assert_eq!(ActionType::TablesMerged.display_name(), "Tables Merged");
    }

    #[test]
    fn test_record_serializes_display_names() {
        let record = PreparedOrderRecord {
            order_id: "ord01".to_string(),
            order_purchase_timestamp: chrono::NaiveDate::from_ymd_opt(2018, 5, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0),
            review_score: 4,
            delivery_timeliness: -2,
            delivery_status: DeliveryStatus::Late,
            price: 25.0,
            freight_value: 5.0,
            product_category_name: "beleza_saude".to_string(),
            customer_state: "SP".to_string(),
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"Review Score\":4"));
        assert!(json.contains("\"Delivery Status\":\"Late\""));
        assert_eq!(record.revenue(), 30.0);
    }
}

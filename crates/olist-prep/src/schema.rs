//! Column names of the Olist extracts and of the prepared order table.

pub const ORDER_ID: &str = "order_id";
pub const CUSTOMER_ID: &str = "customer_id";
pub const PRODUCT_ID: &str = "product_id";
pub const ORDER_ITEM_ID: &str = "order_item_id";

pub const PURCHASE_TIMESTAMP: &str = "order_purchase_timestamp";
pub const APPROVED_AT: &str = "order_approved_at";
pub const DELIVERED_CARRIER_DATE: &str = "order_delivered_carrier_date";
pub const DELIVERED_CUSTOMER_DATE: &str = "order_delivered_customer_date";
pub const ESTIMATED_DELIVERY_DATE: &str = "order_estimated_delivery_date";

pub const REVIEW_SCORE: &str = "review_score";
pub const PRICE: &str = "price";
pub const FREIGHT_VALUE: &str = "freight_value";
pub const PRODUCT_CATEGORY: &str = "product_category_name";
pub const CUSTOMER_STATE: &str = "customer_state";

/// Derived per-order columns.
pub const DELIVERY_TIMELINESS: &str = "Delivery Timeliness";
pub const DELIVERY_STATUS: &str = "Delivery Status";

/// Display name `review_score` takes in the prepared table.
pub const REVIEW_SCORE_LABEL: &str = "Review Score";

/// File-order position of a review, used to pick the first review of an order.
pub(crate) const REVIEW_SEQ: &str = "review_seq";

/// Order date columns parsed into timestamps by the cleaner.
pub const ORDER_DATE_COLUMNS: [&str; 5] = [
    PURCHASE_TIMESTAMP,
    APPROVED_AT,
    DELIVERED_CARRIER_DATE,
    DELIVERED_CUSTOMER_DATE,
    ESTIMATED_DELIVERY_DATE,
];

/// Columns of the prepared order table, in output order.
pub const PREPARED_COLUMNS: [&str; 9] = [
    ORDER_ID,
    PURCHASE_TIMESTAMP,
    REVIEW_SCORE_LABEL,
    DELIVERY_TIMELINESS,
    DELIVERY_STATUS,
    PRICE,
    FREIGHT_VALUE,
    PRODUCT_CATEGORY,
    CUSTOMER_STATE,
];

//! Olist Order Preparation Library
//!
//! Turns the five raw Olist e-commerce extracts into one analysis-ready row
//! per order, built with Rust and Polars.
//!
//! # Overview
//!
//! - **Loading**: reads orders, reviews, items, products and customers from one directory
//! - **Cleaning**: drops uncategorised products and orders without delivery dates,
//!   coercing malformed timestamps to null
//! - **Delivery Metrics**: whole days between estimated and actual delivery, and a
//!   "Late" / "On-Time/Early" status
//! - **Merging**: inner joins of the five cleaned tables
//! - **Aggregation**: one row per order with summed price and freight
//! - **Dashboard**: session cache, filters, KPIs and chart datasets over the result
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use olist_prep::{Pipeline, PipelineConfig};
//! use olist_prep::dashboard::{DashboardFilter, DashboardView};
//!
//! let config = PipelineConfig::builder()
//!     .data_dir("olist data")
//!     .build()?;
//!
//! let outcome = Pipeline::builder()
//!     .config(config)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run()?;
//!
//! println!("{} orders prepared", outcome.summary.orders_prepared);
//!
//! let view = DashboardView::build(&outcome.table, DashboardFilter::new())?;
//! println!("Late delivery rate: {:.2}%", view.kpis.late_delivery_rate * 100.0);
//! ```
//!
//! # Sessions
//!
//! A long-lived front end prepares each data directory once and keeps the
//! result in a [`PreparedDataCache`]:
//!
//! ```rust,ignore
//! use olist_prep::{Pipeline, PreparedDataCache};
//!
//! let pipeline = Pipeline::builder().build()?;
//! let cache = PreparedDataCache::new();
//!
//! let table = cache.get_or_prepare(&pipeline, "olist data")?; // runs the pipeline
//! let again = cache.get_or_prepare(&pipeline, "olist data")?; // served from cache
//! ```
//!
//! # Errors
//!
//! A missing source file ([`PrepError::MissingDataFile`]) and an empty result
//! ([`PrepError::EmptyResult`]) are terminal: a front end should report them
//! and render nothing else. See [`PrepError::is_terminal`].

pub mod aggregator;
pub mod cleaner;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod features;
pub mod loader;
pub mod merger;
pub mod pipeline;
pub mod schema;
pub mod session;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use aggregator::OrderAggregator;
pub use cleaner::{CleaningReport, DataCleaner};
pub use config::{ConfigValidationError, PipelineConfig, PipelineConfigBuilder};
pub use error::{PrepError, Result as PrepResult, ResultExt};
pub use features::FeatureDeriver;
pub use loader::{DataLoader, SourceFile, SourceTables};
pub use merger::TableMerger;
pub use pipeline::{
    ClosureProgressReporter, Pipeline, PipelineBuilder, PreparationOutcome, PreparationStage,
    ProgressReporter, ProgressUpdate,
};
pub use session::{CacheKey, PreparedDataCache, PreparedTable, SourceFingerprint};
pub use types::{
    ActionType, DeliveryStatus, PreparationAction, PreparationSummary, PreparedOrderRecord,
    SourceRowCounts,
};

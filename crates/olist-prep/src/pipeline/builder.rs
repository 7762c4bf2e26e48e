//! Main preparation pipeline module.
//!
//! This module provides the core `Pipeline` struct and builder for
//! orchestrating load, clean, derive, merge and aggregate.

use crate::aggregator::OrderAggregator;
use crate::cleaner::DataCleaner;
use crate::config::PipelineConfig;
use crate::error::{PrepError, Result};
use crate::features::FeatureDeriver;
use crate::loader::DataLoader;
use crate::merger::TableMerger;
use crate::pipeline::progress::{
    ClosureProgressReporter, PreparationStage, ProgressReporter, ProgressUpdate,
};
use crate::schema::{REVIEW_SCORE, REVIEW_SCORE_LABEL};
use crate::session::PreparedTable;
use crate::types::{ActionType, PreparationAction, PreparationSummary};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Result of a successful preparation run.
#[derive(Debug, Clone)]
pub struct PreparationOutcome {
    /// One row per surviving order.
    pub table: PreparedTable,
    /// What each step removed, coerced or produced.
    pub summary: PreparationSummary,
}

/// The order preparation pipeline.
///
/// Use [`Pipeline::builder()`] to create a new pipeline with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// use olist_prep::{Pipeline, PipelineConfig};
///
/// let outcome = Pipeline::builder()
///     .config(PipelineConfig::builder().data_dir("data/olist").build()?)
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()?
///     .run()?;
///
/// println!("{} orders prepared", outcome.table.height());
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    loader: DataLoader,
    cleaner: DataCleaner,
    deriver: FeatureDeriver,
    merger: TableMerger,
    aggregator: OrderAggregator,
}

// Shared by reference through the session cache.
static_assertions::assert_impl_all!(Pipeline: Send, Sync);

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Prepare the data in the configured directory.
    pub fn run(&self) -> Result<PreparationOutcome> {
        self.run_dir(&self.config.data_dir)
    }

    /// Prepare the data in `dir`.
    ///
    /// # Errors
    ///
    /// [`PrepError::MissingDataFile`] when a source file cannot be read and
    /// [`PrepError::EmptyResult`] when no order survives cleaning and merging.
    /// Both are terminal for a dashboard session.
    pub fn run_dir(&self, dir: impl AsRef<Path>) -> Result<PreparationOutcome> {
        match self.run_internal(dir.as_ref()) {
            Ok(outcome) => {
                self.report_progress(ProgressUpdate::complete(format!(
                    "Prepared {} orders",
                    outcome.table.height()
                )));
                Ok(outcome)
            }
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                error!("Pipeline error: {}", e);
                Err(e)
            }
        }
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn run_internal(&self, dir: &Path) -> Result<PreparationOutcome> {
        let start_time = Instant::now();
        let mut summary = PreparationSummary::new();

        // Step 1: Load
        info!("Step 1: Loading source tables...");
        self.report_progress(ProgressUpdate::with_sub_stage(
            PreparationStage::Loading,
            dir.display().to_string(),
            0.0,
            "Loading source tables...",
        ));
        let tables = self.loader.load_dir(dir)?;
        summary.source_rows = tables.row_counts();
        self.report_progress(ProgressUpdate::new(
            PreparationStage::Loading,
            1.0,
            format!("Loaded {} source rows", summary.source_rows.total()),
        ));

        // Step 2: Clean
        info!("Step 2: Cleaning products and orders...");
        self.report_progress(ProgressUpdate::new(
            PreparationStage::Cleaning,
            0.0,
            "Cleaning products and orders...",
        ));
        let (mut tables, report) = self
            .cleaner
            .clean(tables)
            .map_err(|e| PrepError::CleaningFailed(e.to_string()))?;

        summary.products_dropped = report.products_dropped;
        summary.customers_dropped = report.customers_dropped;
        summary.orders_dropped_undelivered = report.orders_dropped;
        summary.malformed_dates = report.malformed_dates.clone();

        if report.products_dropped > 0 {
            summary.add_action(PreparationAction::new(
                ActionType::ProductsRemoved,
                "products",
                format!(
                    "Removed {} products without a category",
                    report.products_dropped
                ),
            ));
        }
        if report.customers_dropped > 0 {
            summary.add_action(PreparationAction::new(
                ActionType::CustomersRemoved,
                "customers",
                format!(
                    "Removed {} customers without a state",
                    report.customers_dropped
                ),
            ));
        }
        for (column, count) in &report.malformed_dates {
            summary.add_action(PreparationAction::new(
                ActionType::DatesCoerced,
                column.as_str(),
                format!("Set {} unparseable dates to null", count),
            ));
        }
        if report.orders_dropped > 0 {
            summary.add_action(PreparationAction::new(
                ActionType::OrdersRemoved,
                "orders",
                format!(
                    "Removed {} orders without a delivered or estimated date",
                    report.orders_dropped
                ),
            ));
        }
        self.report_progress(ProgressUpdate::new(
            PreparationStage::Cleaning,
            1.0,
            "Cleaning complete",
        ));

        // Step 3: Derive delivery metrics
        info!("Step 3: Deriving delivery metrics...");
        self.report_progress(ProgressUpdate::new(
            PreparationStage::FeatureDerivation,
            0.0,
            "Deriving delivery timeliness...",
        ));
        tables.orders = self
            .deriver
            .derive(tables.orders.clone())
            .map_err(|e| PrepError::FeatureDerivationFailed(e.to_string()))?;
        summary.add_action(PreparationAction::new(
            ActionType::FeaturesDerived,
            "orders",
            format!(
                "Derived delivery timeliness and status for {} orders",
                tables.orders.height()
            ),
        ));

        // Step 4: Merge
        info!("Step 4: Merging tables...");
        self.report_progress(ProgressUpdate::new(
            PreparationStage::Merging,
            0.0,
            "Joining orders, reviews, items, products and customers...",
        ));
        let merged = self
            .merger
            .merge(&tables)
            .map_err(|e| PrepError::MergeFailed(e.to_string()))?;
        summary.merged_rows = merged.height();
        summary.add_action(PreparationAction::new(
            ActionType::TablesMerged,
            "dataset",
            format!("Inner-joined five tables into {} rows", merged.height()),
        ));
        drop(tables);

        // Step 5: Aggregate
        info!("Step 5: Aggregating to one row per order...");
        self.report_progress(ProgressUpdate::new(
            PreparationStage::Aggregation,
            0.0,
            "Aggregating orders...",
        ));
        let aggregated = self
            .aggregator
            .aggregate(merged)
            .map_err(|e| PrepError::AggregationFailed(e.to_string()))?;
        summary.add_action(PreparationAction::new(
            ActionType::OrdersAggregated,
            "dataset",
            format!(
                "Collapsed {} rows into {} orders",
                summary.merged_rows,
                aggregated.height()
            ),
        ));
        summary.add_action(PreparationAction::new(
            ActionType::ColumnRenamed,
            REVIEW_SCORE,
            format!("Renamed to '{}'", REVIEW_SCORE_LABEL),
        ));

        if aggregated.height() == 0 {
            return Err(PrepError::EmptyResult);
        }

        let table = PreparedTable::new(aggregated)?;
        summary.orders_prepared = table.height();
        summary.duration_ms = start_time.elapsed().as_millis() as u64;

        let dropped_share = summary.orders_dropped_percentage() / 100.0;
        if dropped_share > self.config.data_loss_warning_threshold {
            let message = format!(
                "High data loss: {:.1}% of source orders were dropped",
                summary.orders_dropped_percentage()
            );
            warn!("{}", message);
            summary.add_warning(message);
        }

        debug!(
            "Fan-out ratio {:.2}, {} malformed dates",
            summary.fan_out_ratio(),
            summary.total_malformed_dates()
        );
        info!(
            "Prepared {} orders in {}ms",
            summary.orders_prepared, summary.duration_ms
        );

        Ok(PreparationOutcome { table, summary })
    }
}

/// Builder for creating a [`Pipeline`] instance.
///
/// Use [`Pipeline::builder()`] to get started.
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress reporter for receiving updates during preparation.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// This is a convenience method for simple progress handling.
    /// For more complex scenarios, use [`progress_reporter`](Self::progress_reporter).
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<Pipeline, crate::config::ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(Pipeline {
            loader: DataLoader::new(config.infer_schema_length),
            cleaner: DataCleaner::new(config.malformed_sample_limit),
            deriver: FeatureDeriver::new(),
            merger: TableMerger::new(),
            aggregator: OrderAggregator::new(),
            progress_reporter: self.progress_reporter,
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_pipeline_builder_default() {
        let pipeline = Pipeline::builder().build().unwrap();
        assert!(pipeline.progress_reporter.is_none());
        assert_eq!(pipeline.config().data_dir, PathBuf::from("olist data"));
    }

    #[test]
    fn test_pipeline_builder_rejects_invalid_config() {
        let config = PipelineConfig {
            data_loss_warning_threshold: -0.1,
            ..PipelineConfig::default()
        };
        assert!(Pipeline::builder().config(config).build().is_err());
    }

    #[test]
    fn test_pipeline_builder_with_progress_callback() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let pipeline = Pipeline::builder()
            .on_progress(move |_update| {
                call_count_clone.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        pipeline.report_progress(ProgressUpdate::new(PreparationStage::Loading, 0.5, "Test"));

        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_directory_reports_failure() {
        let stages = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let stages_clone = stages.clone();

        let pipeline = Pipeline::builder()
            .on_progress(move |update| stages_clone.lock().push(update.stage))
            .build()
            .unwrap();

        let err = pipeline.run_dir("/definitely/not/here").unwrap_err();

        assert!(err.is_terminal());
        assert_eq!(err.error_code(), "MISSING_DATA_FILE");
        assert_eq!(stages.lock().last(), Some(&PreparationStage::Failed));
    }
}

//! CLI entry point for the order preparation pipeline.

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use clap::Parser;
use olist_prep::dashboard::{DashboardFilter, DashboardView};
use olist_prep::{
    Pipeline, PipelineConfig, PrepError, PreparationOutcome, PreparationSummary, PreparedTable,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Olist Customer Satisfaction & Delivery Performance",
    long_about = "Prepares the Olist e-commerce extracts into one row per order and prints \
                  delivery and satisfaction KPIs with the chart datasets behind them.\n\n\
                  EXAMPLES:\n  \
                  # Full dashboard over the default data directory\n  \
                  olist-prep\n\n  \
                  # One quarter, two categories\n  \
                  olist-prep --from 2018-01-01 --to 2018-03-31 \\\n    \
                  --category beleza_saude --category moveis_decoracao\n\n  \
                  # Machine-readable output and a CSV of the prepared table\n  \
                  olist-prep --json --export out/prepared_orders.csv"
)]
struct Args {
    /// Directory containing the five Olist CSV files
    ///
    /// Overrides the directory from --config. Defaults to "olist data".
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// JSON pipeline configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// First purchase day to include (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last purchase day to include (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Product category to include (repeatable, default: all)
    #[arg(long = "category")]
    categories: Vec<String>,

    /// Write the prepared order table to this CSV file
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,

    /// Output JSON to stdout instead of human-readable summary
    ///
    /// Disables all progress logs; only outputs the final JSON document.
    #[arg(long)]
    json: bool,
}

/// Document printed by `--json`.
#[derive(Serialize)]
struct JsonReport<'a> {
    summary: &'a PreparationSummary,
    dashboard: &'a DashboardView,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }

    let pipeline = build_pipeline(&args, config)?;

    let outcome = match pipeline.run() {
        Ok(outcome) => outcome,
        Err(e) => return report_failure(&args, e),
    };

    if let Some(path) = &args.export {
        outcome.table.write_csv(path)?;
    }

    let filter = build_filter(&args, &outcome.table)?;
    let view = DashboardView::build(&outcome.table, filter)?;

    if args.json {
        let report = JsonReport {
            summary: &outcome.summary,
            dashboard: &view,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_human_readable_summary(&outcome, &view);
    Ok(())
}

fn build_pipeline(args: &Args, config: PipelineConfig) -> Result<Pipeline> {
    let mut builder = Pipeline::builder().config(config);

    if !args.quiet && !args.json {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        });
    }

    Ok(builder.build()?)
}

/// Start from the table's full range and narrow it with the CLI bounds.
fn build_filter(args: &Args, table: &PreparedTable) -> Result<DashboardFilter> {
    let defaults = DashboardFilter::full_range(table)?;

    let mut filter =
        DashboardFilter::new().with_date_range(args.from.or(defaults.start), args.to.or(defaults.end));
    if !args.categories.is_empty() {
        filter = filter.with_categories(args.categories.iter().cloned());
    }

    if let (Some(from), Some(to)) = (filter.start, filter.end)
        && from > to
    {
        return Err(anyhow!("--from {} is after --to {}", from, to));
    }

    Ok(filter)
}

/// Print a failed run and stop.
///
/// A missing source file or an empty result halts the dashboard entirely;
/// nothing else is rendered.
fn report_failure(args: &Args, e: PrepError) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(&e)?);
    } else if e.is_terminal() {
        eprintln!("Failed to load data. Please check the data files and path.");
        eprintln!("  [{}] {}", e.error_code(), e);
    }

    error!("Pipeline failed: {}", e);
    Err(anyhow!("Pipeline failed: {}", e))
}

/// Print a human-readable summary of the run and the dashboard.
///
/// This is the default output when `--json` is not specified.
fn print_human_readable_summary(outcome: &PreparationOutcome, view: &DashboardView) {
    let summary = &outcome.summary;

    println!();
    println!("{}", "=".repeat(80));
    println!("OLIST CUSTOMER SATISFACTION & DELIVERY PERFORMANCE");
    println!("{}", "=".repeat(80));
    println!();

    println!("Preparation Summary:");
    println!("  Duration: {}ms", summary.duration_ms);
    println!(
        "  Orders: {} -> {} ({:.1}% dropped)",
        summary.source_rows.orders,
        summary.orders_prepared,
        summary.orders_dropped_percentage()
    );
    println!("  Products without category: {}", summary.products_dropped);
    println!(
        "  Orders without delivery dates: {}",
        summary.orders_dropped_undelivered
    );
    if summary.total_malformed_dates() > 0 {
        println!("  Malformed dates set to null:");
        for (column, count) in &summary.malformed_dates {
            println!("    - {}: {}", column, count);
        }
    }
    for warning in &summary.warnings {
        println!("  WARNING: {}", warning);
    }
    println!();

    if view.is_empty() {
        println!("No data available for the selected filters.");
        return;
    }

    let kpis = &view.kpis;
    println!("Executive KPI Summary:");
    println!("  Total Orders:       {}", kpis.total_orders);
    match kpis.avg_review_score {
        Some(score) => println!("  Avg. Review Score:  {:.2}", score),
        None => println!("  Avg. Review Score:  -"),
    }
    println!(
        "  Late Delivery Rate: {:.2}%",
        kpis.late_delivery_rate * 100.0
    );
    println!("  Total Revenue:      R${:.2}", kpis.total_revenue);
    println!();

    println!("Average Review Score by Delivery Status:");
    for row in &view.score_by_status {
        println!(
            "  {:<15} {:>5.2}  ({} orders)",
            row.delivery_status.as_str(),
            row.avg_review_score,
            row.total_orders
        );
    }
    println!();

    println!("Late Delivery Rate by State:");
    for row in &view.late_rate_by_state {
        println!(
            "  {:<4} {:>7.2}%  ({} of {})",
            row.customer_state,
            row.late_rate * 100.0,
            row.late_orders,
            row.total_orders
        );
    }
    println!();

    println!("Revenue vs. Satisfaction by Product Category:");
    println!(
        "  {:<40} {:>12} {:>8} {:>8}",
        "Category", "Revenue", "Score", "Orders"
    );
    for row in &view.category_performance {
        println!(
            "  {:<40} {:>12.2} {:>8.2} {:>8}",
            truncate_str(&row.product_category_name, 39),
            row.total_revenue,
            row.avg_review_score,
            row.total_orders
        );
    }
    println!();

    println!("Monthly Orders & Late Delivery Trend:");
    for row in &view.monthly_trend {
        println!(
            "  {}  {:>7} orders  {:>7.2}% late",
            row.month,
            row.total_orders,
            row.late_rate * 100.0
        );
    }

    println!();
    println!("{}", "=".repeat(80));
}

/// Truncate a string to max length with ellipsis
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

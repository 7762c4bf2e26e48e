//! Session-scoped access to the prepared order table.
//!
//! ```text
//! ┌──────────────────────────────┐      ┌──────────────────────────────┐
//! │ PreparedDataCache            │      │ PreparedTable                │
//! │  entries: RwLock<HashMap<    │ ───► │  Arc<DataFrame> (immutable)  │
//! │    canonical dir,            │      │  records / purchase_range /  │
//! │    fingerprint + outcome>>   │      │  categories / write_csv      │
//! └──────────────────────────────┘      └──────────────────────────────┘
//! ```
//!
//! The pipeline runs once per data directory. A cached outcome is reused
//! until [`PreparedDataCache::reload`] or [`PreparedDataCache::invalidate`]
//! is called, until the size or modification time of one of the five
//! source files changes, or until a pipeline with different settings asks
//! for the same directory.

use crate::error::{PrepError, Result};
use crate::loader::SourceFile;
use crate::pipeline::{Pipeline, PreparationOutcome};
use crate::schema::*;
use crate::types::{DeliveryStatus, PreparedOrderRecord};
use crate::utils::{column_f64, column_i64, column_millis, column_strings, millis_to_naive};
use chrono::NaiveDateTime;
use parking_lot::RwLock;
use polars::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info};

// ============================================================================
// PREPARED TABLE
// ============================================================================

/// The finished one-row-per-order table.
///
/// Cloning shares the underlying frame.
#[derive(Debug, Clone)]
pub struct PreparedTable {
    df: Arc<DataFrame>,
}

impl PreparedTable {
    /// Wrap a frame, checking that every output column is present.
    pub fn new(df: DataFrame) -> Result<Self> {
        for name in PREPARED_COLUMNS {
            if df.column(name).is_err() {
                return Err(PrepError::ColumnNotFound(name.to_string()));
            }
        }
        Ok(Self { df: Arc::new(df) })
    }

    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    /// Shared handle to the frame for read-only consumers.
    pub fn shared(&self) -> Arc<DataFrame> {
        Arc::clone(&self.df)
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    /// The table as typed rows, in table order.
    ///
    /// # Errors
    ///
    /// [`PrepError::AggregationFailed`] if a value other than the purchase time is null or the
    /// delivery status is unknown. The pipeline leaves `Review Score` null only for an order
    /// none of whose reviews carries a score.
    pub fn records(&self) -> Result<Vec<PreparedOrderRecord>> {
        let df = self.dataframe();
        let order_ids = column_strings(df, ORDER_ID)?;
        let purchased = column_millis(df, PURCHASE_TIMESTAMP)?;
        let scores = column_i64(df, REVIEW_SCORE_LABEL)?;
        let timeliness = column_i64(df, DELIVERY_TIMELINESS)?;
        let statuses = column_strings(df, DELIVERY_STATUS)?;
        let prices = column_f64(df, PRICE)?;
        let freights = column_f64(df, FREIGHT_VALUE)?;
        let categories = column_strings(df, PRODUCT_CATEGORY)?;
        let states = column_strings(df, CUSTOMER_STATE)?;

        let mut records = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let incomplete = || PrepError::AggregationFailed(format!("row {i} has missing values"));

            let delivery_status = statuses[i]
                .as_deref()
                .ok_or_else(incomplete)?
                .parse::<DeliveryStatus>()
                .map_err(|e| PrepError::AggregationFailed(e.to_string()))?;

            records.push(PreparedOrderRecord {
                order_id: order_ids[i].clone().ok_or_else(incomplete)?,
                order_purchase_timestamp: purchased[i].and_then(millis_to_naive),
                review_score: scores[i].ok_or_else(incomplete)?,
                delivery_timeliness: timeliness[i].ok_or_else(incomplete)?,
                delivery_status,
                price: prices[i].ok_or_else(incomplete)?,
                freight_value: freights[i].ok_or_else(incomplete)?,
                product_category_name: categories[i].clone().ok_or_else(incomplete)?,
                customer_state: states[i].clone().ok_or_else(incomplete)?,
            });
        }
        Ok(records)
    }

    /// Earliest and latest purchase timestamps, `None` for an empty table.
    pub fn purchase_range(&self) -> Result<Option<(NaiveDateTime, NaiveDateTime)>> {
        let millis = column_millis(self.dataframe(), PURCHASE_TIMESTAMP)?;
        let min = millis.iter().flatten().min().copied();
        let max = millis.iter().flatten().max().copied();

        Ok(match (min.and_then(millis_to_naive), max.and_then(millis_to_naive)) {
            (Some(min), Some(max)) => Some((min, max)),
            _ => None,
        })
    }

    /// Distinct product categories, sorted.
    pub fn categories(&self) -> Result<Vec<String>> {
        let categories: BTreeSet<String> = column_strings(self.dataframe(), PRODUCT_CATEGORY)?
            .into_iter()
            .flatten()
            .collect();
        Ok(categories.into_iter().collect())
    }

    /// Write the table to a CSV file with a header row.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| PrepError::ExportFailed(format!("{}: {}", parent.display(), e)))?;
        }

        let mut file = File::create(path)
            .map_err(|e| PrepError::ExportFailed(format!("{}: {}", path.display(), e)))?;
        let mut df = self.dataframe().clone();

        CsvWriter::new(&mut file)
            .include_header(true)
            .with_separator(b',')
            .with_quote_char(b'"')
            .finish(&mut df)
            .map_err(|e| PrepError::ExportFailed(format!("{}: {}", path.display(), e)))?;

        info!("Prepared table saved: {}", path.display());
        Ok(())
    }
}

// ============================================================================
// SESSION CACHE
// ============================================================================

/// Size and modification time of each source file, in loading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFingerprint(Vec<(u64, Option<SystemTime>)>);

impl SourceFingerprint {
    /// Fingerprint the five source files in `dir`.
    pub fn of_dir(dir: &Path) -> Result<Self> {
        let mut entries = Vec::with_capacity(SourceFile::ALL.len());
        for source in SourceFile::ALL {
            let path = source.path_in(dir);
            let metadata =
                std::fs::metadata(&path).map_err(|e| PrepError::missing_file(&path, e))?;
            entries.push((metadata.len(), metadata.modified().ok()));
        }
        Ok(Self(entries))
    }
}

/// Identifies one cached preparation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    /// Canonical data directory.
    pub dir: PathBuf,
    pub fingerprint: SourceFingerprint,
    /// [`PipelineConfig::settings_signature`](crate::config::PipelineConfig::settings_signature)
    /// of the pipeline that prepared it.
    pub settings: String,
}

struct CacheEntry {
    fingerprint: SourceFingerprint,
    settings: String,
    outcome: PreparationOutcome,
}

impl CacheEntry {
    fn matches(&self, fingerprint: &SourceFingerprint, settings: &str) -> bool {
        self.fingerprint == *fingerprint && self.settings == settings
    }
}

/// Memoises pipeline outcomes per data directory.
///
/// Each directory holds one outcome. A pipeline whose settings differ from
/// the cached run's prepares the directory again and replaces the entry.
/// Errors are returned to the caller and never cached, so a fixed input
/// directory is picked up by the next call.
///
/// # Example
///
/// ```rust,ignore
/// use olist_prep::{Pipeline, PreparedDataCache};
///
/// let cache = PreparedDataCache::new();
/// let pipeline = Pipeline::builder().build()?;
///
/// let first = cache.get_or_prepare(&pipeline, "olist data")?;  // runs the pipeline
/// let again = cache.get_or_prepare(&pipeline, "olist data")?;  // served from memory
/// ```
#[derive(Default)]
pub struct PreparedDataCache {
    entries: RwLock<HashMap<PathBuf, CacheEntry>>,
}

static_assertions::assert_impl_all!(PreparedDataCache: Send, Sync);
static_assertions::assert_impl_all!(PreparedTable: Send, Sync);

impl PreparedDataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached outcome for `dir`, running the pipeline on a miss,
    /// when the source files changed since the cached run, or when `pipeline`
    /// is configured differently from the cached run.
    pub fn get_or_prepare(
        &self,
        pipeline: &Pipeline,
        dir: impl AsRef<Path>,
    ) -> Result<PreparationOutcome> {
        let key = canonical_dir(dir.as_ref());
        let fingerprint = SourceFingerprint::of_dir(&key)?;
        let settings = pipeline.config().settings_signature();

        {
            let entries = self.entries.read();
            if let Some(entry) = entries.get(&key)
                && entry.matches(&fingerprint, &settings)
            {
                debug!("Serving prepared table for {} from cache", key.display());
                return Ok(entry.outcome.clone());
            }
        }

        let mut entries = self.entries.write();
        if let Some(entry) = entries.get(&key)
            && entry.matches(&fingerprint, &settings)
        {
            return Ok(entry.outcome.clone());
        }

        let outcome = pipeline.run_dir(&key)?;
        entries.insert(
            key,
            CacheEntry {
                fingerprint,
                settings,
                outcome: outcome.clone(),
            },
        );
        Ok(outcome)
    }

    /// Drop any cached outcome for `dir` and prepare it again.
    pub fn reload(&self, pipeline: &Pipeline, dir: impl AsRef<Path>) -> Result<PreparationOutcome> {
        let dir = dir.as_ref();
        self.invalidate(dir);
        info!("Reloading prepared table for {}", dir.display());
        self.get_or_prepare(pipeline, dir)
    }

    /// Forget the cached outcome for `dir`. Returns whether one existed.
    pub fn invalidate(&self, dir: impl AsRef<Path>) -> bool {
        let key = canonical_dir(dir.as_ref());
        self.entries.write().remove(&key).is_some()
    }

    /// Key of the cached outcome for `dir`, if any.
    pub fn cached_key(&self, dir: impl AsRef<Path>) -> Option<CacheKey> {
        let key = canonical_dir(dir.as_ref());
        self.entries.read().get(&key).map(|entry| CacheKey {
            dir: key.clone(),
            fingerprint: entry.fingerprint.clone(),
            settings: entry.settings.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

fn canonical_dir(dir: &Path) -> PathBuf {
    dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn prepared_frame() -> DataFrame {
        let purchased = Series::new(
            PURCHASE_TIMESTAMP.into(),
            [Some(1_525_168_800_000i64), Some(1_522_576_800_000)],
        )
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
        .unwrap();

        let mut df = df![
            ORDER_ID => ["o1", "o2"],
            REVIEW_SCORE_LABEL => [4i64, 1],
            DELIVERY_TIMELINESS => [-2i64, 3],
            DELIVERY_STATUS => ["Late", "On-Time/Early"],
            PRICE => [25.0f64, 99.9],
            FREIGHT_VALUE => [5.0f64, 10.1],
            PRODUCT_CATEGORY => ["pet_shop", "beleza_saude"],
            CUSTOMER_STATE => ["SP", "RJ"],
        ]
        .unwrap();
        df.insert_column(1, purchased).unwrap();
        df
    }

    #[test]
    fn test_prepared_table_requires_columns() {
        let df = prepared_frame().drop(CUSTOMER_STATE).unwrap();
        let err = PreparedTable::new(df).unwrap_err();
        assert!(matches!(err, PrepError::ColumnNotFound(ref c) if c == CUSTOMER_STATE));
    }

    #[test]
    fn test_records() {
        let table = PreparedTable::new(prepared_frame()).unwrap();
        let records = table.records().unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].order_id, "o1");
        assert_eq!(
            records[0].order_purchase_timestamp,
            NaiveDate::from_ymd_opt(2018, 5, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
        );
        assert_eq!(records[0].delivery_status, DeliveryStatus::Late);
        assert_eq!(records[1].review_score, 1);
        assert!((records[1].revenue() - 110.0).abs() < 1e-9);
    }

    #[test]
    fn test_purchase_range_and_categories() {
        let table = PreparedTable::new(prepared_frame()).unwrap();

        let (min, max) = table.purchase_range().unwrap().unwrap();
        assert_eq!(min.date(), NaiveDate::from_ymd_opt(2018, 4, 1).unwrap());
        assert_eq!(max.date(), NaiveDate::from_ymd_opt(2018, 5, 1).unwrap());
        assert_eq!(
            table.categories().unwrap(),
            vec!["beleza_saude".to_string(), "pet_shop".to_string()]
        );
    }

    #[test]
    fn test_empty_table_range() {
        let table = PreparedTable::new(prepared_frame().head(Some(0))).unwrap();
        assert!(table.is_empty());
        assert!(table.purchase_range().unwrap().is_none());
        assert!(table.categories().unwrap().is_empty());
    }

    #[test]
    fn test_write_csv() {
        let table = PreparedTable::new(prepared_frame()).unwrap();
        let path = std::env::temp_dir()
            .join(format!("olist-prep-session-{}", std::process::id()))
            .join("prepared.csv");

        table.write_csv(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let header = content.lines().next().unwrap();
        assert_eq!(header, PREPARED_COLUMNS.join(","));
        assert_eq!(content.lines().count(), 3);

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_fingerprint_missing_dir() {
        let err = SourceFingerprint::of_dir(Path::new("/definitely/not/here")).unwrap_err();
        assert!(err.is_terminal());
    }
}

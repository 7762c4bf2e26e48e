//! Loading of the five Olist CSV extracts.
//!
//! File names are fixed; only the directory varies. Every file is checked
//! for existence before any of them is parsed so a missing extract is
//! reported by path without doing partial work.

use crate::error::{PrepError, Result};
use crate::schema::*;
use crate::types::SourceRowCounts;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// The five source extracts, in loading order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFile {
    Orders,
    Reviews,
    Items,
    Products,
    Customers,
}

impl SourceFile {
    /// All source files in the order they are checked and read.
    pub const ALL: [SourceFile; 5] = [
        Self::Orders,
        Self::Reviews,
        Self::Items,
        Self::Products,
        Self::Customers,
    ];

    /// File name inside the data directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Orders => "olist_orders_dataset.csv",
            Self::Reviews => "olist_order_reviews_dataset.csv",
            Self::Items => "olist_order_items_dataset.csv",
            Self::Products => "olist_products_dataset.csv",
            Self::Customers => "olist_customers_dataset.csv",
        }
    }

    /// Short table name used in logs and summaries.
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Orders => "orders",
            Self::Reviews => "reviews",
            Self::Items => "items",
            Self::Products => "products",
            Self::Customers => "customers",
        }
    }

    /// Columns the pipeline cannot work without.
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            Self::Orders => &[
                ORDER_ID,
                CUSTOMER_ID,
                PURCHASE_TIMESTAMP,
                DELIVERED_CUSTOMER_DATE,
                ESTIMATED_DELIVERY_DATE,
            ],
            Self::Reviews => &[ORDER_ID, REVIEW_SCORE],
            Self::Items => &[ORDER_ID, ORDER_ITEM_ID, PRODUCT_ID, PRICE, FREIGHT_VALUE],
            Self::Products => &[PRODUCT_ID, PRODUCT_CATEGORY],
            Self::Customers => &[CUSTOMER_ID, CUSTOMER_STATE],
        }
    }

    /// Key and text columns read as strings regardless of their content.
    fn string_columns(&self) -> &'static [&'static str] {
        match self {
            Self::Orders => &[
                ORDER_ID,
                CUSTOMER_ID,
                PURCHASE_TIMESTAMP,
                APPROVED_AT,
                DELIVERED_CARRIER_DATE,
                DELIVERED_CUSTOMER_DATE,
                ESTIMATED_DELIVERY_DATE,
            ],
            Self::Reviews => &[ORDER_ID],
            Self::Items => &[ORDER_ID, PRODUCT_ID],
            Self::Products => &[PRODUCT_ID, PRODUCT_CATEGORY],
            Self::Customers => &[CUSTOMER_ID, CUSTOMER_STATE],
        }
    }

    /// Full path of this file inside `dir`.
    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }
}

/// The five raw tables as read from disk.
#[derive(Debug, Clone)]
pub struct SourceTables {
    pub orders: DataFrame,
    pub reviews: DataFrame,
    pub items: DataFrame,
    pub products: DataFrame,
    pub customers: DataFrame,
}

impl SourceTables {
    pub fn row_counts(&self) -> SourceRowCounts {
        SourceRowCounts {
            orders: self.orders.height(),
            reviews: self.reviews.height(),
            items: self.items.height(),
            products: self.products.height(),
            customers: self.customers.height(),
        }
    }
}

/// Reads the source extracts with polars' CSV reader.
#[derive(Debug, Clone)]
pub struct DataLoader {
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self {
            infer_schema_length: 10_000,
        }
    }
}

impl DataLoader {
    pub fn new(infer_schema_length: usize) -> Self {
        Self {
            infer_schema_length: infer_schema_length.max(1),
        }
    }

    /// Load all five tables from `dir`.
    ///
    /// # Errors
    ///
    /// [`PrepError::MissingDataFile`] for the first absent or unreadable file,
    /// [`PrepError::ColumnNotFound`] when a file lacks a required column.
    pub fn load_dir(&self, dir: impl AsRef<Path>) -> Result<SourceTables> {
        let dir = dir.as_ref();
        info!("Loading source tables from {}", dir.display());

        for source in SourceFile::ALL {
            let path = source.path_in(dir);
            if !path.is_file() {
                return Err(PrepError::missing_file(path, "file not found"));
            }
        }

        let tables = SourceTables {
            orders: self.load_file(dir, SourceFile::Orders)?,
            reviews: self.load_file(dir, SourceFile::Reviews)?,
            items: self.load_file(dir, SourceFile::Items)?,
            products: self.load_file(dir, SourceFile::Products)?,
            customers: self.load_file(dir, SourceFile::Customers)?,
        };

        let counts = tables.row_counts();
        info!(
            "Loaded {} orders, {} reviews, {} items, {} products, {} customers",
            counts.orders, counts.reviews, counts.items, counts.products, counts.customers
        );
        Ok(tables)
    }

    /// Read a single source file.
    pub fn load_file(&self, dir: &Path, source: SourceFile) -> Result<DataFrame> {
        let path = source.path_in(dir);
        let header = read_header(&path)?;

        if let Some(missing) = source
            .required_columns()
            .iter()
            .find(|name| !header.iter().any(|h| h == *name))
        {
            return Err(PrepError::ColumnNotFound(format!(
                "{} (in {})",
                missing,
                source.file_name()
            )));
        }

        let overrides = Schema::from_iter(
            source
                .string_columns()
                .iter()
                .copied()
                .filter(|name| header.iter().any(|h| h == name))
                .map(|name| (PlSmallStr::from_static(name), DataType::String)),
        );

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_schema_overwrite(Some(Arc::new(overrides)))
            .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
            .try_into_reader_with_file_path(Some(path.clone()))
            .and_then(|reader| reader.finish())
            .map_err(|e| PrepError::missing_file(&path, e))?;

        debug!(
            "{}: {} rows x {} columns",
            source.table_name(),
            df.height(),
            df.width()
        );
        Ok(df)
    }
}

/// Column names of a CSV file, parsed by the CSV reader without reading rows.
fn read_header(path: &Path) -> Result<Vec<String>> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_n_rows(Some(0))
        .with_infer_schema_length(Some(0))
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|e| PrepError::missing_file(path, e))?;

    Ok(df
        .get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect())
}

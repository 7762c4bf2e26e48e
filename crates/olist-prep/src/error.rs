//! Custom error types for the order preparation pipeline.
//!
//! This module provides the error hierarchy using `thiserror`. Two kinds are
//! terminal for a dashboard session: [`PrepError::MissingDataFile`] (a source
//! extract could not be read) and [`PrepError::EmptyResult`] (every order was
//! filtered out).
//!
//! Errors are serializable so a presentation layer can show a code and a
//! message without matching on the enum.

use serde::Serialize;
use serde::ser::SerializeStruct;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the preparation pipeline.
#[derive(Error, Debug)]
pub enum PrepError {
    /// One of the five source CSV files is absent or unreadable.
    #[error("Missing or unreadable data file '{}': {reason}", path.display())]
    MissingDataFile { path: PathBuf, reason: String },

    /// Every order was removed by the cleaning or merge filters.
    #[error("No orders left after cleaning and merging")]
    EmptyResult,

    /// Column was not found in a table.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Cleaning the raw tables failed.
    #[error("Failed to clean data: {0}")]
    CleaningFailed(String),

    /// Deriving delivery features failed.
    #[error("Failed to derive delivery features: {0}")]
    FeatureDerivationFailed(String),

    /// Joining the cleaned tables failed.
    #[error("Failed to merge tables: {0}")]
    MergeFailed(String),

    /// Collapsing the merged rows to one row per order failed.
    #[error("Failed to aggregate orders: {0}")]
    AggregationFailed(String),

    /// Writing the prepared table failed.
    #[error("Failed to export prepared table: {0}")]
    ExportFailed(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PrepError>,
    },
}

impl PrepError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PrepError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Build a [`PrepError::MissingDataFile`] from a path and any displayable cause.
    pub fn missing_file(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PrepError::MissingDataFile {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Get error code for frontend handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingDataFile { .. } => "MISSING_DATA_FILE",
            Self::EmptyResult => "EMPTY_RESULT",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::CleaningFailed(_) => "CLEANING_FAILED",
            Self::FeatureDerivationFailed(_) => "FEATURE_DERIVATION_FAILED",
            Self::MergeFailed(_) => "MERGE_FAILED",
            Self::AggregationFailed(_) => "AGGREGATION_FAILED",
            Self::ExportFailed(_) => "EXPORT_FAILED",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Whether the session must stop rendering after this error.
    ///
    /// A missing source file and an empty prepared table both mean there is
    /// nothing to show; the caller displays the message and halts.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::MissingDataFile { .. } | Self::EmptyResult => true,
            Self::WithContext { source, .. } => source.is_terminal(),
            _ => false,
        }
    }

    /// Whether this error reports an empty prepared table.
    pub fn is_empty_result(&self) -> bool {
        match self {
            Self::EmptyResult => true,
            Self::WithContext { source, .. } => source.is_empty_result(),
            _ => false,
        }
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for PrepError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PrepError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for preparation operations.
pub type Result<T> = std::result::Result<T, PrepError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PrepError::Polars(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(PrepError::EmptyResult.error_code(), "EMPTY_RESULT");
        assert_eq!(
            PrepError::missing_file("data/olist_orders_dataset.csv", "not found").error_code(),
            "MISSING_DATA_FILE"
        );
    }

    #[test]
    fn test_missing_file_message_names_path() {
        let error = PrepError::missing_file("data/olist_orders_dataset.csv", "No such file");
        let message = error.to_string();
        assert!(message.contains("data/olist_orders_dataset.csv"));
        assert!(message.contains("No such file"));
    }

    #[test]
    fn test_is_terminal() {
        assert!(PrepError::EmptyResult.is_terminal());
        assert!(PrepError::missing_file("x.csv", "gone").is_terminal());
        assert!(!PrepError::MergeFailed("join".to_string()).is_terminal());
    }

    #[test]
    fn test_error_serialization() {
        let error = PrepError::ColumnNotFound("price".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("COLUMN_NOT_FOUND"));
        assert!(json.contains("price"));
    }

    #[test]
    fn test_with_context() {
        let error = PrepError::EmptyResult.with_context("While preparing dashboard data");
        assert!(error.to_string().contains("While preparing dashboard data"));
        assert_eq!(error.error_code(), "EMPTY_RESULT");
        assert!(error.is_terminal());
        assert!(error.is_empty_result());
    }
}

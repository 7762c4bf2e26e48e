//! Configuration types for the order preparation pipeline.
//!
//! This module provides configuration options using the builder pattern.
//! The five source file names are fixed (see [`crate::loader::SourceFile`]);
//! only the directory holding them is configurable.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default directory holding the five Olist extracts.
pub const DEFAULT_DATA_DIR: &str = "olist data";

/// Configuration for the preparation pipeline.
///
/// Use [`PipelineConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use olist_prep::config::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .data_dir("data/olist")
///     .data_loss_warning_threshold(0.3)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory containing the five source CSV files.
    /// Default: "olist data"
    pub data_dir: PathBuf,

    /// Number of rows polars scans to infer numeric column types.
    /// Default: 10000
    pub infer_schema_length: usize,

    /// Share of source orders (0.0 - 1.0) that may be dropped before the
    /// summary carries a data-loss warning.
    /// Default: 0.5
    pub data_loss_warning_threshold: f64,

    /// How many malformed date strings per column are quoted in the log.
    /// Default: 3
    pub malformed_sample_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            infer_schema_length: 10_000,
            data_loss_warning_threshold: 0.5,
            malformed_sample_limit: 3,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Read a configuration from a JSON file; missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config
            .validate()
            .map_err(|e| crate::error::PrepError::InvalidConfig(e.to_string()))?;
        Ok(config)
    }

    /// The settings that shape a prepared table and its summary, leaving out
    /// the data directory. Equal signatures prepare a directory identically.
    pub fn settings_signature(&self) -> String {
        format!(
            "infer_schema_length={};data_loss_warning_threshold={};malformed_sample_limit={}",
            self.infer_schema_length, self.data_loss_warning_threshold, self.malformed_sample_limit
        )
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(0.0..=1.0).contains(&self.data_loss_warning_threshold) {
            return Err(ConfigValidationError::InvalidThreshold {
                field: "data_loss_warning_threshold".to_string(),
                value: self.data_loss_warning_threshold,
            });
        }

        if self.infer_schema_length == 0 {
            return Err(ConfigValidationError::InvalidSchemaLength(
                self.infer_schema_length,
            ));
        }

        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigValidationError::EmptyDataDir);
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid threshold for '{field}': {value} (must be between 0.0 and 1.0)")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Invalid schema inference length: {0} (must be at least 1)")]
    InvalidSchemaLength(usize),

    #[error("Data directory must not be empty")]
    EmptyDataDir,
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    data_dir: Option<PathBuf>,
    infer_schema_length: Option<usize>,
    data_loss_warning_threshold: Option<f64>,
    malformed_sample_limit: Option<usize>,
}

impl PipelineConfigBuilder {
    /// Set the directory holding the source CSV files.
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    /// Set how many rows are scanned for schema inference.
    pub fn infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = Some(rows);
        self
    }

    /// Set the share of dropped orders that triggers a data-loss warning.
    ///
    /// # Arguments
    /// * `threshold` - Value between 0.0 and 1.0 (e.g., 0.5 = 50%)
    pub fn data_loss_warning_threshold(mut self, threshold: f64) -> Self {
        self.data_loss_warning_threshold = Some(threshold);
        self
    }

    /// Set how many malformed date samples are logged per column.
    pub fn malformed_sample_limit(mut self, limit: usize) -> Self {
        self.malformed_sample_limit = Some(limit);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let defaults = PipelineConfig::default();
        let config = PipelineConfig {
            data_dir: self.data_dir.unwrap_or(defaults.data_dir),
            infer_schema_length: self
                .infer_schema_length
                .unwrap_or(defaults.infer_schema_length),
            data_loss_warning_threshold: self
                .data_loss_warning_threshold
                .unwrap_or(defaults.data_loss_warning_threshold),
            malformed_sample_limit: self
                .malformed_sample_limit
                .unwrap_or(defaults.malformed_sample_limit),
        };

        config.validate()?;
        Ok(config)
    }
}

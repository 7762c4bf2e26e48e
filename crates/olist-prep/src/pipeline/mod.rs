//! Pipeline module.
//!
//! This module provides the preparation pipeline and its progress reporting.

mod builder;
pub mod progress;

pub use builder::{Pipeline, PipelineBuilder, PreparationOutcome};
pub use progress::{ClosureProgressReporter, PreparationStage, ProgressReporter, ProgressUpdate};

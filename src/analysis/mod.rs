//! Run-length quality analysis.
//!
//! This module holds the reference model for bit runs in fair random data
//! and a streaming analyzer that compares observed runs against it. These
//! are diagnostics, not a replacement for a statistical test suite.

mod model;
mod runs;
mod threshold;

pub use model::{
    distribution_mean, expected_average_run_count, run_count_distribution, RunLengthEntry,
    RunLengthModel,
};
pub use runs::{AnalyzerError, BlockCallback, QualityReport, RunCountAnalyzer, RunLengthStats};
pub use threshold::{QualityThresholds, ThresholdViolation};

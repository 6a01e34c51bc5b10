//! Sample input and configuration.
//!
//! This module provides the abstraction over external sample feeds and
//! the configuration types for every stage. The feed is treated as a
//! source of raw noisy samples, not as a source of random bits directly.

mod config;
mod source;

pub use config::{
    AnalyzerConfig, ConfigError, ExtractorConfig, FileConfig, OutputConfig, TrngConfig,
    TruncationPolicy,
};
pub use source::{SampleSource, SourceError, SyntheticSource};

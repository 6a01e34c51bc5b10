//! Extraction, analysis and pipeline configuration.
//!
//! Block sizes decide how many samples feed one debiasing pass and how
//! many bits make up one analyzed block. Everything else has safe
//! defaults so that a config file only lists what it changes.

use crate::analysis::QualityThresholds;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for the entropy extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Samples collected before extracting random data.
    pub block_size: usize,
    /// Bytes to extract from each block, 0 for as many as possible.
    pub output_size: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            block_size: 1000,
            output_size: 0,
        }
    }
}

impl ExtractorConfig {
    /// Creates a configuration with the given block and output sizes.
    pub fn new(block_size: usize, output_size: usize) -> Self {
        Self {
            block_size,
            output_size,
        }
    }

    /// Upper bound on bytes a block can yield: two samples per bit.
    pub fn max_yield(&self) -> usize {
        self.block_size / 16
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_size < 2 {
            return Err(ConfigError::InvalidBlockSize(self.block_size));
        }
        Ok(())
    }
}

/// Configuration for the run-count analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Block size in bits.
    pub block_size: usize,
    /// Longest run length to track, clamped to `block_size`.
    pub max_length: usize,
    /// Minimum milliseconds between logged quality tables, 0 to disable.
    pub report_interval_ms: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            block_size: 1000,
            max_length: 100,
            report_interval_ms: 1000,
        }
    }
}

impl AnalyzerConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // A single-bit block always holds one run, leaving nothing to compare.
        if self.block_size < 2 {
            return Err(ConfigError::InvalidBlockSize(self.block_size));
        }
        if self.max_length == 0 {
            return Err(ConfigError::InvalidMaxLength);
        }
        Ok(())
    }
}

/// What the pipeline does with a truncated block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TruncationPolicy {
    /// Stop the stream and report the truncation.
    #[default]
    Stop,
    /// Drop the block and keep the current pool.
    Discard,
}

/// Configuration for the [`Trng`](crate::Trng) pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrngConfig {
    /// Samples per extraction block.
    pub block_size: usize,
    /// 32-bit words to extract per block, 0 for as many as possible.
    pub output_words: usize,
    /// Milliseconds of output to discard after start.
    pub start_delay_ms: u64,
    /// Milliseconds between pool checks while waiting for data.
    pub poll_interval_ms: u64,
    /// Handling of truncated blocks.
    pub on_truncation: TruncationPolicy,
    /// Feed every extracted block through a run-count analyzer.
    pub monitor: bool,
}

impl Default for TrngConfig {
    fn default() -> Self {
        Self {
            block_size: 22050,
            output_words: 0,
            start_delay_ms: 0,
            poll_interval_ms: 10,
            on_truncation: TruncationPolicy::Stop,
            monitor: false,
        }
    }
}

impl TrngConfig {
    /// Extractor settings: the output cap is counted in bytes.
    pub fn extractor(&self) -> ExtractorConfig {
        ExtractorConfig::new(self.block_size, self.output_words * 4)
    }

    /// Delay before output is used.
    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }

    /// Interval between pool checks.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.extractor().validate()?;
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidPollInterval);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid block size {0} (need at least 2)")]
    InvalidBlockSize(usize),
    #[error("max run length must be at least 1")]
    InvalidMaxLength,
    #[error("poll interval must be at least 1 ms")]
    InvalidPollInterval,
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Pipeline settings.
    #[serde(default)]
    pub trng: TrngConfig,
    /// Run-count analyzer settings.
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    /// Quality thresholds applied to analyzer reports.
    #[serde(default)]
    pub thresholds: QualityThresholds,
    /// Command-line output settings.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Output configuration for the command-line tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Run until interrupted (true) or for a fixed number of blocks (false).
    pub continuous: bool,
    /// Number of blocks to process if not continuous.
    pub blocks: u32,
    /// Samples per chunk handed to the pipeline.
    pub chunk_size: usize,
    /// Metrics server port (0 to disable).
    pub metrics_port: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            continuous: false,
            blocks: 20,
            chunk_size: 128,
            metrics_port: 9090,
        }
    }
}

impl FileConfig {
    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.trng.validate()?;
        self.analyzer.validate()
    }
}

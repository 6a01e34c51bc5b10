//! Prometheus metrics exporter for the entropy pipeline.
//!
//! # Metrics Exposed
//!
//! ## Extraction Metrics
//! - `acoustic_entropy_blocks_total` - Sample blocks extracted
//! - `acoustic_entropy_truncated_blocks_total` - Blocks short of the requested size
//! - `acoustic_entropy_silent_chunks_total` - Chunks skipped as silence
//! - `acoustic_entropy_bytes_total` - Bytes delivered to the pool
//!
//! ## Stream Metrics
//! - `acoustic_entropy_pool_words` - Unread words in the pool
//!
//! ## Run-Count Metrics
//! - `acoustic_entropy_analyzer_blocks` - Bit blocks analyzed
//! - `acoustic_entropy_quality_violations_total` - Threshold violations
//! - `acoustic_entropy_run_count_diff_percent{run_length}` - Average count vs expectation
//! - `acoustic_entropy_deviation_diff_percent{run_length}` - Average deviation vs expectation
//!
//! # Example
//!
//! ```no_run
//! use acoustic_entropy::metrics::{MetricsRegistry, MetricsSnapshot};
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//!
//! let snapshot = MetricsSnapshot {
//!     blocks: 12,
//!     bytes: 744,
//!     pool_words: 15,
//!     ..Default::default()
//! };
//!
//! registry.update(&snapshot);
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot, RunLengthSnapshot};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, MetricsState, ServerError};

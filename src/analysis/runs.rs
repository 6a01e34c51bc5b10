//! Streaming bit-run analysis.
//!
//! Counts runs of identical bits per block, accumulates the counts across
//! blocks and compares the running averages against [`RunLengthModel`].
//! Two percentages come out of this per run length: how far the average
//! count is from its expectation (bias), and how far the average absolute
//! deviation is from its expectation (too little deviation is as
//! suspicious as too much).

use super::model::RunLengthModel;
use crate::capture::AnalyzerConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors for malformed analyzer input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalyzerError {
    #[error("bit value must be 0 or 1, got {0}")]
    InvalidBit(u8),
}

/// Observer invoked with the raw histogram of each finished block.
///
/// Index `n` holds the number of runs of length `n`; index 0 is unused.
pub type BlockCallback = Box<dyn FnMut(&[u64]) + Send>;

/// Running statistics for one run length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLengthStats {
    /// Run length these statistics describe.
    pub run_length: usize,
    /// Runs of this length seen over all blocks.
    pub total_run_count: u64,
    /// Average runs per block.
    pub avg_run_count: f64,
    /// Absolute percentage difference of `avg_run_count` from the expected average.
    pub avg_run_count_diff: f64,
    /// Average absolute deviation of the per-block count from the expected average.
    pub avg_deviation: f64,
    /// Absolute percentage difference of `avg_deviation` from the expected deviation.
    pub avg_deviation_diff: f64,
    /// Expected runs per block.
    pub expected_average: f64,
    /// Expected mean absolute deviation per block.
    pub expected_deviation: f64,
}

/// Snapshot of the analyzer after a finished block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Number of blocks analyzed so far.
    pub blocks: u64,
    /// Block size in bits.
    pub block_size: usize,
    /// When the snapshot was taken.
    pub generated_at: DateTime<Utc>,
    /// Per run length statistics, ordered by run length starting at 1.
    pub runs: Vec<RunLengthStats>,
}

impl QualityReport {
    /// Statistics for `run_length`, if tracked.
    pub fn run(&self, run_length: usize) -> Option<&RunLengthStats> {
        run_length
            .checked_sub(1)
            .and_then(|i| self.runs.get(i))
    }

    /// The run length whose average count is furthest from expectation.
    pub fn worst_run_count_diff(&self) -> Option<&RunLengthStats> {
        self.runs
            .iter()
            .max_by(|a, b| a.avg_run_count_diff.total_cmp(&b.avg_run_count_diff))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct RunTotals {
    run_count: u64,
    deviation: f64,
}

/// Online run-length analyzer.
pub struct RunCountAnalyzer {
    block_size: usize,
    max_length: usize,
    model: Arc<RunLengthModel>,
    totals: Vec<RunTotals>,
    histogram: Vec<u64>,
    previous_bit: bool,
    run_length: usize,
    bit_index: usize,
    blocks: u64,
    latest: Option<QualityReport>,
    on_block_done: Option<BlockCallback>,
    report_interval: Option<Duration>,
    last_report: Option<Instant>,
}

impl RunCountAnalyzer {
    /// Creates an analyzer for blocks of `block_size` bits tracking run
    /// lengths up to `max_length` (clamped to the block size).
    pub fn new(block_size: usize, max_length: usize) -> Self {
        let block_size = block_size.max(1);
        let max_length = max_length.clamp(1, block_size);
        Self {
            block_size,
            max_length,
            model: RunLengthModel::cached(block_size, max_length),
            totals: vec![RunTotals::default(); max_length + 1],
            histogram: vec![0; max_length + 1],
            previous_bit: false,
            run_length: 0,
            bit_index: 0,
            blocks: 0,
            latest: None,
            on_block_done: None,
            report_interval: None,
            last_report: None,
        }
    }

    /// Creates an analyzer from configuration, including report throttling.
    pub fn from_config(config: &AnalyzerConfig) -> Self {
        let analyzer = Self::new(config.block_size, config.max_length);
        match config.report_interval_ms {
            0 => analyzer,
            ms => analyzer.with_report_interval(Duration::from_millis(ms)),
        }
    }

    /// Sets the observer called with each finished block's histogram.
    pub fn on_block_done(mut self, callback: impl FnMut(&[u64]) + Send + 'static) -> Self {
        self.on_block_done = Some(Box::new(callback));
        self
    }

    /// Logs the quality table at most once per `interval`.
    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = Some(interval);
        self
    }

    /// Feeds bytes, least significant bit first. Returns the number of
    /// blocks finished.
    pub fn process_bytes(&mut self, bytes: impl AsRef<[u8]>) -> usize {
        bytes
            .as_ref()
            .iter()
            .map(|&byte| self.process_byte(byte))
            .sum()
    }

    /// Feeds one byte, least significant bit first.
    pub fn process_byte(&mut self, byte: u8) -> usize {
        let mut finished = 0;
        for i in 0..8 {
            if self.push_bit((byte >> i) & 1 == 1) {
                finished += 1;
            }
        }
        finished
    }

    /// Feeds a single bit. Returns whether it finished a block.
    pub fn process_bit(&mut self, bit: u8) -> Result<bool, AnalyzerError> {
        match bit {
            0 | 1 => Ok(self.push_bit(bit == 1)),
            other => Err(AnalyzerError::InvalidBit(other)),
        }
    }

    fn push_bit(&mut self, bit: bool) -> bool {
        if self.run_length == 0 {
            self.run_length = 1;
            self.previous_bit = bit;
        } else if bit == self.previous_bit {
            self.run_length += 1;
        } else {
            self.count_run();
            self.run_length = 1;
            self.previous_bit = bit;
        }

        self.bit_index += 1;
        if self.bit_index < self.block_size {
            return false;
        }

        self.count_run();
        self.blocks += 1;
        self.analyze_block();
        if let Some(callback) = self.on_block_done.as_mut() {
            callback(&self.histogram);
        }
        self.reset();
        true
    }

    /// Runs longer than `max_length` are not tracked.
    fn count_run(&mut self) {
        if self.run_length <= self.max_length {
            self.histogram[self.run_length] += 1;
        }
    }

    fn analyze_block(&mut self) {
        let blocks = self.blocks as f64;
        let mut runs = Vec::with_capacity(self.max_length);

        for run_length in 1..=self.max_length {
            let count = self.histogram[run_length];
            let expected = self.model.entries()[run_length];
            let totals = &mut self.totals[run_length];
            totals.run_count += count;
            totals.deviation += (expected.average - count as f64).abs();

            let avg_run_count = totals.run_count as f64 / blocks;
            let avg_deviation = totals.deviation / blocks;
            runs.push(RunLengthStats {
                run_length,
                total_run_count: totals.run_count,
                avg_run_count,
                avg_run_count_diff: percent_diff(expected.average, avg_run_count).abs(),
                avg_deviation,
                avg_deviation_diff: percent_diff(expected.average_deviation, avg_deviation).abs(),
                expected_average: expected.average,
                expected_deviation: expected.average_deviation,
            });
        }

        let report = QualityReport {
            blocks: self.blocks,
            block_size: self.block_size,
            generated_at: Utc::now(),
            runs,
        };
        tracing::trace!(block = self.blocks, "Run-count block analyzed");
        self.maybe_log(&report);
        self.latest = Some(report);
    }

    fn maybe_log(&mut self, report: &QualityReport) {
        let Some(interval) = self.report_interval else {
            return;
        };
        let now = Instant::now();
        if self.last_report.is_some_and(|last| now < last + interval) {
            return;
        }
        self.last_report = Some(now);

        if let Some(worst) = report.worst_run_count_diff() {
            tracing::info!(
                blocks = report.blocks,
                worst_run_length = worst.run_length,
                worst_run_count_diff = format_args!("{:.4}", worst.avg_run_count_diff),
                "Run-count quality"
            );
        }
        for stats in &report.runs {
            tracing::debug!(
                run_length = stats.run_length,
                total_run_count = stats.total_run_count,
                avg_run_count = format_args!("{:.4}", stats.avg_run_count),
                avg_run_count_diff = format_args!("{:.4}", stats.avg_run_count_diff),
                avg_deviation = format_args!("{:.4}", stats.avg_deviation),
                avg_deviation_diff = format_args!("{:.4}", stats.avg_deviation_diff),
            );
        }
    }

    /// Clears the in-progress block. Cumulative statistics are kept.
    pub fn reset(&mut self) {
        self.histogram.iter_mut().for_each(|c| *c = 0);
        self.bit_index = 0;
        self.run_length = 0;
    }

    /// Most recent quality snapshot, `None` before the first block.
    pub fn report(&self) -> Option<&QualityReport> {
        self.latest.as_ref()
    }

    /// Histogram of the block in progress.
    pub fn histogram(&self) -> &[u64] {
        &self.histogram
    }

    /// Blocks finished so far.
    pub fn blocks(&self) -> u64 {
        self.blocks
    }

    /// Bits consumed in the current block.
    pub fn bits_in_block(&self) -> usize {
        self.bit_index
    }

    /// Block size in bits.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Largest tracked run length.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// The reference model in use.
    pub fn model(&self) -> &RunLengthModel {
        &self.model
    }
}

impl std::fmt::Debug for RunCountAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunCountAnalyzer")
            .field("block_size", &self.block_size)
            .field("max_length", &self.max_length)
            .field("blocks", &self.blocks)
            .field("bit_index", &self.bit_index)
            .finish_non_exhaustive()
    }
}

/// Percentage by which `value` differs from `control`.
/// Percentage difference of `value` from `control`. A zero control gives
/// 0 for a zero value and infinity otherwise.
fn percent_diff(control: f64, value: f64) -> f64 {
    if control == 0.0 {
        return if value == 0.0 { 0.0 } else { f64::INFINITY };
    }
    (value / control) * 100.0 - 100.0
}

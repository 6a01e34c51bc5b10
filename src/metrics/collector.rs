//! Metrics collection and registry.

use crate::analysis::QualityReport;
use crate::trng::TrngStats;
use prometheus::{Encoder, GaugeVec, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Run-count deviations for one run length.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunLengthSnapshot {
    /// Run length.
    pub run_length: usize,
    /// Percentage difference of the average run count.
    pub run_count_diff: f64,
    /// Percentage difference of the average deviation.
    pub deviation_diff: f64,
}

/// A snapshot of system state for metrics update.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Blocks extracted.
    pub blocks: u64,
    /// Blocks that came up short.
    pub truncated_blocks: u64,
    /// Silent chunks skipped.
    pub silent_chunks: u64,
    /// Bytes delivered to the pool.
    pub bytes: u64,
    /// Words left in the pool.
    pub pool_words: usize,
    /// Run-count threshold violations.
    pub quality_violations: u64,
    /// Blocks seen by the run-count analyzer.
    pub analyzer_blocks: u64,
    /// Per run length deviations from the latest report.
    pub runs: Vec<RunLengthSnapshot>,
}

/// Prometheus metrics registry for the pipeline.
pub struct MetricsRegistry {
    registry: Registry,

    // Extraction metrics
    blocks_total: IntCounter,
    truncated_total: IntCounter,
    silent_chunks_total: IntCounter,
    bytes_total: IntCounter,

    // Stream metrics
    pool_words: IntGauge,

    // Analyzer metrics
    quality_violations_total: IntCounter,
    analyzer_blocks: IntGauge,
    run_count_diff: GaugeVec,
    deviation_diff: GaugeVec,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all pipeline metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let blocks_total = IntCounter::new(
            "acoustic_entropy_blocks_total",
            "Total sample blocks extracted",
        )?;
        let truncated_total = IntCounter::new(
            "acoustic_entropy_truncated_blocks_total",
            "Blocks that yielded fewer bytes than requested",
        )?;
        let silent_chunks_total = IntCounter::new(
            "acoustic_entropy_silent_chunks_total",
            "Sample chunks skipped as silence",
        )?;
        let bytes_total = IntCounter::new(
            "acoustic_entropy_bytes_total",
            "Random bytes delivered to the pool",
        )?;
        let pool_words = IntGauge::new(
            "acoustic_entropy_pool_words",
            "Unread words in the random pool",
        )?;
        let quality_violations_total = IntCounter::new(
            "acoustic_entropy_quality_violations_total",
            "Run-count threshold violations",
        )?;
        let analyzer_blocks = IntGauge::new(
            "acoustic_entropy_analyzer_blocks",
            "Bit blocks analyzed by the run-count analyzer",
        )?;
        let run_count_diff = GaugeVec::new(
            Opts::new(
                "acoustic_entropy_run_count_diff_percent",
                "Percentage difference of the average run count from expectation",
            ),
            &["run_length"],
        )?;
        let deviation_diff = GaugeVec::new(
            Opts::new(
                "acoustic_entropy_deviation_diff_percent",
                "Percentage difference of the average deviation from expectation",
            ),
            &["run_length"],
        )?;

        registry.register(Box::new(blocks_total.clone()))?;
        registry.register(Box::new(truncated_total.clone()))?;
        registry.register(Box::new(silent_chunks_total.clone()))?;
        registry.register(Box::new(bytes_total.clone()))?;
        registry.register(Box::new(pool_words.clone()))?;
        registry.register(Box::new(quality_violations_total.clone()))?;
        registry.register(Box::new(analyzer_blocks.clone()))?;
        registry.register(Box::new(run_count_diff.clone()))?;
        registry.register(Box::new(deviation_diff.clone()))?;

        Ok(Self {
            registry,
            blocks_total,
            truncated_total,
            silent_chunks_total,
            bytes_total,
            pool_words,
            quality_violations_total,
            analyzer_blocks,
            run_count_diff,
            deviation_diff,
        })
    }

    /// Updates all metrics from a snapshot of system state.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        // Counters only move forward by the difference.
        advance(&self.blocks_total, snapshot.blocks);
        advance(&self.truncated_total, snapshot.truncated_blocks);
        advance(&self.silent_chunks_total, snapshot.silent_chunks);
        advance(&self.bytes_total, snapshot.bytes);
        advance(&self.quality_violations_total, snapshot.quality_violations);

        self.pool_words.set(snapshot.pool_words as i64);
        self.analyzer_blocks.set(snapshot.analyzer_blocks as i64);

        for run in &snapshot.runs {
            let label = run.run_length.to_string();
            self.run_count_diff
                .with_label_values(&[label.as_str()])
                .set(run.run_count_diff);
            self.deviation_diff
                .with_label_values(&[label.as_str()])
                .set(run.deviation_diff);
        }
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn advance(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}

impl MetricsSnapshot {
    /// Creates a snapshot from pipeline state.
    pub fn from_components(
        stats: &TrngStats,
        pool_words: usize,
        report: Option<&QualityReport>,
    ) -> Self {
        let (analyzer_blocks, runs) = report
            .map(|r| {
                let runs = r
                    .runs
                    .iter()
                    .map(|s| RunLengthSnapshot {
                        run_length: s.run_length,
                        run_count_diff: s.avg_run_count_diff,
                        deviation_diff: s.avg_deviation_diff,
                    })
                    .collect();
                (r.blocks, runs)
            })
            .unwrap_or_default();

        Self {
            blocks: stats.blocks,
            truncated_blocks: stats.truncated_blocks,
            silent_chunks: stats.silent_chunks,
            bytes: stats.bytes,
            pool_words,
            quality_violations: stats.quality_violations,
            analyzer_blocks,
            runs,
        }
    }
}

//! Sample-to-random-number pipeline.
//!
//! [`Trng`] owns an [`Extractor`] and the producer side of a
//! [`RandomStream`]. Every complete block replaces the stream's pool, so
//! consumers always draw from the freshest output. Optionally each block
//! is also fed to a [`RunCountAnalyzer`] whose reports are checked against
//! [`QualityThresholds`].

use crate::analysis::{QualityReport, QualityThresholds, RunCountAnalyzer, ThresholdViolation};
use crate::capture::{AnalyzerConfig, ConfigError, FileConfig, TrngConfig, TruncationPolicy};
use crate::extraction::{ExtractedOutput, Extractor, Truncation};
use crate::stream::{PoolFeeder, RandomStream};
use std::time::Instant;
use thiserror::Error;

/// Errors reported by the pipeline.
#[derive(Debug, Error)]
pub enum TrngError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("extraction truncated: {0}")]
    Truncated(#[from] Truncation),
    #[error("trng stopped")]
    Stopped,
}

/// Pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrngStats {
    /// Blocks extracted, complete or not.
    pub blocks: u64,
    /// Blocks that came up short.
    pub truncated_blocks: u64,
    /// Blocks dropped during the start delay.
    pub warmup_blocks: u64,
    /// Silent chunks skipped by the extractor.
    pub silent_chunks: u64,
    /// Bytes delivered to the pool.
    pub bytes: u64,
    /// Run-count threshold violations seen.
    pub quality_violations: u64,
}

struct Monitor {
    analyzer: RunCountAnalyzer,
    thresholds: QualityThresholds,
    last_violation: Option<ThresholdViolation>,
}

/// True random number generator over a push-style sample feed.
pub struct Trng {
    config: TrngConfig,
    extractor: Extractor,
    feeder: PoolFeeder,
    stream: RandomStream,
    monitor: Option<Monitor>,
    started_at: Instant,
    stats: TrngStats,
}

impl Trng {
    /// Creates a pipeline with an OS-seeded shuffle.
    ///
    /// If `config.monitor` is set the monitor uses default analyzer
    /// settings and thresholds; see [`from_file_config`](Self::from_file_config).
    pub fn new(config: TrngConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let extractor = Extractor::new(config.extractor())?;
        Ok(Self::with_extractor(config, extractor))
    }

    /// Creates a pipeline from a full configuration file. When `[trng]`
    /// enables monitoring, the monitor follows `[analyzer]` and
    /// `[thresholds]`.
    pub fn from_file_config(config: &FileConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let extractor = Extractor::new(config.trng.extractor())?;
        Ok(Self::build(
            config.trng.clone(),
            extractor,
            &config.analyzer,
            config.thresholds.clone(),
        ))
    }

    /// Creates a pipeline around an existing extractor.
    ///
    /// The extractor's own configuration wins over `config.block_size` and
    /// `config.output_words`.
    pub fn with_extractor(config: TrngConfig, extractor: Extractor) -> Self {
        Self::build(
            config,
            extractor,
            &AnalyzerConfig::default(),
            QualityThresholds::default(),
        )
    }

    fn build(
        config: TrngConfig,
        extractor: Extractor,
        analyzer: &AnalyzerConfig,
        thresholds: QualityThresholds,
    ) -> Self {
        let (stream, feeder) = RandomStream::with_poll_interval(config.poll_interval());
        let monitor = config.monitor.then(|| Monitor {
            analyzer: RunCountAnalyzer::from_config(analyzer),
            thresholds,
            last_violation: None,
        });
        Self {
            config,
            extractor,
            feeder,
            stream,
            monitor,
            started_at: Instant::now(),
            stats: TrngStats::default(),
        }
    }

    /// Replaces the run-count monitor.
    pub fn with_monitor(mut self, analyzer: RunCountAnalyzer, thresholds: QualityThresholds) -> Self {
        self.monitor = Some(Monitor {
            analyzer,
            thresholds,
            last_violation: None,
        });
        self
    }

    /// (Re)starts the pipeline: clears a stop and restarts the start delay.
    pub fn start(&mut self) {
        tracing::info!(
            block_size = self.extractor.config().block_size,
            output_size = self.extractor.config().output_size,
            "Starting TRNG"
        );
        self.started_at = Instant::now();
        self.extractor.reset();
        self.feeder.resume();
    }

    /// Stops the pipeline; waiting consumers get `Stopped`.
    pub fn stop(&self) {
        if !self.feeder.is_stopped() {
            tracing::info!("Stopping TRNG");
        }
        self.feeder.stop();
    }

    /// Returns true once stopped.
    pub fn is_stopped(&self) -> bool {
        self.feeder.is_stopped()
    }

    /// A consumer handle onto the pool.
    pub fn stream(&self) -> RandomStream {
        self.stream.clone()
    }

    /// Feeds samples. Returns the number of blocks that refreshed the pool.
    pub fn accumulate(&mut self, samples: &[f32]) -> Result<usize, TrngError> {
        if self.is_stopped() {
            return Err(TrngError::Stopped);
        }

        let skipped_before = self.extractor.chunks_skipped();
        let outputs = self.extractor.accumulate(samples);
        self.stats.silent_chunks += self.extractor.chunks_skipped() - skipped_before;

        let mut delivered = 0;
        for output in outputs {
            if self.handle_output(output)? {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    fn handle_output(&mut self, output: ExtractedOutput) -> Result<bool, TrngError> {
        self.stats.blocks += 1;

        if self.started_at.elapsed() < self.config.start_delay() {
            self.stats.warmup_blocks += 1;
            return Ok(false);
        }

        let data = match output.into_result() {
            Ok(data) => data,
            Err((truncation, _partial)) => {
                self.stats.truncated_blocks += 1;
                return match self.config.on_truncation {
                    TruncationPolicy::Stop => {
                        self.stop();
                        Err(TrngError::Truncated(truncation))
                    }
                    TruncationPolicy::Discard => {
                        tracing::warn!(%truncation, "Discarding truncated block");
                        Ok(false)
                    }
                };
            }
        };

        if let Some(monitor) = self.monitor.as_mut() {
            if monitor.analyzer.process_bytes(&data) > 0 {
                monitor.check(&mut self.stats);
            }
        }

        self.stats.bytes += data.len() as u64;
        self.feeder.replace(&data);
        Ok(true)
    }

    /// Pipeline counters.
    pub fn stats(&self) -> TrngStats {
        self.stats
    }

    /// Latest run-count report, if monitoring.
    pub fn report(&self) -> Option<&QualityReport> {
        self.monitor.as_ref().and_then(|m| m.analyzer.report())
    }

    /// Most recent threshold violation, cleared by a passing report.
    pub fn last_violation(&self) -> Option<&ThresholdViolation> {
        self.monitor.as_ref().and_then(|m| m.last_violation.as_ref())
    }

    /// The active configuration.
    pub fn config(&self) -> &TrngConfig {
        &self.config
    }
}

impl Monitor {
    fn check(&mut self, stats: &mut TrngStats) {
        let Some(report) = self.analyzer.report() else {
            return;
        };
        match self.thresholds.check(report) {
            Ok(()) => self.last_violation = None,
            Err(violation) => {
                stats.quality_violations += 1;
                if self.last_violation.is_none() {
                    tracing::warn!(%violation, blocks = report.blocks, "Run-count quality violation");
                }
                self.last_violation = Some(violation);
            }
        }
    }
}

impl std::fmt::Debug for Trng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trng")
            .field("config", &self.config)
            .field("extractor", &self.extractor)
            .field("stats", &self.stats)
            .field("monitoring", &self.monitor.is_some())
            .finish_non_exhaustive()
    }
}

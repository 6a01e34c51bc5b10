//! Random byte extraction from noisy samples.
//!
//! Samples are collected into fixed-size blocks. Each full block is
//! shuffled, so that pairs come from unrelated points in time, and then
//! debiased pairwise by comparing the low noise bits of each sample.

mod block;
mod comparator;
mod output;

pub use block::SampleBlock;
pub use comparator::{compare, debias, noise_bits, BitPacker};
pub use output::{ExtractedOutput, Truncation};

use crate::capture::{ConfigError, ExtractorConfig};
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;

/// Number of leading zero samples that mark a silent chunk.
const SILENCE_PROBE: usize = 3;

/// Extracts debiased bytes from a stream of samples.
///
/// Extraction runs synchronously inside [`accumulate`](Self::accumulate)
/// each time the block fills. The shuffle PRNG only permutes sample
/// positions and does not need to be cryptographic.
pub struct Extractor {
    config: ExtractorConfig,
    block: SampleBlock,
    rng: ChaCha8Rng,
    blocks_extracted: u64,
    chunks_skipped: u64,
}

impl Extractor {
    /// Creates an extractor with a shuffle PRNG seeded from the OS.
    pub fn new(config: ExtractorConfig) -> Result<Self, ConfigError> {
        Self::with_rng(config, ChaCha8Rng::from_entropy())
    }

    /// Creates an extractor with a given shuffle PRNG (for reproducible runs).
    pub fn with_rng(config: ExtractorConfig, rng: ChaCha8Rng) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            block: SampleBlock::new(config.block_size),
            config,
            rng,
            blocks_extracted: 0,
            chunks_skipped: 0,
        })
    }

    /// Adds a chunk of samples, returning one output per block it filled.
    ///
    /// A chunk starting with three exact zeros is taken as a muted input
    /// and ignored entirely.
    pub fn accumulate(&mut self, samples: &[f32]) -> Vec<ExtractedOutput> {
        let mut outputs = Vec::new();
        self.accumulate_with(samples, |output| outputs.push(output));
        outputs
    }

    /// Like [`accumulate`](Self::accumulate), handing each output to `emit`
    /// as soon as its block is processed.
    pub fn accumulate_with(&mut self, samples: &[f32], mut emit: impl FnMut(ExtractedOutput)) {
        if is_silent(samples) {
            self.chunks_skipped += 1;
            tracing::trace!(len = samples.len(), "Skipped silent chunk");
            return;
        }

        let mut rest = samples;
        while !rest.is_empty() {
            let taken = self.block.fill(rest);
            rest = &rest[taken..];
            if self.block.is_full() {
                emit(self.extract_block());
            }
        }
    }

    fn extract_block(&mut self) -> ExtractedOutput {
        self.blocks_extracted += 1;
        let requested = self.config.output_size;
        let limit = if requested > 0 {
            requested
        } else {
            self.config.max_yield()
        };

        let data = match self.block.full_samples_mut() {
            Some(samples) => {
                samples.shuffle(&mut self.rng);
                debias(samples, limit)
            }
            None => Vec::new(),
        };
        self.block.clear();

        let block = self.blocks_extracted;
        if requested == 0 || data.len() == requested {
            tracing::debug!(block, bytes = data.len(), "Extracted block");
            return ExtractedOutput::complete(data, block);
        }

        let truncation = Truncation {
            requested,
            achieved: data.len(),
            block_size: self.config.block_size,
        };
        tracing::warn!(block, %truncation, "Extraction truncated");
        ExtractedOutput::truncated(data, block, truncation)
    }

    /// Discards a partially filled block.
    pub fn reset(&mut self) {
        self.block.clear();
    }

    /// Samples waiting in the current block.
    pub fn pending_samples(&self) -> usize {
        self.block.len()
    }

    /// Blocks processed so far.
    pub fn blocks_extracted(&self) -> u64 {
        self.blocks_extracted
    }

    /// Silent chunks ignored so far.
    pub fn chunks_skipped(&self) -> u64 {
        self.chunks_skipped
    }

    /// The active configuration.
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor")
            .field("config", &self.config)
            .field("block", &self.block)
            .field("blocks_extracted", &self.blocks_extracted)
            .finish_non_exhaustive()
    }
}

fn is_silent(samples: &[f32]) -> bool {
    samples
        .get(..SILENCE_PROBE)
        .is_some_and(|lead| lead.iter().all(|&s| s == 0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{SampleSource, SyntheticSource};
    use proptest::prelude::*;

    fn extractor(block_size: usize, output_size: usize) -> Extractor {
        Extractor::with_rng(
            ExtractorConfig::new(block_size, output_size),
            ChaCha8Rng::seed_from_u64(42),
        )
        .unwrap()
    }

    fn noisy_samples(len: usize, seed: u64) -> Vec<f32> {
        let mut source = SyntheticSource::new(seed);
        source.open().unwrap();
        let mut buf = vec![0.0f32; len];
        source.read(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_zero_block_is_noop() {
        let mut ex = extractor(1000, 0);
        assert!(ex.accumulate(&[0.0; 1000]).is_empty());
        assert_eq!(ex.pending_samples(), 0);
        assert_eq!(ex.blocks_extracted(), 0);
        assert_eq!(ex.chunks_skipped(), 1);
    }

    #[test]
    fn test_block_needs_to_fill() {
        let mut ex = extractor(1000, 0);
        let samples = noisy_samples(1500, 1);

        assert!(ex.accumulate(&samples[..999]).is_empty());
        assert_eq!(ex.pending_samples(), 999);

        let outputs = ex.accumulate(&samples[999..]);
        assert_eq!(outputs.len(), 1);
        assert_eq!(ex.pending_samples(), 500);
    }

    #[test]
    fn test_one_output_per_filled_block() {
        let mut ex = extractor(256, 0);
        let outputs = ex.accumulate(&noisy_samples(256 * 5 + 10, 2));
        assert_eq!(outputs.len(), 5);
        let blocks: Vec<u64> = outputs.iter().map(|o| o.block()).collect();
        assert_eq!(blocks, vec![1, 2, 3, 4, 5]);
        assert!(outputs.iter().all(|o| o.is_complete()));
    }

    #[test]
    fn test_requested_size_complete() {
        let mut ex = extractor(1000, 16);
        let outputs = ex.accumulate(&noisy_samples(1000, 3));
        assert_eq!(outputs.len(), 1);
        assert!(outputs[0].is_complete());
        assert_eq!(outputs[0].len(), 16);
    }

    #[test]
    fn test_oversized_request_truncates() {
        // 1000 samples can never give more than 62 bytes.
        let mut ex = extractor(1000, 100);
        let outputs = ex.accumulate(&noisy_samples(1000, 4));
        let output = &outputs[0];
        assert!(!output.is_complete());
        let truncation = output.truncation().unwrap();
        assert_eq!(truncation.requested, 100);
        assert_eq!(truncation.achieved, output.len());
        assert_eq!(truncation.block_size, 1000);
        assert!(output.len() <= 62);
    }

    #[test]
    fn test_constant_signal_truncates_to_nothing() {
        // Nonzero but constant: every pair ties.
        let mut ex = extractor(64, 2);
        let outputs = ex.accumulate(&[0.25; 64]);
        assert_eq!(outputs[0].truncation().unwrap().achieved, 0);
        assert!(outputs[0].is_empty());
    }

    #[test]
    fn test_silence_check_applies_per_chunk() {
        let mut ex = extractor(8, 0);
        // Too short to check for silence, so it is accepted.
        ex.accumulate(&[0.0, 0.0]);
        assert_eq!(ex.pending_samples(), 2);
        // Zero tail after a noisy head is accepted too.
        ex.accumulate(&[0.5, 0.0, 0.0, 0.0]);
        assert_eq!(ex.pending_samples(), 6);
    }

    #[test]
    fn test_noisy_output_is_roughly_unbiased() {
        let mut ex = extractor(4096, 0);
        let outputs = ex.accumulate(&noisy_samples(4096 * 8, 5));
        let bytes: Vec<u8> = outputs.into_iter().flat_map(|o| o.into_data()).collect();
        assert!(bytes.len() > 1000);
        let ones: u32 = bytes.iter().map(|b| b.count_ones()).sum();
        let bias = ones as f64 / (bytes.len() * 8) as f64 - 0.5;
        assert!(bias.abs() < 0.05);
    }

    proptest! {
        #[test]
        fn prop_uncapped_yield_bounded(block_size in 2usize..600, seed in any::<u64>()) {
            let mut ex = extractor(block_size, 0);
            let outputs = ex.accumulate(&noisy_samples(block_size, seed));
            prop_assert_eq!(outputs.len(), 1);
            prop_assert!(outputs[0].is_complete());
            prop_assert!(outputs[0].len() <= block_size / 16);
        }

        #[test]
        fn prop_capped_output_complete_iff_exact(
            block_size in 2usize..600,
            cap in 1usize..50,
            seed in any::<u64>(),
        ) {
            let mut ex = extractor(block_size, cap);
            let output = ex.accumulate(&noisy_samples(block_size, seed)).remove(0);
            prop_assert!(output.len() <= cap);
            prop_assert_eq!(output.is_complete(), output.len() == cap);
        }
    }
}

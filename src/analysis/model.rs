//! Expected bit-run statistics for blocks of fair coin flips.
//!
//! For every run length the model computes the exact distribution of the
//! number of runs of *exactly* that length in a block, using a Markov
//! chain over (current run length, completed runs). The distribution is
//! reduced to the expected count and the expected mean absolute deviation
//! from that count, which is what the run-count analyzer compares against.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Expected statistics for one run length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunLengthEntry {
    /// Expected number of runs of this length per block.
    pub average: f64,
    /// Expected mean absolute deviation of the per-block count from `average`.
    pub average_deviation: f64,
}

/// Expected average number of runs of exactly `run_length` bits in a block
/// of `block_size` independent fair bits.
pub fn expected_average_run_count(block_size: usize, run_length: usize) -> f64 {
    if run_length == 0 || run_length > block_size {
        return 0.0;
    }
    let n = block_size as f64;
    let k = run_length as f64;
    if run_length == block_size {
        // Only one run fits: all bits equal.
        return (n - (k - 2.0)) / 2f64.powi(run_length as i32);
    }
    (n - (k - 3.0)) / 2f64.powi(run_length as i32 + 1)
}

/// Exact probability distribution of the number of runs of exactly
/// `run_length` bits in a block of `block_size` fair bits.
///
/// Index `i` of the result is the probability of observing `i` such runs.
/// Returns an empty vector when the run cannot occur.
pub fn run_count_distribution(run_length: usize, block_size: usize) -> Vec<f64> {
    if run_length == 0 || block_size == 0 || run_length > block_size {
        return Vec::new();
    }
    let rl = run_length;
    let max_runs = block_size / rl;
    // Rows: run-so-far 1..=rl, plus rl + 1 for "longer than rl".
    // Columns: completed runs + 1, so column 1 means none completed.
    let rows = rl + 2;
    let cols = max_runs + 2;
    let at = |r: usize, j: usize| r * cols + j;

    let mut old = vec![0.0f64; rows * cols];
    let mut cur = vec![0.0f64; rows * cols];
    old[at(1, 1)] = 1.0;

    for _ in 1..block_size {
        for j in 1..=max_runs + 1 {
            // Interrupted runs shorter than rl start over without counting.
            for r in 1..rl {
                cur[at(1, j)] += old[at(r, j)] / 2.0;
                if r > 1 {
                    cur[at(r, j)] = old[at(r - 1, j)] / 2.0;
                }
            }
            if rl > 1 {
                cur[at(rl, j)] = old[at(rl - 1, j)] / 2.0;
            }
            cur[at(1, j)] += old[at(rl + 1, j)] / 2.0;
            if j > 1 {
                // A run of exactly rl was interrupted: it counts.
                cur[at(1, j)] += old[at(rl, j - 1)] / 2.0;
            }
            cur[at(rl + 1, j)] = (old[at(rl, j)] + old[at(rl + 1, j)]) / 2.0;
        }
        std::mem::swap(&mut old, &mut cur);
        cur.iter_mut().for_each(|p| *p = 0.0);
    }

    // Close the in-flight run and marginalize over the run-so-far.
    let mut dist = vec![0.0f64; max_runs + 1];
    for j in 1..=max_runs + 1 {
        let mut p = old[at(rl + 1, j)];
        for r in 1..rl {
            p += old[at(r, j)];
        }
        if j > 1 {
            p += old[at(rl, j - 1)];
        }
        dist[j - 1] = p;
    }
    dist
}

/// Mean of a count distribution as returned by [`run_count_distribution`].
pub fn distribution_mean(dist: &[f64]) -> f64 {
    dist.iter().enumerate().map(|(count, p)| count as f64 * p).sum()
}

/// Reference table of expected run statistics for one configuration.
///
/// Index 0 is an empty entry so that run lengths index directly.
#[derive(Debug, Clone, PartialEq)]
pub struct RunLengthModel {
    block_size: usize,
    entries: Vec<RunLengthEntry>,
}

type ModelCache = Mutex<HashMap<(usize, usize), Arc<RunLengthModel>>>;

fn cache() -> &'static ModelCache {
    static CACHE: OnceLock<ModelCache> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

impl RunLengthModel {
    /// Computes the model for `block_size` bits and run lengths up to
    /// `max_run_length`, which is clamped to `block_size`.
    pub fn new(block_size: usize, max_run_length: usize) -> Self {
        let max_run_length = max_run_length.min(block_size);
        let mut entries = Vec::with_capacity(max_run_length + 1);
        entries.push(RunLengthEntry::default());

        for run_length in 1..=max_run_length {
            let dist = run_count_distribution(run_length, block_size);
            let average = expected_average_run_count(block_size, run_length);
            let average_deviation = dist
                .iter()
                .enumerate()
                .map(|(count, p)| (count as f64 - average).abs() * p)
                .sum();
            entries.push(RunLengthEntry {
                average,
                average_deviation,
            });
        }

        tracing::debug!(block_size, max_run_length, "Computed run-length model");

        Self {
            block_size,
            entries,
        }
    }

    /// Returns the shared model for this configuration, computing it once.
    pub fn cached(block_size: usize, max_run_length: usize) -> Arc<Self> {
        let key = (block_size, max_run_length.min(block_size));
        let mut cache = cache().lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            cache
                .entry(key)
                .or_insert_with(|| Arc::new(Self::new(key.0, key.1))),
        )
    }

    /// Block size in bits.
    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Largest run length covered by the table.
    #[inline]
    pub fn max_run_length(&self) -> usize {
        self.entries.len() - 1
    }

    /// Entry for `run_length`, `None` for 0 or lengths beyond the table.
    pub fn get(&self, run_length: usize) -> Option<&RunLengthEntry> {
        if run_length == 0 {
            return None;
        }
        self.entries.get(run_length)
    }

    /// The full table, index 0 included.
    pub fn entries(&self) -> &[RunLengthEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_runs_in_thousand_bits() {
        assert_eq!(expected_average_run_count(1000, 1), 250.5);
    }

    #[test]
    fn test_full_block_run() {
        // Four equal bits: probability 2/16.
        assert!((expected_average_run_count(4, 4) - 0.125).abs() < 1e-12);
        assert_eq!(expected_average_run_count(4, 5), 0.0);
    }

    #[test]
    fn test_distribution_sums_to_one() {
        for rl in 1..=12 {
            let total: f64 = run_count_distribution(rl, 12).iter().sum();
            assert!((total - 1.0).abs() < 1e-12, "rl={rl} total={total}");
        }
    }

    #[test]
    fn test_distribution_mean_matches_closed_form() {
        for block_size in [1usize, 2, 3, 8, 17, 64] {
            for rl in 1..=block_size {
                let mean = distribution_mean(&run_count_distribution(rl, block_size));
                let expected = expected_average_run_count(block_size, rl);
                assert!(
                    (mean - expected).abs() < 1e-9,
                    "bs={block_size} rl={rl}: {mean} vs {expected}"
                );
            }
        }
    }

    #[test]
    fn test_two_bit_block_exact() {
        // 00, 11 -> one run of 2; 01, 10 -> two runs of 1.
        let ones = run_count_distribution(1, 2);
        assert_eq!(ones, vec![0.5, 0.0, 0.5]);
        let twos = run_count_distribution(2, 2);
        assert_eq!(twos, vec![0.5, 0.5]);
    }

    #[test]
    fn test_model_clamps_max_length() {
        let model = RunLengthModel::new(8, 20);
        assert_eq!(model.max_run_length(), 8);
        assert!(model.get(0).is_none());
        assert!(model.get(9).is_none());
        assert!(model.get(8).is_some());
    }

    #[test]
    fn test_deviation_of_two_bit_block() {
        let model = RunLengthModel::new(2, 2);
        // Runs of 1: count 0 or 2 with mean 1 -> deviation 1.
        let e1 = model.get(1).unwrap();
        assert!((e1.average - 1.0).abs() < 1e-12);
        assert!((e1.average_deviation - 1.0).abs() < 1e-12);
        // Runs of 2: count 0 or 1 with mean 0.5 -> deviation 0.5.
        let e2 = model.get(2).unwrap();
        assert!((e2.average_deviation - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_cached_model_is_shared() {
        let a = RunLengthModel::cached(32, 6);
        let b = RunLengthModel::cached(32, 6);
        assert!(Arc::ptr_eq(&a, &b));
        // Clamped keys collapse onto one entry.
        let c = RunLengthModel::cached(4, 10);
        let d = RunLengthModel::cached(4, 4);
        assert!(Arc::ptr_eq(&c, &d));
    }
}

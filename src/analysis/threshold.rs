//! Quality thresholds for run-count reports.
//!
//! A report fails when the average run count of some length drifts too far
//! from its expectation, or when the average deviation does. The second
//! check also catches output that is "too regular" to be random.

use super::runs::QualityReport;
use serde::{Deserialize, Serialize};

/// Quality thresholds for run-count monitoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    /// Maximum percentage difference of the average run count.
    pub max_run_count_diff: f64,
    /// Maximum percentage difference of the average deviation.
    pub max_deviation_diff: f64,
    /// Blocks required before any check applies.
    pub min_blocks: u64,
    /// Run lengths whose expected total count is below this are skipped.
    pub min_expected_runs: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            max_run_count_diff: 20.0,
            max_deviation_diff: 30.0,
            min_blocks: 100,
            min_expected_runs: 100.0,
        }
    }
}

impl QualityThresholds {
    /// Creates tighter thresholds that need more data.
    pub fn conservative() -> Self {
        Self {
            max_run_count_diff: 10.0,
            max_deviation_diff: 15.0,
            min_blocks: 1000,
            min_expected_runs: 1000.0,
        }
    }

    /// Creates looser thresholds (for testing).
    pub fn permissive() -> Self {
        Self {
            max_run_count_diff: 50.0,
            max_deviation_diff: 60.0,
            min_blocks: 10,
            min_expected_runs: 10.0,
        }
    }

    /// Checks a report against the thresholds.
    pub fn check(&self, report: &QualityReport) -> Result<(), ThresholdViolation> {
        if report.blocks < self.min_blocks {
            return Ok(());
        }
        let blocks = report.blocks as f64;

        for stats in &report.runs {
            if stats.expected_average * blocks < self.min_expected_runs {
                continue;
            }

            if stats.avg_run_count_diff > self.max_run_count_diff {
                return Err(ThresholdViolation::RunCountBias {
                    run_length: stats.run_length,
                    observed: stats.avg_run_count_diff,
                    threshold: self.max_run_count_diff,
                });
            }

            // Without an expected spread there is no deviation to judge.
            if stats.expected_deviation > 0.0
                && stats.avg_deviation_diff > self.max_deviation_diff
            {
                return Err(ThresholdViolation::AbnormalDeviation {
                    run_length: stats.run_length,
                    observed: stats.avg_deviation_diff,
                    threshold: self.max_deviation_diff,
                });
            }
        }

        Ok(())
    }
}

impl QualityReport {
    /// Checks this report against `thresholds`.
    pub fn check(&self, thresholds: &QualityThresholds) -> Result<(), ThresholdViolation> {
        thresholds.check(self)
    }
}

/// Threshold violation types.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ThresholdViolation {
    #[error("runs of length {run_length}: average count off by {observed:.2}% (threshold {threshold:.2}%)")]
    RunCountBias {
        run_length: usize,
        observed: f64,
        threshold: f64,
    },

    #[error("runs of length {run_length}: average deviation off by {observed:.2}% (threshold {threshold:.2}%)")]
    AbnormalDeviation {
        run_length: usize,
        observed: f64,
        threshold: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::RunCountAnalyzer;
    use rand_chacha::ChaCha8Rng;
    use rand_core::{RngCore, SeedableRng};

    fn analyze(bytes: &[u8]) -> QualityReport {
        let mut analyzer = RunCountAnalyzer::new(256, 6);
        analyzer.process_bytes(bytes);
        analyzer.report().cloned().unwrap()
    }

    #[test]
    fn test_pseudo_random_data_passes() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut data = vec![0u8; 32 * 400];
        rng.fill_bytes(&mut data);

        let report = analyze(&data);
        assert_eq!(report.blocks, 400);
        assert!(QualityThresholds::permissive().check(&report).is_ok());
    }

    #[test]
    fn test_alternating_data_fails_run_count() {
        let report = analyze(&vec![0xAAu8; 32 * 20]);
        assert!(matches!(
            QualityThresholds::permissive().check(&report),
            Err(ThresholdViolation::RunCountBias { run_length: 1, .. })
        ));
    }

    #[test]
    fn test_too_perfect_counts_fail_deviation() {
        // 14-bit blocks expect exactly 4 single runs. Hitting 4 every time
        // leaves no deviation at all.
        let block = [0u8, 1, 0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0];
        let mut analyzer = RunCountAnalyzer::new(14, 1);
        for _ in 0..20 {
            for &bit in &block {
                analyzer.process_bit(bit).unwrap();
            }
        }
        let report = analyzer.report().unwrap();
        let singles = report.run(1).unwrap();
        assert_eq!(singles.avg_run_count_diff, 0.0);
        assert_eq!(singles.avg_deviation, 0.0);
        assert!(matches!(
            QualityThresholds::permissive().check(report),
            Err(ThresholdViolation::AbnormalDeviation { run_length: 1, .. })
        ));
    }

    #[test]
    fn test_too_few_blocks_not_checked() {
        let report = analyze(&vec![0xAAu8; 32]);
        assert!(QualityThresholds::default().check(&report).is_ok());
    }

    #[test]
    fn test_zero_expected_deviation_not_judged() {
        let mut report = analyze(&vec![0x5Au8; 32 * 20]);
        for stats in &mut report.runs {
            stats.avg_run_count = stats.expected_average;
            stats.avg_run_count_diff = 0.0;
            stats.expected_deviation = 0.0;
            stats.avg_deviation = 1.0;
            stats.avg_deviation_diff = f64::INFINITY;
        }
        assert!(QualityThresholds::permissive().check(&report).is_ok());

        report.runs[0].expected_deviation = 0.5;
        assert!(matches!(
            QualityThresholds::permissive().check(&report),
            Err(ThresholdViolation::AbnormalDeviation { run_length: 1, .. })
        ));
    }
}

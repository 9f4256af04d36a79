//! Cumulative sums test, forward and reverse.

use randcheck_core::math::normal_cdf;
use randcheck_core::{BitSequence, Iteration, RunConfig, StatisticalTest, TestId};
use serde::Serialize;

pub const MIN_BITS: usize = 100;

/// Maximal excursion of the ±1 random walk, read front to back
/// (partition 0) and back to front (partition 1).
#[derive(Debug, Clone, Default)]
pub struct CumulativeSums;

#[derive(Debug, Clone, Serialize)]
pub struct CumulativeSumsStats {
    pub forward_max: i64,
    pub reverse_max: i64,
}

/// Largest |S_k| over the partial sums of `steps`.
fn max_excursion(steps: impl Iterator<Item = i64>) -> i64 {
    let mut s = 0i64;
    let mut z = 0i64;
    for step in steps {
        s += step;
        z = z.max(s.abs());
    }
    z
}

/// p-value for maximal excursion `z` over `n` steps.
pub fn cusum_p_value(n: usize, z: i64) -> f64 {
    if z == 0 {
        return 1.0;
    }
    let n_i = n as i64;
    let root_n = (n as f64).sqrt();
    let zf = z as f64;
    let term = |a: i64, b: i64| {
        normal_cdf(a as f64 * zf / root_n) - normal_cdf(b as f64 * zf / root_n)
    };

    // Integer division truncates toward zero, matching the reference bounds.
    let mut sum1 = 0.0;
    for k in (-n_i / z + 1) / 4..=(n_i / z - 1) / 4 {
        sum1 += term(4 * k + 1, 4 * k - 1);
    }
    let mut sum2 = 0.0;
    for k in (-n_i / z - 3) / 4..=(n_i / z - 1) / 4 {
        sum2 += term(4 * k + 3, 4 * k + 1);
    }
    1.0 - sum1 + sum2
}

impl StatisticalTest for CumulativeSums {
    type Stats = CumulativeSumsStats;
    const ID: TestId = TestId::CumulativeSums;

    fn configure(cfg: &RunConfig) -> Result<Self, String> {
        if cfg.sequence_length < MIN_BITS {
            return Err(format!(
                "n = {} is below the minimum of {MIN_BITS}",
                cfg.sequence_length
            ));
        }
        Ok(Self)
    }

    fn partitions(&self) -> usize {
        2
    }

    fn iterate(&self, bits: &BitSequence) -> Iteration<CumulativeSumsStats> {
        let n = bits.len();
        let forward_max = max_excursion(bits.steps());
        let reverse_max = max_excursion(bits.as_slice().iter().rev().map(|&b| 2 * b as i64 - 1));
        Iteration::Applicable {
            stats: CumulativeSumsStats {
                forward_max,
                reverse_max,
            },
            p_values: vec![cusum_p_value(n, forward_max), cusum_p_value(n, reverse_max)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::testing::{PI_100, close, parse};

    #[test]
    fn test_reference_example() {
        // SP 800-22 section 2.13.8.
        match CumulativeSums.iterate(&parse(PI_100)) {
            Iteration::Applicable { stats, p_values } => {
                assert_eq!(stats.forward_max, 16);
                assert_eq!(stats.reverse_max, 19);
                assert!(close(p_values[0], 0.219194));
                assert!(close(p_values[1], 0.114866));
            }
            Iteration::Inapplicable { .. } => panic!("cusum is always applicable"),
        }
    }

    #[test]
    fn test_small_worked_example() {
        // Section 2.13.4: 1011010111, z = 4.
        assert!(close(cusum_p_value(10, 4), 0.411659));
    }

    #[test]
    fn test_constant_sequence_fails() {
        match CumulativeSums.iterate(&BitSequence::new(1000)) {
            Iteration::Applicable { p_values, .. } => {
                assert!(p_values.iter().all(|&p| p < 1e-6));
            }
            Iteration::Inapplicable { .. } => panic!(),
        }
    }

    #[test]
    fn test_two_partitions() {
        assert_eq!(CumulativeSums.partitions(), 2);
    }
}

//! Frequency (monobit) test.

use randcheck_core::math::erfc;
use randcheck_core::{BitSequence, Iteration, RunConfig, StatisticalTest, TestId};
use serde::Serialize;

pub const MIN_BITS: usize = 100;

/// Proportion of ones versus zeros over the whole sequence.
#[derive(Debug, Clone, Default)]
pub struct Frequency;

#[derive(Debug, Clone, Serialize)]
pub struct FrequencyStats {
    /// Sum of the +/-1 steps.
    pub sum: i64,
    pub s_obs: f64,
}

impl StatisticalTest for Frequency {
    type Stats = FrequencyStats;
    const ID: TestId = TestId::Frequency;

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
        1
    }

    fn iterate(&self, bits: &BitSequence) -> Iteration<FrequencyStats> {
        let n = bits.len() as f64;
        let sum: i64 = bits.steps().sum();
        let s_obs = (sum as f64).abs() / n.sqrt();
        let p = erfc(s_obs / std::f64::consts::SQRT_2);
        Iteration::Applicable {
            stats: FrequencyStats { sum, s_obs },
            p_values: vec![p],
        }
    }
}

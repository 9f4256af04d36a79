//! Runs test: total number of uninterrupted runs of identical bits.

use randcheck_core::math::erfc;
use randcheck_core::{BitSequence, Iteration, RunConfig, StatisticalTest, TestId};
use serde::Serialize;

pub const MIN_BITS: usize = 100;

#[derive(Debug, Clone, Default)]
pub struct Runs;

#[derive(Debug, Clone, Serialize)]
pub struct RunsStats {
    /// Proportion of ones.
    pub pi: f64,
    pub runs: usize,
    /// The frequency pre-test failed, so the run count was not tested.
    pub prerequisite_failed: bool,
}

impl StatisticalTest for Runs {
    type Stats = RunsStats;
    const ID: TestId = TestId::Runs;

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

    fn iterate(&self, bits: &BitSequence) -> Iteration<RunsStats> {
        let n = bits.len() as f64;
        let pi = bits.ones() as f64 / n;
        let runs = 1 + bits
            .as_slice()
            .windows(2)
            .filter(|w| w[0] != w[1])
            .count();

        // A sequence that fails the frequency pre-test is a genuine failure,
        // not an inapplicable one.
        if (pi - 0.5).abs() >= 2.0 / n.sqrt() {
            return Iteration::Applicable {
                stats: RunsStats {
                    pi,
                    runs,
                    prerequisite_failed: true,
                },
                p_values: vec![0.0],
            };
        }
        let spread = pi * (1.0 - pi);
        let p = erfc((runs as f64 - 2.0 * n * spread).abs() / (2.0 * (2.0 * n).sqrt() * spread));
        Iteration::Applicable {
            stats: RunsStats {
                pi,
                runs,
                prerequisite_failed: false,
            },
            p_values: vec![p],
        }
    }
}

//! Binary matrix rank test over disjoint 32x32 matrices.

use randcheck_core::{BitSequence, Iteration, RunConfig, StatisticalTest, TestId};
use serde::Serialize;

use crate::common::gf2_rank;

pub const ROWS: usize = 32;
pub const COLS: usize = 32;
/// At least 38 matrices are required.
pub const MIN_MATRICES: usize = 38;

/// Probability that a random `ROWS x COLS` matrix over GF(2) has rank `r`.
fn rank_probability(r: usize) -> f64 {
    let (m, q) = (ROWS as i32, COLS as i32);
    let r = r as i32;
    let mut product = 1.0;
    for i in 0..r {
        product *= (1.0 - 2f64.powi(i - q)) * (1.0 - 2f64.powi(i - m)) / (1.0 - 2f64.powi(i - r));
    }
    2f64.powi(r * (q + m - r) - m * q) * product
}

#[derive(Debug, Clone)]
pub struct Rank {
    /// Expected proportions for full rank, full rank - 1, and the rest.
    p_full: f64,
    p_minus_one: f64,
    p_rest: f64,
}

impl Default for Rank {
    fn default() -> Self {
        let p_full = rank_probability(ROWS);
        let p_minus_one = rank_probability(ROWS - 1);
        Self {
            p_full,
            p_minus_one,
            p_rest: 1.0 - p_full - p_minus_one,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RankStats {
    pub matrices: usize,
    pub full_rank: usize,
    pub full_rank_minus_one: usize,
    pub chi_squared: f64,
    pub discarded: usize,
}

impl StatisticalTest for Rank {
    type Stats = RankStats;
    const ID: TestId = TestId::Rank;

    fn configure(cfg: &RunConfig) -> Result<Self, String> {
        let needed = MIN_MATRICES * ROWS * COLS;
        if cfg.sequence_length < needed {
            return Err(format!(
                "n = {} is below {needed} ({MIN_MATRICES} matrices)",
                cfg.sequence_length
            ));
        }
        Ok(Self::default())
    }

    fn partitions(&self) -> usize {
        1
    }

    fn iterate(&self, bits: &BitSequence) -> Iteration<RankStats> {
        let size = ROWS * COLS;
        let mut full_rank = 0;
        let mut full_rank_minus_one = 0;
        for matrix in bits.as_slice().chunks_exact(size) {
            match gf2_rank(matrix, ROWS, COLS) {
                r if r == ROWS => full_rank += 1,
                r if r == ROWS - 1 => full_rank_minus_one += 1,
                _ => {}
            }
        }
        let matrices = bits.len() / size;
        let nf = matrices as f64;
        let rest = matrices - full_rank - full_rank_minus_one;
        let chi_squared = (full_rank as f64 - nf * self.p_full).powi(2) / (nf * self.p_full)
            + (full_rank_minus_one as f64 - nf * self.p_minus_one).powi(2) / (nf * self.p_minus_one)
            + (rest as f64 - nf * self.p_rest).powi(2) / (nf * self.p_rest);
        // Chi-square with two degrees of freedom.
        let p = (-chi_squared / 2.0).exp();
        Iteration::Applicable {
            stats: RankStats {
                matrices,
                full_rank,
                full_rank_minus_one,
                chi_squared,
                discarded: bits.len() % size,
            },
            p_values: vec![p],
        }
    }
}

//! Longest run of ones within M-bit blocks.

use randcheck_core::math::igamc;
use randcheck_core::{BitSequence, Iteration, RunConfig, StatisticalTest, TestId};
use serde::Serialize;

pub const MIN_BITS: usize = 128;

/// Block length, category bounds and class probabilities for one size band.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Table {
    block_len: usize,
    /// Runs at or below `min_run` share the first class.
    min_run: usize,
    pi: &'static [f64],
}

const SMALL: Table = Table {
    block_len: 8,
    min_run: 1,
    pi: &[0.21484375, 0.3671875, 0.23046875, 0.1875],
};

const MEDIUM: Table = Table {
    block_len: 128,
    min_run: 4,
    pi: &[
        0.1174035788,
        0.242955959,
        0.249363483,
        0.17517706,
        0.102701071,
        0.112398847,
    ],
};

const LARGE: Table = Table {
    block_len: 10_000,
    min_run: 10,
    pi: &[0.0882, 0.2092, 0.2483, 0.1933, 0.1208, 0.0675, 0.0727],
};

fn table_for(n: usize) -> Table {
    if n < 6272 {
        SMALL
    } else if n < 750_000 {
        MEDIUM
    } else {
        LARGE
    }
}

#[derive(Debug, Clone)]
pub struct LongestRun {
    table: Table,
}

#[derive(Debug, Clone, Serialize)]
pub struct LongestRunStats {
    pub block_len: usize,
    pub blocks: usize,
    /// Blocks per longest-run class.
    pub nu: Vec<usize>,
    pub chi_squared: f64,
}

impl LongestRun {
    /// Table chosen by the sequence length.
    pub fn for_length(n: usize) -> Self {
        Self {
            table: table_for(n),
        }
    }
}

fn longest_run(block: &[u8]) -> usize {
    let mut run = 0;
    let mut best = 0;
    for &b in block {
        if b == 1 {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }
    best
}

impl StatisticalTest for LongestRun {
    type Stats = LongestRunStats;
    const ID: TestId = TestId::LongestRun;

    fn configure(cfg: &RunConfig) -> Result<Self, String> {
        if cfg.sequence_length < MIN_BITS {
            return Err(format!(
                "n = {} is below the minimum of {MIN_BITS}",
                cfg.sequence_length
            ));
        }
        Ok(Self::for_length(cfg.sequence_length))
    }

    fn partitions(&self) -> usize {
        1
    }

    fn iterate(&self, bits: &BitSequence) -> Iteration<LongestRunStats> {
        let t = self.table;
        let k = t.pi.len() - 1;
        let mut nu = vec![0usize; t.pi.len()];
        for block in bits.as_slice().chunks_exact(t.block_len) {
            let run = longest_run(block);
            let class = run.saturating_sub(t.min_run).min(k);
            nu[class] += 1;
        }
        let blocks = bits.len() / t.block_len;
        let nf = blocks as f64;
        let chi_squared: f64 = nu
            .iter()
            .zip(t.pi)
            .map(|(&v, &pi)| {
                let expected = nf * pi;
                (v as f64 - expected).powi(2) / expected
            })
            .sum();
        let p = igamc(k as f64 / 2.0, chi_squared / 2.0);
        Iteration::Applicable {
            stats: LongestRunStats {
                block_len: t.block_len,
                blocks,
                nu,
                chi_squared,
            },
            p_values: vec![p],
        }
    }
}

//! Linear complexity test: LFSR length of each M-bit block via
//! Berlekamp-Massey.

use randcheck_core::math::igamc;
use randcheck_core::{BitSequence, Iteration, RunConfig, StatisticalTest, TestId};
use serde::Serialize;

use crate::common::berlekamp_massey;

pub const MIN_BLOCK: usize = 500;
pub const MAX_BLOCK: usize = 5000;
/// Fewer blocks than this still runs, with a warning.
pub const RECOMMENDED_BLOCKS: usize = 200;

const PI: [f64; 7] = [0.01047, 0.03125, 0.125, 0.5, 0.25, 0.0625, 0.020833];

#[derive(Debug, Clone)]
pub struct LinearComplexity {
    block_len: usize,
    /// Theoretical mean complexity of an M-bit block.
    mean: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinearComplexityStats {
    pub blocks: usize,
    pub nu: [usize; 7],
    pub chi_squared: f64,
    pub discarded: usize,
}

impl LinearComplexity {
    pub fn new(block_len: usize) -> Self {
        let m = block_len as f64;
        let sign = if block_len % 2 == 0 { -1.0 } else { 1.0 };
        let mean = m / 2.0 + (9.0 + sign) / 36.0 - (m / 3.0 + 2.0 / 9.0) / 2f64.powf(m);
        Self { block_len, mean }
    }

    fn class(t: f64) -> usize {
        match t {
            t if t <= -2.5 => 0,
            t if t <= -1.5 => 1,
            t if t <= -0.5 => 2,
            t if t <= 0.5 => 3,
            t if t <= 1.5 => 4,
            t if t <= 2.5 => 5,
            _ => 6,
        }
    }
}

impl StatisticalTest for LinearComplexity {
    type Stats = LinearComplexityStats;
    const ID: TestId = TestId::LinearComplexity;

    fn configure(cfg: &RunConfig) -> Result<Self, String> {
        let m = cfg.params.linear_complexity;
        let n = cfg.sequence_length;
        if !(MIN_BLOCK..=MAX_BLOCK).contains(&m) {
            return Err(format!("block length {m} not in {MIN_BLOCK}..={MAX_BLOCK}"));
        }
        let blocks = n / m;
        if blocks == 0 {
            return Err(format!("n = {n} is shorter than one {m}-bit block"));
        }
        if blocks < RECOMMENDED_BLOCKS {
            log::warn!(
                "linear complexity: only {blocks} blocks, at least {RECOMMENDED_BLOCKS} recommended"
            );
        }
        Ok(Self::new(m))
    }

    fn partitions(&self) -> usize {
        1
    }

    fn iterate(&self, bits: &BitSequence) -> Iteration<LinearComplexityStats> {
        let m = self.block_len;
        let parity = if m % 2 == 0 { 1.0 } else { -1.0 };
        let mut nu = [0usize; 7];
        for block in bits.as_slice().chunks_exact(m) {
            let l = berlekamp_massey(block) as f64;
            let t = parity * (l - self.mean) + 2.0 / 9.0;
            nu[Self::class(t)] += 1;
        }
        let blocks = bits.len() / m;
        let nf = blocks as f64;
        let chi_squared: f64 = nu
            .iter()
            .zip(PI)
            .map(|(&v, p)| (v as f64 - nf * p).powi(2) / (nf * p))
            .sum();
        let p = igamc(3.0, chi_squared / 2.0);
        Iteration::Applicable {
            stats: LinearComplexityStats {
                blocks,
                nu,
                chi_squared,
                discarded: bits.len() % m,
            },
            p_values: vec![p],
        }
    }
}

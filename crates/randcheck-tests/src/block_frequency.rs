//! Frequency within fixed-length blocks.

use randcheck_core::math::igamc;
use randcheck_core::{BitSequence, Iteration, RunConfig, StatisticalTest, TestId};
use serde::Serialize;

pub const MIN_BITS: usize = 100;
pub const MIN_BLOCK: usize = 20;

/// Splits the sequence into `n / M` blocks of `M` bits and tests each
/// block's ones proportion against 1/2. Trailing bits are discarded.
#[derive(Debug, Clone)]
pub struct BlockFrequency {
    block_len: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockFrequencyStats {
    pub blocks: usize,
    pub chi_squared: f64,
    pub discarded: usize,
}

impl BlockFrequency {
    pub fn new(block_len: usize) -> Self {
        Self { block_len }
    }
}

impl StatisticalTest for BlockFrequency {
    type Stats = BlockFrequencyStats;
    const ID: TestId = TestId::BlockFrequency;

    fn configure(cfg: &RunConfig) -> Result<Self, String> {
        let n = cfg.sequence_length;
        let m = cfg.params.block_frequency;
        if n < MIN_BITS {
            return Err(format!("n = {n} is below the minimum of {MIN_BITS}"));
        }
        if m < MIN_BLOCK || m > n {
            return Err(format!("block length {m} not in {MIN_BLOCK}..={n}"));
        }
        if n / m >= 100 {
            log::debug!("block frequency: {} blocks, at most 99 recommended", n / m);
        }
        Ok(Self::new(m))
    }

    fn partitions(&self) -> usize {
        1
    }

    fn iterate(&self, bits: &BitSequence) -> Iteration<BlockFrequencyStats> {
        let m = self.block_len;
        let blocks = bits.len() / m;
        let chi_squared = 4.0
            * m as f64
            * bits
                .as_slice()
                .chunks_exact(m)
                .map(|block| {
                    let pi = block.iter().map(|&b| b as usize).sum::<usize>() as f64 / m as f64;
                    (pi - 0.5) * (pi - 0.5)
                })
                .sum::<f64>();
        let p = igamc(blocks as f64 / 2.0, chi_squared / 2.0);
        Iteration::Applicable {
            stats: BlockFrequencyStats {
                blocks,
                chi_squared,
                discarded: bits.len() % m,
            },
            p_values: vec![p],
        }
    }
}

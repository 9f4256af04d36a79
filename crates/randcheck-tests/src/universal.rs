//! Maurer's "universal statistical" test.

use randcheck_core::math::erfc;
use randcheck_core::{BitSequence, Iteration, RunConfig, StatisticalTest, TestId};
use serde::Serialize;

/// Smallest `n` for which L = 6.
pub const MIN_BITS: usize = 387_840;

/// Lower `n` bound for each block length L = 6..=16.
const L_THRESHOLDS: [usize; 11] = [
    387_840,
    904_960,
    2_068_480,
    4_654_080,
    10_342_400,
    22_753_280,
    49_643_520,
    107_560_960,
    231_669_760,
    496_435_200,
    1_059_061_760,
];

const EXPECTED: [f64; 11] = [
    5.2177052, 6.1962507, 7.1836656, 8.1764248, 9.1723243, 10.170032, 11.168765, 12.168070,
    13.167693, 14.167488, 15.167379,
];

const VARIANCE: [f64; 11] = [
    2.954, 3.125, 3.238, 3.311, 3.356, 3.384, 3.401, 3.410, 3.416, 3.419, 3.421,
];

#[derive(Debug, Clone)]
pub struct Universal {
    /// Block length L.
    l: usize,
    /// Initialization blocks Q = 10 * 2^L.
    q: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct UniversalStats {
    pub l: usize,
    pub q: usize,
    pub k: usize,
    pub phi: f64,
    pub sigma: f64,
    pub discarded: usize,
}

impl Universal {
    /// Block length for `n` bits, if `n` is long enough.
    pub fn block_len(n: usize) -> Option<usize> {
        L_THRESHOLDS.iter().rposition(|&t| n >= t).map(|i| i + 6)
    }

    pub fn new(l: usize) -> Self {
        Self { l, q: 10 << l }
    }
}

impl StatisticalTest for Universal {
    type Stats = UniversalStats;
    const ID: TestId = TestId::Universal;

    fn configure(cfg: &RunConfig) -> Result<Self, String> {
        let n = cfg.sequence_length;
        let l = Self::block_len(n)
            .ok_or_else(|| format!("n = {n} is below the minimum of {MIN_BITS}"))?;
        let test = Self::new(l);
        if n / l <= test.q {
            return Err(format!("n = {n} leaves no test blocks for L = {l}"));
        }
        Ok(test)
    }

    fn partitions(&self) -> usize {
        1
    }

    fn iterate(&self, bits: &BitSequence) -> Iteration<UniversalStats> {
        let (l, q) = (self.l, self.q);
        let blocks = bits.len() / l;
        let k = blocks.saturating_sub(q);
        let mut last_seen = vec![0usize; 1 << l];
        let mut sum = 0.0;
        for (i, block) in bits.as_slice().chunks_exact(l).enumerate().take(q + k) {
            let pattern = block.iter().fold(0usize, |acc, &b| (acc << 1) | b as usize);
            let index = i + 1;
            if index > q {
                sum += ((index - last_seen[pattern]) as f64).log2();
            }
            last_seen[pattern] = index;
        }
        let kf = k as f64;
        let lf = l as f64;
        let phi = sum / kf;
        let c = 0.7 - 0.8 / lf + (4.0 + 32.0 / lf) * kf.powf(-3.0 / lf) / 15.0;
        let sigma = c * (VARIANCE[l - 6] / kf).sqrt();
        let p = erfc((phi - EXPECTED[l - 6]).abs() / (std::f64::consts::SQRT_2 * sigma));
        Iteration::Applicable {
            stats: UniversalStats {
                l,
                q,
                k,
                phi,
                sigma,
                discarded: bits.len() % l,
            },
            p_values: vec![p],
        }
    }
}

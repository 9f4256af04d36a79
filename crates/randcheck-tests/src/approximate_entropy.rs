//! Approximate entropy test.

use randcheck_core::math::igamc;
use randcheck_core::{BitSequence, Iteration, RunConfig, StatisticalTest, TestId};
use serde::Serialize;

use crate::common::pattern_counts;

/// Longest supported m + 1.
pub const MAX_PATTERN: usize = 24;

/// Compares the frequency of overlapping m-bit and (m+1)-bit patterns.
#[derive(Debug, Clone)]
pub struct ApproximateEntropy {
    m: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApproximateEntropyStats {
    pub phi_m: f64,
    pub phi_m1: f64,
    pub apen: f64,
    pub chi_squared: f64,
}

impl ApproximateEntropy {
    pub fn new(m: usize) -> Self {
        Self { m }
    }
}

/// Sum over patterns of c * ln(c), with c the pattern frequency.
fn phi(bits: &[u8], m: usize) -> f64 {
    if m == 0 {
        return 0.0;
    }
    let n = bits.len() as f64;
    pattern_counts(bits, m)
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / n;
            p * p.ln()
        })
        .sum()
}

impl StatisticalTest for ApproximateEntropy {
    type Stats = ApproximateEntropyStats;
    const ID: TestId = TestId::ApproximateEntropy;

    fn configure(cfg: &RunConfig) -> Result<Self, String> {
        let m = cfg.params.approximate_entropy;
        let n = cfg.sequence_length;
        if m == 0 || m + 1 > MAX_PATTERN {
            return Err(format!("block length {m} not in 1..={}", MAX_PATTERN - 1));
        }
        let log2n = n.max(1).ilog2() as usize;
        if log2n < 5 || m >= log2n - 5 {
            return Err(format!(
                "block length {m} too large for n = {n} (must be below {})",
                log2n.saturating_sub(5)
            ));
        }
        Ok(Self::new(m))
    }

    fn partitions(&self) -> usize {
        1
    }

    fn iterate(&self, bits: &BitSequence) -> Iteration<ApproximateEntropyStats> {
        let n = bits.len() as f64;
        let phi_m = phi(bits.as_slice(), self.m);
        let phi_m1 = phi(bits.as_slice(), self.m + 1);
        let apen = phi_m - phi_m1;
        let chi_squared = 2.0 * n * (std::f64::consts::LN_2 - apen);
        let p = igamc(2f64.powi(self.m as i32 - 1), chi_squared / 2.0);
        Iteration::Applicable {
            stats: ApproximateEntropyStats {
                phi_m,
                phi_m1,
                apen,
                chi_squared,
            },
            p_values: vec![p],
        }
    }
}

//! Overlapping template matching test for the all-ones template.

use randcheck_core::math::{igamc, ln_gamma};
use randcheck_core::{BitSequence, Iteration, RunConfig, StatisticalTest, TestId};
use serde::Serialize;

pub const BLOCK_LEN: usize = 1032;
/// Match counts at or above `K` share the last class.
pub const K: usize = 5;
pub const MIN_TEMPLATE: usize = 2;
pub const MAX_TEMPLATE: usize = 21;

/// Exact class probabilities for m = 9 over 1032-bit blocks (Hamano and
/// Kaneko). Other template lengths use the series approximation.
pub const PI_M9: [f64; K + 1] = [0.364091, 0.185659, 0.139381, 0.100571, 0.0704323, 0.139865];

#[derive(Debug, Clone)]
pub struct OverlappingTemplate {
    m: usize,
    pi: [f64; K + 1],
}

#[derive(Debug, Clone, Serialize)]
pub struct OverlappingStats {
    pub blocks: usize,
    pub nu: [usize; K + 1],
    pub chi_squared: f64,
}

/// Probability of exactly `u` overlapping matches in a block, with
/// `eta = lambda / 2`.
fn match_probability(u: usize, eta: f64) -> f64 {
    if u == 0 {
        return (-eta).exp();
    }
    let uf = u as f64;
    (1..=u)
        .map(|l| {
            let lf = l as f64;
            (-eta - uf * std::f64::consts::LN_2 + lf * eta.ln() - ln_gamma(lf + 1.0)
                + ln_gamma(uf)
                - ln_gamma(lf)
                - ln_gamma(uf - lf + 1.0))
            .exp()
        })
        .sum()
}

impl OverlappingTemplate {
    pub fn new(m: usize) -> Self {
        if m == 9 {
            return Self { m, pi: PI_M9 };
        }
        let lambda = (BLOCK_LEN - m + 1) as f64 / 2f64.powi(m as i32);
        let eta = lambda / 2.0;
        let mut pi = [0.0; K + 1];
        for (u, slot) in pi.iter_mut().take(K).enumerate() {
            *slot = match_probability(u, eta);
        }
        pi[K] = 1.0 - pi[..K].iter().sum::<f64>();
        Self { m, pi }
    }
}

impl StatisticalTest for OverlappingTemplate {
    type Stats = OverlappingStats;
    const ID: TestId = TestId::OverlappingTemplate;

    fn configure(cfg: &RunConfig) -> Result<Self, String> {
        let m = cfg.params.overlapping_template;
        if !(MIN_TEMPLATE..=MAX_TEMPLATE).contains(&m) {
            return Err(format!(
                "template length {m} not in {MIN_TEMPLATE}..={MAX_TEMPLATE}"
            ));
        }
        if cfg.sequence_length < BLOCK_LEN {
            return Err(format!(
                "n = {} is shorter than one {BLOCK_LEN}-bit block",
                cfg.sequence_length
            ));
        }
        Ok(Self::new(m))
    }

    fn partitions(&self) -> usize {
        1
    }

    fn iterate(&self, bits: &BitSequence) -> Iteration<OverlappingStats> {
        let m = self.m;
        let mut nu = [0usize; K + 1];
        for block in bits.as_slice().chunks_exact(BLOCK_LEN) {
            let mut matches = 0;
            let mut run = 0;
            // Every window of m ones ends at a position where the current run
            // of ones is at least m long.
            for &b in block {
                run = if b == 1 { run + 1 } else { 0 };
                if run >= m {
                    matches += 1;
                }
            }
            nu[matches.min(K)] += 1;
        }
        let blocks = bits.len() / BLOCK_LEN;
        let nf = blocks as f64;
        let chi_squared: f64 = nu
            .iter()
            .zip(&self.pi)
            .map(|(&v, &pi)| (v as f64 - nf * pi).powi(2) / (nf * pi))
            .sum();
        let p = igamc(K as f64 / 2.0, chi_squared / 2.0);
        Iteration::Applicable {
            stats: OverlappingStats {
                blocks,
                nu,
                chi_squared,
            },
            p_values: vec![p],
        }
    }
}

//! Serial test: uniformity of overlapping m-bit patterns, reported as the
//! first and second differences of psi-squared.

use randcheck_core::math::igamc;
use randcheck_core::{BitSequence, Iteration, RunConfig, StatisticalTest, TestId};
use serde::Serialize;

use crate::common::psi_squared;

pub const MIN_PATTERN: usize = 2;
pub const MAX_PATTERN: usize = 24;

#[derive(Debug, Clone)]
pub struct Serial {
    m: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SerialStats {
    pub psi_m: f64,
    pub psi_m1: f64,
    pub psi_m2: f64,
    pub del1: f64,
    pub del2: f64,
}

impl Serial {
    pub fn new(m: usize) -> Self {
        Self { m }
    }
}

impl StatisticalTest for Serial {
    type Stats = SerialStats;
    const ID: TestId = TestId::Serial;

    fn configure(cfg: &RunConfig) -> Result<Self, String> {
        let m = cfg.params.serial;
        let n = cfg.sequence_length;
        if !(MIN_PATTERN..=MAX_PATTERN).contains(&m) {
            return Err(format!(
                "block length {m} not in {MIN_PATTERN}..={MAX_PATTERN}"
            ));
        }
        let log2n = n.max(1).ilog2() as usize;
        if m + 2 >= log2n {
            return Err(format!(
                "block length {m} too large for n = {n} (must be below {})",
                log2n.saturating_sub(2)
            ));
        }
        Ok(Self::new(m))
    }

    fn partitions(&self) -> usize {
        2
    }

    fn iterate(&self, bits: &BitSequence) -> Iteration<SerialStats> {
        let m = self.m;
        let psi_m = psi_squared(bits.as_slice(), m);
        let psi_m1 = psi_squared(bits.as_slice(), m - 1);
        let psi_m2 = if m >= 2 {
            psi_squared(bits.as_slice(), m - 2)
        } else {
            0.0
        };
        let del1 = psi_m - psi_m1;
        let del2 = psi_m - 2.0 * psi_m1 + psi_m2;
        let p1 = igamc(2f64.powi(m as i32 - 2), del1 / 2.0);
        let p2 = igamc(2f64.powi(m as i32 - 3), del2 / 2.0);
        Iteration::Applicable {
            stats: SerialStats {
                psi_m,
                psi_m1,
                psi_m2,
                del1,
                del2,
            },
            p_values: vec![p1, p2],
        }
    }
}

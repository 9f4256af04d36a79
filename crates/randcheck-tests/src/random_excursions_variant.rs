//! Random excursions variant: total visits to each state x in
//! {-9..-1, 1..9} across the whole walk.

use randcheck_core::math::erfc;
use randcheck_core::{BitSequence, Iteration, RunConfig, StatisticalTest, TestId};
use serde::Serialize;

use crate::random_excursions::{MIN_BITS, cycle_count, min_cycles};

pub const STATES: [i64; 18] = [-9, -8, -7, -6, -5, -4, -3, -2, -1, 1, 2, 3, 4, 5, 6, 7, 8, 9];

#[derive(Debug, Clone, Default)]
pub struct RandomExcursionsVariant;

#[derive(Debug, Clone, Serialize)]
pub struct RandomExcursionsVariantStats {
    pub cycles: usize,
    /// Visits per state, indexed like [`STATES`].
    pub visits: Vec<usize>,
}

fn state_index(s: i64) -> Option<usize> {
    match s {
        -9..=-1 => Some((s + 9) as usize),
        1..=9 => Some((s + 8) as usize),
        _ => None,
    }
}

impl StatisticalTest for RandomExcursionsVariant {
    type Stats = RandomExcursionsVariantStats;
    const ID: TestId = TestId::RandomExcursionsVariant;

    fn configure(cfg: &RunConfig) -> Result<Self, String> {
        let n = cfg.sequence_length;
        if n < MIN_BITS {
            return Err(format!("n = {n} is below the minimum of {MIN_BITS}"));
        }
        Ok(Self)
    }

    fn partitions(&self) -> usize {
        STATES.len()
    }

    fn iterate(&self, bits: &BitSequence) -> Iteration<RandomExcursionsVariantStats> {
        let cycles = cycle_count(bits);
        let mut visits = vec![0usize; STATES.len()];
        let mut s = 0i64;
        for step in bits.steps() {
            s += step;
            if let Some(i) = state_index(s) {
                visits[i] += 1;
            }
        }
        let stats = RandomExcursionsVariantStats { cycles, visits };
        if (cycles as f64) < min_cycles(bits.len()) {
            return Iteration::Inapplicable { stats };
        }
        let j = cycles as f64;
        let p_values = stats
            .visits
            .iter()
            .zip(&STATES)
            .map(|(&xi, &x)| {
                let denom = (2.0 * j * (4.0 * x.abs() as f64 - 2.0)).sqrt();
                erfc((xi as f64 - j).abs() / denom)
            })
            .collect();
        Iteration::Applicable { stats, p_values }
    }
}

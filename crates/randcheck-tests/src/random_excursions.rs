//! Random excursions test.
//!
//! The ±1 walk is cut into cycles at each return to zero. For each state
//! x in {-4..-1, 1..4} the test compares how many cycles visit x exactly k
//! times (k = 0..5+) against the theoretical occupation probabilities. A walk
//! with too few cycles makes the whole iteration inapplicable.

use randcheck_core::math::igamc;
use randcheck_core::{BitSequence, Iteration, RunConfig, StatisticalTest, TestId};
use serde::Serialize;

pub const MIN_BITS: usize = 1000;
/// States -4..-1 then 1..4.
pub const STATES: [i64; 8] = [-4, -3, -2, -1, 1, 2, 3, 4];

/// pi_k(x) for |x| = 1..=4 and k = 0..=5 (5 meaning "5 or more").
const PI: [[f64; 6]; 4] = [
    [0.5, 0.25, 0.125, 0.0625, 0.03125, 0.03125],
    [0.75, 0.0625, 0.046875, 0.03515625, 0.0263671875, 0.0791015625],
    [
        0.8333333333,
        0.02777777778,
        0.02314814815,
        0.01929012346,
        0.01607510288,
        0.0803755143,
    ],
    [
        0.875,
        0.015625,
        0.013671875,
        0.01196289063,
        0.0104675293,
        0.0732727051,
    ],
];

/// Fewest cycles for which the excursion tests apply.
pub(crate) fn min_cycles(n: usize) -> f64 {
    (0.005 * (n as f64).sqrt()).max(500.0)
}

/// Number of cycles in the walk: returns to zero, plus one if the walk does
/// not end at zero.
pub(crate) fn cycle_count(bits: &BitSequence) -> usize {
    let mut s = 0i64;
    let mut cycles = 0;
    for step in bits.steps() {
        s += step;
        if s == 0 {
            cycles += 1;
        }
    }
    if s != 0 {
        cycles += 1;
    }
    cycles
}

/// Per-state histograms of visits per cycle, indexed like [`STATES`].
fn visit_histograms(bits: &BitSequence) -> [[usize; 6]; 8] {
    let mut nu = [[0usize; 6]; 8];
    let mut current = [0usize; 8];
    let mut flush = |current: &mut [usize; 8]| {
        for (hist, visits) in nu.iter_mut().zip(current.iter_mut()) {
            hist[(*visits).min(5)] += 1;
            *visits = 0;
        }
    };
    let mut s = 0i64;
    for step in bits.steps() {
        s += step;
        if s == 0 {
            flush(&mut current);
        } else if let Some(i) = state_index(s) {
            current[i] += 1;
        }
    }
    if s != 0 {
        flush(&mut current);
    }
    nu
}

fn state_index(s: i64) -> Option<usize> {
    match s {
        -4..=-1 => Some((s + 4) as usize),
        1..=4 => Some((s + 3) as usize),
        _ => None,
    }
}

#[derive(Debug, Clone, Default)]
pub struct RandomExcursions;

#[derive(Debug, Clone, Serialize)]
pub struct RandomExcursionsStats {
    pub cycles: usize,
    /// Empty when the iteration was inapplicable.
    pub chi_squared: Vec<f64>,
}

impl StatisticalTest for RandomExcursions {
    type Stats = RandomExcursionsStats;
    const ID: TestId = TestId::RandomExcursions;

    fn configure(cfg: &RunConfig) -> Result<Self, String> {
        let n = cfg.sequence_length;
        if n < MIN_BITS {
            return Err(format!("n = {n} is below the minimum of {MIN_BITS}"));
        }
        if n < 1_000_000 {
            log::debug!("random excursions: n = {n}, at least 1000000 recommended");
        }
        Ok(Self)
    }

    fn partitions(&self) -> usize {
        STATES.len()
    }

    fn iterate(&self, bits: &BitSequence) -> Iteration<RandomExcursionsStats> {
        let cycles = cycle_count(bits);
        if (cycles as f64) < min_cycles(bits.len()) {
            return Iteration::Inapplicable {
                stats: RandomExcursionsStats {
                    cycles,
                    chi_squared: Vec::new(),
                },
            };
        }
        let j = cycles as f64;
        let nu = visit_histograms(bits);
        let mut chi_squared = Vec::with_capacity(STATES.len());
        let mut p_values = Vec::with_capacity(STATES.len());
        for (hist, &x) in nu.iter().zip(&STATES) {
            let pi = &PI[(x.unsigned_abs() - 1) as usize];
            let chi: f64 = hist
                .iter()
                .zip(pi)
                .map(|(&v, &p)| (v as f64 - j * p).powi(2) / (j * p))
                .sum();
            p_values.push(igamc(2.5, chi / 2.0));
            chi_squared.push(chi);
        }
        Iteration::Applicable {
            stats: RandomExcursionsStats {
                cycles,
                chi_squared,
            },
            p_values,
        }
    }
}

//! Cross-iteration aggregation: the uniformity and proportion-of-passes
//! verdicts for one (test, partition) pair.

use serde::Serialize;

use crate::config::{RunConfig, TestId};
use crate::math::igamc;
use crate::pvalue::{PValueClass, classify, is_non_p_value};

/// Histogram of one partition's p-values plus pass/fail counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UniformityTally {
    /// Count per equal-width sub-interval of [0, 1).
    pub bins: Vec<usize>,
    /// p-values that entered the sample.
    pub sample_count: usize,
    /// Sampled p-values that did not pass at `alpha`.
    pub too_low: usize,
    /// Sentinels (and, for excursion tests, exact zeros) left out.
    pub skipped: usize,
}

impl UniformityTally {
    /// Walk `p_values` with stride `partitions`, starting at `partition`.
    ///
    /// Values at or above 1.0 land in the last bin; negatives and NaN land in
    /// the first. Anything that does not classify as a success counts toward
    /// `too_low`, so out-of-range values are failures.
    pub fn collect(
        p_values: &[f64],
        partitions: usize,
        partition: usize,
        excursion: bool,
        bins: usize,
        alpha: f64,
    ) -> Self {
        let mut tally = Self {
            bins: vec![0; bins.max(1)],
            sample_count: 0,
            too_low: 0,
            skipped: 0,
        };
        if partitions == 0 || partition >= partitions {
            return tally;
        }
        let last = tally.bins.len() - 1;
        for &p in p_values.iter().skip(partition).step_by(partitions) {
            if is_non_p_value(p) || (excursion && p == 0.0) {
                tally.skipped += 1;
                continue;
            }
            tally.sample_count += 1;
            let scaled = p * tally.bins.len() as f64;
            let bucket = if scaled.is_nan() || scaled <= 0.0 {
                0
            } else {
                (scaled as usize).min(last)
            };
            tally.bins[bucket] += 1;
            if classify(p, alpha) != PValueClass::Success {
                tally.too_low += 1;
            }
        }
        tally
    }

    pub fn passed(&self) -> usize {
        self.sample_count - self.too_low
    }
}

/// Chi-square uniformity verdict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Uniformity {
    Pass { p_value: f64 },
    Fail { p_value: f64 },
    NotEvaluable,
}

impl Uniformity {
    pub fn evaluate(tally: &UniformityTally, level: f64) -> Self {
        let bins = tally.bins.len();
        let expected = tally.sample_count as f64 / bins as f64;
        if bins < 2 || expected <= 0.0 {
            return Self::NotEvaluable;
        }
        let chi2: f64 = tally
            .bins
            .iter()
            .map(|&o| {
                let d = o as f64 - expected;
                d * d / expected
            })
            .sum();
        let p_value = igamc((bins - 1) as f64 / 2.0, chi2 / 2.0);
        if p_value >= level {
            Self::Pass { p_value }
        } else {
            Self::Fail { p_value }
        }
    }

    pub fn p_value(&self) -> Option<f64> {
        match self {
            Self::Pass { p_value } | Self::Fail { p_value } => Some(*p_value),
            Self::NotEvaluable => None,
        }
    }
}

/// Proportion-of-passes verdict with its acceptance band (in counts).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Proportion {
    Pass { passed: usize, lower: f64, upper: f64 },
    Fail { passed: usize, lower: f64, upper: f64 },
    NotEvaluable,
}

impl Proportion {
    /// Band: (1-a +/- 3 sqrt((1-a) a / s)) * s for sample size s.
    pub fn bounds(sample_count: usize, alpha: f64) -> Option<(f64, f64)> {
        if sample_count == 0 {
            return None;
        }
        let s = sample_count as f64;
        let p_hat = 1.0 - alpha;
        let spread = 3.0 * (p_hat * alpha / s).sqrt();
        Some(((p_hat - spread) * s, (p_hat + spread) * s))
    }

    pub fn evaluate(tally: &UniformityTally, alpha: f64) -> Self {
        let Some((lower, upper)) = Self::bounds(tally.sample_count, alpha) else {
            return Self::NotEvaluable;
        };
        let passed = tally.passed();
        let x = passed as f64;
        if x >= lower && x <= upper {
            Self::Pass {
                passed,
                lower,
                upper,
            }
        } else {
            Self::Fail {
                passed,
                lower,
                upper,
            }
        }
    }
}

/// Both verdicts for one (test, partition) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsVerdict {
    pub test: TestId,
    pub partition: usize,
    pub tally: UniformityTally,
    pub uniformity: Uniformity,
    pub proportion: Proportion,
}

impl MetricsVerdict {
    /// Overall pass: neither verdict failed. Not-evaluable does not fail.
    pub fn passed(&self) -> bool {
        !matches!(self.uniformity, Uniformity::Fail { .. })
            && !matches!(self.proportion, Proportion::Fail { .. })
    }
}

/// Verdicts for every partition of one test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestMetrics {
    pub test: TestId,
    pub enabled: bool,
    pub partitions: usize,
    pub iterations: usize,
    pub inapplicable: usize,
    pub verdicts: Vec<MetricsVerdict>,
}

impl TestMetrics {
    pub fn disabled(test: TestId) -> Self {
        Self {
            test,
            enabled: false,
            partitions: 0,
            iterations: 0,
            inapplicable: 0,
            verdicts: Vec::new(),
        }
    }

    pub fn passed(&self) -> bool {
        self.verdicts.iter().all(MetricsVerdict::passed)
    }
}

/// Aggregate one partition of a test's p-value collection.
pub fn aggregate_partition(
    test: TestId,
    p_values: &[f64],
    partitions: usize,
    partition: usize,
    cfg: &RunConfig,
) -> MetricsVerdict {
    let tally = UniformityTally::collect(
        p_values,
        partitions,
        partition,
        test.is_excursion(),
        cfg.bins(),
        cfg.alpha,
    );
    let uniformity = Uniformity::evaluate(&tally, cfg.uniformity_level);
    let proportion = Proportion::evaluate(&tally, cfg.alpha);
    MetricsVerdict {
        test,
        partition,
        tally,
        uniformity,
        proportion,
    }
}

/// Aggregate every partition of a test.
pub fn aggregate(
    test: TestId,
    p_values: &[f64],
    partitions: usize,
    cfg: &RunConfig,
) -> Vec<MetricsVerdict> {
    (0..partitions)
        .map(|k| aggregate_partition(test, p_values, partitions, k, cfg))
        .collect()
}

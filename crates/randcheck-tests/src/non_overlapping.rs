//! Non-overlapping template matching test. One partition per aperiodic
//! template of the configured length.

use randcheck_core::math::igamc;
use randcheck_core::{BitSequence, Iteration, MAX_PARTITIONS, RunConfig, StatisticalTest, TestId};
use serde::Serialize;

use crate::templates::{Template, aperiodic_templates};

pub const BLOCKS: usize = 8;
pub const MIN_TEMPLATE: usize = 2;
pub const MAX_TEMPLATE: usize = 21;

#[derive(Debug, Clone)]
pub struct NonOverlappingTemplate {
    templates: Vec<Template>,
    blocks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct NonOverlappingStats {
    pub block_len: usize,
    pub lambda: f64,
    pub variance: f64,
    /// Matches per block, one row per template.
    pub matches: Vec<Vec<usize>>,
    pub chi_squared: Vec<f64>,
}

impl NonOverlappingTemplate {
    pub fn new(templates: Vec<Template>, blocks: usize) -> Self {
        Self { templates, blocks }
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    /// Expected matches per block and their variance for block length `M`.
    fn moments(block_len: usize, m: usize) -> (f64, f64) {
        let two_m = 2f64.powi(m as i32);
        let mf = block_len as f64;
        let lambda = (mf - m as f64 + 1.0) / two_m;
        let variance = mf * (1.0 / two_m - (2.0 * m as f64 - 1.0) / (two_m * two_m));
        (lambda, variance)
    }

    /// Non-overlapping matches of `t` in `block`: after a hit, the window
    /// skips past the matched bits.
    fn count(windows: &[u32], block_len: usize, t: &Template) -> usize {
        let m = t.len;
        let mut hits = 0;
        let mut j = 0;
        while j + m <= block_len {
            if windows[j] == t.value {
                hits += 1;
                j += m;
            } else {
                j += 1;
            }
        }
        hits
    }
}

impl StatisticalTest for NonOverlappingTemplate {
    type Stats = NonOverlappingStats;
    const ID: TestId = TestId::NonOverlappingTemplate;

    fn configure(cfg: &RunConfig) -> Result<Self, String> {
        let m = cfg.params.non_overlapping_template;
        if !(MIN_TEMPLATE..=MAX_TEMPLATE).contains(&m) {
            return Err(format!(
                "template length {m} not in {MIN_TEMPLATE}..={MAX_TEMPLATE}"
            ));
        }
        let block_len = cfg.sequence_length / BLOCKS;
        let (lambda, variance) = Self::moments(block_len, m);
        if lambda <= 0.0 || variance <= 0.0 {
            return Err(format!(
                "block length {block_len} too short for {m}-bit templates"
            ));
        }
        let templates = aperiodic_templates(m, MAX_PARTITIONS);
        if templates.is_empty() {
            return Err(format!("no aperiodic templates of length {m}"));
        }
        Ok(Self::new(templates, BLOCKS))
    }

    fn partitions(&self) -> usize {
        self.templates.len()
    }

    fn iterate(&self, bits: &BitSequence) -> Iteration<NonOverlappingStats> {
        let m = self.templates.first().map_or(0, |t| t.len);
        let block_len = bits.len() / self.blocks;
        let (lambda, variance) = Self::moments(block_len, m);

        // Window value starting at every position of every block.
        let block_windows: Vec<Vec<u32>> = bits
            .as_slice()
            .chunks_exact(block_len.max(1))
            .take(self.blocks)
            .map(|block| {
                if block.len() < m {
                    return Vec::new();
                }
                block
                    .windows(m)
                    .map(|w| Template::from_bits(w).value)
                    .collect()
            })
            .collect();

        let mut matches = Vec::with_capacity(self.templates.len());
        let mut chi_squared = Vec::with_capacity(self.templates.len());
        let mut p_values = Vec::with_capacity(self.templates.len());
        for t in &self.templates {
            let w: Vec<usize> = block_windows
                .iter()
                .map(|windows| Self::count(windows, block_len, t))
                .collect();
            let chi: f64 = w
                .iter()
                .map(|&x| (x as f64 - lambda).powi(2) / variance)
                .sum();
            p_values.push(igamc(self.blocks as f64 / 2.0, chi / 2.0));
            matches.push(w);
            chi_squared.push(chi);
        }
        Iteration::Applicable {
            stats: NonOverlappingStats {
                block_len,
                lambda,
                variance,
                matches,
                chi_squared,
            },
            p_values,
        }
    }
}

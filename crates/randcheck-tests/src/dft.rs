//! Discrete Fourier transform (spectral) test.

use std::sync::Arc;

use randcheck_core::math::erfc;
use randcheck_core::{BitSequence, Iteration, RunConfig, StatisticalTest, TestId};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner, Length};
use serde::Serialize;

pub const MIN_BITS: usize = 1000;

/// Counts spectral peaks below the 95% threshold. The FFT plan is built once
/// at init and shared by every worker.
#[derive(Clone)]
pub struct Dft {
    fft: Arc<dyn Fft<f64>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DftStats {
    pub threshold: f64,
    /// Expected peaks below the threshold.
    pub n0: f64,
    /// Observed peaks below the threshold.
    pub n1: usize,
    pub d: f64,
}

impl Dft {
    pub fn new(n: usize) -> Self {
        Self {
            fft: FftPlanner::new().plan_fft_forward(n),
        }
    }
}

impl StatisticalTest for Dft {
    type Stats = DftStats;
    const ID: TestId = TestId::Dft;

    fn configure(cfg: &RunConfig) -> Result<Self, String> {
        if cfg.sequence_length < MIN_BITS {
            return Err(format!(
                "n = {} is below the minimum of {MIN_BITS}",
                cfg.sequence_length
            ));
        }
        Ok(Self::new(cfg.sequence_length))
    }

    fn partitions(&self) -> usize {
        1
    }

    fn iterate(&self, bits: &BitSequence) -> Iteration<DftStats> {
        let n = bits.len();
        let mut buffer: Vec<Complex<f64>> = bits
            .as_slice()
            .iter()
            .map(|&b| Complex {
                re: if b == 1 { 1.0 } else { -1.0 },
                im: 0.0,
            })
            .collect();
        if self.fft.len() == n {
            self.fft.process(&mut buffer);
        } else {
            FftPlanner::new().plan_fft_forward(n).process(&mut buffer);
        }

        let nf = n as f64;
        let threshold = ((1.0f64 / 0.05).ln() * nf).sqrt();
        let n0 = 0.95 * nf / 2.0;
        let n1 = buffer[..n / 2]
            .iter()
            .filter(|c| c.norm() < threshold)
            .count();
        let d = (n1 as f64 - n0) / (nf * 0.95 * 0.05 / 4.0).sqrt();
        let p = erfc(d.abs() / std::f64::consts::SQRT_2);
        Iteration::Applicable {
            stats: DftStats {
                threshold,
                n0,
                n1,
                d,
            },
            p_values: vec![p],
        }
    }
}

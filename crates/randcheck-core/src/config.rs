//! Run configuration and test identifiers.
//!
//! A [`RunConfig`] is built once at startup (defaults, optional JSON file,
//! command-line overrides), validated, and then passed by shared reference to
//! every component for the lifetime of the run.

use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Upper bound on the partitions any single test may emit per iteration.
pub const MAX_PARTITIONS: usize = 148;

/// Identifier of one of the fifteen SP 800-22 tests, numbered as in the
/// reference suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestId {
    Frequency = 1,
    BlockFrequency = 2,
    CumulativeSums = 3,
    Runs = 4,
    LongestRun = 5,
    Rank = 6,
    Dft = 7,
    NonOverlappingTemplate = 8,
    OverlappingTemplate = 9,
    Universal = 10,
    ApproximateEntropy = 11,
    RandomExcursions = 12,
    RandomExcursionsVariant = 13,
    Serial = 14,
    LinearComplexity = 15,
}

impl TestId {
    /// All tests in id order.
    pub const ALL: [TestId; 15] = [
        Self::Frequency,
        Self::BlockFrequency,
        Self::CumulativeSums,
        Self::Runs,
        Self::LongestRun,
        Self::Rank,
        Self::Dft,
        Self::NonOverlappingTemplate,
        Self::OverlappingTemplate,
        Self::Universal,
        Self::ApproximateEntropy,
        Self::RandomExcursions,
        Self::RandomExcursionsVariant,
        Self::Serial,
        Self::LinearComplexity,
    ];

    /// Numeric id (1..=15).
    pub fn number(self) -> u8 {
        self as u8
    }

    /// Look up a test by numeric id.
    pub fn from_number(n: i64) -> Option<Self> {
        if (1..=15).contains(&n) {
            Some(Self::ALL[(n - 1) as usize])
        } else {
            None
        }
    }

    /// Name used in reports and output directories.
    pub fn name(self) -> &'static str {
        match self {
            Self::Frequency => "Frequency",
            Self::BlockFrequency => "BlockFrequency",
            Self::CumulativeSums => "CumulativeSums",
            Self::Runs => "Runs",
            Self::LongestRun => "LongestRun",
            Self::Rank => "Rank",
            Self::Dft => "FFT",
            Self::NonOverlappingTemplate => "NonOverlappingTemplate",
            Self::OverlappingTemplate => "OverlappingTemplate",
            Self::Universal => "Universal",
            Self::ApproximateEntropy => "ApproximateEntropy",
            Self::RandomExcursions => "RandomExcursions",
            Self::RandomExcursionsVariant => "RandomExcursionsVariant",
            Self::Serial => "Serial",
            Self::LinearComplexity => "LinearComplexity",
        }
    }

    /// Excursion tests treat a p-value of exactly zero as "no sample".
    pub fn is_excursion(self) -> bool {
        matches!(self, Self::RandomExcursions | Self::RandomExcursionsVariant)
    }
}

impl std::fmt::Display for TestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for TestId {
    type Err = Error;

    /// Accepts the numeric id or the (case-insensitive) report name.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(n) = s.parse::<i64>() {
            return Self::from_number(n)
                .ok_or_else(|| Error::Config(format!("test id {n} out of range 1..=15")));
        }
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Config(format!("unknown test '{s}'")))
    }
}

/// Per-test block-length parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestParams {
    /// Block length M for the block frequency test.
    pub block_frequency: usize,
    /// Template length m for the non-overlapping template test.
    pub non_overlapping_template: usize,
    /// Template length m for the overlapping template test.
    pub overlapping_template: usize,
    /// Block length m for approximate entropy.
    pub approximate_entropy: usize,
    /// Block length m for the serial test.
    pub serial: usize,
    /// Block length M for linear complexity.
    pub linear_complexity: usize,
}

impl Default for TestParams {
    fn default() -> Self {
        Self {
            block_frequency: 128,
            non_overlapping_template: 9,
            overlapping_template: 9,
            approximate_entropy: 10,
            serial: 16,
            linear_complexity: 500,
        }
    }
}

/// Immutable configuration for one battery run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Bits per sequence (`n`).
    pub sequence_length: usize,
    /// Number of sequences tested (`numOfBitStreams`).
    pub iterations: usize,
    /// Significance level.
    pub alpha: f64,
    /// Uniformity histogram bins; `None` derives the count from `iterations`.
    pub uniformity_bins: Option<usize>,
    /// Minimum uniformity p-value for a passing verdict.
    pub uniformity_level: f64,
    /// Compatibility mode: fixed 10-bin uniformity histogram.
    pub legacy: bool,
    /// Worker threads; `None` means min(available cores, iterations).
    pub workers: Option<usize>,
    /// Log progress every this many completed iterations (0 = never).
    pub report_cycle: usize,
    /// Tests to run; empty means every test.
    pub tests: BTreeSet<TestId>,
    pub params: TestParams,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            sequence_length: 1_048_576,
            iterations: 1,
            alpha: 0.01,
            uniformity_bins: None,
            uniformity_level: 0.0001,
            legacy: false,
            workers: None,
            report_cycle: 0,
            tests: BTreeSet::new(),
            params: TestParams::default(),
        }
    }
}

impl RunConfig {
    /// Load a configuration from a JSON file; absent fields take defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Check the run-wide invariants. Per-test parameter ranges are checked by
    /// each test at init and only disable that test.
    pub fn validate(&self) -> Result<()> {
        if self.sequence_length == 0 {
            return Err(Error::Config("sequence length must be positive".into()));
        }
        if self.iterations == 0 {
            return Err(Error::Config("iteration count must be positive".into()));
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(Error::Config(format!("alpha {} not in (0, 1)", self.alpha)));
        }
        if !(self.uniformity_level > 0.0 && self.uniformity_level < 1.0) {
            return Err(Error::Config(format!(
                "uniformity level {} not in (0, 1)",
                self.uniformity_level
            )));
        }
        if self.uniformity_bins == Some(0) {
            return Err(Error::Config("uniformity bins must be positive".into()));
        }
        if self.workers == Some(0) {
            return Err(Error::Config("worker count must be positive".into()));
        }
        if self.sequence_length.checked_mul(self.iterations).is_none() {
            return Err(Error::Config(format!(
                "{} iterations of {} bits overflows",
                self.iterations, self.sequence_length
            )));
        }
        Ok(())
    }

    /// Whether `test` was selected for this run.
    pub fn is_selected(&self, test: TestId) -> bool {
        self.tests.is_empty() || self.tests.contains(&test)
    }

    /// Effective number of uniformity bins.
    pub fn bins(&self) -> usize {
        if let Some(b) = self.uniformity_bins {
            return b;
        }
        if self.legacy {
            return 10;
        }
        ((self.iterations as f64).sqrt().floor() as usize).max(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let cfg = RunConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.sequence_length, 1_048_576);
        assert_eq!(cfg.params.block_frequency, 128);
        assert!((cfg.alpha - 0.01).abs() < f64::EPSILON);
    }

    #[test]
    fn test_test_id_numbering() {
        for (i, t) in TestId::ALL.iter().enumerate() {
            assert_eq!(t.number() as usize, i + 1);
            assert_eq!(TestId::from_number(i as i64 + 1), Some(*t));
        }
        assert_eq!(TestId::from_number(0), None);
        assert_eq!(TestId::from_number(16), None);
    }

    #[test]
    fn test_test_id_parse() {
        assert_eq!("1".parse::<TestId>().unwrap(), TestId::Frequency);
        assert_eq!("serial".parse::<TestId>().unwrap(), TestId::Serial);
        assert_eq!("FFT".parse::<TestId>().unwrap(), TestId::Dft);
        assert!("99".parse::<TestId>().is_err());
        assert!("nope".parse::<TestId>().is_err());
    }

    #[test]
    fn test_excursion_flag() {
        assert!(TestId::RandomExcursions.is_excursion());
        assert!(TestId::RandomExcursionsVariant.is_excursion());
        assert!(!TestId::Serial.is_excursion());
    }

    #[test]
    fn test_bins() {
        let mut cfg = RunConfig {
            iterations: 100,
            ..Default::default()
        };
        assert_eq!(cfg.bins(), 10);
        cfg.iterations = 1000;
        assert_eq!(cfg.bins(), 31);
        cfg.legacy = true;
        assert_eq!(cfg.bins(), 10);
        cfg.uniformity_bins = Some(7);
        assert_eq!(cfg.bins(), 7);
        cfg.uniformity_bins = None;
        cfg.legacy = false;
        cfg.iterations = 1;
        assert_eq!(cfg.bins(), 2);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            RunConfig {
                sequence_length: 0,
                ..Default::default()
            },
            RunConfig {
                iterations: 0,
                ..Default::default()
            },
            RunConfig {
                alpha: 1.5,
                ..Default::default()
            },
            RunConfig {
                uniformity_level: 0.0,
                ..Default::default()
            },
            RunConfig {
                workers: Some(0),
                ..Default::default()
            },
            RunConfig {
                sequence_length: usize::MAX,
                iterations: 2,
                ..Default::default()
            },
        ];
        for cfg in bad {
            assert!(cfg.validate().is_err(), "{cfg:?} should be rejected");
        }
    }

    #[test]
    fn test_selection() {
        let mut cfg = RunConfig::default();
        assert!(cfg.is_selected(TestId::Rank));
        cfg.tests.insert(TestId::Frequency);
        assert!(cfg.is_selected(TestId::Frequency));
        assert!(!cfg.is_selected(TestId::Rank));
    }

    #[test]
    fn test_json_partial_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("run.json");
        std::fs::write(
            &path,
            r#"{"sequence_length": 1000, "iterations": 4, "tests": ["frequency", "runs"],
               "params": {"serial": 5}}"#,
        )
        .unwrap();
        let cfg = RunConfig::from_json_file(&path).unwrap();
        assert_eq!(cfg.sequence_length, 1000);
        assert_eq!(cfg.iterations, 4);
        assert_eq!(cfg.params.serial, 5);
        assert_eq!(cfg.params.block_frequency, 128);
        assert!(cfg.is_selected(TestId::Runs));
        assert!(!cfg.is_selected(TestId::Serial));
    }
}

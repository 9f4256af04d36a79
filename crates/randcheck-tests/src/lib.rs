//! The fifteen NIST SP 800-22 statistical tests.
//!
//! Each module implements [`randcheck_core::StatisticalTest`]. The registry
//! below wraps every test in a [`TestDriver`] so the battery can hold them as
//! `Box<dyn Driver>` indexed by [`TestId`].
//!
//! | id | test | partitions |
//! |----|------|-----------|
//! | 1 | frequency | 1 |
//! | 2 | block frequency | 1 |
//! | 3 | cumulative sums | 2 |
//! | 4 | runs | 1 |
//! | 5 | longest run of ones | 1 |
//! | 6 | binary matrix rank | 1 |
//! | 7 | discrete Fourier transform | 1 |
//! | 8 | non-overlapping template | one per aperiodic template, up to 148 |
//! | 9 | overlapping template | 1 |
//! | 10 | Maurer's universal | 1 |
//! | 11 | approximate entropy | 1 |
//! | 12 | random excursions | 8 |
//! | 13 | random excursions variant | 18 |
//! | 14 | serial | 2 |
//! | 15 | linear complexity | 1 |

pub mod approximate_entropy;
pub mod block_frequency;
mod common;
pub mod cusum;
pub mod dft;
pub mod frequency;
pub mod linear_complexity;
pub mod longest_run;
pub mod non_overlapping;
pub mod overlapping;
pub mod random_excursions;
pub mod random_excursions_variant;
pub mod rank;
pub mod runs;
pub mod serial;
pub mod templates;
pub mod universal;

use randcheck_core::{Driver, TestDriver, TestId};

pub use approximate_entropy::ApproximateEntropy;
pub use block_frequency::BlockFrequency;
pub use cusum::CumulativeSums;
pub use dft::Dft;
pub use frequency::Frequency;
pub use linear_complexity::LinearComplexity;
pub use longest_run::LongestRun;
pub use non_overlapping::NonOverlappingTemplate;
pub use overlapping::OverlappingTemplate;
pub use random_excursions::RandomExcursions;
pub use random_excursions_variant::RandomExcursionsVariant;
pub use rank::Rank;
pub use runs::Runs;
pub use serial::Serial;
pub use universal::Universal;

/// A fresh, uninitialized driver for `test`.
pub fn driver_for(test: TestId) -> Box<dyn Driver> {
    match test {
        TestId::Frequency => Box::new(TestDriver::<Frequency>::new()),
        TestId::BlockFrequency => Box::new(TestDriver::<BlockFrequency>::new()),
        TestId::CumulativeSums => Box::new(TestDriver::<CumulativeSums>::new()),
        TestId::Runs => Box::new(TestDriver::<Runs>::new()),
        TestId::LongestRun => Box::new(TestDriver::<LongestRun>::new()),
        TestId::Rank => Box::new(TestDriver::<Rank>::new()),
        TestId::Dft => Box::new(TestDriver::<Dft>::new()),
        TestId::NonOverlappingTemplate => Box::new(TestDriver::<NonOverlappingTemplate>::new()),
        TestId::OverlappingTemplate => Box::new(TestDriver::<OverlappingTemplate>::new()),
        TestId::Universal => Box::new(TestDriver::<Universal>::new()),
        TestId::ApproximateEntropy => Box::new(TestDriver::<ApproximateEntropy>::new()),
        TestId::RandomExcursions => Box::new(TestDriver::<RandomExcursions>::new()),
        TestId::RandomExcursionsVariant => {
            Box::new(TestDriver::<RandomExcursionsVariant>::new())
        }
        TestId::Serial => Box::new(TestDriver::<Serial>::new()),
        TestId::LinearComplexity => Box::new(TestDriver::<LinearComplexity>::new()),
    }
}

/// One driver per test, in id order.
pub fn all_drivers() -> Vec<Box<dyn Driver>> {
    TestId::ALL.iter().map(|&t| driver_for(t)).collect()
}

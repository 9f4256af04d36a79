//! # randcheck-core
//!
//! The engine behind the `randcheck` SP 800-22 battery: per-test lifecycle,
//! result storage, the multi-threaded iteration scheduler, cross-iteration
//! aggregation, and the binary p-value archive.
//!
//! ## Quick Start
//!
//! ```no_run
//! use randcheck_core::{Battery, GeneratorKind, GeneratorSource, RunConfig};
//!
//! # fn drivers() -> Vec<Box<dyn randcheck_core::Driver>> { Vec::new() }
//! let cfg = RunConfig {
//!     sequence_length: 1_000_000,
//!     iterations: 100,
//!     ..Default::default()
//! };
//! let mut battery = Battery::new(cfg, drivers())?;
//! battery.init()?;
//! battery.run(&mut GeneratorSource::new(GeneratorKind::Sha256, 1))?;
//! battery.print(std::path::Path::new("experiments"))?;
//! for test in battery.metrics()? {
//!     println!("{}: {}", test.test, if test.passed() { "pass" } else { "FAIL" });
//! }
//! battery.destroy()?;
//! # Ok::<(), randcheck_core::Error>(())
//! ```
//!
//! ## Architecture
//!
//! BitSource → Scheduler (N workers) → Driver::iterate (per test) →
//! ResultStore → Aggregator → verdicts
//!
//! Tests themselves live in `randcheck-tests`; each implements
//! [`StatisticalTest`] and is wrapped in a [`TestDriver`].

pub mod aggregate;
pub mod archive;
pub mod battery;
pub mod bits;
pub mod config;
pub mod driver;
pub mod error;
pub mod generators;
pub mod math;
pub mod pvalue;
pub mod scheduler;
pub mod source;
pub mod store;

pub use aggregate::{MetricsVerdict, Proportion, TestMetrics, Uniformity, UniformityTally};
pub use archive::{ArchiveName, ArchiveRecord, ArchiveScan, read_archive, scan_directory};
pub use battery::Battery;
pub use bits::BitSequence;
pub use config::{MAX_PARTITIONS, RunConfig, TestId, TestParams};
pub use driver::{Driver, DriverState, Iteration, StatisticalTest, TestDescriptor, TestDriver};
pub use error::{Error, Result};
pub use generators::{Generator, GeneratorKind};
pub use pvalue::{NON_P_VALUE, PValueClass, classify, is_non_p_value};
pub use scheduler::{RunSummary, Scheduler, SchedulerState};
pub use source::{BitEncoding, BitSource, FileSource, GeneratorSource, MemorySource};
pub use store::ResultStore;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

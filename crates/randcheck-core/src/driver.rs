//! The per-test lifecycle protocol.
//!
//! Every test is wrapped in a [`TestDriver`], which enforces
//! `Init -> Iterate* -> Print -> Metrics -> Destroy` and owns the test's two
//! result stores. The battery and scheduler only see the object-safe
//! [`Driver`] trait, so the fifteen tests form a registry indexed by
//! [`TestId`].

use std::fmt::Debug;
use std::io::Write;
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

use crate::aggregate::{TestMetrics, aggregate};
use crate::bits::BitSequence;
use crate::config::{MAX_PARTITIONS, RunConfig, TestId};
use crate::error::{Error, Result};
use crate::pvalue::{NON_P_VALUE, PValueClass, classify, is_non_p_value, is_out_of_range};
use crate::store::{DEFAULT_CHUNK, ResultStore, presize};

/// Lifecycle state of one test. Ordered; only `Destroy -> Null` goes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverState {
    Null,
    Init,
    Iterate,
    Print,
    Metrics,
    Destroy,
}

impl std::fmt::Display for DriverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Null => "null",
            Self::Init => "init",
            Self::Iterate => "iterate",
            Self::Print => "print",
            Self::Metrics => "metrics",
            Self::Destroy => "destroy",
        };
        write!(f, "{s}")
    }
}

/// Result of running a test over one sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Iteration<S> {
    /// One p-value per partition, in partition order.
    Applicable { stats: S, p_values: Vec<f64> },
    /// Preconditions not met for this sequence; every partition gets
    /// [`NON_P_VALUE`].
    Inapplicable { stats: S },
}

/// Pure computation side of a test.
///
/// `configure` checks the run parameters and returns a ready instance, or a
/// reason the test must be disabled. `iterate` must be callable from many
/// threads at once.
pub trait StatisticalTest: Send + Sync + Sized + 'static {
    /// Per-iteration diagnostic record.
    type Stats: Debug + Clone + Send + Serialize;

    const ID: TestId;

    fn configure(cfg: &RunConfig) -> std::result::Result<Self, String>;

    /// p-values emitted per iteration.
    fn partitions(&self) -> usize;

    fn iterate(&self, bits: &BitSequence) -> Iteration<Self::Stats>;
}

/// Init-time facts about a test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestDescriptor {
    pub id: TestId,
    pub enabled: bool,
    pub partitions: usize,
    pub excursion: bool,
    pub disabled_reason: Option<String>,
}

impl TestDescriptor {
    fn new(id: TestId) -> Self {
        Self {
            id,
            enabled: false,
            partitions: 0,
            excursion: id.is_excursion(),
            disabled_reason: None,
        }
    }
}

/// Object-safe view of a driver used by the scheduler and battery.
pub trait Driver: Send + Sync {
    fn id(&self) -> TestId;

    fn state(&self) -> DriverState;

    fn descriptor(&self) -> &TestDescriptor;

    /// `Null -> Init`. Disables the test (without failing) when its
    /// parameters are out of range.
    fn init(&mut self, cfg: &RunConfig) -> Result<()>;

    /// `Init -> Iterate`.
    fn begin_iterate(&mut self) -> Result<()>;

    /// Run the test on one sequence and record the outcome.
    fn iterate(&self, bits: &BitSequence) -> Result<()>;

    /// Append archived p-values; the count must be a multiple of the
    /// partition count.
    fn ingest_p_values(&mut self, values: &[f64]) -> Result<()>;

    /// Iterations recorded so far.
    fn iterations(&self) -> Result<usize>;

    /// Snapshot of the p-value collection.
    fn p_values(&self) -> Result<Vec<f64>>;

    /// `Iterate -> Print`. Writes stats as JSON lines and p-values as text.
    fn print(&mut self, stats: &mut dyn Write, results: &mut dyn Write) -> Result<()>;

    /// `Print -> Metrics`.
    fn metrics(&mut self, cfg: &RunConfig) -> Result<TestMetrics>;

    /// Drops both stores. Allowed from any state but `Null` and `Destroy`.
    fn destroy(&mut self) -> Result<()>;

    /// `Destroy -> Null`.
    fn reset(&mut self) -> Result<()>;
}

/// Outcome counters kept alongside the stores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub success: usize,
    pub failure: usize,
    pub inapplicable: usize,
}

struct TestResults<S> {
    stats: ResultStore<S>,
    p_values: ResultStore<f64>,
    counters: Counters,
}

impl<S> TestResults<S> {
    fn empty() -> Self {
        Self {
            stats: ResultStore::new(DEFAULT_CHUNK),
            p_values: ResultStore::new(DEFAULT_CHUNK),
            counters: Counters::default(),
        }
    }
}

/// Generic driver wrapping one [`StatisticalTest`].
pub struct TestDriver<T: StatisticalTest> {
    state: DriverState,
    descriptor: TestDescriptor,
    alpha: f64,
    test: Option<T>,
    results: Mutex<TestResults<T::Stats>>,
}

impl<T: StatisticalTest> Default for TestDriver<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: StatisticalTest> TestDriver<T> {
    pub fn new() -> Self {
        Self {
            state: DriverState::Null,
            descriptor: TestDescriptor::new(T::ID),
            alpha: 0.01,
            test: None,
            results: Mutex::new(TestResults::empty()),
        }
    }

    /// The configured test, once init has enabled it.
    pub fn test(&self) -> Option<&T> {
        self.test.as_ref()
    }

    /// Success/failure/inapplicable counts so far.
    pub fn counters(&self) -> Result<Counters> {
        Ok(self.lock()?.counters)
    }

    /// Snapshot of the private statistics, in append order.
    pub fn stats(&self) -> Result<Vec<T::Stats>> {
        Ok(self.lock()?.stats.as_slice().to_vec())
    }

    fn lock(&self) -> Result<MutexGuard<'_, TestResults<T::Stats>>> {
        self.results
            .lock()
            .map_err(|_| Error::Poisoned("test results"))
    }

    fn require(&self, op: &'static str, state: DriverState) -> Result<()> {
        if self.state != state {
            return Err(Error::DriverState {
                test: T::ID,
                op,
                state: self.state,
            });
        }
        Ok(())
    }

    fn disable(&mut self, reason: String) {
        log::warn!("{}: disabled: {reason}", T::ID);
        self.descriptor.enabled = false;
        self.descriptor.partitions = 0;
        self.descriptor.disabled_reason = Some(reason);
        self.test = None;
    }

    fn tally(counters: &mut Counters, p: f64, alpha: f64, test: TestId) {
        if is_out_of_range(p) {
            log::warn!("{test}: p-value {p} outside [0, 1], counted as failure");
        }
        match classify(p, alpha) {
            PValueClass::Success => counters.success += 1,
            PValueClass::Failure => counters.failure += 1,
            PValueClass::Inapplicable => counters.inapplicable += 1,
        }
    }
}

impl<T: StatisticalTest> Driver for TestDriver<T> {
    fn id(&self) -> TestId {
        T::ID
    }

    fn state(&self) -> DriverState {
        self.state
    }

    fn descriptor(&self) -> &TestDescriptor {
        &self.descriptor
    }

    fn init(&mut self, cfg: &RunConfig) -> Result<()> {
        self.require("init", DriverState::Null)?;
        self.alpha = cfg.alpha;
        self.descriptor = TestDescriptor::new(T::ID);
        if !cfg.is_selected(T::ID) {
            self.descriptor.disabled_reason = Some("not selected".into());
            self.state = DriverState::Init;
            return Ok(());
        }
        match T::configure(cfg) {
            Ok(test) => {
                let partitions = test.partitions();
                if partitions == 0 || partitions > MAX_PARTITIONS {
                    self.disable(format!(
                        "partition count {partitions} outside 1..={MAX_PARTITIONS}"
                    ));
                } else {
                    let slots = presize(cfg.iterations, partitions)?;
                    let results = TestResults {
                        stats: ResultStore::with_capacity(DEFAULT_CHUNK, cfg.iterations)?,
                        p_values: ResultStore::with_capacity(DEFAULT_CHUNK, slots)?,
                        counters: Counters::default(),
                    };
                    *self.lock()? = results;
                    self.descriptor.enabled = true;
                    self.descriptor.partitions = partitions;
                    self.test = Some(test);
                }
            }
            Err(reason) => self.disable(reason),
        }
        self.state = DriverState::Init;
        Ok(())
    }

    fn begin_iterate(&mut self) -> Result<()> {
        self.require("begin_iterate", DriverState::Init)?;
        self.state = DriverState::Iterate;
        Ok(())
    }

    fn iterate(&self, bits: &BitSequence) -> Result<()> {
        self.require("iterate", DriverState::Iterate)?;
        let test = match (&self.test, self.descriptor.enabled) {
            (Some(test), true) => test,
            _ => return Err(Error::Disabled { test: T::ID }),
        };
        let partitions = self.descriptor.partitions;
        let (stats, p_values) = match test.iterate(bits) {
            Iteration::Applicable { stats, p_values } => {
                if p_values.len() != partitions {
                    return Err(Error::PartitionMismatch {
                        test: T::ID,
                        got: p_values.len(),
                        partitions,
                    });
                }
                (stats, p_values)
            }
            Iteration::Inapplicable { stats } => (stats, vec![NON_P_VALUE; partitions]),
        };

        // One critical section per iteration keeps its partitions contiguous.
        let mut guard = self.lock()?;
        let results = &mut *guard;
        results.stats.append(stats)?;
        results.p_values.append_slice(&p_values)?;
        for &p in &p_values {
            Self::tally(&mut results.counters, p, self.alpha, T::ID);
        }
        Ok(())
    }

    fn ingest_p_values(&mut self, values: &[f64]) -> Result<()> {
        self.require("ingest_p_values", DriverState::Iterate)?;
        if !self.descriptor.enabled {
            return Err(Error::Disabled { test: T::ID });
        }
        let partitions = self.descriptor.partitions;
        if values.len() % partitions != 0 {
            return Err(Error::PartitionMismatch {
                test: T::ID,
                got: values.len(),
                partitions,
            });
        }
        let alpha = self.alpha;
        let mut guard = self.lock()?;
        let results = &mut *guard;
        results.p_values.append_slice(values)?;
        for &p in values {
            Self::tally(&mut results.counters, p, alpha, T::ID);
        }
        log::debug!("{}: replayed {} archived p-values", T::ID, values.len());
        Ok(())
    }

    fn iterations(&self) -> Result<usize> {
        let partitions = self.descriptor.partitions;
        if partitions == 0 {
            return Ok(0);
        }
        Ok(self.lock()?.p_values.len() / partitions)
    }

    fn p_values(&self) -> Result<Vec<f64>> {
        Ok(self.lock()?.p_values.as_slice().to_vec())
    }

    fn print(&mut self, stats: &mut dyn Write, results: &mut dyn Write) -> Result<()> {
        self.require("print", DriverState::Iterate)?;
        if self.descriptor.enabled {
            let guard = self.lock()?;
            for record in guard.stats.iter() {
                serde_json::to_writer(&mut *stats, record)?;
                writeln!(stats)?;
            }
            for &p in guard.p_values.iter() {
                if is_non_p_value(p) {
                    writeln!(results, "inapplicable")?;
                } else {
                    writeln!(results, "{p:.6}")?;
                }
            }
            stats.flush()?;
            results.flush()?;
        }
        self.state = DriverState::Print;
        Ok(())
    }

    fn metrics(&mut self, cfg: &RunConfig) -> Result<TestMetrics> {
        self.require("metrics", DriverState::Print)?;
        self.state = DriverState::Metrics;
        if !self.descriptor.enabled {
            return Ok(TestMetrics::disabled(T::ID));
        }
        let partitions = self.descriptor.partitions;
        let guard = self.lock()?;
        let p_values = guard.p_values.as_slice();
        Ok(TestMetrics {
            test: T::ID,
            enabled: true,
            partitions,
            iterations: p_values.len() / partitions,
            inapplicable: guard.counters.inapplicable / partitions,
            verdicts: aggregate(T::ID, p_values, partitions, cfg),
        })
    }

    fn destroy(&mut self) -> Result<()> {
        if matches!(self.state, DriverState::Null | DriverState::Destroy) {
            return Err(Error::DriverState {
                test: T::ID,
                op: "destroy",
                state: self.state,
            });
        }
        *self.lock()? = TestResults::empty();
        self.test = None;
        self.state = DriverState::Destroy;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.require("reset", DriverState::Destroy)?;
        self.descriptor = TestDescriptor::new(T::ID);
        self.state = DriverState::Null;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockTest;
    use super::*;

    fn cfg() -> RunConfig {
        RunConfig {
            sequence_length: 8,
            iterations: 4,
            ..Default::default()
        }
    }

    fn ready() -> TestDriver<MockTest> {
        let mut d = TestDriver::<MockTest>::new();
        d.init(&cfg()).unwrap();
        d.begin_iterate().unwrap();
        d
    }

    #[test]
    fn test_full_lifecycle() {
        let mut d = ready();
        assert_eq!(d.state(), DriverState::Iterate);
        assert!(d.descriptor().enabled);
        assert_eq!(d.descriptor().partitions, 2);

        d.iterate(&BitSequence::from_bits(&[0, 1, 1, 0, 0, 0, 0, 0])).unwrap();
        d.iterate(&BitSequence::from_bits(&[1, 1, 1, 1, 1, 1, 1, 1])).unwrap();
        assert_eq!(d.iterations().unwrap(), 2);
        assert_eq!(d.p_values().unwrap(), vec![0.25, 0.25, NON_P_VALUE, NON_P_VALUE]);
        let c = d.counters().unwrap();
        assert_eq!(c.success, 2);
        assert_eq!(c.inapplicable, 2);

        let mut stats = Vec::new();
        let mut results = Vec::new();
        d.print(&mut stats, &mut results).unwrap();
        let stats = String::from_utf8(stats).unwrap();
        let results = String::from_utf8(results).unwrap();
        assert_eq!(stats.lines().count(), 2);
        assert!(stats.lines().next().unwrap().contains("\"ones\":2"));
        assert_eq!(
            results.lines().collect::<Vec<_>>(),
            vec!["0.250000", "0.250000", "inapplicable", "inapplicable"]
        );

        let m = d.metrics(&cfg()).unwrap();
        assert_eq!(m.verdicts.len(), 2);
        assert_eq!(m.iterations, 2);
        assert_eq!(m.inapplicable, 1);
        assert_eq!(m.verdicts[0].tally.sample_count, 1);

        d.destroy().unwrap();
        assert_eq!(d.state(), DriverState::Destroy);
        d.reset().unwrap();
        assert_eq!(d.state(), DriverState::Null);
        assert!(!d.descriptor().enabled);
    }

    #[test]
    fn test_out_of_order_is_fatal() {
        let mut d = TestDriver::<MockTest>::new();
        let bits = BitSequence::new(8);
        assert!(matches!(
            d.iterate(&bits),
            Err(Error::DriverState { op: "iterate", .. })
        ));
        assert!(d.metrics(&cfg()).is_err());
        assert!(d.destroy().is_err());
        d.init(&cfg()).unwrap();
        assert!(d.init(&cfg()).is_err());
        // Metrics before Print never reads the stores.
        d.begin_iterate().unwrap();
        assert!(matches!(
            d.metrics(&cfg()),
            Err(Error::DriverState {
                state: DriverState::Iterate,
                ..
            })
        ));
        assert!(d.reset().is_err());
    }

    #[test]
    fn test_invalid_parameters_disable() {
        let mut d = TestDriver::<MockTest>::new();
        let short = RunConfig {
            sequence_length: 4,
            ..cfg()
        };
        d.init(&short).unwrap();
        assert_eq!(d.state(), DriverState::Init);
        assert!(!d.descriptor().enabled);
        assert!(d.descriptor().disabled_reason.is_some());
        d.begin_iterate().unwrap();
        assert!(matches!(
            d.iterate(&BitSequence::new(4)),
            Err(Error::Disabled { .. })
        ));
        let mut sink = Vec::new();
        let mut sink2 = Vec::new();
        d.print(&mut sink, &mut sink2).unwrap();
        assert!(sink.is_empty() && sink2.is_empty());
        let m = d.metrics(&short).unwrap();
        assert!(!m.enabled);
        assert!(m.verdicts.is_empty());
    }

    #[test]
    fn test_unselected_is_disabled() {
        let mut d = TestDriver::<MockTest>::new();
        let mut c = cfg();
        c.tests.insert(TestId::Rank);
        d.init(&c).unwrap();
        assert!(!d.descriptor().enabled);
    }

    #[test]
    fn test_ingest_checks_partition_multiple() {
        let mut d = ready();
        d.ingest_p_values(&[0.1, 0.2, 0.3, 0.4]).unwrap();
        assert_eq!(d.iterations().unwrap(), 2);
        assert!(matches!(
            d.ingest_p_values(&[0.5]),
            Err(Error::PartitionMismatch { got: 1, .. })
        ));
    }

    #[test]
    fn test_concurrent_iterations_stay_contiguous() {
        let d = ready();
        std::thread::scope(|s| {
            for w in 0..4 {
                let d = &d;
                s.spawn(move || {
                    let mut bits = vec![0u8; 8];
                    bits[1..=w + 1].iter_mut().for_each(|b| *b = 1);
                    for _ in 0..50 {
                        d.iterate(&BitSequence::from_bits(&bits)).unwrap();
                    }
                });
            }
        });
        let p = d.p_values().unwrap();
        assert_eq!(p.len(), 400);
        for pair in p.chunks(2) {
            assert_eq!(pair[0], pair[1]);
        }
    }

    #[test]
    fn test_state_order() {
        assert!(DriverState::Null < DriverState::Init);
        assert!(DriverState::Print < DriverState::Metrics);
        assert_eq!(DriverState::Iterate.to_string(), "iterate");
    }
}

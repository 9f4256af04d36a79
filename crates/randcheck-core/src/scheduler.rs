//! Multi-threaded iteration scheduler.
//!
//! Workers share one ingestion lock guarding the remaining-iteration count and
//! the bit source. A worker claims a ticket and fills its private buffer while
//! holding the lock, then releases it and runs every enabled test on the
//! buffer. Result stores are serialized by each driver's own lock.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;

use serde::Serialize;

use crate::bits::BitSequence;
use crate::config::RunConfig;
use crate::driver::{Driver, DriverState};
use crate::error::{Error, Result};
use crate::source::BitSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Running,
    Drained,
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub iterations: usize,
    pub workers: usize,
    pub elapsed_ms: f64,
}

/// A claim on one iteration index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationTicket(pub usize);

struct Ingestion<'a> {
    remaining: usize,
    next: usize,
    source: &'a mut dyn BitSource,
}

impl Ingestion<'_> {
    /// Claim the next ticket and fill `buf` for it. `None` once drained.
    fn claim(&mut self, buf: &mut BitSequence) -> Result<Option<IterationTicket>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let ticket = IterationTicket(self.next);
        self.remaining -= 1;
        self.next += 1;
        self.source.seek(ticket.0)?;
        self.source.read_bits(buf)?;
        Ok(Some(ticket))
    }
}

/// Drives `iterations` sequences from one source through a set of drivers.
pub struct Scheduler {
    state: SchedulerState,
    iterations: usize,
    sequence_length: usize,
    workers: usize,
    report_cycle: usize,
}

impl Scheduler {
    /// Size the worker pool for `source`. Sequential sources always get one
    /// worker, and there are never more workers than iterations.
    pub fn new(cfg: &RunConfig, source: &dyn BitSource) -> Self {
        let requested = cfg.workers.unwrap_or_else(|| {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        let workers = if source.is_sequential() {
            1
        } else {
            requested.clamp(1, cfg.iterations.max(1))
        };
        Self {
            state: SchedulerState::Idle,
            iterations: cfg.iterations,
            sequence_length: cfg.sequence_length,
            workers,
            report_cycle: cfg.report_cycle,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run every iteration. Each driver must already be in `Iterate`; only
    /// enabled drivers are invoked. The first error stops all workers.
    pub fn run(
        &mut self,
        source: &mut dyn BitSource,
        drivers: &[Box<dyn Driver>],
    ) -> Result<RunSummary> {
        if self.state != SchedulerState::Idle {
            return Err(Error::Scheduler("run called twice"));
        }
        if drivers.iter().any(|d| d.state() != DriverState::Iterate) {
            return Err(Error::Scheduler("drivers must be in the iterate state"));
        }
        let active: Vec<&dyn Driver> = drivers
            .iter()
            .filter(|d| d.descriptor().enabled)
            .map(|d| &**d)
            .collect();

        self.state = SchedulerState::Running;
        log::info!(
            "running {} iterations of {} bits on {} worker(s), {} test(s) enabled, source {}",
            self.iterations,
            self.sequence_length,
            self.workers,
            active.len(),
            source.describe()
        );
        let start = Instant::now();

        let ingestion = Mutex::new(Ingestion {
            remaining: self.iterations,
            next: 0,
            source,
        });
        let completed = AtomicUsize::new(0);
        let abort = AtomicBool::new(false);
        let iterations = self.iterations;
        let report_cycle = self.report_cycle;
        let n = self.sequence_length;

        let outcomes: Vec<Result<()>> = thread::scope(|s| {
            let handles: Vec<_> = (0..self.workers)
                .map(|_| {
                    let ingestion = &ingestion;
                    let completed = &completed;
                    let abort = &abort;
                    let active = &active;
                    s.spawn(move || -> Result<()> {
                        let mut buf = BitSequence::new(n);
                        let result = worker_loop(ingestion, active, &mut buf, abort, || {
                            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                            if report_cycle > 0 && done % report_cycle == 0 {
                                log::info!("{done}/{iterations} iterations complete");
                            }
                        });
                        if result.is_err() {
                            abort.store(true, Ordering::Relaxed);
                        }
                        result
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or(Err(Error::WorkerPanicked)))
                .collect()
        });

        for outcome in outcomes {
            outcome?;
        }
        let done = completed.load(Ordering::Relaxed);
        if done != iterations {
            return Err(Error::Scheduler("iterations left unclaimed"));
        }
        self.state = SchedulerState::Drained;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        log::info!("{done} iterations drained in {elapsed_ms:.1} ms");
        Ok(RunSummary {
            iterations: done,
            workers: self.workers,
            elapsed_ms,
        })
    }
}

fn worker_loop(
    ingestion: &Mutex<Ingestion<'_>>,
    active: &[&dyn Driver],
    buf: &mut BitSequence,
    abort: &AtomicBool,
    on_complete: impl Fn(),
) -> Result<()> {
    loop {
        if abort.load(Ordering::Relaxed) {
            return Ok(());
        }
        let ticket = {
            let mut guard = ingestion
                .lock()
                .map_err(|_| Error::Poisoned("ingestion"))?;
            guard.claim(buf)?
        };
        if ticket.is_none() {
            return Ok(());
        }
        for driver in active {
            driver.iterate(buf)?;
        }
        on_complete();
    }
}

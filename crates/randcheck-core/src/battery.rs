//! Sequencing of the whole battery: init, iterate (live or replayed from
//! archives), print, metrics, destroy.

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::Path;

use crate::aggregate::TestMetrics;
use crate::archive::{self, ArchiveName, ArchiveRecord, ArchiveScan};
use crate::config::{RunConfig, TestId};
use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::scheduler::{RunSummary, Scheduler};
use crate::source::BitSource;

/// Name of the per-test diagnostic file written by [`Battery::print`].
pub const STATS_FILE: &str = "stats.jsonl";
/// Name of the per-test p-value file written by [`Battery::print`].
pub const RESULTS_FILE: &str = "results.txt";

/// A configured set of drivers run as one battery.
pub struct Battery {
    cfg: RunConfig,
    drivers: Vec<Box<dyn Driver>>,
}

impl Battery {
    /// Validate `cfg` and take ownership of the drivers.
    pub fn new(cfg: RunConfig, drivers: Vec<Box<dyn Driver>>) -> Result<Self> {
        cfg.validate()?;
        Ok(Self { cfg, drivers })
    }

    pub fn config(&self) -> &RunConfig {
        &self.cfg
    }

    pub fn drivers(&self) -> &[Box<dyn Driver>] {
        &self.drivers
    }

    pub fn driver(&self, test: TestId) -> Option<&dyn Driver> {
        self.drivers.iter().find(|d| d.id() == test).map(|d| &**d)
    }

    fn driver_mut(&mut self, test: TestId) -> Option<&mut Box<dyn Driver>> {
        self.drivers.iter_mut().find(|d| d.id() == test)
    }

    /// Tests that survived their parameter checks.
    pub fn enabled(&self) -> Vec<TestId> {
        self.drivers
            .iter()
            .filter(|d| d.descriptor().enabled)
            .map(|d| d.id())
            .collect()
    }

    /// Init every driver. Returns the number left enabled.
    pub fn init(&mut self) -> Result<usize> {
        for d in &mut self.drivers {
            d.init(&self.cfg)?;
        }
        let enabled = self.enabled().len();
        log::info!("{enabled} of {} test(s) enabled", self.drivers.len());
        Ok(enabled)
    }

    fn begin_iterate(&mut self) -> Result<()> {
        for d in &mut self.drivers {
            d.begin_iterate()?;
        }
        Ok(())
    }

    /// Feed `cfg.iterations` sequences from `source` through every enabled
    /// test.
    pub fn run(&mut self, source: &mut dyn BitSource) -> Result<RunSummary> {
        self.begin_iterate()?;
        let mut scheduler = Scheduler::new(&self.cfg, source);
        scheduler.run(source, &self.drivers)
    }

    /// Persist every enabled test's p-values as one archive file.
    pub fn write_archive(&self, dir: &Path, jobnum: u32) -> Result<std::path::PathBuf> {
        let mut records = Vec::new();
        for d in self.drivers.iter().filter(|d| d.descriptor().enabled) {
            records.push(ArchiveRecord {
                test: d.id(),
                p_values: d.p_values()?,
            });
        }
        let name = ArchiveName {
            jobnum,
            iterations: self.cfg.iterations,
            bitcount: self.cfg.sequence_length,
        };
        archive::write_archive(dir, &name, &records)
    }

    /// Replay every archive in `scan` instead of running live iterations.
    /// Records for tests that are disabled in this run are skipped.
    pub fn load_archives(&mut self, scan: &ArchiveScan) -> Result<usize> {
        self.begin_iterate()?;
        let mut replayed = 0;
        for path in &scan.files {
            for record in archive::read_archive(path)? {
                let Some(driver) = self.driver_mut(record.test) else {
                    log::debug!("{}: no driver for {}", path.display(), record.test);
                    continue;
                };
                if !driver.descriptor().enabled {
                    log::debug!("{}: skipping disabled {}", path.display(), record.test);
                    continue;
                }
                driver.ingest_p_values(&record.p_values)?;
                replayed += 1;
            }
        }
        for d in self.drivers.iter().filter(|d| d.descriptor().enabled) {
            let got = d.iterations()?;
            if got != self.cfg.iterations {
                let dir = scan
                    .files
                    .first()
                    .and_then(|f| f.parent())
                    .map_or_else(String::new, |p| p.display().to_string());
                return Err(Error::Archive {
                    path: dir,
                    reason: format!(
                        "{} replayed {got} iteration(s), file names declare {}",
                        d.id(),
                        self.cfg.iterations
                    ),
                });
            }
        }
        log::info!(
            "replayed {replayed} record(s) from {} archive(s)",
            scan.files.len()
        );
        Ok(replayed)
    }

    /// Write each enabled test's stats and p-values under `dir/<TestName>/`.
    pub fn print(&mut self, dir: &Path) -> Result<()> {
        for d in &mut self.drivers {
            if !d.descriptor().enabled {
                d.print(&mut io::sink(), &mut io::sink())?;
                continue;
            }
            let test_dir = dir.join(d.id().name());
            fs::create_dir_all(&test_dir)?;
            let mut stats = BufWriter::new(File::create(test_dir.join(STATS_FILE))?);
            let mut results = BufWriter::new(File::create(test_dir.join(RESULTS_FILE))?);
            d.print(&mut stats, &mut results)?;
        }
        Ok(())
    }

    /// Print without writing any files.
    pub fn print_to_sink(&mut self) -> Result<()> {
        for d in &mut self.drivers {
            d.print(&mut io::sink(), &mut io::sink())?;
        }
        Ok(())
    }

    /// Aggregate every test. Disabled tests report no verdicts.
    pub fn metrics(&mut self) -> Result<Vec<TestMetrics>> {
        let mut out = Vec::with_capacity(self.drivers.len());
        for d in &mut self.drivers {
            out.push(d.metrics(&self.cfg)?);
        }
        Ok(out)
    }

    pub fn destroy(&mut self) -> Result<()> {
        let mut first_err: Option<Error> = None;
        for d in &mut self.drivers {
            if let Err(e) = d.destroy() {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

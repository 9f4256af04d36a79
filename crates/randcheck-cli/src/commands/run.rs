use std::path::Path;

use randcheck_core::{
    Battery, BitEncoding, BitSource, Error, FileSource, GeneratorKind, GeneratorSource, Result,
};

use crate::ConfigArgs;

pub struct RunCommandConfig<'a> {
    pub config: &'a ConfigArgs,
    pub iterations: Option<usize>,
    pub input: Option<&'a Path>,
    pub format: &'a str,
    pub offset: u64,
    pub generator: Option<&'a str>,
    pub seed: u64,
    pub workers: Option<usize>,
    pub report_cycle: Option<usize>,
    pub output_dir: Option<&'a Path>,
    pub json_path: Option<&'a Path>,
    pub archive_dir: Option<&'a Path>,
    pub jobnum: u32,
    pub iterate_only: bool,
}

pub fn run(cmd: RunCommandConfig<'_>) -> Result<()> {
    let mut cfg = super::build_config(cmd.config, cmd.iterations)?;
    if cmd.workers.is_some() {
        cfg.workers = cmd.workers;
    }
    if let Some(c) = cmd.report_cycle {
        cfg.report_cycle = c;
    }
    cfg.validate()?;

    let mut source = open_source(&cmd, cfg.sequence_length)?;

    let mut battery = Battery::new(cfg, randcheck_tests::all_drivers())?;
    if battery.init()? == 0 {
        return Err(Error::Config("no test is enabled for this configuration".into()));
    }

    println!(
        "Testing {} sequence(s) of {} bits from {}",
        battery.config().iterations,
        battery.config().sequence_length,
        source.describe()
    );
    let summary = battery.run(source.as_mut())?;
    println!(
        "{} iteration(s) on {} worker(s) in {:.1}s",
        summary.iterations,
        summary.workers,
        summary.elapsed_ms / 1000.0
    );

    if let Some(dir) = cmd.archive_dir {
        std::fs::create_dir_all(dir)?;
        let path = battery.write_archive(dir, cmd.jobnum)?;
        println!("p-values archived to: {}", path.display());
    }
    if cmd.iterate_only {
        return battery.destroy();
    }

    if let Some(dir) = cmd.output_dir {
        std::fs::create_dir_all(dir)?;
    }
    super::finish(battery, Some(&summary), cmd.output_dir, cmd.json_path)
}

/// The file named by `--input`, else the builtin named by `--generator`.
fn open_source(cmd: &RunCommandConfig<'_>, sequence_length: usize) -> Result<Box<dyn BitSource>> {
    match (cmd.input, cmd.generator) {
        (Some(path), _) => {
            let encoding: BitEncoding = cmd.format.parse()?;
            Ok(Box::new(FileSource::open(
                path,
                encoding,
                sequence_length,
                cmd.offset,
            )?))
        }
        (None, Some(name)) => {
            let kind: GeneratorKind = name.parse()?;
            Ok(Box::new(GeneratorSource::new(kind, cmd.seed)))
        }
        (None, None) => Err(Error::Config(
            "either --input or --generator is required".into(),
        )),
    }
}

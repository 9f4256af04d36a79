pub mod assess;
pub mod list;
pub mod run;
pub mod summary;

use std::collections::BTreeSet;
use std::path::Path;

use randcheck_core::{Battery, Result, RunConfig, RunSummary, TestId};

use crate::ConfigArgs;

/// Parse a comma-separated list of test ids or names. "all" selects every
/// test, which is the same as an empty set.
pub fn parse_tests(list: &str) -> Result<BTreeSet<TestId>> {
    if list.trim().eq_ignore_ascii_case("all") {
        return Ok(BTreeSet::new());
    }
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<TestId>())
        .collect()
}

/// Defaults, then the JSON file named by `--config`, then explicit flags.
pub fn build_config(args: &ConfigArgs, iterations: Option<usize>) -> Result<RunConfig> {
    let mut cfg = match &args.config {
        Some(path) => RunConfig::from_json_file(path)?,
        None => RunConfig::default(),
    };
    if let Some(n) = args.bits {
        cfg.sequence_length = n;
    }
    if let Some(i) = iterations {
        cfg.iterations = i;
    }
    if let Some(list) = &args.tests {
        cfg.tests = parse_tests(list)?;
    }
    if let Some(a) = args.alpha {
        cfg.alpha = a;
    }
    if let Some(b) = args.bins {
        cfg.uniformity_bins = Some(b);
    }
    if let Some(u) = args.uniformity_level {
        cfg.uniformity_level = u;
    }
    if args.legacy {
        cfg.legacy = true;
    }
    let p = &mut cfg.params;
    let overrides = [
        (&mut p.block_frequency, args.block_frequency_m),
        (&mut p.non_overlapping_template, args.non_overlapping_m),
        (&mut p.overlapping_template, args.overlapping_m),
        (&mut p.approximate_entropy, args.approximate_entropy_m),
        (&mut p.serial, args.serial_m),
        (&mut p.linear_complexity, args.linear_complexity_m),
    ];
    for (slot, value) in overrides {
        if let Some(v) = value {
            *slot = v;
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

/// Print, aggregate and report a battery whose iterations are complete.
pub fn finish(
    mut battery: Battery,
    run: Option<&RunSummary>,
    output_dir: Option<&Path>,
    json_path: Option<&Path>,
) -> Result<()> {
    match output_dir {
        Some(dir) => {
            battery.print(dir)?;
            log::info!("per-test results written under {}", dir.display());
        }
        None => battery.print_to_sink()?,
    }
    let metrics = battery.metrics()?;

    let report = summary::render(battery.config(), &metrics);
    print!("{report}");
    if let Some(dir) = output_dir {
        let path = dir.join(summary::REPORT_FILE);
        std::fs::write(&path, &report)?;
        println!("\nReport saved to: {}", path.display());
    }

    if let Some(path) = json_path {
        let export = summary::VerdictExport::new(battery.config(), run, &metrics);
        let json = serde_json::to_string_pretty(&export)?;
        std::fs::write(path, json)?;
        println!("Verdicts saved to: {}", path.display());
    }

    battery.destroy()
}

use std::path::Path;

use randcheck_core::{Battery, Error, Result, scan_directory};

use crate::ConfigArgs;

/// Replay every archive in `pvalues_dir` matching `-n` and aggregate the
/// combined p-values as one run.
pub fn run(
    args: &ConfigArgs,
    pvalues_dir: &Path,
    output_dir: Option<&Path>,
    json_path: Option<&Path>,
) -> Result<()> {
    let base = super::build_config(args, None)?;
    let scan = scan_directory(pvalues_dir, base.sequence_length)?;
    if scan.files.is_empty() {
        return Err(Error::Config(format!(
            "no archives for {}-bit sequences in {}",
            base.sequence_length,
            pvalues_dir.display()
        )));
    }
    println!(
        "Assessing {} iteration(s) from {} archive(s)",
        scan.iterations,
        scan.files.len()
    );

    let cfg = randcheck_core::RunConfig {
        iterations: scan.iterations,
        ..base
    };
    let mut battery = Battery::new(cfg, randcheck_tests::all_drivers())?;
    battery.init()?;
    battery.load_archives(&scan)?;

    if let Some(dir) = output_dir {
        std::fs::create_dir_all(dir)?;
    }
    super::finish(battery, None, output_dir, json_path)
}

//! CLI for randcheck, the NIST SP 800-22 statistical test battery.

mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "randcheck")]
#[command(about = "randcheck: NIST SP 800-22 statistical tests for random bit generators")]
#[command(version = randcheck_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by `run` and `assess` that shape the configuration.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// JSON configuration file; flags given on the command line override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bits per sequence
    #[arg(short = 'n', long = "bits")]
    bits: Option<usize>,

    /// Comma-separated test ids or names (default: all)
    #[arg(long)]
    tests: Option<String>,

    /// Significance level for each p-value
    #[arg(long)]
    alpha: Option<f64>,

    /// Uniformity histogram bins (default: floor(sqrt(iterations)))
    #[arg(long)]
    bins: Option<usize>,

    /// Minimum uniformity p-value
    #[arg(long)]
    uniformity_level: Option<f64>,

    /// Use the fixed 10-bin uniformity histogram of the reference suite
    #[arg(long)]
    legacy: bool,

    /// Block length M for block frequency
    #[arg(long)]
    block_frequency_m: Option<usize>,

    /// Template length m for non-overlapping templates
    #[arg(long)]
    non_overlapping_m: Option<usize>,

    /// Template length m for overlapping templates
    #[arg(long)]
    overlapping_m: Option<usize>,

    /// Block length m for approximate entropy
    #[arg(long)]
    approximate_entropy_m: Option<usize>,

    /// Block length m for the serial test
    #[arg(long)]
    serial_m: Option<usize>,

    /// Block length M for linear complexity
    #[arg(long)]
    linear_complexity_m: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the battery over a file or a builtin generator
    Run {
        #[command(flatten)]
        config: ConfigArgs,

        /// Number of sequences to test
        #[arg(short = 'i', long)]
        iterations: Option<usize>,

        /// Read bits from this file
        #[arg(long, conflicts_with = "generator")]
        input: Option<PathBuf>,

        /// Input encoding: ascii ('0'/'1' characters) or binary (packed bytes)
        #[arg(long, default_value = "binary", value_parser = ["ascii", "binary"])]
        format: String,

        /// Bytes to skip at the start of the input file
        #[arg(long, default_value = "0")]
        offset: u64,

        /// Builtin generator (see `randcheck list`)
        #[arg(long)]
        generator: Option<String>,

        /// Generator seed
        #[arg(long, default_value = "1")]
        seed: u64,

        /// Worker threads (default: min(cores, iterations))
        #[arg(long)]
        workers: Option<usize>,

        /// Log progress every N completed iterations
        #[arg(long)]
        report_cycle: Option<usize>,

        /// Write per-test stats and results under this directory
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Write verdicts as JSON
        #[arg(long)]
        json: Option<PathBuf>,

        /// Archive raw p-values to this directory for a later `assess`
        #[arg(long)]
        write_pvalues: Option<PathBuf>,

        /// Job number embedded in the archive file name
        #[arg(long, default_value = "0")]
        jobnum: u32,

        /// Stop after iterating (and archiving); skip print and metrics
        #[arg(long, requires = "write_pvalues")]
        iterate_only: bool,
    },

    /// Aggregate p-value archives written by earlier `run --write-pvalues` jobs
    Assess {
        #[command(flatten)]
        config: ConfigArgs,

        /// Directory holding sts.*.pvalues archives
        #[arg(long)]
        pvalues_dir: PathBuf,

        /// Write per-test stats and results under this directory
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Write verdicts as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// List tests and builtin generators
    List,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            config,
            iterations,
            input,
            format,
            offset,
            generator,
            seed,
            workers,
            report_cycle,
            output_dir,
            json,
            write_pvalues,
            jobnum,
            iterate_only,
        } => commands::run::run(commands::run::RunCommandConfig {
            config: &config,
            iterations,
            input: input.as_deref(),
            format: &format,
            offset,
            generator: generator.as_deref(),
            seed,
            workers,
            report_cycle,
            output_dir: output_dir.as_deref(),
            json_path: json.as_deref(),
            archive_dir: write_pvalues.as_deref(),
            jobnum,
            iterate_only,
        }),
        Commands::Assess {
            config,
            pvalues_dir,
            output_dir,
            json,
        } => commands::assess::run(
            &config,
            &pvalues_dir,
            output_dir.as_deref(),
            json.as_deref(),
        ),
        Commands::List => {
            commands::list::run();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

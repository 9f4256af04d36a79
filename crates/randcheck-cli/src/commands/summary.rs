//! Text summary report and JSON verdict export.

use randcheck_core::{Proportion, RunConfig, RunSummary, TestMetrics, Uniformity};
use serde::Serialize;

/// Summary report written next to the per-test directories.
pub const REPORT_FILE: &str = "summary.txt";

/// JSON document written by `--json`.
#[derive(Serialize)]
pub struct VerdictExport<'a> {
    pub version: &'static str,
    pub config: &'a RunConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<&'a RunSummary>,
    pub passed: bool,
    pub tests: &'a [TestMetrics],
}

impl<'a> VerdictExport<'a> {
    pub fn new(
        config: &'a RunConfig,
        run: Option<&'a RunSummary>,
        tests: &'a [TestMetrics],
    ) -> Self {
        Self {
            version: randcheck_core::VERSION,
            config,
            run,
            passed: tests.iter().all(TestMetrics::passed),
            tests,
        }
    }
}

fn uniformity_cell(u: &Uniformity) -> String {
    match u {
        Uniformity::Pass { p_value } => format!("{p_value:.6} "),
        Uniformity::Fail { p_value } => format!("{p_value:.6}*"),
        Uniformity::NotEvaluable => "    ----  ".to_string(),
    }
}

fn proportion_cell(p: &Proportion, sample_count: usize) -> String {
    match p {
        Proportion::Pass { passed, .. } => format!("{passed:>5}/{sample_count:<5} "),
        Proportion::Fail { passed, .. } => format!("{passed:>5}/{sample_count:<5}*"),
        Proportion::NotEvaluable => "     ----   ".to_string(),
    }
}

/// Render the per-partition uniformity and proportion table.
pub fn render(cfg: &RunConfig, metrics: &[TestMetrics]) -> String {
    let mut out = String::new();
    let bins = cfg.bins();
    let rule = "-".repeat(12 + 5 * bins + 36);

    out.push_str(&format!("{rule}\n"));
    out.push_str(
        "RESULTS FOR THE UNIFORMITY OF P-VALUES AND THE PROPORTION OF PASSING SEQUENCES\n",
    );
    out.push_str(&format!(
        "{} sequence(s) of {} bits, alpha = {}, {} uniformity bin(s)\n",
        cfg.iterations, cfg.sequence_length, cfg.alpha, bins
    ));
    out.push_str(&format!("{rule}\n"));
    let header: String = (1..=bins).map(|i| format!("{:>5}", format!("C{i}"))).collect();
    out.push_str(&format!("{header}  P-VALUE   PROPORTION  STATISTICAL TEST\n"));
    out.push_str(&format!("{rule}\n"));

    let mut failures = 0usize;
    let mut verdicts = 0usize;
    for m in metrics.iter().filter(|m| m.enabled) {
        for v in &m.verdicts {
            verdicts += 1;
            if !v.passed() {
                failures += 1;
            }
            let row: String = v.tally.bins.iter().map(|c| format!("{c:>5}")).collect();
            let partition = if m.partitions > 1 {
                format!(" [{}]", v.partition + 1)
            } else {
                String::new()
            };
            out.push_str(&format!(
                "{row}  {}  {}  {}{partition}\n",
                uniformity_cell(&v.uniformity),
                proportion_cell(&v.proportion, v.tally.sample_count),
                m.test
            ));
        }
        if m.inapplicable > 0 {
            out.push_str(&format!(
                "  {}: {} of {} iteration(s) inapplicable\n",
                m.test, m.inapplicable, m.iterations
            ));
        }
    }

    out.push_str(&format!("{rule}\n"));
    out.push_str(&format!(
        "Uniformity fails below {}; '*' marks a failed verdict.\n",
        cfg.uniformity_level
    ));
    if let Some((lower, upper)) = Proportion::bounds(cfg.iterations, cfg.alpha) {
        out.push_str(&format!(
            "For {} sequence(s) the passing proportion must lie in [{:.2}, {:.2}].\n",
            cfg.iterations, lower, upper
        ));
    }
    let disabled: Vec<String> = metrics
        .iter()
        .filter(|m| !m.enabled)
        .map(|m| m.test.to_string())
        .collect();
    if !disabled.is_empty() {
        out.push_str(&format!("Not run: {}\n", disabled.join(", ")));
    }
    out.push_str(&format!("{failures} of {verdicts} verdict(s) failed.\n"));
    out
}

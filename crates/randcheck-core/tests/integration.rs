//! Integration tests for randcheck-core.
//!
//! These drive the full engine with a toy test:
//! file source → scheduler → driver stores → archive → aggregation.

use std::io::Write;

use randcheck_core::{
    Battery, BitEncoding, BitSequence, Driver, DriverState, FileSource, Iteration, NON_P_VALUE,
    RunConfig, StatisticalTest, TestDriver, TestId, Uniformity, read_archive, scan_directory,
};
use serde::Serialize;

/// Reports the fraction of ones; all-zero sequences are inapplicable.
struct OnesFraction;

#[derive(Debug, Clone, Serialize)]
struct OnesStats {
    ones: usize,
}

impl StatisticalTest for OnesFraction {
    type Stats = OnesStats;
    const ID: TestId = TestId::Frequency;

    fn configure(cfg: &RunConfig) -> Result<Self, String> {
        if cfg.sequence_length < 4 {
            return Err("too short".into());
        }
        Ok(Self)
    }

    fn partitions(&self) -> usize {
        1
    }

    fn iterate(&self, bits: &BitSequence) -> Iteration<OnesStats> {
        let ones = bits.ones();
        let stats = OnesStats { ones };
        if ones == 0 {
            return Iteration::Inapplicable { stats };
        }
        Iteration::Applicable {
            stats,
            p_values: vec![ones as f64 / bits.len() as f64],
        }
    }
}

fn battery(iterations: usize, workers: usize) -> Battery {
    let cfg = RunConfig {
        sequence_length: 16,
        iterations,
        workers: Some(workers),
        ..Default::default()
    };
    let drivers: Vec<Box<dyn Driver>> = vec![Box::new(TestDriver::<OnesFraction>::new())];
    Battery::new(cfg, drivers).unwrap()
}

fn sorted(mut v: Vec<f64>) -> Vec<f64> {
    v.sort_by(|a, b| a.total_cmp(b));
    v
}

#[test]
fn ascii_file_with_whitespace_runs_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("bits.txt");
    let mut f = std::fs::File::create(&path).unwrap();
    // Sequence i has 4 * i ones; the first is all zeros.
    for i in 0..4 {
        let line: String = (0..16).map(|j| if j < 4 * i { '1' } else { '0' }).collect();
        writeln!(f, "{} {}", &line[..8], &line[8..]).unwrap();
    }
    drop(f);

    let mut b = battery(4, 1);
    assert_eq!(b.init().unwrap(), 1);
    let mut source = FileSource::open(&path, BitEncoding::Ascii, 16, 0).unwrap();
    let summary = b.run(&mut source).unwrap();
    assert_eq!(summary.iterations, 4);

    let p = b.driver(TestId::Frequency).unwrap().p_values().unwrap();
    assert_eq!(p, vec![NON_P_VALUE, 0.25, 0.5, 0.75]);

    b.print(tmp.path()).unwrap();
    let results =
        std::fs::read_to_string(tmp.path().join("Frequency").join("results.txt")).unwrap();
    assert_eq!(results, "inapplicable\n0.250000\n0.500000\n0.750000\n");
    let stats = std::fs::read_to_string(tmp.path().join("Frequency").join("stats.jsonl")).unwrap();
    assert_eq!(stats.lines().count(), 4);

    let metrics = b.metrics().unwrap();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].iterations, 4);
    assert_eq!(metrics[0].inapplicable, 1);
    assert_eq!(metrics[0].verdicts[0].tally.sample_count, 3);
    assert_eq!(metrics[0].verdicts[0].tally.skipped, 1);
    b.destroy().unwrap();
    assert_eq!(b.drivers()[0].state(), DriverState::Destroy);
}

#[test]
fn binary_file_matches_across_worker_counts() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("bits.bin");
    let data: Vec<u8> = (0..64u32).map(|i| (i.wrapping_mul(37) ^ 0x5a) as u8).collect();
    std::fs::write(&path, &data).unwrap();

    let mut single = battery(32, 1);
    single.init().unwrap();
    single
        .run(&mut FileSource::open(&path, BitEncoding::Binary, 16, 0).unwrap())
        .unwrap();

    let mut parallel = battery(32, 4);
    parallel.init().unwrap();
    parallel
        .run(&mut FileSource::open(&path, BitEncoding::Binary, 16, 0).unwrap())
        .unwrap();

    let a = single.driver(TestId::Frequency).unwrap().p_values().unwrap();
    let b = parallel.driver(TestId::Frequency).unwrap().p_values().unwrap();
    assert_eq!(a.len(), 32);
    assert_eq!(sorted(a), sorted(b));
}

#[test]
fn short_file_is_a_fatal_error() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("short.bin");
    std::fs::write(&path, [0xffu8; 3]).unwrap();

    let mut b = battery(2, 2);
    b.init().unwrap();
    let err = b
        .run(&mut FileSource::open(&path, BitEncoding::Binary, 16, 0).unwrap())
        .unwrap_err();
    assert!(err.to_string().contains("exhausted"), "{err}");
}

#[test]
fn archive_replay_reproduces_metrics() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("bits.bin");
    let data: Vec<u8> = (0..40u32).map(|i| (i * 91 + 7) as u8).collect();
    std::fs::write(&path, &data).unwrap();

    let mut live = battery(20, 2);
    live.init().unwrap();
    live.run(&mut FileSource::open(&path, BitEncoding::Binary, 16, 0).unwrap())
        .unwrap();
    let written = live.write_archive(tmp.path(), 7).unwrap();
    assert!(written.ends_with("sts.0007.20.16.pvalues"));
    assert_eq!(read_archive(&written).unwrap().len(), 1);

    let scan = scan_directory(tmp.path(), 16).unwrap();
    assert_eq!(scan.iterations, 20);
    let mut replay = battery(scan.iterations, 1);
    replay.init().unwrap();
    assert_eq!(replay.load_archives(&scan).unwrap(), 1);

    live.print_to_sink().unwrap();
    replay.print_to_sink().unwrap();
    let a = live.metrics().unwrap();
    let b = replay.metrics().unwrap();
    assert_eq!(a[0].verdicts[0].tally, b[0].verdicts[0].tally);
    assert_eq!(
        a[0].verdicts[0].uniformity.p_value(),
        b[0].verdicts[0].uniformity.p_value()
    );
    assert!(!matches!(b[0].verdicts[0].uniformity, Uniformity::NotEvaluable));
}

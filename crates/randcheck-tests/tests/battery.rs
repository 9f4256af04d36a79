//! Whole-battery tests: every test module driven through the scheduler,
//! aggregator and archive.

use std::collections::BTreeSet;

use randcheck_core::archive::write_archive;
use randcheck_core::{
    ArchiveName, ArchiveRecord, Battery, BitSequence, BitSource, GeneratorKind, GeneratorSource,
    MemorySource, NON_P_VALUE, RunConfig, TestId, TestParams, scan_directory,
};
use randcheck_tests::all_drivers;

const N: usize = 40_000;

/// Parameters that keep every test except Maurer's universal enabled at
/// `N` bits.
fn config(iterations: usize, workers: usize) -> RunConfig {
    RunConfig {
        sequence_length: N,
        iterations,
        workers: Some(workers),
        params: TestParams {
            approximate_entropy: 5,
            serial: 8,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// `iterations * N` bits of SHA-256 output, starting at sequence `skip`.
fn generated_bits(skip: usize, iterations: usize) -> Vec<u8> {
    let mut source = GeneratorSource::new(GeneratorKind::Sha256, 2024);
    let mut buf = BitSequence::new(N);
    let mut bits = Vec::with_capacity(iterations * N);
    for i in 0..skip + iterations {
        source.seek(i).unwrap();
        source.read_bits(&mut buf).unwrap();
        if i >= skip {
            bits.extend_from_slice(buf.as_slice());
        }
    }
    bits
}

fn run_battery(cfg: RunConfig, bits: Vec<u8>) -> Battery {
    let mut battery = Battery::new(cfg, all_drivers()).unwrap();
    battery.init().unwrap();
    battery.run(&mut MemorySource::new(bits, N)).unwrap();
    battery
}

fn sorted(mut v: Vec<f64>) -> Vec<f64> {
    v.sort_by(|a, b| a.total_cmp(b));
    v
}

#[test]
fn every_test_appends_exactly_its_partitions() {
    let iterations = 3;
    let battery = run_battery(config(iterations, 2), generated_bits(0, iterations));
    let enabled: BTreeSet<TestId> = battery.enabled().into_iter().collect();
    assert!(!enabled.contains(&TestId::Universal));
    assert_eq!(enabled.len(), 14);

    for d in battery.drivers() {
        let desc = d.descriptor();
        if !desc.enabled {
            assert_eq!(d.iterations().unwrap(), 0);
            continue;
        }
        let p = d.p_values().unwrap();
        assert_eq!(p.len(), iterations * desc.partitions, "{}", d.id());
        for &v in &p {
            assert!(v == NON_P_VALUE || (0.0..=1.0).contains(&v), "{}: {v}", d.id());
        }
    }

    let excursions = battery.driver(TestId::RandomExcursions).unwrap();
    assert_eq!(excursions.descriptor().partitions, 8);
    let variant = battery.driver(TestId::RandomExcursionsVariant).unwrap();
    assert_eq!(variant.descriptor().partitions, 18);
    // 40 000 bits rarely reach 500 cycles; inapplicable iterations fill
    // every partition with the sentinel.
    for chunk in excursions.p_values().unwrap().chunks(8) {
        let sentinels = chunk.iter().filter(|&&p| p == NON_P_VALUE).count();
        assert!(sentinels == 0 || sentinels == 8);
    }
}

#[test]
fn worker_count_does_not_change_p_values() {
    let iterations = 6;
    let bits = generated_bits(0, iterations);
    let single = run_battery(config(iterations, 1), bits.clone());
    let parallel = run_battery(config(iterations, 4), bits);
    for test in single.enabled() {
        let a = single.driver(test).unwrap().p_values().unwrap();
        let b = parallel.driver(test).unwrap().p_values().unwrap();
        assert_eq!(sorted(a), sorted(b), "{test}");
    }
}

#[test]
fn all_zeros_fails_frequency() {
    let mut cfg = config(2, 2);
    cfg.tests = [TestId::Frequency, TestId::BlockFrequency, TestId::Runs]
        .into_iter()
        .collect();
    let mut battery = run_battery(cfg, vec![0; 2 * N]);
    let frequency = battery.driver(TestId::Frequency).unwrap().p_values().unwrap();
    assert!(frequency.iter().all(|&p| p < 1e-10));
    battery.print_to_sink().unwrap();
    let metrics = battery.metrics().unwrap();
    let freq = metrics.iter().find(|m| m.test == TestId::Frequency).unwrap();
    assert!(!freq.passed());
    assert_eq!(freq.verdicts[0].tally.too_low, 2);
}

#[test]
fn alternating_bits_pass_block_frequency_and_fail_runs() {
    let mut cfg = config(2, 2);
    cfg.tests = [TestId::BlockFrequency, TestId::Runs].into_iter().collect();
    let bits = (0..2 * N).map(|i| (i % 2) as u8).collect();
    let battery = run_battery(cfg, bits);
    let block = battery.driver(TestId::BlockFrequency).unwrap().p_values().unwrap();
    assert!(block.iter().all(|&p| p > 0.99));
    let runs = battery.driver(TestId::Runs).unwrap().p_values().unwrap();
    assert!(runs.iter().all(|&p| p < 1e-10));
    assert!(battery.driver(TestId::Frequency).unwrap().p_values().unwrap().is_empty());
}

#[test]
fn archives_split_across_jobs_match_a_single_run() {
    let tmp = tempfile::tempdir().unwrap();
    let whole = run_battery(config(5, 2), generated_bits(0, 5));

    let first = run_battery(config(3, 2), generated_bits(0, 3));
    first.write_archive(tmp.path(), 0).unwrap();
    let second = run_battery(config(2, 1), generated_bits(3, 2));
    second.write_archive(tmp.path(), 1).unwrap();

    let scan = scan_directory(tmp.path(), N).unwrap();
    assert_eq!(scan.files.len(), 2);
    assert_eq!(scan.iterations, 5);

    let mut cfg = config(scan.iterations, 1);
    cfg.workers = None;
    let mut replay = Battery::new(cfg, all_drivers()).unwrap();
    replay.init().unwrap();
    replay.load_archives(&scan).unwrap();

    for test in whole.enabled() {
        let original = whole.driver(test).unwrap().p_values().unwrap();
        let restored = replay.driver(test).unwrap().p_values().unwrap();
        assert_eq!(sorted(original), sorted(restored), "{test}");
    }

    replay.print(tmp.path()).unwrap();
    let metrics = replay.metrics().unwrap();
    for m in &metrics {
        if m.enabled {
            assert_eq!(m.iterations, 5, "{}", m.test);
            assert_eq!(m.verdicts.len(), m.partitions);
        }
    }
    assert!(tmp.path().join("Frequency").join("results.txt").exists());
    replay.destroy().unwrap();
}

#[test]
fn disabled_tests_are_never_invoked_or_aggregated() {
    let mut battery = run_battery(config(2, 2), generated_bits(0, 2));
    let universal = battery.driver(TestId::Universal).unwrap();
    assert!(!universal.descriptor().enabled);
    assert!(universal.descriptor().disabled_reason.is_some());
    assert!(universal.p_values().unwrap().is_empty());

    battery.print_to_sink().unwrap();
    let metrics = battery.metrics().unwrap();
    let m = metrics.iter().find(|m| m.test == TestId::Universal).unwrap();
    assert!(!m.enabled);
    assert!(m.verdicts.is_empty());
}

#[test]
fn excursion_zeros_are_not_samples_after_replay() {
    let tmp = tempfile::tempdir().unwrap();
    let column = [NON_P_VALUE, 0.0, 0.3, 0.0, 0.7];
    let second = [NON_P_VALUE, 0.5, 0.3, 0.0, 0.005];
    // Eight excursion states per iteration; states 2..8 repeat 0.4.
    let excursions: Vec<f64> = column
        .iter()
        .zip(&second)
        .flat_map(|(&a, &b)| {
            let rest = if a == NON_P_VALUE { NON_P_VALUE } else { 0.4 };
            [a, b, rest, rest, rest, rest, rest, rest]
        })
        .collect();
    let records = [
        ArchiveRecord {
            test: TestId::Frequency,
            p_values: column.to_vec(),
        },
        ArchiveRecord {
            test: TestId::RandomExcursions,
            p_values: excursions,
        },
    ];
    let name = ArchiveName {
        jobnum: 0,
        iterations: column.len(),
        bitcount: N,
    };
    write_archive(tmp.path(), &name, &records).unwrap();

    let scan = scan_directory(tmp.path(), N).unwrap();
    let mut cfg = config(scan.iterations, 1);
    cfg.tests = [TestId::Frequency, TestId::RandomExcursions].into();
    let mut battery = Battery::new(cfg, all_drivers()).unwrap();
    assert_eq!(battery.init().unwrap(), 2);
    assert_eq!(battery.load_archives(&scan).unwrap(), 2);
    battery.print_to_sink().unwrap();
    let metrics = battery.metrics().unwrap();

    let excursion = metrics
        .iter()
        .find(|m| m.test == TestId::RandomExcursions)
        .unwrap();
    assert_eq!(excursion.iterations, 5);
    assert_eq!(excursion.inapplicable, 1);
    assert_eq!(excursion.verdicts.len(), 8);
    let first = &excursion.verdicts[0].tally;
    assert_eq!((first.skipped, first.sample_count, first.too_low), (3, 2, 0));
    let state = &excursion.verdicts[1].tally;
    assert_eq!((state.skipped, state.sample_count, state.too_low), (2, 3, 1));

    // For the frequency test the same zeros are failing samples.
    let frequency = metrics.iter().find(|m| m.test == TestId::Frequency).unwrap();
    let tally = &frequency.verdicts[0].tally;
    assert_eq!((tally.skipped, tally.sample_count, tally.too_low), (1, 4, 2));
    battery.destroy().unwrap();
}

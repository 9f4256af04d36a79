//! Binary p-value archives for merging partial runs.
//!
//! A file is a sequence of records, each a little-endian `i64` test id, an
//! `i64` value count, and that many `f64` p-values. Reading stops at EOF or at
//! a test id outside `1..=15`. Files are named
//! `sts.<jobnum:04>.<iterations>.<bits>.pvalues` and written under a `.work`
//! suffix, then renamed into place.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use crate::config::TestId;
use crate::error::{Error, Result};

const PREFIX: &str = "sts";
const SUFFIX: &str = "pvalues";

/// One archived block of p-values for a single test.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveRecord {
    pub test: TestId,
    pub p_values: Vec<f64>,
}

/// Parsed archive file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveName {
    pub jobnum: u32,
    pub iterations: usize,
    pub bitcount: usize,
}

impl ArchiveName {
    pub fn file_name(&self) -> String {
        format!(
            "{PREFIX}.{:04}.{}.{}.{SUFFIX}",
            self.jobnum, self.iterations, self.bitcount
        )
    }

    /// Parse `sts.<job>.<iterations>.<bits>.pvalues`; anything else is `None`.
    pub fn parse(name: &str) -> Option<Self> {
        let fields: Vec<&str> = name.split('.').collect();
        if fields.len() != 5 || fields[0] != PREFIX || fields[4] != SUFFIX {
            return None;
        }
        Some(Self {
            jobnum: fields[1].parse().ok()?,
            iterations: fields[2].parse().ok()?,
            bitcount: fields[3].parse().ok()?,
        })
    }
}

/// Write `records` to `dir` under the archive naming convention. Returns the
/// final path.
pub fn write_archive(
    dir: &Path,
    name: &ArchiveName,
    records: &[ArchiveRecord],
) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let final_path = dir.join(name.file_name());
    let work_path = dir.join(format!("{}.work", name.file_name()));
    {
        let mut w = BufWriter::new(File::create(&work_path)?);
        for record in records {
            write_record(&mut w, record)?;
        }
        w.flush()?;
        w.get_ref().sync_all()?;
    }
    fs::rename(&work_path, &final_path)?;
    log::info!(
        "wrote {} archive record(s) to {}",
        records.len(),
        final_path.display()
    );
    Ok(final_path)
}

pub fn write_record(w: &mut impl Write, record: &ArchiveRecord) -> Result<()> {
    w.write_all(&i64::from(record.test.number()).to_le_bytes())?;
    w.write_all(&(record.p_values.len() as i64).to_le_bytes())?;
    for p in &record.p_values {
        w.write_all(&p.to_le_bytes())?;
    }
    Ok(())
}

/// Read every record of one archive file.
pub fn read_archive(path: &Path) -> Result<Vec<ArchiveRecord>> {
    let display = path.display().to_string();
    let file = File::open(path)?;
    let mut remaining = file.metadata()?.len();
    let mut r = BufReader::new(file);
    let mut records = Vec::new();
    loop {
        let Some(id) = read_i64(&mut r, &display, true)? else {
            break;
        };
        remaining = remaining.saturating_sub(8);
        let Some(test) = TestId::from_number(id) else {
            log::debug!("{display}: stopping at test id {id}");
            break;
        };
        let count = read_i64(&mut r, &display, false)?.unwrap_or_default();
        let count = usize::try_from(count).map_err(|_| Error::Archive {
            path: display.clone(),
            reason: format!("negative value count {count} for {test}"),
        })?;
        remaining = remaining.saturating_sub(8);
        let available = usize::try_from(remaining / 8).unwrap_or(usize::MAX);
        if count > available {
            return Err(Error::Archive {
                path: display,
                reason: format!(
                    "{test} record declares {count} values, only {available} remain"
                ),
            });
        }
        remaining -= count as u64 * 8;
        let mut p_values = Vec::new();
        p_values
            .try_reserve_exact(count)
            .map_err(|_| Error::StoreAlloc { count })?;
        let mut buf = [0u8; 8];
        for i in 0..count {
            r.read_exact(&mut buf)
                .map_err(|e| truncated(&display, e, test, i, count))?;
            p_values.push(f64::from_le_bytes(buf));
        }
        records.push(ArchiveRecord { test, p_values });
    }
    log::debug!("{display}: read {} record(s)", records.len());
    Ok(records)
}

fn truncated(path: &str, e: std::io::Error, test: TestId, at: usize, count: usize) -> Error {
    if e.kind() == ErrorKind::UnexpectedEof {
        Error::Archive {
            path: path.to_string(),
            reason: format!("{test} record truncated after {at} of {count} values"),
        }
    } else {
        Error::Io(e)
    }
}

/// Read a little-endian i64. A clean EOF before the first byte yields `None`
/// when `eof_ok`; a partial value is always an error.
fn read_i64(r: &mut impl Read, path: &str, eof_ok: bool) -> Result<Option<i64>> {
    let mut buf = [0u8; 8];
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(k) => filled += k,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(Error::Io(e)),
        }
    }
    match filled {
        0 if eof_ok => Ok(None),
        8 => Ok(Some(i64::from_le_bytes(buf))),
        _ => Err(Error::Archive {
            path: path.to_string(),
            reason: format!("truncated header ({filled} of 8 bytes)"),
        }),
    }
}

/// Archive files in a directory that match one bit count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArchiveScan {
    pub files: Vec<PathBuf>,
    /// Sum of the iteration field over `files`.
    pub iterations: usize,
}

/// Find `sts.*.*.<bitcount>.pvalues` files in `dir`, sorted by name.
pub fn scan_directory(dir: &Path, bitcount: usize) -> Result<ArchiveScan> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str().and_then(ArchiveName::parse) else {
            continue;
        };
        if name.bitcount != bitcount || !entry.file_type()?.is_file() {
            continue;
        }
        found.push((entry.path(), name.iterations));
    }
    found.sort();
    let mut scan = ArchiveScan::default();
    for (path, iterations) in found {
        scan.iterations = scan
            .iterations
            .checked_add(iterations)
            .ok_or_else(|| Error::Archive {
                path: path.display().to_string(),
                reason: "iteration count overflow".into(),
            })?;
        scan.files.push(path);
    }
    log::info!(
        "found {} archive(s) with {} iterations of {bitcount} bits in {}",
        scan.files.len(),
        scan.iterations,
        dir.display()
    );
    Ok(scan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_format_and_parse() {
        let name = ArchiveName {
            jobnum: 7,
            iterations: 100,
            bitcount: 1_000_000,
        };
        assert_eq!(name.file_name(), "sts.0007.100.1000000.pvalues");
        assert_eq!(ArchiveName::parse(&name.file_name()), Some(name));
        assert_eq!(ArchiveName::parse("sts.0007.100.1000000.pvalues.work"), None);
        assert_eq!(ArchiveName::parse("sts.x.100.1000000.pvalues"), None);
        assert_eq!(ArchiveName::parse("foo.0001.1.1.pvalues"), None);
    }

    #[test]
    fn test_write_and_read() {
        let tmp = tempfile::tempdir().unwrap();
        let records = vec![
            ArchiveRecord {
                test: TestId::Frequency,
                p_values: vec![0.1, 0.2, 0.3],
            },
            ArchiveRecord {
                test: TestId::RandomExcursions,
                p_values: vec![crate::pvalue::NON_P_VALUE; 8],
            },
        ];
        let name = ArchiveName {
            jobnum: 1,
            iterations: 3,
            bitcount: 128,
        };
        let path = write_archive(tmp.path(), &name, &records).unwrap();
        assert!(path.ends_with("sts.0001.3.128.pvalues"));
        assert!(!tmp.path().join("sts.0001.3.128.pvalues.work").exists());
        assert_eq!(read_archive(&path).unwrap(), records);
    }

    #[test]
    fn test_stops_at_invalid_id() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.bin");
        let mut bytes = Vec::new();
        write_record(
            &mut bytes,
            &ArchiveRecord {
                test: TestId::Serial,
                p_values: vec![0.5, 0.25],
            },
        )
        .unwrap();
        bytes.extend_from_slice(&99i64.to_le_bytes());
        bytes.extend_from_slice(b"trailing junk");
        fs::write(&path, bytes).unwrap();
        let records = read_archive(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].test, TestId::Serial);
    }

    #[test]
    fn test_truncated_record_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("t.bin");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1i64.to_le_bytes());
        bytes.extend_from_slice(&3i64.to_le_bytes());
        bytes.extend_from_slice(&0.5f64.to_le_bytes());
        fs::write(&path, &bytes).unwrap();
        assert!(matches!(read_archive(&path), Err(Error::Archive { .. })));

        fs::write(&path, &bytes[..5]).unwrap();
        assert!(matches!(read_archive(&path), Err(Error::Archive { .. })));
    }

    #[test]
    fn test_oversized_count_fails_before_allocating() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("huge.bin");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1i64.to_le_bytes());
        bytes.extend_from_slice(&(1i64 << 31).to_le_bytes());
        bytes.extend_from_slice(&0.5f64.to_le_bytes());
        fs::write(&path, &bytes).unwrap();
        match read_archive(&path) {
            Err(Error::Archive { reason, .. }) => {
                assert!(reason.contains("only 1 remain"), "{reason}")
            }
            other => panic!("expected archive error, got {other:?}"),
        }
    }

    #[test]
    fn test_scan_sums_matching_files() {
        let tmp = tempfile::tempdir().unwrap();
        for (job, iters, bits) in [(0, 10, 1000), (1, 15, 1000), (2, 99, 2000)] {
            let name = ArchiveName {
                jobnum: job,
                iterations: iters,
                bitcount: bits,
            };
            write_archive(tmp.path(), &name, &[]).unwrap();
        }
        fs::write(tmp.path().join("sts.0003.5.1000.pvalues.work"), b"").unwrap();
        fs::write(tmp.path().join("notes.txt"), b"").unwrap();
        let scan = scan_directory(tmp.path(), 1000).unwrap();
        assert_eq!(scan.files.len(), 2);
        assert_eq!(scan.iterations, 25);
        assert_eq!(scan_directory(tmp.path(), 3000).unwrap().iterations, 0);
    }
}

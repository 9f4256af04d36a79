//! Bit sources the scheduler ingests from.
//!
//! Every source implements [`BitSource`]: the scheduler seeks it to an
//! iteration index and reads exactly `n` bits into a worker's
//! [`BitSequence`]. Both calls happen under the scheduler's ingestion lock, so
//! a source never sees concurrent access.

use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::bits::BitSequence;
use crate::error::{Error, Result};
use crate::generators::{Generator, GeneratorKind};

/// On-disk encoding of a bit file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitEncoding {
    /// One ASCII `'0'` or `'1'` per bit; ASCII whitespace is skipped.
    Ascii,
    /// Packed bytes, most significant bit first.
    Binary,
}

impl std::fmt::Display for BitEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ascii => write!(f, "ascii"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

impl FromStr for BitEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ascii" | "0" => Ok(Self::Ascii),
            "binary" | "raw" | "1" => Ok(Self::Binary),
            other => Err(Error::Config(format!("unknown bit encoding '{other}'"))),
        }
    }
}

/// Anything the scheduler can pull bit sequences from.
pub trait BitSource: Send {
    /// Position the source at the start of iteration `iteration`.
    fn seek(&mut self, iteration: usize) -> Result<()>;

    /// Fill `buf` with the next `buf.len()` bits.
    fn read_bits(&mut self, buf: &mut BitSequence) -> Result<()>;

    /// Sources with internal sequential state cannot be sharded across
    /// workers; the scheduler runs them single-threaded.
    fn is_sequential(&self) -> bool {
        false
    }

    /// Human-readable description for logs and reports.
    fn describe(&self) -> String;
}

// ---------------------------------------------------------------------------
// File source
// ---------------------------------------------------------------------------

/// Reads fixed-length sequences from a bit file.
pub struct FileSource {
    path: PathBuf,
    reader: BufReader<File>,
    encoding: BitEncoding,
    sequence_length: usize,
    /// Byte offset where iteration 0 starts.
    base_offset: u64,
    current: usize,
    next: Option<usize>,
}

impl FileSource {
    pub fn open(
        path: &Path,
        encoding: BitEncoding,
        sequence_length: usize,
        base_offset: u64,
    ) -> Result<Self> {
        if encoding == BitEncoding::Binary && base_offset.checked_mul(8).is_none() {
            return Err(Error::Config(format!(
                "offset {base_offset} is beyond any addressable bit position"
            )));
        }
        let file = File::open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            encoding,
            sequence_length,
            base_offset,
            current: 0,
            next: None,
        })
    }

    /// Offset of `iteration` from the start of the file, in bits for binary
    /// input and in bytes for ascii.
    fn offset(&self, iteration: usize) -> Result<u64> {
        let base = match self.encoding {
            BitEncoding::Ascii => Some(self.base_offset),
            BitEncoding::Binary => self.base_offset.checked_mul(8),
        };
        (iteration as u64)
            .checked_mul(self.sequence_length as u64)
            .zip(base)
            .and_then(|(step, base)| base.checked_add(step))
            .ok_or_else(|| {
                Error::Config(format!(
                    "offset of iteration {iteration} overflows from base {}",
                    self.base_offset
                ))
            })
    }

    fn read_ascii(&mut self, out: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < out.len() {
            let used = {
                let buf = self.reader.fill_buf()?;
                if buf.is_empty() {
                    return Err(Error::SourceExhausted {
                        iteration: self.current,
                    });
                }
                let mut used = 0;
                for &byte in buf {
                    used += 1;
                    match byte {
                        b'0' | b'1' => {
                            out[filled] = byte - b'0';
                            filled += 1;
                            if filled == out.len() {
                                break;
                            }
                        }
                        b if b.is_ascii_whitespace() => {}
                        b => return Err(Error::InvalidAscii { byte: b }),
                    }
                }
                used
            };
            self.reader.consume(used);
        }
        Ok(())
    }

    fn read_binary(&mut self, out: &mut [u8], skip: usize) -> Result<()> {
        let nbytes = (skip + out.len()).div_ceil(8);
        let mut raw = vec![0u8; nbytes];
        self.reader.read_exact(&mut raw).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                Error::SourceExhausted {
                    iteration: self.current,
                }
            } else {
                Error::Io(e)
            }
        })?;
        for (i, cell) in out.iter_mut().enumerate() {
            let bit = skip + i;
            *cell = (raw[bit / 8] >> (7 - bit % 8)) & 1;
        }
        Ok(())
    }
}

impl BitSource for FileSource {
    fn seek(&mut self, iteration: usize) -> Result<()> {
        self.current = iteration;
        let offset = self.offset(iteration)?;
        let contiguous = self.next == Some(iteration);
        match self.encoding {
            BitEncoding::Ascii => {
                // One byte per bit; a contiguous read continues where the last
                // one stopped so embedded whitespace is tolerated.
                if !contiguous {
                    self.reader.seek(SeekFrom::Start(offset))?;
                }
            }
            BitEncoding::Binary => {
                if !(contiguous && offset % 8 == 0) {
                    self.reader.seek(SeekFrom::Start(offset / 8))?;
                }
            }
        }
        Ok(())
    }

    fn read_bits(&mut self, buf: &mut BitSequence) -> Result<()> {
        match self.encoding {
            BitEncoding::Ascii => self.read_ascii(buf.as_mut_slice())?,
            BitEncoding::Binary => {
                let skip = (self.offset(self.current)? % 8) as usize;
                self.read_binary(buf.as_mut_slice(), skip)?;
            }
        }
        self.next = Some(self.current + 1);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{} ({})", self.path.display(), self.encoding)
    }
}

// ---------------------------------------------------------------------------
// In-memory source
// ---------------------------------------------------------------------------

/// Serves consecutive `n`-bit windows of an in-memory bit vector.
pub struct MemorySource {
    bits: Vec<u8>,
    sequence_length: usize,
    current: usize,
}

impl MemorySource {
    /// `bits` holds 0/1 cells; any non-zero value counts as 1.
    pub fn new(bits: Vec<u8>, sequence_length: usize) -> Self {
        let bits = bits.into_iter().map(|b| (b != 0) as u8).collect();
        Self {
            bits,
            sequence_length,
            current: 0,
        }
    }

    /// Unpack bytes MSB first.
    pub fn from_bytes(data: &[u8], sequence_length: usize) -> Self {
        let bits = BitSequence::from_bytes(data, data.len() * 8);
        Self::new(bits.as_slice().to_vec(), sequence_length)
    }
}

impl BitSource for MemorySource {
    fn seek(&mut self, iteration: usize) -> Result<()> {
        self.current = iteration;
        Ok(())
    }

    fn read_bits(&mut self, buf: &mut BitSequence) -> Result<()> {
        let exhausted = Error::SourceExhausted {
            iteration: self.current,
        };
        let start = self
            .current
            .checked_mul(self.sequence_length)
            .ok_or(Error::SourceExhausted {
                iteration: self.current,
            })?;
        let window = start
            .checked_add(buf.len())
            .and_then(|end| self.bits.get(start..end))
            .ok_or(exhausted)?;
        buf.as_mut_slice().copy_from_slice(window);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("memory ({} bits)", self.bits.len())
    }
}

// ---------------------------------------------------------------------------
// Generator source
// ---------------------------------------------------------------------------

/// Wraps a builtin generator. Sequential: iterations must be read in order.
pub struct GeneratorSource {
    generator: Box<dyn Generator>,
    kind: GeneratorKind,
    seed: u64,
    next: usize,
}

impl GeneratorSource {
    pub fn new(kind: GeneratorKind, seed: u64) -> Self {
        Self {
            generator: kind.build(seed),
            kind,
            seed,
            next: 0,
        }
    }
}

impl BitSource for GeneratorSource {
    fn seek(&mut self, iteration: usize) -> Result<()> {
        if iteration != self.next {
            return Err(Error::NonSequentialSeek {
                requested: iteration,
                expected: self.next,
            });
        }
        Ok(())
    }

    fn read_bits(&mut self, buf: &mut BitSequence) -> Result<()> {
        for cell in buf.as_mut_slice() {
            *cell = self.generator.next_bit();
        }
        self.next += 1;
        Ok(())
    }

    fn is_sequential(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        format!("generator {} (seed {})", self.kind, self.seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn read(source: &mut dyn BitSource, iteration: usize, n: usize) -> Result<Vec<u8>> {
        let mut buf = BitSequence::new(n);
        source.seek(iteration)?;
        source.read_bits(&mut buf)?;
        Ok(buf.as_slice().to_vec())
    }

    #[test]
    fn test_parse_encoding() {
        assert_eq!("ascii".parse::<BitEncoding>().unwrap(), BitEncoding::Ascii);
        assert_eq!("Binary".parse::<BitEncoding>().unwrap(), BitEncoding::Binary);
        assert!("hex".parse::<BitEncoding>().is_err());
    }

    #[test]
    fn test_ascii_file_sequential_with_whitespace() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "0101\n1100\n1111 0000").unwrap();
        let mut src = FileSource::open(f.path(), BitEncoding::Ascii, 4, 0).unwrap();
        assert_eq!(read(&mut src, 0, 4).unwrap(), vec![0, 1, 0, 1]);
        assert_eq!(read(&mut src, 1, 4).unwrap(), vec![1, 1, 0, 0]);
        assert_eq!(read(&mut src, 2, 4).unwrap(), vec![1, 1, 1, 1]);
        assert_eq!(read(&mut src, 3, 4).unwrap(), vec![0, 0, 0, 0]);
        assert!(matches!(
            read(&mut src, 4, 4),
            Err(Error::SourceExhausted { iteration: 4 })
        ));
    }

    #[test]
    fn test_ascii_file_random_seek() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "xx000011110101").unwrap();
        let mut src = FileSource::open(f.path(), BitEncoding::Ascii, 4, 2).unwrap();
        assert_eq!(read(&mut src, 2, 4).unwrap(), vec![0, 1, 0, 1]);
        assert_eq!(read(&mut src, 0, 4).unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_ascii_rejects_garbage() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "01x1").unwrap();
        let mut src = FileSource::open(f.path(), BitEncoding::Ascii, 4, 0).unwrap();
        assert!(matches!(
            read(&mut src, 0, 4),
            Err(Error::InvalidAscii { byte: b'x' })
        ));
    }

    #[test]
    fn test_binary_file_unaligned_sequences() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&[0b1010_1111, 0b0000_1100]).unwrap();
        let mut src = FileSource::open(f.path(), BitEncoding::Binary, 6, 0).unwrap();
        assert_eq!(read(&mut src, 0, 6).unwrap(), vec![1, 0, 1, 0, 1, 1]);
        assert_eq!(read(&mut src, 1, 6).unwrap(), vec![1, 1, 0, 0, 0, 0]);
        assert_eq!(read(&mut src, 0, 6).unwrap(), vec![1, 0, 1, 0, 1, 1]);
        assert!(read(&mut src, 2, 6).is_err());
    }

    #[test]
    fn test_binary_file_base_offset() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&[0xFF, 0x0F, 0xF0]).unwrap();
        let mut src = FileSource::open(f.path(), BitEncoding::Binary, 8, 1).unwrap();
        assert_eq!(read(&mut src, 0, 8).unwrap(), vec![0, 0, 0, 0, 1, 1, 1, 1]);
        assert_eq!(read(&mut src, 1, 8).unwrap(), vec![1, 1, 1, 1, 0, 0, 0, 0]);
    }

    #[test]
    fn test_huge_base_offset_is_rejected() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let err = FileSource::open(f.path(), BitEncoding::Binary, 8, u64::MAX / 4);
        assert!(matches!(err, Err(Error::Config(_))));
        // Ascii offsets are bytes, so the same value only fails once added to.
        let mut src = FileSource::open(f.path(), BitEncoding::Ascii, 8, u64::MAX).unwrap();
        assert!(matches!(src.seek(1), Err(Error::Config(_))));
    }

    #[test]
    fn test_memory_source_windows() {
        let mut src = MemorySource::new(vec![1, 1, 0, 0, 1, 0], 2);
        assert_eq!(read(&mut src, 2, 2).unwrap(), vec![1, 0]);
        assert_eq!(read(&mut src, 0, 2).unwrap(), vec![1, 1]);
        assert!(read(&mut src, 3, 2).is_err());
        assert!(!src.is_sequential());
    }

    #[test]
    fn test_generator_source_is_sequential() {
        let mut src = GeneratorSource::new(GeneratorKind::Sha256, 9);
        assert!(src.is_sequential());
        let a = read(&mut src, 0, 64).unwrap();
        let b = read(&mut src, 1, 64).unwrap();
        assert_ne!(a, b);
        assert!(matches!(
            read(&mut src, 5, 64),
            Err(Error::NonSequentialSeek {
                requested: 5,
                expected: 2
            })
        ));
    }
}

//! Per-worker bit sequence buffer.

/// A reusable buffer of exactly `n` cells, each 0 or 1.
///
/// Every worker owns one and overwrites it for each iteration it claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitSequence {
    bits: Vec<u8>,
}

impl BitSequence {
    /// An all-zero sequence of `n` bits.
    pub fn new(n: usize) -> Self {
        Self { bits: vec![0; n] }
    }

    /// Build from 0/1 cells; any non-zero value is stored as 1.
    pub fn from_bits(bits: &[u8]) -> Self {
        Self {
            bits: bits.iter().map(|&b| (b != 0) as u8).collect(),
        }
    }

    /// Unpack bytes MSB first, keeping the first `n` bits.
    pub fn from_bytes(data: &[u8], n: usize) -> Self {
        let mut bits = Vec::with_capacity(n);
        'outer: for &byte in data {
            for shift in (0..8).rev() {
                if bits.len() == n {
                    break 'outer;
                }
                bits.push((byte >> shift) & 1);
            }
        }
        bits.resize(n, 0);
        Self { bits }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bits
    }

    /// Mutable access for sources filling the buffer in place.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bits
    }

    /// Number of one bits.
    pub fn ones(&self) -> usize {
        self.bits.iter().map(|&b| b as usize).sum()
    }

    /// Iterate the ±1 steps of the partial-sum walk.
    pub fn steps(&self) -> impl Iterator<Item = i64> + '_ {
        self.bits.iter().map(|&b| 2 * b as i64 - 1)
    }
}

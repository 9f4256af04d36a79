//! Helpers shared by several tests.

/// Sum of squared pattern counts for overlapping `m`-bit patterns, with
/// wraparound, as used by the serial test. Zero for `m == 0`.
pub(crate) fn psi_squared(bits: &[u8], m: usize) -> f64 {
    let n = bits.len();
    if m == 0 || n == 0 {
        return 0.0;
    }
    let counts = pattern_counts(bits, m);
    let sum_sq: f64 = counts.iter().map(|&c| (c as f64) * (c as f64)).sum();
    sum_sq * (counts.len() as f64) / (n as f64) - n as f64
}

/// Counts of each overlapping `m`-bit pattern over the sequence extended
/// cyclically by `m - 1` bits. Index is the pattern read MSB first.
pub(crate) fn pattern_counts(bits: &[u8], m: usize) -> Vec<u64> {
    let n = bits.len();
    let mut counts = vec![0u64; 1usize << m];
    if n == 0 || m == 0 {
        return counts;
    }
    let mask = (1usize << m) - 1;
    let mut val = 0usize;
    // Prime the window with the first m - 1 bits.
    for j in 0..m - 1 {
        val = (val << 1) | bits[j % n] as usize;
    }
    for i in 0..n {
        val = ((val << 1) | bits[(i + m - 1) % n] as usize) & mask;
        counts[val] += 1;
    }
    counts
}

/// Rank over GF(2) of a `rows x cols` matrix given row-major as 0/1 cells.
pub(crate) fn gf2_rank(matrix: &[u8], rows: usize, cols: usize) -> usize {
    let mut m: Vec<Vec<u8>> = (0..rows)
        .map(|r| matrix[r * cols..(r + 1) * cols].to_vec())
        .collect();
    let mut rank = 0;
    for col in 0..cols {
        let Some(pivot) = (rank..rows).find(|&row| m[row][col] == 1) else {
            continue;
        };
        m.swap(rank, pivot);
        for row in 0..rows {
            if row != rank && m[row][col] == 1 {
                let rank_row = m[rank].clone();
                for (m_c, r_c) in m[row].iter_mut().zip(rank_row.iter()) {
                    *m_c ^= r_c;
                }
            }
        }
        rank += 1;
    }
    rank
}

/// Berlekamp-Massey over GF(2). Returns the linear complexity of `seq`.
pub(crate) fn berlekamp_massey(seq: &[u8]) -> usize {
    let n = seq.len();
    if n == 0 {
        return 0;
    }
    let mut c = vec![0u8; n + 1];
    let mut b = vec![0u8; n + 1];
    c[0] = 1;
    b[0] = 1;
    let mut l: usize = 0;
    let mut m: isize = -1;

    for ni in 0..n {
        let mut d: u8 = seq[ni];
        for i in 1..=l {
            d ^= c[i] & seq[ni - i];
        }
        if d == 1 {
            let t = c.clone();
            let shift = (ni as isize - m) as usize;
            for i in shift..=n {
                c[i] ^= b[i - shift];
            }
            if l <= ni / 2 {
                l = ni + 1 - l;
                m = ni as isize;
                b = t;
            }
        }
    }
    l
}

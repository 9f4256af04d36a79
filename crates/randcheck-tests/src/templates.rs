//! Aperiodic template generation for the non-overlapping template test.

/// An `len`-bit pattern stored MSB first in the low bits of `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Template {
    pub value: u32,
    pub len: usize,
}

impl Template {
    pub fn from_bits(bits: &[u8]) -> Self {
        let value = bits.iter().fold(0u32, |acc, &b| (acc << 1) | (b & 1) as u32);
        Self {
            value,
            len: bits.len(),
        }
    }

    pub fn bit(&self, i: usize) -> u8 {
        ((self.value >> (self.len - 1 - i)) & 1) as u8
    }

    /// A template is aperiodic when no proper prefix equals the suffix of
    /// the same length, so two occurrences can never overlap.
    pub fn is_aperiodic(&self) -> bool {
        (1..self.len).all(|shift| {
            let overlap = self.len - shift;
            let mask = (1u32 << overlap) - 1;
            (self.value >> shift) != (self.value & mask)
        })
    }
}

impl std::fmt::Display for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for i in 0..self.len {
            write!(f, "{}", self.bit(i))?;
        }
        Ok(())
    }
}

/// The first `limit` aperiodic templates of length `m`, in ascending order.
pub fn aperiodic_templates(m: usize, limit: usize) -> Vec<Template> {
    if m == 0 || m > 31 {
        return Vec::new();
    }
    (0..1u32 << m)
        .map(|value| Template { value, len: m })
        .filter(Template::is_aperiodic)
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_counts() {
        let expected = [
            (2, 2),
            (3, 4),
            (4, 6),
            (5, 12),
            (6, 20),
            (7, 40),
            (8, 74),
            (9, 148),
            (10, 284),
        ];
        for (m, count) in expected {
            assert_eq!(aperiodic_templates(m, usize::MAX).len(), count, "m = {m}");
        }
    }

    #[test]
    fn test_order_and_limit() {
        let t: Vec<String> = aperiodic_templates(3, usize::MAX)
            .iter()
            .map(|t| t.to_string())
            .collect();
        assert_eq!(t, vec!["001", "011", "100", "110"]);
        assert_eq!(aperiodic_templates(10, 148).len(), 148);
    }

    #[test]
    fn test_periodic_rejected() {
        assert!(!Template::from_bits(&[1, 0, 1]).is_aperiodic());
        assert!(!Template::from_bits(&[1, 1]).is_aperiodic());
        assert!(Template::from_bits(&[0, 0, 0, 0, 0, 0, 0, 0, 1]).is_aperiodic());
    }
}

//! Builtin deterministic bit generators.
//!
//! These are reference generators for exercising the battery, not
//! cryptographic DRBGs. Each carries sequential internal state, so a
//! [`GeneratorSource`](crate::source::GeneratorSource) built on one always
//! runs with a single worker.

use std::str::FromStr;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// 2^61 - 1, the modulus shared by the congruential generators.
const MERSENNE_61: u64 = (1 << 61) - 1;
/// 2^31 - 1, the Park-Miller modulus.
const MERSENNE_31: u64 = (1 << 31) - 1;
/// Register length of the XOR generator.
const XOR_LAG: usize = 127;

/// A source of one bit at a time.
pub trait Generator: Send {
    fn name(&self) -> &'static str;

    fn next_bit(&mut self) -> u8;
}

/// Selectable builtin generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneratorKind {
    /// Park-Miller linear congruential generator.
    Lcg,
    /// x <- 2x^2 + 3x + 1 mod (2^61 - 1).
    QuadraticCongruential,
    /// x <- x^3 + 1 mod (2^61 - 1).
    CubicCongruential,
    /// x_i = x_{i-1} xor x_{i-127}.
    Xor,
    /// SHA-256 in counter mode.
    Sha256,
}

impl GeneratorKind {
    pub const ALL: [GeneratorKind; 5] = [
        Self::Lcg,
        Self::QuadraticCongruential,
        Self::CubicCongruential,
        Self::Xor,
        Self::Sha256,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Lcg => "lcg",
            Self::QuadraticCongruential => "qcg",
            Self::CubicCongruential => "ccg",
            Self::Xor => "xor",
            Self::Sha256 => "sha256",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Lcg => "linear congruential, 16807 * x mod (2^31 - 1)",
            Self::QuadraticCongruential => "quadratic congruential, 2x^2 + 3x + 1 mod (2^61 - 1)",
            Self::CubicCongruential => "cubic congruential, x^3 + 1 mod (2^61 - 1)",
            Self::Xor => "lagged xor over a 127-bit register",
            Self::Sha256 => "SHA-256 of seed || counter",
        }
    }

    /// Instantiate the generator from a 64-bit seed.
    pub fn build(self, seed: u64) -> Box<dyn Generator> {
        match self {
            Self::Lcg => Box::new(Lcg::new(seed)),
            Self::QuadraticCongruential => Box::new(PolynomialCongruential::quadratic(seed)),
            Self::CubicCongruential => Box::new(PolynomialCongruential::cubic(seed)),
            Self::Xor => Box::new(XorGenerator::new(seed)),
            Self::Sha256 => Box::new(HashGenerator::new(seed)),
        }
    }
}

impl std::fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for GeneratorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::Config(format!("unknown generator '{s}'")))
    }
}

/// splitmix64 step, used to expand seeds.
fn splitmix(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    ((a as u128 * b as u128) % m as u128) as u64
}

struct Lcg {
    state: u64,
}

impl Lcg {
    fn new(seed: u64) -> Self {
        // State must lie in [1, m - 1].
        Self {
            state: seed % (MERSENNE_31 - 1) + 1,
        }
    }
}

impl Generator for Lcg {
    fn name(&self) -> &'static str {
        "lcg"
    }

    fn next_bit(&mut self) -> u8 {
        self.state = mul_mod(self.state, 16807, MERSENNE_31);
        (self.state as f64 / MERSENNE_31 as f64 >= 0.5) as u8
    }
}

/// x <- (a x^degree + b x + c) mod (2^61 - 1).
struct PolynomialCongruential {
    state: u64,
    degree: u32,
    coefficients: (u64, u64, u64),
    name: &'static str,
}

impl PolynomialCongruential {
    fn quadratic(seed: u64) -> Self {
        Self::new(seed, 2, (2, 3, 1), "qcg")
    }

    fn cubic(seed: u64) -> Self {
        Self::new(seed, 3, (1, 0, 1), "ccg")
    }

    fn new(seed: u64, degree: u32, coefficients: (u64, u64, u64), name: &'static str) -> Self {
        let mut s = seed;
        Self {
            state: splitmix(&mut s) % MERSENNE_61,
            degree,
            coefficients,
            name,
        }
    }
}

impl Generator for PolynomialCongruential {
    fn name(&self) -> &'static str {
        self.name
    }

    fn next_bit(&mut self) -> u8 {
        let x = self.state;
        let (a, b, c) = self.coefficients;
        let mut power = x;
        for _ in 1..self.degree {
            power = mul_mod(power, x, MERSENNE_61);
        }
        let lead = mul_mod(a, power, MERSENNE_61);
        let linear = mul_mod(b, x, MERSENNE_61);
        self.state = ((lead as u128 + linear as u128 + c as u128) % MERSENNE_61 as u128) as u64;
        ((self.state >> 30) & 1) as u8
    }
}

struct XorGenerator {
    register: [u8; XOR_LAG],
    index: usize,
}

impl XorGenerator {
    fn new(seed: u64) -> Self {
        let mut s = seed;
        let mut register = [0u8; XOR_LAG];
        let mut word = 0u64;
        for (i, cell) in register.iter_mut().enumerate() {
            if i % 64 == 0 {
                word = splitmix(&mut s);
            }
            *cell = ((word >> (i % 64)) & 1) as u8;
        }
        if register.iter().all(|&b| b == 0) {
            register[0] = 1;
        }
        Self { register, index: 0 }
    }
}

impl Generator for XorGenerator {
    fn name(&self) -> &'static str {
        "xor"
    }

    fn next_bit(&mut self) -> u8 {
        // index holds x_{i-127}; the previous cell holds x_{i-1}.
        let prev = self.register[(self.index + XOR_LAG - 1) % XOR_LAG];
        let bit = prev ^ self.register[self.index];
        self.register[self.index] = bit;
        self.index = (self.index + 1) % XOR_LAG;
        bit
    }
}

struct HashGenerator {
    seed: [u8; 8],
    counter: u64,
    block: [u8; 32],
    position: usize,
}

impl HashGenerator {
    fn new(seed: u64) -> Self {
        Self {
            seed: seed.to_le_bytes(),
            counter: 0,
            block: [0; 32],
            position: 256,
        }
    }

    fn refill(&mut self) {
        let mut h = Sha256::new();
        h.update(self.seed);
        h.update(self.counter.to_le_bytes());
        self.block = h.finalize().into();
        self.counter += 1;
        self.position = 0;
    }
}

impl Generator for HashGenerator {
    fn name(&self) -> &'static str {
        "sha256"
    }

    fn next_bit(&mut self) -> u8 {
        if self.position == 256 {
            self.refill();
        }
        let byte = self.block[self.position / 8];
        let bit = (byte >> (7 - self.position % 8)) & 1;
        self.position += 1;
        bit
    }
}

//! Randomness for verification codes.
//!
//! Production engines draw from OS entropy. Tests seed the generator so
//! issued codes are reproducible run to run.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub struct CodeRng {
    inner: StdRng,
}

impl CodeRng {
    pub fn from_entropy() -> Self {
        Self {
            inner: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
        }
    }

    /// A code of exactly `len` decimal digits, each drawn uniformly.
    /// Leading zeros are kept, so every string in `0..10^len` is equally likely.
    pub fn numeric_code(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| char::from(b'0' + self.inner.gen_range(0..10u8)))
            .collect()
    }
}

impl Default for CodeRng {
    fn default() -> Self {
        Self::from_entropy()
    }
}

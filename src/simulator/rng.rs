use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Version of the draw mapping below. Bump when any derived draw changes
/// how it consumes the underlying stream.
pub const RNG_VERSION: u32 = 1;

/// Stream id used for workload randomness.
pub const SCENARIO_STREAM: u64 = 0;
/// Stream id used for encryption key derivation.
pub const KEY_STREAM: u64 = 1;

/// Scale for turning the top 53 bits of a draw into a float in [0, 1).
const F64_UNIT: f64 = 1.0 / (1u64 << 53) as f64;

/// Seeded, portable random stream.
///
/// Every derived draw is built on `next_u64` in this module rather than on
/// `rand` distributions, so the value sequence for a given seed is fixed by
/// `RNG_VERSION` alone.
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    rng: ChaCha8Rng,
    draws: u64,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        Self::with_stream(seed, SCENARIO_STREAM)
    }

    pub fn with_stream(seed: u64, stream: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(stream);
        DeterministicRng { rng, draws: 0 }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.draws += 1;
        self.rng.next_u64()
    }

    /// Number of 64-bit values consumed so far.
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// Uniform integer in `[0, bound)`. Returns 0 without drawing when
    /// `bound` is 0.
    pub fn gen_below(&mut self, bound: u64) -> u64 {
        if bound == 0 {
            return 0;
        }
        // Widening multiply with rejection of the biased low zone.
        let threshold = bound.wrapping_neg() % bound;
        loop {
            let m = u128::from(self.next_u64()) * u128::from(bound);
            if (m as u64) >= threshold {
                return (m >> 64) as u64;
            }
        }
    }

    /// Uniform integer in the closed range `[min, max]`.
    pub fn gen_range_inclusive(&mut self, min: u64, max: u64) -> u64 {
        debug_assert!(min <= max, "Precondition: min {} > max {}", min, max);
        let span = max.saturating_sub(min);
        if span == u64::MAX {
            return self.next_u64();
        }
        min + self.gen_below(span + 1)
    }

    /// Uniform float in `[0, 1)`.
    pub fn gen_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * F64_UNIT
    }

    pub fn gen_f64_between(&mut self, min: f64, max: f64) -> f64 {
        min + self.gen_f64() * (max - min)
    }

    /// True with the given likelihood.
    pub fn decide(&mut self, likelihood: f64) -> bool {
        self.gen_f64() < likelihood
    }

    /// Uniformly pick one element. Empty slices consume nothing.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let index = self.gen_below(items.len() as u64) as usize;
        items.get(index)
    }
}

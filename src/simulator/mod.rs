//! Seeded randomness for reproducible workloads.

mod rng;

pub use rng::{DeterministicRng, KEY_STREAM, RNG_VERSION, SCENARIO_STREAM};

use rand::{rng, Rng};

/// A source of 64-bit random words.
///
/// UUID strategies draw all their entropy through this seam, which keeps the
/// bit-twiddling deterministic under test.
pub trait RandSource {
    /// Returns the next random 64-bit word.
    fn next_u64(&self) -> u64;
}

/// A `RandSource` backed by the thread-local RNG.
///
/// Each OS thread owns its own generator seeded from the OS entropy pool, so
/// calls from multiple threads are contention-free without any locking. The
/// wrapper itself is zero-sized and freely shareable.
#[derive(Default, Clone, Copy, Debug)]
pub struct ThreadRandom;

impl RandSource for ThreadRandom {
    fn next_u64(&self) -> u64 {
        rng().random()
    }
}

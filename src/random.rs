//! Shared random source.
//!
//! Every randomized decision of a run (operators, rank-selection pivots,
//! migration choices) draws from one [`RandomSource`], so a seed fully
//! reproduces a run.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

/// Creates a seeded standard generator.
pub fn create_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// How the Schedule seeds the random source at the start of each run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SeedPolicy {
    /// Every run starts from the same seed.
    Fixed(u64),
    /// Run `k` (counted across batches) uses `base + k`.
    PerRun(u64),
    /// A fresh seed is drawn from the thread generator for every run.
    Entropy,
}

impl Default for SeedPolicy {
    fn default() -> Self {
        SeedPolicy::PerRun(42)
    }
}

impl SeedPolicy {
    /// Resolves the seed for the given global run number.
    pub fn seed_for(&self, run_number: u64) -> u64 {
        match *self {
            SeedPolicy::Fixed(seed) => seed,
            SeedPolicy::PerRun(base) => base.wrapping_add(run_number),
            SeedPolicy::Entropy => rand::random(),
        }
    }
}

/// The single seeded generator shared by a run.
///
/// Implements [`RngCore`], so it can be passed wherever an `R: Rng` is expected.
#[derive(Debug, Clone)]
pub struct RandomSource {
    rng: StdRng,
    seed: u64,
}

impl RandomSource {
    /// Creates a source from a seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: create_rng(seed),
            seed,
        }
    }

    /// Re-seeds the source in place.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = create_rng(seed);
        self.seed = seed;
    }

    /// Seed this source was last initialized with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform integer in `lo..=hi`. Bounds may be given in either order.
    pub fn choose(&mut self, lo: i64, hi: i64) -> i64 {
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        self.rng.random_range(lo..=hi)
    }

    /// Uniform real in `lo..hi`. Returns `lo` when the interval is empty.
    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        if hi <= lo {
            return lo;
        }
        self.rng.random_range(lo..hi)
    }

    /// Raw 64 random bits.
    pub fn raw(&mut self) -> u64 {
        self.rng.next_u64()
    }

    /// Uniform index in `0..n`.
    ///
    /// # Panics
    /// Panics if `n == 0`.
    pub fn index(&mut self, n: usize) -> usize {
        self.rng.random_range(0..n)
    }

    /// Returns `true` with probability `p` (clamped to `[0, 1]`).
    pub fn flip(&mut self, p: f64) -> bool {
        self.rng.random_bool(p.clamp(0.0, 1.0))
    }
}

impl RngCore for RandomSource {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        self.rng.fill_bytes(dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = RandomSource::new(7);
        let mut b = RandomSource::new(7);
        for _ in 0..100 {
            assert_eq!(a.raw(), b.raw());
        }
    }

    #[test]
    fn test_reseed_restarts_stream() {
        let mut a = RandomSource::new(7);
        let first = a.raw();
        a.raw();
        a.reseed(7);
        assert_eq!(a.raw(), first);
        assert_eq!(a.seed(), 7);
    }

    #[test]
    fn test_choose_is_inclusive_and_order_free() {
        let mut rng = RandomSource::new(1);
        let mut seen = [false; 3];
        for _ in 0..200 {
            let v = rng.choose(4, 2);
            assert!((2..=4).contains(&v));
            seen[(v - 2) as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_uniform_bounds() {
        let mut rng = RandomSource::new(3);
        for _ in 0..200 {
            let v = rng.uniform(-1.0, 1.0);
            assert!((-1.0..1.0).contains(&v));
        }
        assert_eq!(rng.uniform(2.0, 2.0), 2.0);
    }

    #[test]
    fn test_usable_as_rng() {
        let mut rng = RandomSource::new(9);
        let x: f64 = rng.random_range(0.0..1.0);
        assert!((0.0..1.0).contains(&x));
    }

    #[test]
    fn test_seed_policy() {
        assert_eq!(SeedPolicy::Fixed(5).seed_for(3), 5);
        assert_eq!(SeedPolicy::PerRun(5).seed_for(3), 8);
        assert_eq!(SeedPolicy::default(), SeedPolicy::PerRun(42));
    }
}

//! Deterministic RNG for simulation
//!
//! TigerStyle: ChaCha20-based RNG for reproducibility.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Deterministic random number generator
///
/// Given the same seed, produces the same sequence of values. Clones share
/// one stream; [`DeterministicRng::fork`] derives an independent one.
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    /// The original seed (for logging/reproduction)
    seed: u64,
    rng: Rc<RefCell<ChaCha20Rng>>,
    fork_counter: Rc<Cell<u64>>,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: Rc::new(RefCell::new(ChaCha20Rng::seed_from_u64(seed))),
            fork_counter: Rc::new(Cell::new(0)),
        }
    }

    /// Create from environment variable DST_SEED or generate random seed
    ///
    /// Always logs the seed for reproducibility.
    pub fn from_env_or_random() -> Self {
        let seed = std::env::var("DST_SEED")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(rand::random);

        tracing::info!(seed = seed, "DST seed (set DST_SEED={} to replay)", seed);

        Self::new(seed)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn next_u64(&self) -> u64 {
        self.rng.borrow_mut().gen()
    }

    pub fn next_f64(&self) -> f64 {
        self.rng.borrow_mut().gen()
    }

    /// Generate a random bool with given probability of true
    pub fn next_bool(&self, probability: f64) -> bool {
        debug_assert!(
            (0.0..=1.0).contains(&probability),
            "probability must be in [0, 1]"
        );
        self.next_f64() < probability
    }

    /// Generate a random value in the given range [min, max)
    pub fn next_range(&self, min: u64, max: u64) -> u64 {
        debug_assert!(min < max, "min must be less than max");
        self.rng.borrow_mut().gen_range(min..max)
    }

    /// Generate a random index for a slice of given length
    pub fn next_index(&self, len: usize) -> usize {
        debug_assert!(len > 0, "length must be positive");
        self.rng.borrow_mut().gen_range(0..len)
    }

    /// Shuffle a slice in place
    pub fn shuffle<T>(&self, slice: &mut [T]) {
        let mut rng = self.rng.borrow_mut();
        for i in (1..slice.len()).rev() {
            let j = rng.gen_range(0..=i);
            slice.swap(i, j);
        }
    }

    /// Choose a random element from a slice
    pub fn choose<'a, T>(&self, slice: &'a [T]) -> Option<&'a T> {
        if slice.is_empty() {
            None
        } else {
            slice.get(self.next_index(slice.len()))
        }
    }

    /// Fork the RNG to create an independent stream
    ///
    /// The forked RNG is seeded deterministically from the parent.
    pub fn fork(&self) -> Self {
        let fork_id = self.fork_counter.get();
        self.fork_counter.set(fork_id.wrapping_add(1));
        let fork_seed = self
            .seed
            .wrapping_add(fork_id)
            .wrapping_mul(0x9E3779B97F4A7C15);

        Self::new(fork_seed)
    }
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

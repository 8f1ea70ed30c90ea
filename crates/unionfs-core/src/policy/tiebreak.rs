//! Random ordering of tie-break candidates.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Source of randomness used to shuffle candidates before a reduction.
///
/// Reductions keep the first strictly-better candidate, so shuffling first
/// turns "first among equals" into a uniform pick.
#[derive(Debug, Default)]
pub enum TieBreaker {
    /// The calling thread's RNG. Concurrent calls share no state.
    #[default]
    ThreadRng,
    /// A seeded generator, for reproducible selections.
    Seeded(Mutex<StdRng>),
}

impl TieBreaker {
    /// Thread-local randomness.
    pub fn thread_rng() -> Self {
        Self::ThreadRng
    }

    /// Deterministic randomness from `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self::Seeded(Mutex::new(StdRng::seed_from_u64(seed)))
    }

    /// A shuffled copy of `items`. The input is left untouched.
    pub fn shuffled<T: Clone>(&self, items: &[T]) -> Vec<T> {
        let mut copy = items.to_vec();
        match self {
            Self::ThreadRng => copy.shuffle(&mut rand::thread_rng()),
            Self::Seeded(rng) => copy.shuffle(&mut *rng.lock()),
        }
        copy
    }
}

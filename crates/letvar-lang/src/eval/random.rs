use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Upper bound of values returned by [`RandomSource::next`].
pub const RANDOM_MAX: i64 = i32::MAX as i64;

/// A pseudo-random stream shared by every evaluation of a configuration.
///
/// Not suitable for anything security related.
pub trait RandomSource: Send + Sync {
    /// Returns a value in `0..=RANDOM_MAX`.
    fn next(&self) -> i64;

    /// Returns a value uniformly distributed in `from..=to`.
    fn between(&self, from: i64, to: i64) -> i64;
}

#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Seeds from the wall clock, once per loaded configuration.
    pub fn from_clock() -> Self {
        let now = chrono::Utc::now();
        let seed = now
            .timestamp_nanos_opt()
            .unwrap_or_else(|| now.timestamp_millis());

        log::debug!("Seeding random source with {}", seed);
        Self::new(seed as u64)
    }
}

impl Default for SeededRandom {
    fn default() -> Self {
        Self::from_clock()
    }
}

impl RandomSource for SeededRandom {
    fn next(&self) -> i64 {
        self.between(0, RANDOM_MAX)
    }

    fn between(&self, from: i64, to: i64) -> i64 {
        if from >= to {
            return from;
        }

        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_range(from..=to)
    }
}

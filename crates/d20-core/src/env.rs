//! Environment abstraction for time and randomness.
//!
//! The `Environment` trait decouples table logic from system resources. Dice
//! draws, nonces and the session key all come from `random_bytes`, and roll
//! timestamps come from `now`. This enables:
//!
//! - Deterministic Testing: a seeded RNG and a manually advanced clock make
//!   roll values and ordering reproducible.
//!
//! - Production Runtime: the server implementation reads the OS entropy pool
//!   and the wall clock without any change to the core logic.
//!
//! # Invariants
//!
//! - Unpredictability: production implementations draw from a
//!   cryptographically secure source, since rolls may be contested between
//!   participants
//! - Loud failure: an unavailable entropy source is reported as an error, never
//!   papered over with low-quality bytes

use std::time::SystemTime;

/// The randomness source could not produce bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("entropy source unavailable: {reason}")]
pub struct EntropyError {
    /// Description from the underlying source.
    pub reason: String,
}

impl EntropyError {
    /// Create an error with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

/// Abstract environment providing wall-clock time and secure randomness.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Returns the current wall-clock time.
    ///
    /// Used to timestamp rolls. Ordering of the history is derived from these
    /// values, so test implementations should advance them explicitly.
    fn now(&self) -> SystemTime;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Security
    ///
    /// Production implementations MUST use the OS entropy pool
    /// (`getrandom`), and MUST return an error rather than partially filling
    /// or zero-filling the buffer.
    fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), EntropyError>;

    /// Generates a random `u64`.
    fn random_u64(&self) -> Result<u64, EntropyError> {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes)?;
        Ok(u64::from_be_bytes(bytes))
    }

    /// Generates a uniform integer in `[0, bound)`.
    ///
    /// Uses rejection sampling: draws falling in the final partial block of
    /// the `u64` range are discarded, so every residue is equally likely. A
    /// `bound` of zero or one yields zero without drawing.
    fn random_below(&self, bound: u64) -> Result<u64, EntropyError> {
        if bound <= 1 {
            return Ok(0);
        }

        // Largest multiple of `bound` that fits, exclusive.
        let zone = u64::MAX - (u64::MAX % bound);
        loop {
            let draw = self.random_u64()?;
            if draw < zone {
                return Ok(draw % bound);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use proptest::prelude::*;

    use super::*;

    /// Hands out a fixed sequence of `u64` draws, then fails.
    #[derive(Clone)]
    struct ScriptedEnv {
        draws: Arc<Mutex<Vec<u64>>>,
    }

    impl ScriptedEnv {
        fn new(draws: &[u64]) -> Self {
            let mut draws = draws.to_vec();
            draws.reverse();
            Self { draws: Arc::new(Mutex::new(draws)) }
        }

        fn remaining(&self) -> usize {
            self.draws.lock().unwrap().len()
        }
    }

    impl Environment for ScriptedEnv {
        fn now(&self) -> SystemTime {
            SystemTime::UNIX_EPOCH
        }

        fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), EntropyError> {
            let mut draws = self.draws.lock().unwrap();
            for chunk in buffer.chunks_mut(8) {
                let next = draws.pop().ok_or_else(|| EntropyError::new("script exhausted"))?;
                chunk.copy_from_slice(&next.to_be_bytes()[..chunk.len()]);
            }
            Ok(())
        }
    }

    #[test]
    fn draws_in_partial_block_are_redrawn() {
        // 2^64 - 1 is a multiple of 3, so the top value is the partial block.
        let env = ScriptedEnv::new(&[u64::MAX, 5]);
        assert_eq!(env.random_below(3).unwrap(), 2);
        assert_eq!(env.remaining(), 0);
    }

    #[test]
    fn trivial_bounds_do_not_draw() {
        let env = ScriptedEnv::new(&[]);
        assert_eq!(env.random_below(0).unwrap(), 0);
        assert_eq!(env.random_below(1).unwrap(), 0);
    }

    #[test]
    fn exhausted_source_is_an_error() {
        let env = ScriptedEnv::new(&[]);
        assert!(env.random_below(6).is_err());
    }

    proptest! {
        #[test]
        fn random_below_stays_under_bound(
            draws in proptest::collection::vec(any::<u64>(), 1..8),
            bound in 2u64..,
        ) {
            let env = ScriptedEnv::new(&draws);
            // Running out of script only happens after repeated rejections.
            if let Ok(value) = env.random_below(bound) {
                prop_assert!(value < bound);
            }
        }

        #[test]
        fn accepted_draw_is_reduced_modulo_bound(draw in any::<u64>(), bound in 2u64..=1_000_000) {
            let zone = u64::MAX - (u64::MAX % bound);
            prop_assume!(draw < zone);

            let env = ScriptedEnv::new(&[draw]);
            prop_assert_eq!(env.random_below(bound).unwrap(), draw % bound);
        }
    }
}

//! Deterministic Environment implementations for testing.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, SystemTime},
};

use d20_core::{EntropyError, Environment};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Simulation environment with a seeded RNG and a manual clock.
///
/// This implementation provides:
///
/// - **Manual Time**: `now()` returns a virtual wall clock that starts at a
///   fixed instant and only moves when `advance` is called, or by one
///   microsecond per reading when created with [`SimEnv::ticking`].
///
/// - **Seeded RNG**: `random_bytes()` uses ChaCha20Rng seeded with a fixed
///   value, ensuring reproducible rolls, nonces and keys.
///
/// Clones share both the clock and the RNG stream.
#[derive(Clone)]
pub struct SimEnv {
    rng: Arc<Mutex<ChaCha20Rng>>,
    clock: Arc<Mutex<SystemTime>>,
    tick: Duration,
}

/// Virtual epoch for every `SimEnv` clock.
const SIM_EPOCH_SECS: u64 = 1_700_000_000;

impl SimEnv {
    /// Create a new SimEnv with default seed (0).
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Create a new SimEnv with a specific seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))),
            clock: Arc::new(Mutex::new(
                SystemTime::UNIX_EPOCH + Duration::from_secs(SIM_EPOCH_SECS),
            )),
            tick: Duration::ZERO,
        }
    }

    /// Create a SimEnv whose clock advances by one microsecond on every
    /// reading, so consecutive rolls get strictly increasing timestamps.
    pub fn ticking(seed: u64) -> Self {
        Self { tick: Duration::from_micros(1), ..Self::with_seed(seed) }
    }

    /// Move the virtual clock forward.
    pub fn advance(&self, by: Duration) {
        *self.clock.lock().unwrap_or_else(PoisonError::into_inner) += by;
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    fn now(&self) -> SystemTime {
        let mut clock = self.clock.lock().unwrap_or_else(PoisonError::into_inner);
        let now = *clock;
        *clock += self.tick;
        now
    }

    fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), EntropyError> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
        Ok(())
    }
}

/// Environment whose entropy source is permanently unavailable.
///
/// Used to check that randomness failures surface as errors instead of weak
/// rolls or predictable nonces.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExhaustedEnv;

impl Environment for ExhaustedEnv {
    fn now(&self) -> SystemTime {
        SystemTime::UNIX_EPOCH
    }

    fn random_bytes(&self, _buffer: &mut [u8]) -> Result<(), EntropyError> {
        Err(EntropyError::new("simulated entropy exhaustion"))
    }
}

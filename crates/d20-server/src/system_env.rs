//! Production Environment implementation using system time and RNG.
//!
//! This module provides `SystemEnv`, the production implementation of the
//! `Environment` trait that uses the wall clock and the OS entropy pool.

use std::time::SystemTime;

use d20_core::{EntropyError, Environment};

/// Production environment using system time and cryptographic RNG.
///
/// # Security
///
/// The RNG uses `getrandom`, which reads OS-level cryptographic randomness.
/// Session keys, token nonces and die faces all come from here. A failure is
/// reported to the caller; the buffer is never zero-filled as a fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), EntropyError> {
        getrandom::fill(buffer).map_err(|e| {
            tracing::error!("getrandom failed: {}", e);
            EntropyError::new(e.to_string())
        })
    }
}

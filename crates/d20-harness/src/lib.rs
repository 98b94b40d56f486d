//! Deterministic test harness for d20.
//!
//! Seeded and failing implementations of the `Environment` trait, plus event
//! sinks with scripted reader behavior, so that dice, token and broadcast
//! behavior can be tested reproducibly.
//!
//! # Example
//!
//! ```rust,ignore
//! use d20_core::{DiceEngine, RollRequest};
//! use d20_harness::{SimEnv, player};
//!
//! let engine = DiceEngine::new(SimEnv::with_seed(7));
//! let roll = engine.roll(RollRequest::new(20, 2), &player("Ana"))?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod sim_env;
pub mod sinks;

use d20_core::Participant;
pub use sim_env::{ExhaustedEnv, SimEnv};
pub use sinks::{ClosedSink, RecordingSink, StalledSink};

/// A player named `name` playing a character of the same name.
pub fn player(name: &str) -> Participant {
    Participant::player(name, name, "127.0.0.x")
}

/// A facilitator named `name`.
pub fn facilitator(name: &str) -> Participant {
    Participant::facilitator(name, "GM", "127.0.0.x")
}

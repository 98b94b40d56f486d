//! Dice Engine
//!
//! Produces rolls from the environment's secure randomness source.
//!
//! ## Flags
//!
//! Every die is checked against two thresholds, independently and literally:
//!
//! - `critical` iff `value <= critical_at`
//! - `complication` iff `value >= complication_at`
//!
//! Nothing stops a caller from passing thresholds that overlap or exceed the
//! die range. A value may then carry both flags, or neither.

use std::{fmt, time::SystemTime};

use serde::{Deserialize, Serialize};

use crate::{
    env::{EntropyError, Environment},
    participant::Participant,
};

/// Upper bound on up-front allocation for a roll's outcomes.
const MAX_PREALLOCATED_DICE: usize = 1024;

/// Parameters of a single roll request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollRequest {
    /// Number of faces on each die. Must be at least 1.
    pub sides: i64,
    /// Number of dice to throw. Must not be negative.
    pub count: i64,
    /// Values at or below this are critical.
    pub critical_at: i64,
    /// Values at or above this are complications.
    pub complication_at: i64,
}

impl RollRequest {
    /// Request `count` dice of `sides` faces with thresholds that match a
    /// natural 1 (critical) and a natural maximum (complication).
    pub fn new(sides: i64, count: i64) -> Self {
        Self { sides, count, critical_at: 1, complication_at: sides }
    }

    /// Override both thresholds.
    #[must_use]
    pub fn with_thresholds(mut self, critical_at: i64, complication_at: i64) -> Self {
        self.critical_at = critical_at;
        self.complication_at = complication_at;
        self
    }
}

/// Outcome of a single die.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DieOutcome {
    /// Face that came up, in `[1, sides]`.
    pub value: i64,
    /// Value is at or below the critical threshold.
    pub critical: bool,
    /// Value is at or above the complication threshold.
    pub complication: bool,
}

/// A completed roll. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roll {
    /// Die outcomes in draw order.
    pub dice: Vec<DieOutcome>,
    /// Faces per die.
    pub sides: i64,
    /// When the roll was produced.
    pub timestamp: SystemTime,
    /// Snapshot of who rolled.
    pub roller: Participant,
}

impl Roll {
    /// Sum of all die values.
    pub fn total(&self) -> i64 {
        self.dice.iter().map(|d| d.value).sum()
    }

    /// Number of dice flagged critical.
    pub fn criticals(&self) -> usize {
        self.dice.iter().filter(|d| d.critical).count()
    }

    /// Number of dice flagged as complications.
    pub fn complications(&self) -> usize {
        self.dice.iter().filter(|d| d.complication).count()
    }
}

impl fmt::Display for Roll {
    /// Values joined with `" | "`, e.g. `3 | 17 | 20`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, die) in self.dice.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{}", die.value)?;
        }
        Ok(())
    }
}

/// Errors from roll requests.
#[derive(Debug, thiserror::Error)]
pub enum DiceError {
    /// Dice need at least one face.
    #[error("invalid number of sides: {0}")]
    InvalidSides(i64),

    /// Dice count was negative.
    #[error("invalid number of dice: {0}")]
    InvalidCount(i64),

    /// Randomness source failed mid-roll.
    #[error("failed to roll: {0}")]
    Entropy(#[from] EntropyError),
}

impl DiceError {
    /// Returns true if the caller sent bad parameters, as opposed to the
    /// server failing to produce randomness.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::InvalidSides(_) | Self::InvalidCount(_))
    }
}

/// Rolls dice using an [`Environment`] for randomness and time.
#[derive(Debug, Clone)]
pub struct DiceEngine<E> {
    env: E,
}

impl<E> DiceEngine<E>
where
    E: Environment,
{
    /// Create an engine backed by `env`.
    pub fn new(env: E) -> Self {
        Self { env }
    }

    /// Roll dice for `roller`.
    ///
    /// Parameters are validated before any randomness is consumed. A `count`
    /// of zero produces an empty (but timestamped) roll.
    ///
    /// # Errors
    ///
    /// - `DiceError::InvalidSides` if `sides < 1`
    /// - `DiceError::InvalidCount` if `count < 0`
    /// - `DiceError::Entropy` if the randomness source fails
    pub fn roll(&self, request: RollRequest, roller: &Participant) -> Result<Roll, DiceError> {
        let RollRequest { sides, count, critical_at, complication_at } = request;

        let faces = u64::try_from(sides)
            .ok()
            .filter(|&s| s >= 1)
            .ok_or(DiceError::InvalidSides(sides))?;
        let count = usize::try_from(count).map_err(|_| DiceError::InvalidCount(count))?;

        let mut dice = Vec::with_capacity(count.min(MAX_PREALLOCATED_DICE));
        for _ in 0..count {
            let draw = self.env.random_below(faces)?;
            // `draw < faces <= i64::MAX`, so this cannot wrap.
            let value = i64::try_from(draw).unwrap_or(i64::MAX - 1) + 1;
            dice.push(DieOutcome {
                value,
                critical: value <= critical_at,
                complication: value >= complication_at,
            });
        }

        Ok(Roll { dice, sides, timestamp: self.env.now(), roller: roller.clone() })
    }
}

//! Table State
//!
//! The shared, mutable state of one table: the roll ledger and the
//! facilitator's stats.
//!
//! ## Locking
//!
//! The ledger and the stats sit behind separate `RwLock`s. Writers hold the
//! exclusive lock for exactly one append or one stats mutation. Readers clone
//! a snapshot under the shared lock and do all further work (sorting,
//! rendering) after releasing it.
//!
//! Poisoned locks are recovered: every critical section either completes its
//! single assignment or leaves the data untouched.

use std::{
    cmp::Reverse,
    collections::BTreeMap,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use serde::{Deserialize, Serialize};

use crate::dice::Roll;

/// Facilitator-owned counters and traits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStats {
    /// Threat pool.
    pub threat: i64,
    /// Momentum pool.
    pub momentum: i64,
    /// Traits of the current scene, in display order.
    pub scene_traits: Vec<String>,
    /// Per-character traits. Never holds an empty list.
    pub character_traits: BTreeMap<String, Vec<String>>,
}

/// A partial stats update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsUpdate {
    /// New threat value.
    pub threat: Option<i64>,
    /// New momentum value.
    pub momentum: Option<i64>,
    /// Replacement scene traits.
    pub scene_traits: Option<Vec<String>>,
    /// Replacement traits for one character; an empty list removes them.
    pub character_traits: Option<(String, Vec<String>)>,
}

impl StatsUpdate {
    /// Returns true if applying this update would touch nothing.
    pub fn is_empty(&self) -> bool {
        self.threat.is_none()
            && self.momentum.is_none()
            && self.scene_traits.is_none()
            && self.character_traits.is_none()
    }
}

impl TableStats {
    fn apply(&mut self, update: StatsUpdate) {
        if let Some(threat) = update.threat {
            self.threat = threat;
        }
        if let Some(momentum) = update.momentum {
            self.momentum = momentum;
        }
        if let Some(traits) = update.scene_traits {
            self.scene_traits = traits;
        }
        if let Some((character, traits)) = update.character_traits {
            self.set_character_traits(character, traits);
        }
    }

    fn set_character_traits(&mut self, character: String, traits: Vec<String>) {
        if traits.is_empty() {
            self.character_traits.remove(&character);
        } else {
            self.character_traits.insert(character, traits);
        }
    }
}

/// Roll ledger plus facilitator stats for one table.
#[derive(Debug, Default)]
pub struct TableState {
    rolls: RwLock<Vec<Roll>>,
    stats: RwLock<TableStats>,
}

impl TableState {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a roll to the ledger.
    pub fn append_roll(&self, roll: Roll) {
        write(&self.rolls).push(roll);
    }

    /// Number of rolls in the ledger.
    pub fn roll_count(&self) -> usize {
        read(&self.rolls).len()
    }

    /// Roll history, most recent first.
    ///
    /// Sorted by timestamp, newest first. Rolls with equal timestamps appear
    /// in reverse append order.
    pub fn sorted_rolls(&self) -> Vec<Roll> {
        let mut rolls = read(&self.rolls).clone();
        rolls.reverse();
        // Stable: equal timestamps keep the reversed append order.
        rolls.sort_by_key(|roll| Reverse(roll.timestamp));
        rolls
    }

    /// Snapshot of the current stats.
    pub fn stats(&self) -> TableStats {
        read(&self.stats).clone()
    }

    /// Set the threat pool.
    pub fn set_threat(&self, value: i64) {
        write(&self.stats).threat = value;
    }

    /// Set the momentum pool.
    pub fn set_momentum(&self, value: i64) {
        write(&self.stats).momentum = value;
    }

    /// Replace the scene traits.
    pub fn set_scene_traits(&self, traits: Vec<String>) {
        write(&self.stats).scene_traits = traits;
    }

    /// Replace the traits of one character. An empty list removes the
    /// character entirely.
    pub fn set_character_traits(&self, character: impl Into<String>, traits: Vec<String>) {
        write(&self.stats).set_character_traits(character.into(), traits);
    }

    /// Apply every field of `update` under a single exclusive acquisition and
    /// return the resulting stats.
    pub fn apply(&self, update: StatsUpdate) -> TableStats {
        let mut stats = write(&self.stats);
        stats.apply(update);
        stats.clone()
    }
}

/// Split comma-separated user input into trimmed, non-empty traits.
pub fn parse_trait_list(input: &str) -> Vec<String> {
    input.split(',').map(str::trim).filter(|t| !t.is_empty()).map(str::to_owned).collect()
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

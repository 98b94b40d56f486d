//! Table configuration.
//!
//! Loaded once at startup from a JSON file:
//!
//! ```json
//! {
//!   "facilitator_name": "GM",
//!   "party_key": "open sesame",
//!   "max_dice": 100,
//!   "max_sides": 1000
//! }
//! ```
//!
//! `facilitator_name` and `party_key` are required. The limits bound what a
//! single roll request may ask for.

use std::{fmt, fs, path::Path};

use serde::Deserialize;

/// Default upper bound on dice per request.
pub const DEFAULT_MAX_DICE: i64 = 100;

/// Default upper bound on faces per die.
pub const DEFAULT_MAX_SIDES: i64 = 1000;

/// Errors loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path that was attempted.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// File is not valid configuration JSON.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field holds an unusable value.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Per-table settings.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableConfig {
    /// Character name that grants the facilitator role on join.
    pub facilitator_name: String,
    /// Shared secret every joining participant must supply.
    pub party_key: String,
    /// Most dice one roll may request.
    #[serde(default = "default_max_dice")]
    pub max_dice: i64,
    /// Most faces one die may have.
    #[serde(default = "default_max_sides")]
    pub max_sides: i64,
}

fn default_max_dice() -> i64 {
    DEFAULT_MAX_DICE
}

fn default_max_sides() -> i64 {
    DEFAULT_MAX_SIDES
}

impl TableConfig {
    /// Configuration with default limits.
    pub fn new(facilitator_name: impl Into<String>, party_key: impl Into<String>) -> Self {
        Self {
            facilitator_name: facilitator_name.into(),
            party_key: party_key.into(),
            max_dice: DEFAULT_MAX_DICE,
            max_sides: DEFAULT_MAX_SIDES,
        }
    }

    /// Load and validate configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
        Self::from_json(&raw)
    }

    /// Parse and validate configuration from JSON text.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every field is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = self.facilitator_name.as_str();
        if name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "facilitator_name",
                reason: "must not be empty",
            });
        }
        // Join compares the trimmed character name, so a padded name could
        // never match.
        if name.trim() != name {
            return Err(ConfigError::Invalid {
                field: "facilitator_name",
                reason: "must not have surrounding whitespace",
            });
        }
        if self.party_key.is_empty() {
            return Err(ConfigError::Invalid { field: "party_key", reason: "must not be empty" });
        }
        if self.max_dice < 1 {
            return Err(ConfigError::Invalid { field: "max_dice", reason: "must be at least 1" });
        }
        if self.max_sides < 1 {
            return Err(ConfigError::Invalid { field: "max_sides", reason: "must be at least 1" });
        }
        Ok(())
    }
}

impl fmt::Debug for TableConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableConfig")
            .field("facilitator_name", &self.facilitator_name)
            .field("party_key", &"<redacted>")
            .field("max_dice", &self.max_dice)
            .field("max_sides", &self.max_sides)
            .finish()
    }
}

//! Shared application state handed to every handler.

use std::sync::Arc;

use d20_core::{
    BroadcastHub, DiceEngine, EntropyError, Environment, HubConfig, SessionCodec, SessionKey,
    TableState,
};

use crate::{config::TableConfig, system_env::SystemEnv};

/// Everything a request needs. Cheap to clone.
///
/// The roll ledger and the observer registry are independent resources with
/// their own locks; handlers mutate the table first and publish afterwards.
pub struct AppState<E = SystemEnv> {
    /// Issues and verifies session tokens.
    pub codec: Arc<SessionCodec<E>>,
    /// Rolls dice.
    pub dice: Arc<DiceEngine<E>>,
    /// Roll ledger and facilitator stats.
    pub table: Arc<TableState>,
    /// Live observer fan-out.
    pub hub: BroadcastHub,
    /// Table settings.
    pub config: Arc<TableConfig>,
}

impl<E: Environment> AppState<E> {
    /// Build state with a fresh session key drawn from `env`.
    ///
    /// Fails only if the key cannot be generated.
    pub fn new(env: E, config: TableConfig, hub: HubConfig) -> Result<Self, EntropyError> {
        let key = SessionKey::generate(&env)?;
        Ok(Self::with_key(&key, env, config, hub))
    }

    /// Build state around an existing session key.
    pub fn with_key(key: &SessionKey, env: E, config: TableConfig, hub: HubConfig) -> Self {
        Self {
            codec: Arc::new(SessionCodec::new(key, env.clone())),
            dice: Arc::new(DiceEngine::new(env)),
            table: Arc::new(TableState::new()),
            hub: BroadcastHub::with_config(hub),
            config: Arc::new(config),
        }
    }
}

impl<E> Clone for AppState<E> {
    fn clone(&self) -> Self {
        Self {
            codec: Arc::clone(&self.codec),
            dice: Arc::clone(&self.dice),
            table: Arc::clone(&self.table),
            hub: self.hub.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

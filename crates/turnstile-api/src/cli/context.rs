//! Shared state for CLI commands.
//!
//! Commands run without a conversation engine, so the store is built over
//! [`DetachedEngine`], which cannot open conversations. Only the warm tier
//! and the management operations are usable through it.

use std::path::PathBuf;
use std::sync::Arc;

use turnstile_core::session::{ConversationEngine, ConversationHandle, ExchangeReply, SessionStore, StoreSettings};
use turnstile_core::sync::KeyedMutex;
use turnstile_infra::config::{load_config, sessions_dir};
use turnstile_infra::filesystem::{JsonFileWarmStore, resolve_data_dir};
use turnstile_types::config::GatewayConfig;
use turnstile_types::error::EngineError;
use turnstile_types::session::SessionKey;

/// Engine stand-in for offline maintenance.
#[derive(Debug, Default)]
pub struct DetachedEngine;

/// Handle type of [`DetachedEngine`]; never constructed.
#[derive(Debug)]
pub enum DetachedHandle {}

impl ConversationHandle for DetachedHandle {
    async fn connect(&self) -> Result<(), EngineError> {
        match *self {}
    }

    async fn exchange(&self, _input: &str) -> Result<ExchangeReply, EngineError> {
        match *self {}
    }

    async fn disconnect(&self) {
        match *self {}
    }
}

impl ConversationEngine for DetachedEngine {
    type Handle = DetachedHandle;

    async fn begin_or_resume(
        &self,
        _key: &SessionKey,
        _resume_token: Option<&str>,
    ) -> Result<DetachedHandle, EngineError> {
        Err(EngineError::Connection(
            "no conversation engine in maintenance mode".to_string(),
        ))
    }
}

pub type MaintenanceStore = SessionStore<DetachedEngine, JsonFileWarmStore>;

/// Resolved paths and configuration for one CLI invocation.
#[derive(Debug, Clone)]
pub struct CliContext {
    pub data_dir: PathBuf,
    pub config: GatewayConfig,
    pub sessions_dir: PathBuf,
}

impl CliContext {
    /// Resolve the data directory and load `config.toml` from it.
    pub async fn init() -> Self {
        let data_dir = resolve_data_dir();
        let config = load_config(&data_dir).await;
        let sessions_dir = sessions_dir(&config, &data_dir);
        Self {
            data_dir,
            config,
            sessions_dir,
        }
    }

    pub fn warm_store(&self) -> JsonFileWarmStore {
        JsonFileWarmStore::new(&self.sessions_dir)
    }

    /// A session store over the on-disk tier with an empty hot tier.
    pub fn store(&self) -> Arc<MaintenanceStore> {
        Arc::new(SessionStore::new(
            DetachedEngine,
            self.warm_store(),
            Arc::new(KeyedMutex::new()),
            StoreSettings::from(&self.config),
        ))
    }
}

//! Gateway wiring: one lock table shared by the gate and the store.
//!
//! [`Gateway`] pins the core pieces together the way an ingestion service
//! uses them: every inbound message goes through [`Gateway::run_turn`], the
//! reaper runs in the background, and [`Gateway::shutdown`] stops the reaper
//! before disconnecting live handles.

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::info;
use turnstile_core::session::{
    ConversationEngine, Reaper, ReaperHandle, SessionStore, StoreSettings, WarmStore,
};
use turnstile_core::sync::{ConcurrencyGate, KeyedMutex};
use turnstile_core::turn::{TurnOutcome, TurnRunner};
use turnstile_types::config::GatewayConfig;
use turnstile_types::error::TurnError;
use turnstile_types::session::SessionKey;
use turnstile_types::stats::GateStats;

/// Session core for one process.
pub struct Gateway<E: ConversationEngine, W: WarmStore> {
    config: GatewayConfig,
    runner: TurnRunner<E, W>,
    reaper: Mutex<Option<ReaperHandle>>,
    shutdown: CancellationToken,
}

impl<E: ConversationEngine, W: WarmStore> Gateway<E, W> {
    /// Wire the core without starting the reaper.
    pub fn new(engine: E, warm: W, config: GatewayConfig) -> Self {
        let locks = Arc::new(KeyedMutex::new());
        let gate = Arc::new(ConcurrencyGate::new(Arc::clone(&locks)));
        let store = Arc::new(SessionStore::new(
            engine,
            warm,
            locks,
            StoreSettings::from(&config),
        ));
        let runner = TurnRunner::new(gate, store, config.acquire_timeout());

        Self {
            config,
            runner,
            reaper: Mutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    /// Wire the core and start the reaper. Must be called inside a runtime.
    pub fn start(engine: E, warm: W, config: GatewayConfig) -> Self {
        let gateway = Self::new(engine, warm, config);
        gateway.spawn_reaper();
        gateway
    }

    /// Start the background reaper if it is not already running.
    pub fn spawn_reaper(&self) {
        let mut slot = self.reaper.lock().expect("reaper lock poisoned");
        if slot.is_some() {
            return;
        }
        let handle = Reaper::new(Arc::clone(self.store())).spawn(
            self.config.hot_sweep_interval(),
            self.config.warm_sweep_interval(),
            self.shutdown.child_token(),
        );
        *slot = Some(handle);
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn gate(&self) -> &Arc<ConcurrencyGate> {
        self.runner.gate()
    }

    pub fn store(&self) -> &Arc<SessionStore<E, W>> {
        self.runner.store()
    }

    /// Run one inbound message through the session core.
    pub async fn run_turn(&self, key: &SessionKey, input: &str) -> Result<TurnOutcome, TurnError> {
        self.runner.run(key, input).await
    }

    pub fn stats(&self) -> GateStats {
        self.gate().stats()
    }

    /// Stop the reaper, then disconnect every hot handle.
    ///
    /// Persisted records are left in place for the next process.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let reaper = self.reaper.lock().expect("reaper lock poisoned").take();
        if let Some(reaper) = reaper {
            reaper.shutdown().await;
        }
        self.store().close().await;
        info!("session core shut down");
    }
}

impl<E: ConversationEngine, W: WarmStore> std::fmt::Debug for Gateway<E, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("config", &self.config)
            .field("runner", &self.runner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::{EchoEngine, MemoryWarm};
    use turnstile_types::session::Tier;

    #[tokio::test]
    async fn turns_flow_through_the_gateway() {
        let warm = Arc::new(MemoryWarm::default());
        let gateway = Gateway::new(EchoEngine::default(), Arc::clone(&warm), GatewayConfig::default());
        let key = SessionKey::new(7, "finance");

        let first = gateway.run_turn(&key, "hi").await.unwrap();
        assert_eq!(first.tier, Tier::Cold);
        assert_eq!(first.output, "hi");
        let second = gateway.run_turn(&key, "again").await.unwrap();
        assert_eq!(second.tier, Tier::Hot);

        assert_eq!(gateway.stats().total_requests, 2);
        assert_eq!(gateway.store().sessions().len(), 1);
        assert!(warm.contains(&key));
    }

    #[tokio::test]
    async fn shutdown_stops_reaper_and_keeps_disk() {
        let warm = Arc::new(MemoryWarm::default());
        let gateway = Gateway::start(EchoEngine::default(), Arc::clone(&warm), GatewayConfig::default());
        // Second call is a no-op.
        gateway.spawn_reaper();
        let key = SessionKey::new(7, "finance");
        gateway.run_turn(&key, "hi").await.unwrap();

        gateway.shutdown().await;
        assert_eq!(gateway.store().hot_len(), 0);
        assert!(warm.contains(&key));
        assert!(gateway.reaper.lock().unwrap().is_none());
    }
}

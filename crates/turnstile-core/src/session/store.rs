//! Three-tier session store.
//!
//! Resolves, on every turn, which conversation handle a key should use:
//! - **Hot:** a live handle in memory, used while younger than the hot TTL.
//! - **Warm:** a persisted resume token on disk, used to rebuild a handle
//!   after a restart or hot eviction.
//! - **Cold:** a fresh conversation.
//!
//! `resolve`, `commit`, `mark_connected`, and `handle_stale_handle` assume the
//! caller already holds the key through the [`ConcurrencyGate`]. The
//! management operations (`clear_key`, `clear_all`, `close`) take the per-key
//! lock themselves.
//!
//! [`ConcurrencyGate`]: crate::sync::ConcurrencyGate

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, info, warn};
use turnstile_types::config::GatewayConfig;
use turnstile_types::error::{EngineError, PersistenceError, SessionError};
use turnstile_types::session::{
    ClearReport, PersistedRecord, SessionKey, SessionSummary, Tier, is_expired,
};

use super::engine::{ConversationEngine, ConversationHandle};
use super::warm::{WarmEntry, WarmStore};
use crate::sync::KeyedMutex;

/// Timing knobs for the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSettings {
    pub hot_ttl: Duration,
    pub warm_ttl: Duration,
    /// How long management operations wait for an in-flight turn.
    pub lock_timeout: Duration,
}

impl From<&GatewayConfig> for StoreSettings {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            hot_ttl: config.hot_ttl(),
            warm_ttl: config.warm_ttl(),
            lock_timeout: config.acquire_timeout(),
        }
    }
}

/// Hot-tier entry: one live handle per key.
struct SessionRecord<H> {
    handle: Arc<H>,
    resume_token: String,
    created_at: DateTime<Utc>,
    last_used: DateTime<Utc>,
    turn_count: u64,
    connected: bool,
}

impl<H> SessionRecord<H> {
    fn resolved(&self, tier: Tier) -> ResolvedSession<H> {
        ResolvedSession {
            handle: Arc::clone(&self.handle),
            resume_token: self.resume_token.clone(),
            tier,
            turn_count: self.turn_count,
            connected: self.connected,
        }
    }

    fn summary(&self, key: &SessionKey) -> SessionSummary {
        SessionSummary {
            key: key.clone(),
            has_resume_token: !self.resume_token.is_empty(),
            turn_count: self.turn_count,
            connected: self.connected,
            created_at: self.created_at,
            last_used: self.last_used,
        }
    }
}

/// What a turn should talk to.
#[derive(Debug)]
pub struct ResolvedSession<H> {
    pub handle: Arc<H>,
    /// Empty when the conversation has no prior exchange.
    pub resume_token: String,
    pub tier: Tier,
    pub turn_count: u64,
    /// Whether `handle` has already completed its handshake.
    pub connected: bool,
}

impl<H> ResolvedSession<H> {
    pub fn resume_token(&self) -> Option<&str> {
        (!self.resume_token.is_empty()).then_some(self.resume_token.as_str())
    }
}

/// Tiered session store over a conversation engine and a warm tier.
pub struct SessionStore<E: ConversationEngine, W: WarmStore> {
    engine: E,
    warm: W,
    locks: Arc<KeyedMutex<SessionKey>>,
    hot: DashMap<SessionKey, SessionRecord<E::Handle>>,
    settings: StoreSettings,
}

impl<E: ConversationEngine, W: WarmStore> SessionStore<E, W> {
    /// Create a store. `locks` must be the table the gate serializes on.
    pub fn new(
        engine: E,
        warm: W,
        locks: Arc<KeyedMutex<SessionKey>>,
        settings: StoreSettings,
    ) -> Self {
        Self {
            engine,
            warm,
            locks,
            hot: DashMap::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn warm(&self) -> &W {
        &self.warm
    }

    pub fn locks(&self) -> &Arc<KeyedMutex<SessionKey>> {
        &self.locks
    }

    // --- Turn path (caller holds the key) ---

    /// Pick the handle for this turn: hot, then warm, then cold.
    pub async fn resolve(
        &self,
        key: &SessionKey,
    ) -> Result<ResolvedSession<E::Handle>, EngineError> {
        let now = Utc::now();

        let hot_expired = {
            match self.hot.get_mut(key) {
                Some(mut record) if !is_expired(record.last_used, now, self.settings.hot_ttl) => {
                    record.last_used = now;
                    record.turn_count += 1;
                    debug!(
                        room_id = key.room_id,
                        persona_id = %key.persona_id,
                        turn_count = record.turn_count,
                        tier = %Tier::Hot,
                        "resolved session"
                    );
                    return Ok(record.resolved(Tier::Hot));
                }
                Some(_) => true,
                None => false,
            }
        };
        if hot_expired {
            // The disk record outlives the hot entry; the warm check below
            // decides whether it is still usable.
            self.evict_hot(key, "expired").await;
        }

        if let Some(record) = self.load_warm(key).await {
            if record.is_expired(now, self.settings.warm_ttl) {
                debug!(room_id = key.room_id, persona_id = %key.persona_id, "persisted session expired");
                self.remove_warm(key).await;
            } else {
                let token = (!record.resume_token.is_empty()).then_some(record.resume_token.as_str());
                match self.engine.begin_or_resume(key, token).await {
                    Ok(handle) => {
                        let session = self.install(
                            key,
                            SessionRecord {
                                handle: Arc::new(handle),
                                resume_token: record.resume_token.clone(),
                                created_at: record.created_at,
                                last_used: now,
                                turn_count: record.turn_count + 1,
                                connected: false,
                            },
                            Tier::Warm,
                        );
                        info!(
                            room_id = key.room_id,
                            persona_id = %key.persona_id,
                            turn_count = session.turn_count,
                            tier = %Tier::Warm,
                            "resumed persisted session"
                        );
                        return Ok(session);
                    }
                    Err(EngineError::StaleSession) => {
                        warn!(
                            room_id = key.room_id,
                            persona_id = %key.persona_id,
                            "engine rejected persisted resume token, starting fresh"
                        );
                        self.remove_warm(key).await;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        let handle = self.engine.begin_or_resume(key, None).await?;
        let session = self.install(
            key,
            SessionRecord {
                handle: Arc::new(handle),
                resume_token: String::new(),
                created_at: now,
                last_used: now,
                turn_count: 1,
                connected: false,
            },
            Tier::Cold,
        );
        info!(
            room_id = key.room_id,
            persona_id = %key.persona_id,
            tier = %Tier::Cold,
            "started new session"
        );
        Ok(session)
    }

    /// Record a completed turn and persist it.
    ///
    /// `None` keeps the previous resume token. Returns `false` when there is
    /// no hot session to commit to. A failed disk write is logged and
    /// otherwise ignored.
    pub async fn commit(&self, key: &SessionKey, new_resume_token: Option<String>) -> bool {
        let now = Utc::now();
        let record = {
            let Some(mut session) = self.hot.get_mut(key) else {
                warn!(room_id = key.room_id, persona_id = %key.persona_id, "commit without a hot session");
                return false;
            };
            if let Some(token) = new_resume_token {
                session.resume_token = token;
            }
            session.last_used = now;
            PersistedRecord {
                resume_token: session.resume_token.clone(),
                room_id: key.room_id,
                persona_id: key.persona_id.clone(),
                last_used: now,
                created_at: session.created_at,
                turn_count: session.turn_count,
            }
        };

        if let Err(e) = self.warm.save(&record).await {
            warn!(
                room_id = key.room_id,
                persona_id = %key.persona_id,
                error = %e,
                "failed to persist session, warm tier is behind"
            );
        }
        true
    }

    /// Note that the hot handle finished its handshake.
    pub fn mark_connected(&self, key: &SessionKey) {
        if let Some(mut session) = self.hot.get_mut(key) {
            session.connected = true;
        }
    }

    /// Forget everything about `key` after the engine reported it stale.
    ///
    /// The next `resolve` goes cold. Idempotent.
    pub async fn handle_stale_handle(&self, key: &SessionKey) {
        info!(room_id = key.room_id, persona_id = %key.persona_id, "clearing stale session");
        self.clear_unlocked(key).await;
    }

    // --- Management surface ---

    /// Clear one session, waiting for any in-flight turn to finish first.
    ///
    /// Must not be called from inside a turn on the same key; use
    /// [`handle_stale_handle`](Self::handle_stale_handle) there.
    pub async fn clear_key(&self, key: &SessionKey) -> Result<bool, SessionError> {
        let Some(_guard) = self.locks.lock(key, self.settings.lock_timeout).await else {
            return Err(SessionError::Busy(key.clone()));
        };
        Ok(self.clear_unlocked(key).await)
    }

    /// Clear every session in both tiers, one key at a time.
    ///
    /// Keys that stay busy past the lock timeout are skipped and reported.
    pub async fn clear_all(&self) -> ClearReport {
        let mut keys: BTreeSet<SessionKey> = self.hot_keys().into_iter().collect();
        let mut report = ClearReport::default();

        match self.warm.scan().await {
            Ok(entries) => {
                for entry in entries {
                    match entry {
                        WarmEntry::Record { record, .. } => {
                            keys.insert(record.key());
                        }
                        WarmEntry::Corrupt { location } => {
                            if let Err(e) = self.warm.discard(&location).await {
                                warn!(%location, error = %e, "failed to discard corrupt record");
                            } else {
                                report.discarded += 1;
                            }
                        }
                    }
                }
            }
            Err(e) => warn!(error = %e, "failed to scan persisted sessions"),
        }

        for key in keys {
            match self.clear_key(&key).await {
                Ok(true) => report.cleared += 1,
                Ok(false) => {}
                Err(SessionError::Busy(key)) => {
                    warn!(room_id = key.room_id, persona_id = %key.persona_id, "session busy, not cleared");
                    report.busy.push(key);
                }
            }
        }

        info!(cleared = report.cleared, busy = report.busy.len(), "cleared all sessions");
        report
    }

    /// Summaries of every hot session, sorted by key.
    pub fn sessions(&self) -> Vec<SessionSummary> {
        let mut sessions: Vec<SessionSummary> = self
            .hot
            .iter()
            .map(|entry| entry.value().summary(entry.key()))
            .collect();
        sessions.sort_by(|a, b| a.key.cmp(&b.key));
        sessions
    }

    /// Number of hot sessions.
    pub fn hot_len(&self) -> usize {
        self.hot.len()
    }

    pub fn is_hot(&self, key: &SessionKey) -> bool {
        self.hot.contains_key(key)
    }

    /// Disconnect every hot handle. Persisted records are kept so the next
    /// process can resume.
    pub async fn close(&self) {
        for key in self.hot_keys() {
            match self.locks.lock(&key, self.settings.lock_timeout).await {
                Some(_guard) => {
                    self.evict_hot(&key, "shutdown").await;
                }
                None => {
                    warn!(room_id = key.room_id, persona_id = %key.persona_id, "session busy at shutdown, left connected")
                }
            }
        }
    }

    // --- Reaper support ---

    /// Keys whose hot entry has outlived the TTL as of `now`.
    pub(crate) fn expired_hot_keys(&self, now: DateTime<Utc>) -> Vec<SessionKey> {
        self.hot
            .iter()
            .filter(|entry| is_expired(entry.value().last_used, now, self.settings.hot_ttl))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Evict the hot entry if it is still expired. Caller holds the key.
    pub(crate) async fn evict_hot_if_expired(&self, key: &SessionKey, now: DateTime<Utc>) -> bool {
        let ttl = self.settings.hot_ttl;
        match self
            .hot
            .remove_if(key, |_, record| is_expired(record.last_used, now, ttl))
        {
            Some((_, record)) => {
                debug!(room_id = key.room_id, persona_id = %key.persona_id, "evicted expired session");
                record.handle.disconnect().await;
                true
            }
            None => false,
        }
    }

    // --- Internals ---

    fn hot_keys(&self) -> Vec<SessionKey> {
        self.hot.iter().map(|entry| entry.key().clone()).collect()
    }

    fn install(
        &self,
        key: &SessionKey,
        record: SessionRecord<E::Handle>,
        tier: Tier,
    ) -> ResolvedSession<E::Handle> {
        let session = record.resolved(tier);
        // Expired entries are evicted before the warm/cold paths run, so
        // nothing is replaced here while the caller holds the key.
        self.hot.insert(key.clone(), record);
        session
    }

    async fn evict_hot(&self, key: &SessionKey, reason: &str) -> bool {
        match self.hot.remove(key) {
            Some((_, record)) => {
                debug!(room_id = key.room_id, persona_id = %key.persona_id, %reason, "evicted session");
                record.handle.disconnect().await;
                true
            }
            None => false,
        }
    }

    async fn clear_unlocked(&self, key: &SessionKey) -> bool {
        let was_hot = self.evict_hot(key, "cleared").await;
        let was_warm = self.remove_warm(key).await;
        was_hot || was_warm
    }

    /// Load the persisted record, degrading every failure to "absent".
    async fn load_warm(&self, key: &SessionKey) -> Option<PersistedRecord> {
        match self.warm.load(key).await {
            Ok(record) => record,
            Err(e @ PersistenceError::Corrupt { .. }) => {
                warn!(room_id = key.room_id, persona_id = %key.persona_id, error = %e, "discarding corrupt persisted session");
                self.remove_warm(key).await;
                None
            }
            Err(e) => {
                warn!(room_id = key.room_id, persona_id = %key.persona_id, error = %e, "failed to read persisted session");
                None
            }
        }
    }

    async fn remove_warm(&self, key: &SessionKey) -> bool {
        match self.warm.remove(key).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(room_id = key.room_id, persona_id = %key.persona_id, error = %e, "failed to delete persisted session");
                false
            }
        }
    }
}

impl<E: ConversationEngine, W: WarmStore> std::fmt::Debug for SessionStore<E, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("hot_sessions", &self.hot.len())
            .field("settings", &self.settings)
            .finish()
    }
}

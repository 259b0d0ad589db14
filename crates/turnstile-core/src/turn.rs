//! One full turn: gate, resolve, connect, exchange, commit, release.
//!
//! The runner is what the ingestion layer calls for every inbound message.
//! It owns the ordering contract between the gate and the store so callers
//! cannot resolve without holding the key or forget to release it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};
use turnstile_types::error::{EngineError, TurnError};
use turnstile_types::session::{SessionKey, Tier};

use crate::session::{ConversationEngine, ConversationHandle, SessionStore, WarmStore};
use crate::sync::{ConcurrencyGate, HoldId};

/// Result of a successful turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub output: String,
    /// Tier the final attempt resolved from.
    pub tier: Tier,
    pub turn_count: u64,
    /// Whether the first attempt hit a stale session and was retried fresh.
    pub recovered_stale: bool,
}

/// Releases the gate when the turn ends, including on cancellation.
struct GateRelease<'a> {
    gate: &'a ConcurrencyGate,
    key: &'a SessionKey,
    hold: HoldId,
}

impl Drop for GateRelease<'_> {
    fn drop(&mut self) {
        self.gate.release(self.key, self.hold);
    }
}

/// Runs turns against a gate and a store sharing one lock table.
pub struct TurnRunner<E: ConversationEngine, W: WarmStore> {
    gate: Arc<ConcurrencyGate>,
    store: Arc<SessionStore<E, W>>,
    acquire_timeout: Duration,
}

impl<E: ConversationEngine, W: WarmStore> TurnRunner<E, W> {
    pub fn new(
        gate: Arc<ConcurrencyGate>,
        store: Arc<SessionStore<E, W>>,
        acquire_timeout: Duration,
    ) -> Self {
        Self {
            gate,
            store,
            acquire_timeout,
        }
    }

    pub fn gate(&self) -> &Arc<ConcurrencyGate> {
        &self.gate
    }

    pub fn store(&self) -> &Arc<SessionStore<E, W>> {
        &self.store
    }

    /// Run one turn for `key`.
    ///
    /// A stale session is cleared and the turn retried once on a fresh
    /// conversation. A second stale result is reported as
    /// [`TurnError::StaleAfterRetry`].
    pub async fn run(&self, key: &SessionKey, input: &str) -> Result<TurnOutcome, TurnError> {
        let started = Instant::now();
        let Some(hold) = self.gate.acquire(key, self.acquire_timeout).await else {
            return Err(TurnError::Overloaded {
                key: key.clone(),
                waited: started.elapsed(),
            });
        };
        let _release = GateRelease {
            gate: &self.gate,
            key,
            hold,
        };

        match self.attempt(key, input).await {
            Err(EngineError::StaleSession) => {
                warn!(room_id = key.room_id, persona_id = %key.persona_id, "stale session, retrying fresh");
                self.store.handle_stale_handle(key).await;
                match self.attempt(key, input).await {
                    Ok(outcome) => {
                        info!(room_id = key.room_id, persona_id = %key.persona_id, "recovered from stale session");
                        Ok(TurnOutcome {
                            recovered_stale: true,
                            ..outcome
                        })
                    }
                    Err(EngineError::StaleSession) => {
                        self.store.handle_stale_handle(key).await;
                        Err(TurnError::StaleAfterRetry(key.clone()))
                    }
                    Err(e) => Err(e.into()),
                }
            }
            other => other.map_err(TurnError::from),
        }
    }

    async fn attempt(&self, key: &SessionKey, input: &str) -> Result<TurnOutcome, EngineError> {
        let session = self.store.resolve(key).await?;

        if !session.connected {
            session.handle.connect().await?;
            self.store.mark_connected(key);
        }

        let reply = session.handle.exchange(input).await?;
        self.store.commit(key, reply.resume_token).await;

        Ok(TurnOutcome {
            output: reply.output,
            tier: session.tier,
            turn_count: session.turn_count,
            recovered_stale: false,
        })
    }
}

impl<E: ConversationEngine, W: WarmStore> std::fmt::Debug for TurnRunner<E, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnRunner")
            .field("gate", &self.gate)
            .field("store", &self.store)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

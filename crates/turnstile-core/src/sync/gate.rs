//! Concurrency gate serializing turns per session key.
//!
//! Wraps a shared [`KeyedMutex`] with busy detection, blocking acquire with a
//! timeout, and usage counters. A failed acquire means "overloaded": callers
//! surface backpressure and abandon the turn. The gate never retries.
//!
//! Counters live behind their own lock so monitoring reads never contend with
//! the per-key locks on the hot path.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, warn};
use turnstile_types::session::SessionKey;
use turnstile_types::stats::GateStats;

use super::keyed_mutex::{HoldId, KeyedMutex};

#[derive(Debug, Default)]
struct GateCounters {
    total: u64,
    queued: u64,
    rejected: u64,
    active: BTreeSet<SessionKey>,
}

/// Per-key turn gate with busy detection and statistics.
pub struct ConcurrencyGate {
    locks: Arc<KeyedMutex<SessionKey>>,
    counters: Mutex<GateCounters>,
}

impl ConcurrencyGate {
    /// Build a gate over a lock table shared with the session store.
    pub fn new(locks: Arc<KeyedMutex<SessionKey>>) -> Self {
        Self {
            locks,
            counters: Mutex::new(GateCounters::default()),
        }
    }

    /// The lock table this gate serializes on.
    pub fn locks(&self) -> &Arc<KeyedMutex<SessionKey>> {
        &self.locks
    }

    /// Whether a turn currently holds the key.
    ///
    /// Probes with a transient lock attempt that is released immediately.
    pub fn is_busy(&self, key: &SessionKey) -> bool {
        self.locks.try_lock(key).is_none()
    }

    /// Wait up to `timeout` to start a turn on `key`.
    ///
    /// Returns `None` when the key stayed busy; the caller must not call
    /// `resolve` in that case. The returned id is what [`release`](Self::release)
    /// needs to end the turn.
    pub async fn acquire(&self, key: &SessionKey, timeout: Duration) -> Option<HoldId> {
        let was_busy = self.is_busy(key);
        {
            let mut counters = self.counters.lock().expect("gate counters lock poisoned");
            counters.total += 1;
            if was_busy {
                counters.queued += 1;
            }
        }
        if was_busy {
            debug!(room_id = key.room_id, persona_id = %key.persona_id, "session busy, queueing turn");
        }

        let acquired = self.locks.acquire(key, timeout).await;

        let mut counters = self.counters.lock().expect("gate counters lock poisoned");
        if acquired.is_some() {
            counters.active.insert(key.clone());
        } else {
            counters.rejected += 1;
            warn!(
                room_id = key.room_id,
                persona_id = %key.persona_id,
                timeout_ms = timeout.as_millis() as u64,
                "gate acquire timed out"
            );
        }
        acquired
    }

    /// Finish the turn identified by `hold`.
    ///
    /// A no-op unless `hold` is the key's current hold: releasing twice, or
    /// with an id from an earlier turn, never unlocks someone else's turn.
    pub fn release(&self, key: &SessionKey, hold: HoldId) {
        let mut counters = self.counters.lock().expect("gate counters lock poisoned");
        if self.locks.release(key, hold) {
            counters.active.remove(key);
        } else {
            debug!(room_id = key.room_id, persona_id = %key.persona_id, "ignoring release without the current hold");
        }
    }

    /// Snapshot of the usage counters.
    pub fn stats(&self) -> GateStats {
        let counters = self.counters.lock().expect("gate counters lock poisoned");
        GateStats {
            total_requests: counters.total,
            queued_requests: counters.queued,
            rejected_requests: counters.rejected,
            active_count: counters.active.len(),
            active_keys: counters.active.iter().cloned().collect(),
        }
    }
}

impl std::fmt::Debug for ConcurrencyGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrencyGate")
            .field("locks", &self.locks)
            .finish()
    }
}

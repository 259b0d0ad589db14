//! Lazily-created, per-key mutual exclusion.
//!
//! Each key gets its own `tokio::sync::Mutex`, created on first use and
//! dropped from the table once nobody holds or waits on it. The table itself
//! is a `DashMap`, so get-or-insert is atomic per shard.
//!
//! Two styles of use are supported:
//! - **Guards:** [`KeyedMutex::lock`] / [`KeyedMutex::try_lock`] return a
//!   [`KeyGuard`] that unlocks on drop.
//! - **Acquire/release:** [`KeyedMutex::acquire`] parks the guard inside the
//!   table and hands back a [`HoldId`]. [`KeyedMutex::release`] only unlocks
//!   when given the id of the current hold, so a release from anyone else
//!   (a timed-out waiter, a repeated cleanup) is a no-op.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

/// Lock table entry: the mutex plus the number of holders and waiters.
struct LockSlot {
    mutex: Arc<Mutex<()>>,
    refs: usize,
}

type SlotTable<K> = Arc<DashMap<K, LockSlot>>;

/// One counted reference on a slot. The slot is removed when the last
/// reference drops.
struct SlotRef<K: Eq + Hash + Clone> {
    key: K,
    slots: SlotTable<K>,
}

impl<K: Eq + Hash + Clone> Drop for SlotRef<K> {
    fn drop(&mut self) {
        if let Entry::Occupied(mut slot) = self.slots.entry(self.key.clone()) {
            slot.get_mut().refs -= 1;
            if slot.get().refs == 0 {
                slot.remove();
            }
        }
    }
}

/// Exclusive hold on one key. Unlocks when dropped.
pub struct KeyGuard<K: Eq + Hash + Clone> {
    // Declaration order is drop order: unlock before giving up the slot,
    // otherwise a newcomer could create a second mutex for the same key.
    _guard: OwnedMutexGuard<()>,
    slot: SlotRef<K>,
}

impl<K: Eq + Hash + Clone> KeyGuard<K> {
    /// The key this guard holds.
    pub fn key(&self) -> &K {
        &self.slot.key
    }
}

impl<K: Eq + Hash + Clone + fmt::Debug> fmt::Debug for KeyGuard<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyGuard").field("key", &self.slot.key).finish()
    }
}

/// Proof of one parked hold, returned by `acquire` and required by `release`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HoldId(u64);

struct ParkedHold<K: Eq + Hash + Clone> {
    id: HoldId,
    _guard: KeyGuard<K>,
}

/// Per-key mutex table.
pub struct KeyedMutex<K: Eq + Hash + Clone> {
    slots: SlotTable<K>,
    /// Guards parked by `acquire` / `try_acquire`, waiting for `release`.
    held: DashMap<K, ParkedHold<K>>,
    next_hold: AtomicU64,
}

impl<K> KeyedMutex<K>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            held: DashMap::new(),
            next_hold: AtomicU64::new(1),
        }
    }

    fn park(&self, key: &K, guard: KeyGuard<K>) -> HoldId {
        let id = HoldId(self.next_hold.fetch_add(1, Ordering::Relaxed));
        self.held.insert(key.clone(), ParkedHold { id, _guard: guard });
        id
    }

    /// Take a counted reference on the key's slot, creating it if needed.
    fn checkout(&self, key: &K) -> (Arc<Mutex<()>>, SlotRef<K>) {
        let mut slot = self.slots.entry(key.clone()).or_insert_with(|| LockSlot {
            mutex: Arc::new(Mutex::new(())),
            refs: 0,
        });
        slot.refs += 1;
        let mutex = Arc::clone(&slot.mutex);
        drop(slot);

        let slot_ref = SlotRef {
            key: key.clone(),
            slots: Arc::clone(&self.slots),
        };
        (mutex, slot_ref)
    }

    /// Wait up to `timeout` for the key. Returns `None` on timeout.
    ///
    /// Cancellation-safe: dropping the future while it waits leaves no
    /// stale entry behind.
    pub async fn lock(&self, key: &K, timeout: Duration) -> Option<KeyGuard<K>> {
        let (mutex, slot) = self.checkout(key);
        match tokio::time::timeout(timeout, mutex.lock_owned()).await {
            Ok(guard) => Some(KeyGuard {
                _guard: guard,
                slot,
            }),
            Err(_) => None,
        }
    }

    /// Take the key only if it is free right now.
    pub fn try_lock(&self, key: &K) -> Option<KeyGuard<K>> {
        let (mutex, slot) = self.checkout(key);
        mutex.try_lock_owned().ok().map(|guard| KeyGuard {
            _guard: guard,
            slot,
        })
    }

    /// Blocking acquire that parks the guard until [`release`](Self::release).
    ///
    /// Returns `None` if the key stayed locked for the whole `timeout`.
    pub async fn acquire(&self, key: &K, timeout: Duration) -> Option<HoldId> {
        let guard = self.lock(key, timeout).await?;
        Some(self.park(key, guard))
    }

    /// Non-blocking variant of [`acquire`](Self::acquire).
    pub fn try_acquire(&self, key: &K) -> Option<HoldId> {
        let guard = self.try_lock(key)?;
        Some(self.park(key, guard))
    }

    /// Release the hold `hold` on `key`.
    ///
    /// Returns `false` (and does nothing) unless `hold` is the key's current
    /// hold, so error paths may release twice and a stale id never unlocks a
    /// later holder.
    pub fn release(&self, key: &K, hold: HoldId) -> bool {
        // The removed guard drops after the shard lock is gone.
        let released = self
            .held
            .remove_if(key, |_, parked| parked.id == hold)
            .is_some();
        if !released {
            trace!("release without the current hold");
        }
        released
    }

    /// Whether a parked (acquire-style) hold exists for the key.
    pub fn is_held(&self, key: &K) -> bool {
        self.held.contains_key(key)
    }

    /// Keys currently parked by `acquire` / `try_acquire`.
    pub fn held_keys(&self) -> Vec<K> {
        self.held.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of live lock entries (held or waited on).
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

impl<K> Default for KeyedMutex<K>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone> fmt::Debug for KeyedMutex<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedMutex")
            .field("slots", &self.slots.len())
            .field("held", &self.held.len())
            .finish()
    }
}

//! Periodic TTL sweeps over the hot and warm tiers.
//!
//! The reaper runs as a single background task with two cadences: a frequent
//! in-memory sweep and a slower on-disk sweep. Both run once at startup so a
//! restarted process drops records that expired while it was down.
//!
//! Each key is locked individually (and only if free) while it is evicted. A
//! sweep never holds a lock across keys, and busy keys are left for the next
//! pass.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::engine::ConversationEngine;
use super::store::SessionStore;
use super::warm::{WarmEntry, WarmStore};

/// Smallest accepted sweep interval (`tokio::time::interval` rejects zero).
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Background evictor for a [`SessionStore`].
pub struct Reaper<E: ConversationEngine, W: WarmStore> {
    store: Arc<SessionStore<E, W>>,
}

impl<E: ConversationEngine, W: WarmStore> Reaper<E, W> {
    pub fn new(store: Arc<SessionStore<E, W>>) -> Self {
        Self { store }
    }

    /// Evict hot sessions idle past the hot TTL. Returns how many went.
    pub async fn sweep_hot(&self) -> usize {
        let candidates = self.store.expired_hot_keys(Utc::now());
        let mut evicted = 0;

        for key in candidates {
            let Some(_guard) = self.store.locks().try_lock(&key) else {
                debug!(room_id = key.room_id, persona_id = %key.persona_id, "session busy, skipping eviction");
                continue;
            };
            // Re-check under the lock: a turn may have touched it since.
            if self.store.evict_hot_if_expired(&key, Utc::now()).await {
                evicted += 1;
            }
        }

        if evicted > 0 {
            info!(evicted, remaining = self.store.hot_len(), "hot sweep complete");
        }
        evicted
    }

    /// Delete persisted records idle past the warm TTL, plus anything that
    /// fails to parse. Returns how many went.
    pub async fn sweep_warm(&self) -> usize {
        let warm = self.store.warm();
        let ttl = self.store.settings().warm_ttl;

        let entries = match warm.scan().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "failed to scan persisted sessions");
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries {
            match entry {
                WarmEntry::Record { record, location } => {
                    if !record.is_expired(Utc::now(), ttl) {
                        continue;
                    }
                    let key = record.key();
                    let Some(_guard) = self.store.locks().try_lock(&key) else {
                        continue;
                    };
                    // A turn may have committed between the scan and the lock.
                    if let Ok(Some(current)) = warm.load(&key).await {
                        if !current.is_expired(Utc::now(), ttl) {
                            continue;
                        }
                    }
                    match warm.remove(&key).await {
                        Ok(true) => {
                            debug!(room_id = key.room_id, persona_id = %key.persona_id, "deleted expired persisted session");
                            removed += 1;
                        }
                        // Found somewhere `load` never looks for its key.
                        Ok(false) => match warm.discard(&location).await {
                            Ok(()) => {
                                warn!(%location, room_id = key.room_id, persona_id = %key.persona_id, "deleted misplaced persisted session");
                                removed += 1;
                            }
                            Err(e) => warn!(%location, error = %e, "failed to delete misplaced persisted session"),
                        },
                        Err(e) => {
                            warn!(room_id = key.room_id, persona_id = %key.persona_id, error = %e, "failed to delete persisted session")
                        }
                    }
                }
                WarmEntry::Corrupt { location } => match warm.discard(&location).await {
                    Ok(()) => {
                        warn!(%location, "deleted unreadable persisted session");
                        removed += 1;
                    }
                    Err(e) => warn!(%location, error = %e, "failed to delete unreadable persisted session"),
                },
            }
        }

        if removed > 0 {
            info!(removed, "warm sweep complete");
        }
        removed
    }

    /// Run both sweeps on their intervals until `cancel` fires.
    pub fn spawn(
        self,
        hot_interval: Duration,
        warm_interval: Duration,
        cancel: CancellationToken,
    ) -> ReaperHandle {
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let mut hot_tick = tokio::time::interval(hot_interval.max(MIN_INTERVAL));
            hot_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut warm_tick = tokio::time::interval(warm_interval.max(MIN_INTERVAL));
            warm_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                hot_interval_secs = hot_interval.as_secs(),
                warm_interval_secs = warm_interval.as_secs(),
                "reaper started"
            );
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = hot_tick.tick() => {
                        self.sweep_hot().await;
                    }
                    _ = warm_tick.tick() => {
                        self.sweep_warm().await;
                    }
                }
            }
            info!("reaper stopped");
        });

        ReaperHandle { cancel, task }
    }
}

/// Handle to a running reaper task.
#[derive(Debug)]
pub struct ReaperHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Stop the reaper and wait for any in-progress sweep to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "reaper task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::store::StoreSettings;
    use crate::session::testing::{MemoryWarmStore, MockEngine, finance, settings};
    use crate::sync::KeyedMutex;
    use turnstile_types::session::{PersistedRecord, SessionKey, Tier};

    const HOUR: Duration = Duration::from_secs(3600);
    const SHORT: Duration = Duration::from_millis(30);

    fn make_store(
        warm: &Arc<MemoryWarmStore>,
        settings: StoreSettings,
    ) -> Arc<SessionStore<MockEngine, Arc<MemoryWarmStore>>> {
        Arc::new(SessionStore::new(
            MockEngine::default(),
            Arc::clone(warm),
            Arc::new(KeyedMutex::new()),
            settings,
        ))
    }

    fn persisted(key: &SessionKey, age: chrono::TimeDelta) -> PersistedRecord {
        let at = Utc::now() - age;
        PersistedRecord {
            resume_token: "tok".to_string(),
            room_id: key.room_id,
            persona_id: key.persona_id.clone(),
            last_used: at,
            created_at: at,
            turn_count: 1,
        }
    }

    #[tokio::test]
    async fn hot_sweep_evicts_expired_and_keeps_fresh_disk() {
        let warm = Arc::new(MemoryWarmStore::default());
        let store = make_store(&warm, settings(SHORT, HOUR));
        let key = finance();

        let session = store.resolve(&key).await.unwrap();
        store.commit(&key, Some("tok-A".to_string())).await;
        tokio::time::sleep(SHORT * 2).await;

        let reaper = Reaper::new(Arc::clone(&store));
        assert_eq!(reaper.sweep_hot().await, 1);
        assert!(!store.is_hot(&key));
        assert!(session.handle.disconnected.load(std::sync::atomic::Ordering::SeqCst));

        // Disk record is still fresh, so the next turn resumes warm.
        let next = store.resolve(&key).await.unwrap();
        assert_eq!(next.tier, Tier::Warm);
        assert_eq!(next.resume_token, "tok-A");
    }

    #[tokio::test]
    async fn sweeps_of_both_tiers_lead_to_cold() {
        let warm = Arc::new(MemoryWarmStore::default());
        let store = make_store(&warm, settings(SHORT, SHORT));
        let key = finance();

        store.resolve(&key).await.unwrap();
        store.commit(&key, Some("tok-A".to_string())).await;
        tokio::time::sleep(SHORT * 2).await;

        let reaper = Reaper::new(Arc::clone(&store));
        assert_eq!(reaper.sweep_hot().await, 1);
        assert_eq!(reaper.sweep_warm().await, 1);
        assert!(warm.get(&key).is_none());

        assert_eq!(store.resolve(&key).await.unwrap().tier, Tier::Cold);
    }

    #[tokio::test]
    async fn hot_sweep_skips_busy_keys() {
        let warm = Arc::new(MemoryWarmStore::default());
        let store = make_store(&warm, settings(SHORT, HOUR));
        let key = finance();

        store.resolve(&key).await.unwrap();
        tokio::time::sleep(SHORT * 2).await;

        let turn = store.locks().lock(&key, HOUR).await.unwrap();
        let reaper = Reaper::new(Arc::clone(&store));
        assert_eq!(reaper.sweep_hot().await, 0);
        assert!(store.is_hot(&key));

        drop(turn);
        assert_eq!(reaper.sweep_hot().await, 1);
    }

    #[tokio::test]
    async fn hot_sweep_leaves_fresh_sessions() {
        let warm = Arc::new(MemoryWarmStore::default());
        let store = make_store(&warm, settings(HOUR, HOUR));
        store.resolve(&finance()).await.unwrap();

        let reaper = Reaper::new(Arc::clone(&store));
        assert_eq!(reaper.sweep_hot().await, 0);
        assert_eq!(store.hot_len(), 1);
    }

    #[tokio::test]
    async fn warm_sweep_removes_expired_and_corrupt_only() {
        let warm = Arc::new(MemoryWarmStore::default());
        let store = make_store(&warm, settings(HOUR, HOUR));

        let old = SessionKey::new(1, "finance");
        let fresh = SessionKey::new(2, "finance");
        warm.insert(persisted(&old, chrono::TimeDelta::hours(3)));
        warm.insert(persisted(&fresh, chrono::TimeDelta::minutes(3)));
        warm.add_orphan("9__broken.json");

        let reaper = Reaper::new(Arc::clone(&store));
        assert_eq!(reaper.sweep_warm().await, 2);
        assert!(warm.get(&old).is_none());
        assert!(warm.get(&fresh).is_some());
        assert_eq!(warm.len(), 1);
    }

    #[tokio::test]
    async fn warm_sweep_deletes_expired_record_stored_under_another_name() {
        let warm = Arc::new(MemoryWarmStore::default());
        let store = make_store(&warm, settings(HOUR, HOUR));
        warm.add_misfiled("7__renamed", persisted(&finance(), chrono::TimeDelta::hours(3)));

        let reaper = Reaper::new(Arc::clone(&store));
        assert_eq!(reaper.sweep_warm().await, 1);
        assert_eq!(warm.len(), 0);
        assert_eq!(reaper.sweep_warm().await, 0);
    }

    #[tokio::test]
    async fn warm_sweep_skips_busy_keys() {
        let warm = Arc::new(MemoryWarmStore::default());
        let store = make_store(&warm, settings(HOUR, HOUR));
        let key = finance();
        warm.insert(persisted(&key, chrono::TimeDelta::hours(3)));

        let _turn = store.locks().lock(&key, HOUR).await.unwrap();
        let reaper = Reaper::new(Arc::clone(&store));
        assert_eq!(reaper.sweep_warm().await, 0);
        assert!(warm.get(&key).is_some());
    }

    #[tokio::test]
    async fn spawned_reaper_sweeps_and_shuts_down() {
        let warm = Arc::new(MemoryWarmStore::default());
        let store = make_store(&warm, settings(SHORT, SHORT));
        let key = finance();
        store.resolve(&key).await.unwrap();
        warm.insert(persisted(&SessionKey::new(5, "ops"), chrono::TimeDelta::hours(1)));

        let handle = Reaper::new(Arc::clone(&store)).spawn(
            Duration::from_millis(10),
            Duration::from_millis(10),
            CancellationToken::new(),
        );

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(store.hot_len(), 0);
        assert_eq!(warm.len(), 0);

        assert!(!handle.is_finished());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn parent_cancellation_stops_reaper() {
        let warm = Arc::new(MemoryWarmStore::default());
        let store = make_store(&warm, settings(HOUR, HOUR));
        let shutdown = CancellationToken::new();

        let handle = Reaper::new(store).spawn(HOUR, HOUR, shutdown.child_token());
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle.shutdown())
            .await
            .unwrap();
    }
}

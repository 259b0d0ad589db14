//! Test doubles shared by the store, reaper, and turn runner tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use turnstile_types::error::{EngineError, PersistenceError};
use turnstile_types::session::{PersistedRecord, SessionKey};

use super::engine::{ConversationEngine, ConversationHandle, ExchangeReply};
use super::store::StoreSettings;
use super::warm::{WarmEntry, WarmStore};

pub(crate) fn settings(hot_ttl: Duration, warm_ttl: Duration) -> StoreSettings {
    StoreSettings {
        hot_ttl,
        warm_ttl,
        lock_timeout: Duration::from_millis(200),
    }
}

pub(crate) fn finance() -> SessionKey {
    SessionKey::new(1, "finance")
}

/// Engine that hands out numbered handles and can be told to forget tokens.
#[derive(Debug, Default)]
pub(crate) struct MockEngine {
    next_id: AtomicUsize,
    /// Resume token passed to every `begin_or_resume`, in call order.
    pub begins: Mutex<Vec<Option<String>>>,
    /// Tokens the engine no longer recognizes.
    pub stale_tokens: Mutex<HashSet<String>>,
    /// Make even fresh conversations report stale.
    pub always_stale: AtomicBool,
    /// Reject stale tokens at construction instead of at first exchange.
    pub reject_stale_on_resume: AtomicBool,
}

impl MockEngine {
    pub fn forget(&self, token: &str) {
        self.stale_tokens.lock().unwrap().insert(token.to_string());
    }

    pub fn begins(&self) -> Vec<Option<String>> {
        self.begins.lock().unwrap().clone()
    }
}

#[derive(Debug)]
pub(crate) struct MockHandle {
    pub id: usize,
    pub resume_token: Option<String>,
    stale: bool,
    exchanges: AtomicUsize,
    pub connects: AtomicUsize,
    pub disconnected: AtomicBool,
}

impl ConversationHandle for MockHandle {
    async fn connect(&self) -> Result<(), EngineError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn exchange(&self, input: &str) -> Result<ExchangeReply, EngineError> {
        if self.stale {
            return Err(EngineError::StaleSession);
        }
        let n = self.exchanges.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ExchangeReply {
            output: format!("echo: {input}"),
            resume_token: Some(format!("tok-{}-{n}", self.id)),
        })
    }

    async fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }
}

impl ConversationEngine for MockEngine {
    type Handle = MockHandle;

    async fn begin_or_resume(
        &self,
        _key: &SessionKey,
        resume_token: Option<&str>,
    ) -> Result<MockHandle, EngineError> {
        self.begins
            .lock()
            .unwrap()
            .push(resume_token.map(str::to_string));

        let stale = match resume_token {
            Some(token) => self.stale_tokens.lock().unwrap().contains(token),
            None => false,
        } || self.always_stale.load(Ordering::SeqCst);

        if stale && resume_token.is_some() && self.reject_stale_on_resume.load(Ordering::SeqCst) {
            return Err(EngineError::StaleSession);
        }

        Ok(MockHandle {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            resume_token: resume_token.map(str::to_string),
            stale,
            exchanges: AtomicUsize::new(0),
            connects: AtomicUsize::new(0),
            disconnected: AtomicBool::new(false),
        })
    }
}

/// In-memory warm tier.
#[derive(Debug, Default)]
pub(crate) struct MemoryWarmStore {
    records: Mutex<HashMap<SessionKey, PersistedRecord>>,
    /// Keys whose stored record reads back as corrupt.
    corrupt_keys: Mutex<HashSet<SessionKey>>,
    /// Unparseable entries with no recoverable key.
    orphans: Mutex<Vec<String>>,
    /// Readable records stored at a location other than their key's.
    misfiled: Mutex<Vec<(String, PersistedRecord)>>,
    pub fail_saves: AtomicBool,
}

impl MemoryWarmStore {
    pub fn insert(&self, record: PersistedRecord) {
        self.records.lock().unwrap().insert(record.key(), record);
    }

    pub fn get(&self, key: &SessionKey) -> Option<PersistedRecord> {
        self.records.lock().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
            + self.orphans.lock().unwrap().len()
            + self.misfiled.lock().unwrap().len()
    }

    pub fn corrupt(&self, key: SessionKey) {
        self.corrupt_keys.lock().unwrap().insert(key);
    }

    pub fn add_orphan(&self, location: &str) {
        self.orphans.lock().unwrap().push(location.to_string());
    }

    pub fn add_misfiled(&self, location: &str, record: PersistedRecord) {
        self.misfiled
            .lock()
            .unwrap()
            .push((location.to_string(), record));
    }
}

impl WarmStore for MemoryWarmStore {
    async fn load(&self, key: &SessionKey) -> Result<Option<PersistedRecord>, PersistenceError> {
        if self.corrupt_keys.lock().unwrap().contains(key) {
            return Err(PersistenceError::Corrupt {
                path: key.to_string(),
                reason: "truncated".to_string(),
            });
        }
        Ok(self.get(key))
    }

    async fn save(&self, record: &PersistedRecord) -> Result<(), PersistenceError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(PersistenceError::Io {
                path: record.key().to_string(),
                source: std::io::Error::other("disk full"),
            });
        }
        self.corrupt_keys.lock().unwrap().remove(&record.key());
        self.insert(record.clone());
        Ok(())
    }

    async fn remove(&self, key: &SessionKey) -> Result<bool, PersistenceError> {
        self.corrupt_keys.lock().unwrap().remove(key);
        Ok(self.records.lock().unwrap().remove(key).is_some())
    }

    async fn scan(&self) -> Result<Vec<WarmEntry>, PersistenceError> {
        let mut entries: Vec<WarmEntry> = self
            .records
            .lock()
            .unwrap()
            .values()
            .map(|record| WarmEntry::Record {
                record: record.clone(),
                location: record.key().to_string(),
            })
            .collect();
        entries.extend(
            self.misfiled
                .lock()
                .unwrap()
                .iter()
                .map(|(location, record)| WarmEntry::Record {
                    record: record.clone(),
                    location: location.clone(),
                }),
        );
        entries.extend(
            self.orphans
                .lock()
                .unwrap()
                .iter()
                .map(|location| WarmEntry::Corrupt {
                    location: location.clone(),
                }),
        );
        Ok(entries)
    }

    async fn discard(&self, location: &str) -> Result<(), PersistenceError> {
        self.orphans.lock().unwrap().retain(|l| l != location);
        self.misfiled.lock().unwrap().retain(|(l, _)| l != location);
        Ok(())
    }
}

//! Test doubles for the gateway and router tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use turnstile_core::session::{
    ConversationEngine, ConversationHandle, ExchangeReply, WarmEntry, WarmStore,
};
use turnstile_types::error::{EngineError, PersistenceError};
use turnstile_types::session::{PersistedRecord, SessionKey};

/// Engine whose conversations echo their input.
#[derive(Debug, Default)]
pub(crate) struct EchoEngine {
    next_id: AtomicUsize,
}

#[derive(Debug)]
pub(crate) struct EchoHandle {
    id: usize,
    turns: AtomicUsize,
}

impl ConversationHandle for EchoHandle {
    async fn connect(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn exchange(&self, input: &str) -> Result<ExchangeReply, EngineError> {
        let n = self.turns.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ExchangeReply {
            output: input.to_string(),
            resume_token: Some(format!("tok-{}-{n}", self.id)),
        })
    }

    async fn disconnect(&self) {}
}

impl ConversationEngine for EchoEngine {
    type Handle = EchoHandle;

    async fn begin_or_resume(
        &self,
        _key: &SessionKey,
        _resume_token: Option<&str>,
    ) -> Result<EchoHandle, EngineError> {
        Ok(EchoHandle {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            turns: AtomicUsize::new(0),
        })
    }
}

/// In-memory warm tier.
#[derive(Debug, Default)]
pub(crate) struct MemoryWarm {
    records: Mutex<HashMap<SessionKey, PersistedRecord>>,
}

impl MemoryWarm {
    pub fn contains(&self, key: &SessionKey) -> bool {
        self.records.lock().unwrap().contains_key(key)
    }
}

impl WarmStore for MemoryWarm {
    async fn load(&self, key: &SessionKey) -> Result<Option<PersistedRecord>, PersistenceError> {
        Ok(self.records.lock().unwrap().get(key).cloned())
    }

    async fn save(&self, record: &PersistedRecord) -> Result<(), PersistenceError> {
        self.records
            .lock()
            .unwrap()
            .insert(record.key(), record.clone());
        Ok(())
    }

    async fn remove(&self, key: &SessionKey) -> Result<bool, PersistenceError> {
        Ok(self.records.lock().unwrap().remove(key).is_some())
    }

    async fn scan(&self) -> Result<Vec<WarmEntry>, PersistenceError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .map(|record| WarmEntry::Record {
                record: record.clone(),
                location: record.key().to_string(),
            })
            .collect())
    }

    async fn discard(&self, _location: &str) -> Result<(), PersistenceError> {
        Ok(())
    }
}

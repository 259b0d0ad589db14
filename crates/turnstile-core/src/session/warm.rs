//! Warm-tier port: durable storage for [`PersistedRecord`]s.
//!
//! One record per session key. Implementations must make `save` atomic
//! (a crash mid-write may lose the new record but must not corrupt the old
//! one) and report unparseable records as [`PersistenceError::Corrupt`].
//! The store treats every error here as "entry absent".

use std::future::Future;
use std::sync::Arc;

use turnstile_types::error::PersistenceError;
use turnstile_types::session::{PersistedRecord, SessionKey};

/// One item found while scanning the warm tier.
#[derive(Debug, Clone, PartialEq)]
pub enum WarmEntry {
    /// A readable record. `location` is where it was found, which is not
    /// necessarily where `load` looks for its key.
    Record {
        record: PersistedRecord,
        location: String,
    },
    /// Something that could not be parsed; `location` identifies it for
    /// [`WarmStore::discard`].
    Corrupt { location: String },
}

/// Durable storage for persisted session records.
pub trait WarmStore: Send + Sync + 'static {
    /// Load the record for `key`, if any.
    fn load(
        &self,
        key: &SessionKey,
    ) -> impl Future<Output = Result<Option<PersistedRecord>, PersistenceError>> + Send;

    /// Write (or replace) the record for its key.
    fn save(
        &self,
        record: &PersistedRecord,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    /// Delete the record for `key`. Returns whether one existed.
    fn remove(
        &self,
        key: &SessionKey,
    ) -> impl Future<Output = Result<bool, PersistenceError>> + Send;

    /// List everything in the tier, including unparseable entries.
    fn scan(&self) -> impl Future<Output = Result<Vec<WarmEntry>, PersistenceError>> + Send;

    /// Delete an entry reported by `scan`, by its location.
    fn discard(&self, location: &str)
    -> impl Future<Output = Result<(), PersistenceError>> + Send;
}

impl<T: WarmStore> WarmStore for Arc<T> {
    fn load(
        &self,
        key: &SessionKey,
    ) -> impl Future<Output = Result<Option<PersistedRecord>, PersistenceError>> + Send {
        (**self).load(key)
    }

    fn save(
        &self,
        record: &PersistedRecord,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send {
        (**self).save(record)
    }

    fn remove(
        &self,
        key: &SessionKey,
    ) -> impl Future<Output = Result<bool, PersistenceError>> + Send {
        (**self).remove(key)
    }

    fn scan(&self) -> impl Future<Output = Result<Vec<WarmEntry>, PersistenceError>> + Send {
        (**self).scan()
    }

    fn discard(
        &self,
        location: &str,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send {
        (**self).discard(location)
    }
}

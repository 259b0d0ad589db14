use std::time::Duration;

use thiserror::Error;

use crate::session::SessionKey;

/// Errors reported by the remote conversation engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The engine no longer recognizes the resume token.
    #[error("conversation engine reports the session is stale")]
    StaleSession,

    #[error("engine connection error: {0}")]
    Connection(String),

    #[error("engine request failed: {0}")]
    Failed(String),
}

/// Errors from the warm (on-disk) tier.
///
/// Never fatal: callers log these and treat the entry as absent.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt session record at {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("failed to serialize session record: {0}")]
    Serialize(String),
}

/// Errors from management operations on the session store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The key stayed locked by an in-flight turn for the whole timeout.
    #[error("session {0} is busy")]
    Busy(SessionKey),
}

/// Errors surfaced to the ingestion layer by a full turn.
#[derive(Debug, Error)]
pub enum TurnError {
    /// The gate could not be acquired in time; surface as backpressure.
    #[error("session {key} is overloaded (waited {waited:?})")]
    Overloaded { key: SessionKey, waited: Duration },

    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The engine rejected a freshly started conversation as stale too.
    #[error("session {0} stayed stale after recovery")]
    StaleAfterRetry(SessionKey),
}

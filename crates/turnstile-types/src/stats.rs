//! Concurrency gate statistics exposed on the management surface.

use serde::{Deserialize, Serialize};

use crate::session::SessionKey;

/// Snapshot of gate usage counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateStats {
    /// Every call to `acquire`, successful or not.
    pub total_requests: u64,
    /// Acquires that found their key already busy and had to wait.
    pub queued_requests: u64,
    /// Acquires that gave up after their timeout.
    pub rejected_requests: u64,
    /// Number of keys currently holding the gate.
    pub active_count: usize,
    /// Keys currently holding the gate, sorted.
    pub active_keys: Vec<SessionKey>,
}

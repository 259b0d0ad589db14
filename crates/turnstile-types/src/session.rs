//! Session identity, tier, and persisted record types.
//!
//! A conversation is identified by a [`SessionKey`] (chat room + bot persona).
//! The hot tier keeps a live engine handle in memory; the warm tier keeps a
//! [`PersistedRecord`] on disk so a restarted process can resume.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Identity of a conversation: one chat room talking to one bot persona.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    pub room_id: i64,
    pub persona_id: String,
}

impl SessionKey {
    pub fn new(room_id: i64, persona_id: impl Into<String>) -> Self {
        Self {
            room_id,
            persona_id: persona_id.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.room_id, self.persona_id)
    }
}

/// Which tier satisfied a session resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Live handle found in memory.
    Hot,
    /// Handle rebuilt from a persisted resume token.
    Warm,
    /// Fresh conversation with no prior state.
    Cold,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Hot => write!(f, "hot"),
            Tier::Warm => write!(f, "warm"),
            Tier::Cold => write!(f, "cold"),
        }
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hot" => Ok(Tier::Hot),
            "warm" => Ok(Tier::Warm),
            "cold" => Ok(Tier::Cold),
            other => Err(format!("invalid tier: '{other}'")),
        }
    }
}

/// Durable subset of a hot session, written after every committed turn.
///
/// Contains no live handle: handles cannot survive a process restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub resume_token: String,
    pub room_id: i64,
    pub persona_id: String,
    pub last_used: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Absent in records written before turn counts were persisted.
    #[serde(default)]
    pub turn_count: u64,
}

impl PersistedRecord {
    /// The key this record belongs to.
    pub fn key(&self) -> SessionKey {
        SessionKey::new(self.room_id, self.persona_id.clone())
    }

    /// Whether the record has outlived `ttl` as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        is_expired(self.last_used, now, ttl)
    }
}

/// Whether a timestamp last touched at `last_used` is older than `ttl`.
///
/// A TTL too large to represent never expires.
pub fn is_expired(last_used: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    match TimeDelta::from_std(ttl) {
        Ok(ttl) => now.signed_duration_since(last_used) >= ttl,
        Err(_) => false,
    }
}

/// Read-only view of a hot session for the management surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub key: SessionKey,
    pub has_resume_token: bool,
    pub turn_count: u64,
    pub connected: bool,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

/// Outcome of clearing every session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearReport {
    /// Keys that had hot or warm state and were cleared.
    pub cleared: usize,
    /// Unparseable warm entries deleted along the way.
    pub discarded: usize,
    /// Keys skipped because a turn held them past the lock timeout.
    pub busy: Vec<SessionKey>,
}

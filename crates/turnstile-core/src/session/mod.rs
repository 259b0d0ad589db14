//! Tiered session store and its collaborators.
//!
//! - `engine`: the conversation engine port (implemented outside this crate).
//! - `warm`: the persisted-record port (implemented in `turnstile-infra`).
//! - `store`: hot/warm/cold resolution, commit, and stale recovery.
//! - `reaper`: periodic TTL sweeps over both tiers.

pub mod engine;
pub mod reaper;
pub mod store;
pub mod warm;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{ConversationEngine, ConversationHandle, ExchangeReply};
pub use reaper::{Reaper, ReaperHandle};
pub use store::{ResolvedSession, SessionStore, StoreSettings};
pub use warm::{WarmEntry, WarmStore};

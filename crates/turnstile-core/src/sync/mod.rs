//! Per-key mutual exclusion and the concurrency gate built on it.

pub mod gate;
pub mod keyed_mutex;

pub use gate::ConcurrencyGate;
pub use keyed_mutex::{HoldId, KeyGuard, KeyedMutex};

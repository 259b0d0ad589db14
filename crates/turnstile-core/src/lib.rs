//! Session continuity and concurrency control for Turnstile.
//!
//! This crate defines the "ports" (engine and warm-store traits) that the
//! infrastructure layer implements, plus the in-process machinery built on
//! them: per-key locking, the concurrency gate, the tiered session store, and
//! the reaper. It depends only on `turnstile-types` -- never on
//! `turnstile-infra` or any filesystem code.

pub mod session;
pub mod sync;
pub mod turn;

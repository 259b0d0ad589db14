//! Shared domain types for Turnstile.
//!
//! This crate contains the types used across the gateway core: session keys,
//! persisted session records, gate statistics, configuration, and the error
//! taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod config;
pub mod error;
pub mod session;
pub mod stats;

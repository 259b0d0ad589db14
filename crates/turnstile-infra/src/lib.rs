//! Infrastructure layer for Turnstile.
//!
//! Implements the warm-tier port from `turnstile-core` on the local
//! filesystem (one atomic JSON file per session) and loads gateway
//! configuration from the data directory.

pub mod config;
pub mod filesystem;

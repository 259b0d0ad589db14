//! Application layer for Turnstile.
//!
//! - [`gateway`]: wires the gate, session store, turn runner, and reaper from
//!   a [`GatewayConfig`](turnstile_types::config::GatewayConfig).
//! - [`http`]: the admin REST router an embedding service mounts.

pub mod gateway;
pub mod http;

pub use gateway::Gateway;

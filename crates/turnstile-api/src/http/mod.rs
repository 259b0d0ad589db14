//! Admin HTTP API for the session core.
//!
//! Axum router at `/api/v1/` with the envelope response format. Exposes gate
//! statistics and the session management operations.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;

#[cfg(test)]
pub(crate) mod testing;

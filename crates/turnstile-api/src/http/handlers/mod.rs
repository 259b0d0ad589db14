//! Route handlers, one module per resource.

pub mod session;
pub mod stats;

//! Filesystem adapters for Turnstile.
//!
//! Provides the JSON-file warm tier and data directory resolution.

pub mod session_files;

use std::path::PathBuf;

pub use session_files::JsonFileWarmStore;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "TURNSTILE_DATA_DIR";

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `TURNSTILE_DATA_DIR` environment variable
/// 2. `~/.turnstile`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".turnstile");
    }

    // Last resort: current directory
    PathBuf::from(".turnstile")
}

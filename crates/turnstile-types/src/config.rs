//! Gateway configuration types for Turnstile.
//!
//! `GatewayConfig` represents the top-level `config.toml` that controls session
//! TTLs, gate timeouts, and reaper cadence.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration for the session core.
///
/// Loaded from `~/.turnstile/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Idle time after which a hot session is evicted.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// Idle time after which a persisted record is discarded.
    /// Falls back to `session_ttl_secs` when unset.
    #[serde(default)]
    pub warm_ttl_secs: Option<u64>,

    /// How long a turn waits for its session before reporting overload.
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,

    /// Cadence of the in-memory sweep.
    #[serde(default = "default_hot_sweep_interval_secs")]
    pub hot_sweep_interval_secs: u64,

    /// Cadence of the on-disk sweep.
    #[serde(default = "default_warm_sweep_interval_secs")]
    pub warm_sweep_interval_secs: u64,

    /// Directory for persisted records. Defaults to `{data_dir}/sessions`.
    #[serde(default)]
    pub sessions_dir: Option<PathBuf>,
}

fn default_session_ttl_secs() -> u64 {
    86_400
}

fn default_acquire_timeout_secs() -> u64 {
    60
}

fn default_hot_sweep_interval_secs() -> u64 {
    600
}

fn default_warm_sweep_interval_secs() -> u64 {
    3_600
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: default_session_ttl_secs(),
            warm_ttl_secs: None,
            acquire_timeout_secs: default_acquire_timeout_secs(),
            hot_sweep_interval_secs: default_hot_sweep_interval_secs(),
            warm_sweep_interval_secs: default_warm_sweep_interval_secs(),
            sessions_dir: None,
        }
    }
}

impl GatewayConfig {
    pub fn hot_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn warm_ttl(&self) -> Duration {
        Duration::from_secs(self.warm_ttl_secs.unwrap_or(self.session_ttl_secs))
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn hot_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.hot_sweep_interval_secs)
    }

    pub fn warm_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.warm_sweep_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_config_default_values() {
        let config = GatewayConfig::default();
        assert_eq!(config.hot_ttl(), Duration::from_secs(86_400));
        assert_eq!(config.warm_ttl(), config.hot_ttl());
        assert_eq!(config.acquire_timeout(), Duration::from_secs(60));
        assert!(config.sessions_dir.is_none());
    }

    #[test]
    fn test_gateway_config_deserialize_with_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config, GatewayConfig::default());
    }

    #[test]
    fn test_gateway_config_deserialize_with_values() {
        let toml_str = r#"
session_ttl_secs = 1800
warm_ttl_secs = 7200
acquire_timeout_secs = 15
hot_sweep_interval_secs = 300
warm_sweep_interval_secs = 1800
sessions_dir = "/var/lib/turnstile/sessions"
"#;
        let config: GatewayConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.hot_ttl(), Duration::from_secs(1800));
        assert_eq!(config.warm_ttl(), Duration::from_secs(7200));
        assert_eq!(config.acquire_timeout(), Duration::from_secs(15));
        assert_eq!(config.hot_sweep_interval(), Duration::from_secs(300));
        assert_eq!(config.warm_sweep_interval(), Duration::from_secs(1800));
        assert_eq!(
            config.sessions_dir,
            Some(PathBuf::from("/var/lib/turnstile/sessions"))
        );
    }

    #[test]
    fn test_warm_ttl_follows_session_ttl_when_unset() {
        let config: GatewayConfig = toml::from_str("session_ttl_secs = 42").unwrap();
        assert_eq!(config.warm_ttl(), Duration::from_secs(42));
    }
}

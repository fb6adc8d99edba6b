//! Coordinator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Deadline for one resolver call
    #[serde(rename = "resolver-timeout-ms", default = "default_resolver_timeout_ms")]
    pub resolver_timeout_ms: u64,

    /// Deadline for one journal store call
    #[serde(rename = "storage-timeout-ms", default = "default_storage_timeout_ms")]
    pub storage_timeout_ms: u64,

    /// Idle time after which an active session is reaped
    #[serde(rename = "session-ttl-secs", default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// How long closed sessions and confirm results are remembered
    #[serde(rename = "tombstone-ttl-secs", default = "default_tombstone_ttl_secs")]
    pub tombstone_ttl_secs: u64,

    /// Reaper tick
    #[serde(rename = "reap-interval-secs", default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,
}

fn default_resolver_timeout_ms() -> u64 {
    debug!("default_resolver_timeout_ms: called");
    30_000
}

fn default_storage_timeout_ms() -> u64 {
    debug!("default_storage_timeout_ms: called");
    10_000
}

fn default_session_ttl_secs() -> u64 {
    debug!("default_session_ttl_secs: called");
    86_400
}

fn default_tombstone_ttl_secs() -> u64 {
    debug!("default_tombstone_ttl_secs: called");
    86_400
}

fn default_reap_interval_secs() -> u64 {
    debug!("default_reap_interval_secs: called");
    300
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        debug!("CoordinatorConfig::default: called");
        Self {
            resolver_timeout_ms: default_resolver_timeout_ms(),
            storage_timeout_ms: default_storage_timeout_ms(),
            session_ttl_secs: default_session_ttl_secs(),
            tombstone_ttl_secs: default_tombstone_ttl_secs(),
            reap_interval_secs: default_reap_interval_secs(),
        }
    }
}

impl CoordinatorConfig {
    pub fn resolver_timeout(&self) -> Duration {
        Duration::from_millis(self.resolver_timeout_ms)
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_timeout_ms)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn tombstone_ttl(&self) -> Duration {
        Duration::from_secs(self.tombstone_ttl_secs)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.resolver_timeout(), Duration::from_secs(30));
        assert_eq!(config.storage_timeout(), Duration::from_secs(10));
        assert_eq!(config.session_ttl(), Duration::from_secs(86_400));
        assert_eq!(config.reap_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: CoordinatorConfig = serde_yaml::from_str("resolver-timeout-ms: 500\n").unwrap();
        assert_eq!(config.resolver_timeout(), Duration::from_millis(500));
        assert_eq!(config.storage_timeout_ms, 10_000);
    }
}

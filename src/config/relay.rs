//! Relay Config: a process-wide tunable the mesh relay engine consults
//! on every forwarding decision.
//!
//! Grounded on `config/mod.rs`'s `Config`/`validate`/defaults-per-field
//! pattern, simplified to the handful of knobs the relay engine needs.

use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelayConfigSummary {
    pub enabled: bool,
    pub max_relay_hops: u8,
    pub battery_threshold: u8,
}

struct Inner {
    enabled: bool,
    max_relay_hops: u8,
    battery_threshold: u8,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            enabled: true,
            max_relay_hops: 7,
            battery_threshold: 20,
        }
    }
}

/// Runtime-tunable relay policy, shared across the relay engine and any
/// configuration surface (CLI, mobile settings screen, ...).
pub struct RelayConfig {
    inner: RwLock<Inner>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl RelayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn enable(&self) {
        self.inner.write().await.enabled = true;
    }

    pub async fn disable(&self) {
        self.inner.write().await.enabled = false;
    }

    pub async fn is_enabled(&self) -> bool {
        self.inner.read().await.enabled
    }

    pub async fn set_max_relay_hops(&self, hops: u8) {
        self.inner.write().await.max_relay_hops = hops;
    }

    pub async fn max_relay_hops(&self) -> u8 {
        self.inner.read().await.max_relay_hops
    }

    pub async fn set_battery_threshold(&self, threshold: u8) {
        self.inner.write().await.battery_threshold = threshold;
    }

    pub async fn should_relay_with_battery_level(&self, level: u8) -> bool {
        level >= self.inner.read().await.battery_threshold
    }

    pub async fn get_config_summary(&self) -> RelayConfigSummary {
        let inner = self.inner.read().await;
        RelayConfigSummary {
            enabled: inner.enabled,
            max_relay_hops: inner.max_relay_hops,
            battery_threshold: inner.battery_threshold,
        }
    }

    pub async fn reset_to_defaults(&self) {
        *self.inner.write().await = Inner::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn defaults_match_spec() {
        let config = RelayConfig::new();
        let summary = config.get_config_summary().await;
        assert!(summary.enabled);
        assert_eq!(summary.max_relay_hops, 7);
        assert_eq!(summary.battery_threshold, 20);
    }

    #[tokio::test]
    async fn battery_threshold_is_inclusive() {
        let config = RelayConfig::new();
        assert!(config.should_relay_with_battery_level(20).await);
        assert!(!config.should_relay_with_battery_level(19).await);
    }

    #[tokio::test]
    async fn reset_restores_defaults_after_mutation() {
        let config = RelayConfig::new();
        config.disable().await;
        config.set_max_relay_hops(3).await;
        config.set_battery_threshold(50).await;

        config.reset_to_defaults().await;
        let summary = config.get_config_summary().await;
        assert!(summary.enabled);
        assert_eq!(summary.max_relay_hops, 7);
        assert_eq!(summary.battery_threshold, 20);
    }
}

//! Configuration for the cache.
//!
//! # Example
//!
//! ```
//! use depot_cache::config::{CacheConfig, VolumeConfig};
//!
//! // Minimal config (uses defaults)
//! let config = CacheConfig::default();
//! assert_eq!(config.delete_headroom, 0.02);
//!
//! // Full config
//! let config = CacheConfig {
//!     delete_headroom: 0.05,
//!     select_headroom: 0.25,
//!     expiry_days: 7,
//!     ..Default::default()
//! };
//!
//! let vol = VolumeConfig::new("fast", 50_000_000_000)
//!     .with_roles(depot_cache::cache::roles::SMALL_OBJECTS)
//!     .with_strategy("oldest");
//! assert!(vol.strategy().is_some());
//! ```

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::inventory::VolumeStatus;
use crate::strategy::{BigOldestStrategy, BySizeStrategy, DeletionStrategy, OldestStrategy};

/// Configuration for a [`Cache`](crate::cache::Cache) and its integrity
/// monitor.
///
/// All fields have sensible defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Extra fraction of a requested size that must be free after eviction
    #[serde(default = "default_delete_headroom")]
    pub delete_headroom: f64,

    /// Extra fraction of the shortfall worth of spare eviction candidates
    #[serde(default = "default_select_headroom")]
    pub select_headroom: f64,

    /// How long a freshly checked object is exempt from re-checking
    #[serde(default = "default_check_grace_period_secs")]
    pub check_grace_period_secs: u64,

    /// Cached objects untouched for this many days fail the expiry check
    #[serde(default = "default_expiry_days")]
    pub expiry_days: u32,

    /// Failures tolerated in one integrity sweep before it is cut short
    #[serde(default = "default_monitor_fail_limit")]
    pub monitor_fail_limit: usize,
}

fn default_delete_headroom() -> f64 { 0.02 }
fn default_select_headroom() -> f64 { 0.20 }
fn default_check_grace_period_secs() -> u64 { 3600 } // 1 hour
fn default_expiry_days() -> u32 { 14 }
fn default_monitor_fail_limit() -> usize { 10 }

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            delete_headroom: default_delete_headroom(),
            select_headroom: default_select_headroom(),
            check_grace_period_secs: default_check_grace_period_secs(),
            expiry_days: default_expiry_days(),
            monitor_fail_limit: default_monitor_fail_limit(),
        }
    }
}

/// Declarative description of one cache volume, for config-driven setup.
#[derive(Debug, Clone, Deserialize)]
pub struct VolumeConfig {
    pub name: String,
    /// capacity in bytes
    pub capacity: i64,
    /// role bitmask (see [`crate::cache::roles`])
    #[serde(default)]
    pub roles: u32,
    /// initial status; read-write when omitted
    #[serde(default)]
    pub status: Option<VolumeStatus>,
    /// deletion strategy name: "oldest", "by_size", or "big_oldest"
    #[serde(default)]
    pub strategy: Option<String>,
}

impl VolumeConfig {
    pub fn new(name: impl Into<String>, capacity: i64) -> Self {
        Self {
            name: name.into(),
            capacity,
            roles: 0,
            status: None,
            strategy: None,
        }
    }

    #[must_use]
    pub fn with_roles(mut self, roles: u32) -> Self {
        self.roles = roles;
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: VolumeStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }

    /// The registration metadata this description amounts to.
    pub fn metadata(&self) -> Map<String, Value> {
        let mut md = Map::new();
        if self.roles != 0 {
            md.insert("roles".into(), json!(self.roles));
        }
        if let Some(status) = self.status {
            let label = match status {
                VolumeStatus::Disabled => "disabled",
                VolumeStatus::InfoOnly => "info_only",
                VolumeStatus::ReadOnly => "read_only",
                VolumeStatus::ReadWrite => "read_write",
            };
            md.insert("status".into(), json!(label));
        }
        md
    }

    /// The configured deletion strategy, if the name is recognized.
    pub fn strategy(&self) -> Option<Arc<dyn DeletionStrategy>> {
        match self.strategy.as_deref() {
            Some("oldest") => Some(Arc::new(OldestStrategy::default())),
            Some("by_size") => Some(Arc::new(BySizeStrategy::default())),
            Some("big_oldest") => Some(Arc::new(BigOldestStrategy::default())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.delete_headroom, 0.02);
        assert_eq!(config.select_headroom, 0.20);
        assert_eq!(config.check_grace_period_secs, 3600);
        assert_eq!(config.expiry_days, 14);
        assert_eq!(config.monitor_fail_limit, 10);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: CacheConfig =
            serde_json::from_str(r#"{"delete_headroom": 0.1}"#).unwrap();
        assert_eq!(config.delete_headroom, 0.1);
        assert_eq!(config.select_headroom, 0.20);
    }

    #[test]
    fn test_volume_config_metadata() {
        let vol = VolumeConfig::new("v", 100)
            .with_roles(3)
            .with_status(VolumeStatus::ReadOnly)
            .with_strategy("by_size");
        let md = vol.metadata();
        assert_eq!(md["roles"], json!(3));
        assert_eq!(md["status"], json!("read_only"));
        assert!(vol.strategy().is_some());

        let plain = VolumeConfig::new("p", 100);
        assert!(plain.metadata().is_empty());
        assert!(plain.strategy().is_none());
    }

    #[test]
    fn test_volume_config_deserialize() {
        let vol: VolumeConfig = serde_json::from_str(
            r#"{"name": "fast", "capacity": 1000, "status": "read_only"}"#,
        )
        .unwrap();
        assert_eq!(vol.name, "fast");
        assert_eq!(vol.status, Some(VolumeStatus::ReadOnly));
        assert!(vol.strategy.is_none());
    }
}

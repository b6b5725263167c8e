//! Cached configuration records.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::session::Region;

/// Opaque per-region configuration as served by the remote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionConfig(serde_json::Value);

impl RegionConfig {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_value(self) -> serde_json::Value {
        self.0
    }
}

impl From<serde_json::Value> for RegionConfig {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// A config and the time it was fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub last_update: DateTime<Utc>,
    pub config: RegionConfig,
}

impl ConfigEntry {
    pub fn new(last_update: DateTime<Utc>, config: RegionConfig) -> Self {
        Self {
            last_update,
            config,
        }
    }

    /// Whether the entry is older than `interval` at `now`.
    pub fn is_stale_at(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        now - self.last_update >= interval
    }
}

/// On-disk form of the config cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredConfigs {
    #[serde(default)]
    pub configs: BTreeMap<Region, ConfigEntry>,
}

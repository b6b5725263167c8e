//! Per-region configuration cache.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use chrono::{Duration, Utc};
use serde::Serialize;

use super::{ConfigEntry, RefreshGuard, RegionConfig, StoredConfigs};
use crate::client::ConfigSource;
use crate::session::Region;
use crate::store::JsonFile;

/// Default time after which a cached config is refetched, in seconds.
pub const DEFAULT_REFRESH_SECS: i64 = 24 * 3600;

/// Result of [`ConfigCache::auto_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// The cached entry is younger than the refresh interval.
    Fresh,
    /// Another refresh for the region is already running.
    InFlight,
    /// A new config was fetched and stored.
    Updated,
    /// The fetch failed; the previous entry is kept.
    Failed,
}

/// Cached configs with time-based refresh and de-duplicated fetches.
#[derive(Debug)]
pub struct ConfigCache {
    stored: RwLock<StoredConfigs>,
    file: JsonFile<StoredConfigs>,
    file_writes: tokio::sync::Mutex<()>,
    refreshing: RefreshGuard,
    interval: Duration,
}

impl ConfigCache {
    /// Open the cache, restoring entries from `file`.
    pub async fn open(file: JsonFile<StoredConfigs>) -> Self {
        let stored = file.load_async().await;
        tracing::debug!(regions = stored.configs.len(), "restored config cache");
        Self::with_state(stored, file)
    }

    /// Cache that is never written to disk.
    pub fn in_memory() -> Self {
        Self::with_state(StoredConfigs::default(), JsonFile::ephemeral())
    }

    fn with_state(stored: StoredConfigs, file: JsonFile<StoredConfigs>) -> Self {
        Self {
            stored: RwLock::new(stored),
            file,
            file_writes: tokio::sync::Mutex::new(()),
            refreshing: RefreshGuard::new(),
            interval: Duration::seconds(DEFAULT_REFRESH_SECS),
        }
    }

    /// Override the refresh interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn config(&self, region: &Region) -> Option<RegionConfig> {
        self.entry(region).map(|entry| entry.config)
    }

    /// All cached configs by region.
    pub fn configs(&self) -> BTreeMap<Region, RegionConfig> {
        self.read()
            .configs
            .iter()
            .map(|(region, entry)| (region.clone(), entry.config.clone()))
            .collect()
    }

    pub fn entry(&self, region: &Region) -> Option<ConfigEntry> {
        self.read().configs.get(region).cloned()
    }

    /// Seed the entry for `region` and persist the cache.
    ///
    /// An existing entry keeps its `last_update` if it is newer than the
    /// seeded one.
    pub async fn insert_entry(&self, region: Region, entry: ConfigEntry) {
        {
            let mut stored = self.write();
            let last_update = match stored.configs.get(&region) {
                Some(previous) if previous.last_update > entry.last_update => previous.last_update,
                _ => entry.last_update,
            };
            stored
                .configs
                .insert(region, ConfigEntry::new(last_update, entry.config));
        }
        self.persist().await;
    }

    /// Refetch the config for `region` through `source` if it is stale.
    ///
    /// At most one refresh per region runs at a time. Failures keep the
    /// previous entry.
    pub async fn auto_update<S>(&self, region: &Region, source: &S) -> RefreshOutcome
    where
        S: ConfigSource + ?Sized,
    {
        if let Some(entry) = self.entry(region) {
            if !entry.is_stale_at(Utc::now(), self.interval) {
                return RefreshOutcome::Fresh;
            }
        }

        let Some(_reservation) = self.refreshing.reserve(region) else {
            tracing::debug!(%region, "config refresh already in progress");
            return RefreshOutcome::InFlight;
        };

        tracing::info!(%region, "refreshing config");
        match source.fetch_config(region).await {
            Ok(config) => {
                self.store_fetched(region, config);
                self.persist().await;
                RefreshOutcome::Updated
            }
            Err(e) => {
                tracing::warn!(%region, error = %e, "error updating config");
                RefreshOutcome::Failed
            }
        }
    }

    fn store_fetched(&self, region: &Region, config: RegionConfig) {
        let mut stored = self.write();
        let now = Utc::now();
        let last_update = match stored.configs.get(region) {
            Some(previous) if previous.last_update > now => previous.last_update,
            _ => now,
        };
        stored
            .configs
            .insert(region.clone(), ConfigEntry::new(last_update, config));
    }

    /// Write the current entries to disk.
    ///
    /// Writers queue on `file_writes` and snapshot only once they hold it,
    /// so a slower writer never replaces newer entries with an older set.
    async fn persist(&self) {
        let _writer = self.file_writes.lock().await;
        let snapshot = self.read().clone();
        if let Err(e) = self.file.save_async(snapshot).await {
            tracing::warn!(error = %e, "failed to persist config cache");
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoredConfigs> {
        self.stored.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoredConfigs> {
        self.stored.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ConfigCache {
    fn default() -> Self {
        Self::in_memory()
    }
}

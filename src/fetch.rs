//! Account-scoped fetches for derived surfaces.
//!
//! [`fetch_entry`] resolves an account and its region config, runs a
//! caller-supplied fetch against them, and always produces a
//! [`FetchedEntry`]. Errors become part of the entry instead of being
//! returned.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::account::AccountRecord;
use crate::cache::{ConfigCache, RegionConfig};
use crate::error::FetchError;
use crate::registry::SessionRegistry;
use crate::session::{AccountId, Region};

/// Everything a fetch needs for one account.
pub struct FetchContext {
    pub record: Arc<AccountRecord>,
    pub region: Region,
    pub config: RegionConfig,
}

/// Outcome of one [`fetch_entry`] run.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedEntry<T> {
    pub date: DateTime<Utc>,
    pub account: AccountId,
    /// The account's region, once it was known.
    pub region: Option<Region>,
    pub result: Result<T, String>,
}

impl<T> FetchedEntry<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Run `fetch` for `account_id`.
pub async fn fetch_entry<T, F, Fut>(
    registry: &SessionRegistry,
    configs: &ConfigCache,
    account_id: &AccountId,
    fetch: F,
) -> FetchedEntry<T>
where
    F: FnOnce(FetchContext) -> Fut,
    Fut: Future<Output = crate::Result<T>>,
{
    let mut region = None;
    let result = run(registry, configs, account_id, &mut region, fetch).await;

    if let Err(e) = &result {
        tracing::warn!(account = %account_id, error = %e, "fetch failed");
    }

    FetchedEntry {
        date: Utc::now(),
        account: account_id.clone(),
        region,
        result: result.map_err(|e| e.to_string()),
    }
}

async fn run<T, F, Fut>(
    registry: &SessionRegistry,
    configs: &ConfigCache,
    account_id: &AccountId,
    region_out: &mut Option<Region>,
    fetch: F,
) -> crate::Result<T>
where
    F: FnOnce(FetchContext) -> Fut,
    Fut: Future<Output = crate::Result<T>>,
{
    let record = registry.account(account_id).await?;
    let region = record.region()?;
    *region_out = Some(region.clone());

    if let Some(version) = registry.client_version() {
        record.set_client_version(&version).await;
    }

    let client = record.client();
    configs.auto_update(&region, client.as_ref()).await;

    let config = configs
        .config(&region)
        .ok_or_else(|| FetchError::NoConfig(region.clone()))?;

    fetch(FetchContext {
        record,
        region,
        config,
    })
    .await
}

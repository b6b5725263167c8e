//! Authority over known and active accounts.
//!
//! The [`SessionRegistry`] owns the persisted list of stored accounts, the
//! active [`AccountRecord`], and the cached client version. Every committed
//! change is published as a [`RegistryEvent`].

mod events;
mod state;

pub use events::{EventBus, RegistryEvent, DEFAULT_EVENT_CAPACITY};
pub use state::RegistryState;

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;

use crate::account::{AccountContext, AccountRecord};
use crate::client::AuthClient;
use crate::error::BrokerError;
use crate::multifactor::PromptSlot;
use crate::session::{AccountId, Credentials};
use crate::store::JsonFile;
use crate::Result;

#[derive(Default)]
struct RegistryInner {
    stored: Vec<AccountId>,
    active: Option<Arc<AccountRecord>>,
    client_version: Option<String>,
    load_error: Option<String>,
}

impl RegistryInner {
    fn snapshot(&self) -> RegistryState {
        RegistryState {
            active_account: self.active.as_ref().map(|record| record.id().clone()),
            stored_accounts: self.stored.clone(),
            client_version: self.client_version.clone(),
        }
    }
}

/// Tracks stored accounts and the active one.
///
/// State changes commit under a short synchronous lock. Secure store and
/// registry file I/O run afterwards on tokio's blocking pool.
pub struct SessionRegistry {
    inner: RwLock<RegistryInner>,
    file: JsonFile<RegistryState>,
    file_writes: tokio::sync::Mutex<()>,
    context: AccountContext,
    client: Arc<dyn AuthClient>,
    prompts: Arc<PromptSlot>,
    events: EventBus,
}

impl SessionRegistry {
    /// Restore the registry from `file`.
    ///
    /// A persisted active account that cannot be loaded is left inactive and
    /// its error is kept in [`load_error`](Self::load_error).
    pub async fn open(
        client: Arc<dyn AuthClient>,
        context: AccountContext,
        prompts: Arc<PromptSlot>,
        file: JsonFile<RegistryState>,
    ) -> Self {
        let mut state = file.load_async().await;
        if state.repair() {
            if let Err(e) = file.save_async(state.clone()).await {
                tracing::warn!(error = %e, "failed to save repaired registry state");
            }
        }

        let mut load_error = None;
        let mut active = None;
        if let Some(id) = &state.active_account {
            match AccountRecord::load(id, context.clone(), client.as_ref()).await {
                Ok(record) => {
                    if let Some(version) = &state.client_version {
                        record.set_client_version(version).await;
                    }
                    tracing::info!(account = %id, "restored active account");
                    active = Some(Arc::new(record));
                }
                Err(e) => {
                    tracing::error!(account = %id, error = %e, "could not load active account");
                    load_error = Some(e.to_string());
                }
            }
        }

        tracing::debug!(
            stored = state.stored_accounts.len(),
            active = active.is_some(),
            "opened session registry"
        );

        let events = prompts.events().clone();
        Self {
            inner: RwLock::new(RegistryInner {
                stored: state.stored_accounts,
                active,
                client_version: state.client_version,
                load_error,
            }),
            file,
            file_writes: tokio::sync::Mutex::new(()),
            context,
            client,
            prompts,
            events,
        }
    }

    /// Log in with `credentials`, store the resulting account, and make it
    /// active.
    ///
    /// If the active account has the same username its session is handed to
    /// the login so cookies carry over. A multifactor request is surfaced
    /// through [`prompts`](Self::prompts). On failure nothing changes.
    pub async fn add_account(&self, credentials: Credentials) -> Result<Arc<AccountRecord>> {
        let carry_over = self
            .active()
            .and_then(|record| record.session().ok())
            .filter(|session| session.username == credentials.username);

        tracing::info!(
            username = %credentials.username,
            carry_over = carry_over.is_some(),
            "adding account"
        );

        let session = self
            .client
            .login(&credentials, carry_over.as_ref(), self.prompts.as_ref())
            .await?;

        let record = Arc::new(
            AccountRecord::create(session, self.context.clone(), self.client.as_ref()).await?,
        );
        self.activate(Arc::clone(&record)).await?;
        Ok(record)
    }

    /// Deactivate `id` if it is active, otherwise make it active.
    pub async fn toggle_active(&self, id: &AccountId) -> Result<()> {
        if self.active_id().as_ref() == Some(id) {
            self.deactivate().await
        } else {
            self.set_active(id).await
        }
    }

    /// Load `id` from the secure store and make it active.
    ///
    /// Does nothing if `id` is already active. On failure the previous
    /// active account stays in place.
    pub async fn set_active(&self, id: &AccountId) -> Result<()> {
        if self.active_id().as_ref() == Some(id) {
            tracing::debug!(account = %id, "account already active");
            return Ok(());
        }

        let record =
            AccountRecord::load(id, self.context.clone(), self.client.as_ref()).await?;
        self.activate(Arc::new(record)).await?;
        self.events.emit(RegistryEvent::SurfacesInvalidated);
        Ok(())
    }

    /// Forget all stored accounts. Session bytes stay in the secure store.
    pub async fn clear(&self) -> Result<()> {
        let previous = {
            let mut inner = self.write()?;
            inner.stored.clear();
            inner.active.take()
        };
        drop(previous);
        self.persist().await;

        tracing::info!("cleared stored accounts");
        self.events
            .emit(RegistryEvent::ActiveAccountChanged { account: None });
        self.events
            .emit(RegistryEvent::StoredAccountsChanged { accounts: vec![] });
        Ok(())
    }

    /// Store `version` and apply it to the active account.
    pub async fn set_client_version(&self, version: impl Into<String>) -> Result<()> {
        let version = version.into();
        let active = {
            let mut inner = self.write()?;
            inner.client_version = Some(version.clone());
            inner.active.clone()
        };
        self.persist().await;

        if let Some(record) = active {
            record.set_client_version(&version).await;
        }
        tracing::info!(%version, "client version updated");
        self.events
            .emit(RegistryEvent::ClientVersionChanged { version });
        Ok(())
    }

    async fn activate(&self, record: Arc<AccountRecord>) -> Result<()> {
        let id = record.id().clone();
        let (previous, client_version, stored) = {
            let mut inner = self.write()?;
            let added = if inner.stored.contains(&id) {
                false
            } else {
                inner.stored.push(id.clone());
                true
            };
            let previous = inner.active.replace(Arc::clone(&record));
            inner.load_error = None;
            (previous, inner.client_version.clone(), added.then(|| inner.stored.clone()))
        };
        drop(previous);
        self.persist().await;

        if let Some(version) = client_version {
            record.set_client_version(&version).await;
        }

        tracing::info!(account = %id, "account activated");
        if let Some(accounts) = stored {
            self.events
                .emit(RegistryEvent::StoredAccountsChanged { accounts });
        }
        self.events
            .emit(RegistryEvent::ActiveAccountChanged { account: Some(id) });
        Ok(())
    }

    async fn deactivate(&self) -> Result<()> {
        let previous = self.write()?.active.take();

        if let Some(record) = &previous {
            tracing::info!(account = %record.id(), "account deactivated");
        }
        drop(previous);
        self.persist().await;
        self.events
            .emit(RegistryEvent::ActiveAccountChanged { account: None });
        Ok(())
    }

    /// Write the current state to the registry file.
    ///
    /// Writers queue on `file_writes` and snapshot only once they hold it,
    /// so the last write always carries the newest state.
    async fn persist(&self) {
        let _writer = self.file_writes.lock().await;
        let snapshot = self.read().snapshot();
        if let Err(e) = self.file.save_async(snapshot).await {
            tracing::warn!(error = %e, "failed to save registry state");
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, RegistryInner>> {
        self.inner.write().map_err(|_| BrokerError::LockPoisoned)
    }

    /// The active account record.
    pub fn active(&self) -> Option<Arc<AccountRecord>> {
        self.read().active.clone()
    }

    pub fn active_id(&self) -> Option<AccountId> {
        self.read().active.as_ref().map(|record| record.id().clone())
    }

    /// Stored account ids in insertion order.
    pub fn stored_accounts(&self) -> Vec<AccountId> {
        self.read().stored.clone()
    }

    pub fn client_version(&self) -> Option<String> {
        self.read().client_version.clone()
    }

    /// Whether the user has to log in: no active account, or its session
    /// has expired.
    pub fn requires_action(&self) -> bool {
        self.active().map_or(true, |record| record.has_expired())
    }

    /// Why the persisted active account could not be restored at startup.
    pub fn load_error(&self) -> Option<String> {
        self.read().load_error.clone()
    }

    /// The record for `id`: the active one if it matches, otherwise freshly
    /// loaded from the secure store.
    pub async fn account(&self, id: &AccountId) -> Result<Arc<AccountRecord>> {
        if let Some(active) = self.active().filter(|record| record.id() == id) {
            return Ok(active);
        }
        let record =
            AccountRecord::load(id, self.context.clone(), self.client.as_ref()).await?;
        Ok(Arc::new(record))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// The prompt slot used for multifactor logins.
    pub fn prompts(&self) -> &Arc<PromptSlot> {
        &self.prompts
    }

    pub fn context(&self) -> &AccountContext {
        &self.context
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("active", &self.active_id())
            .field("stored", &self.stored_accounts())
            .finish()
    }
}

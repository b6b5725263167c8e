//! One persisted account.

use std::sync::{Arc, Mutex, PoisonError};

use crate::client::{AuthClient, SessionConsumer, Subscription};
use crate::error::{BrokerError, LoadError, StoreError};
use crate::session::{AccountId, RecordId, Region, Session};
use crate::store::SecureStore;
use crate::Result;

use super::SessionArena;

/// Whether session mutations are written to the secure store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PersistPolicy {
    /// Write after creation and every rotation.
    #[default]
    OnMutation,
    /// Never write. Used for previews and tests that must not touch storage.
    Never,
}

/// Collaborators shared by every record.
///
/// Secure store calls may block on the OS keychain, so the async paths run
/// them on tokio's blocking pool.
#[derive(Clone)]
pub struct AccountContext {
    store: Arc<dyn SecureStore>,
    arena: Arc<SessionArena>,
    persist: PersistPolicy,
    detached_saves: Arc<Mutex<()>>,
}

impl AccountContext {
    pub fn new(store: Arc<dyn SecureStore>, persist: PersistPolicy) -> Self {
        Self {
            store,
            arena: Arc::new(SessionArena::new()),
            persist,
            detached_saves: Arc::new(Mutex::new(())),
        }
    }

    pub fn store(&self) -> &Arc<dyn SecureStore> {
        &self.store
    }

    pub fn arena(&self) -> &Arc<SessionArena> {
        &self.arena
    }

    pub fn persist_policy(&self) -> PersistPolicy {
        self.persist
    }

    async fn read_session(&self, id: &AccountId) -> std::result::Result<Vec<u8>, StoreError> {
        let store = Arc::clone(&self.store);
        let key = id.as_str().to_string();
        tokio::task::spawn_blocking(move || store.load(&key))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
    }

    async fn save(&self, session: &Session) -> Result<()> {
        if self.persist == PersistPolicy::Never {
            return Ok(());
        }

        let bytes = session.to_bytes()?;
        let store = Arc::clone(&self.store);
        let key = session.id().as_str().to_string();
        tokio::task::spawn_blocking(move || store.store(&key, &bytes))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))??;
        Ok(())
    }

    fn save_blocking(&self, session: &Session) -> Result<()> {
        if self.persist == PersistPolicy::Never {
            return Ok(());
        }

        let bytes = session.to_bytes()?;
        self.store.store(session.id().as_str(), &bytes)?;
        Ok(())
    }

    fn log_saved(session: &Session, result: Result<()>) {
        match result {
            Ok(()) => tracing::debug!(account = %session.id(), "saved account session"),
            Err(e) => {
                tracing::warn!(account = %session.id(), error = %e, "failed to save account session")
            }
        }
    }

    /// Persist the session held in `record` without blocking the caller.
    ///
    /// Inside a runtime the write goes to the blocking pool. Writes are
    /// serialized and store whatever the slot holds by then, so back-to-back
    /// rotations settle on the newest session. Outside a runtime it is
    /// written inline.
    fn save_detached(&self, record: RecordId, session: Session) {
        if self.persist == PersistPolicy::Never {
            return;
        }

        let context = self.clone();
        let job = move || {
            let _serial = context
                .detached_saves
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let latest = context
                .arena
                .get(&record)
                .ok()
                .flatten()
                .filter(|current| current.account_id == session.account_id)
                .unwrap_or(session);
            let result = context.save_blocking(&latest);
            Self::log_saved(&latest, result);
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(job);
            }
            Err(_) => job(),
        }
    }

    /// Replace the session in `record` and persist it.
    fn rotate(&self, record: RecordId, session: Session) {
        let result = self.arena.update(&record, |slot| {
            if slot.account_id != session.account_id {
                return false;
            }
            *slot = session.clone();
            true
        });

        match result {
            Ok(true) => {
                tracing::info!(account = %session.id(), %record, "storing rotated session");
                self.save_detached(record, session);
            }
            Ok(false) => tracing::warn!(
                account = %session.id(),
                %record,
                "ignoring rotated session for a different account"
            ),
            Err(BrokerError::RecordNotFound(_)) => {
                tracing::debug!(%record, "session rotated after record was released")
            }
            Err(e) => tracing::error!(%record, error = %e, "failed to store rotated session"),
        }
    }
}

impl std::fmt::Debug for AccountContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountContext")
            .field("arena", &self.arena)
            .field("persist", &self.persist)
            .finish()
    }
}

/// An account with a live session slot and a bound network consumer.
///
/// Dropping the record frees its slot and stops listening for rotations.
pub struct AccountRecord {
    id: AccountId,
    record_id: RecordId,
    context: AccountContext,
    consumer: Arc<dyn SessionConsumer>,
    _rotation: Subscription,
}

impl AccountRecord {
    /// Load the stored session for `id`.
    ///
    /// Fails with [`LoadError::AccountMismatch`] if the bytes under `id`
    /// decode to another account's session.
    pub async fn load(id: &AccountId, context: AccountContext, client: &dyn AuthClient) -> Result<Self> {
        let bytes = match context.read_session(id).await {
            Ok(bytes) => bytes,
            Err(StoreError::KeyNotFound(_)) => {
                return Err(LoadError::NoStoredSession(id.clone()).into())
            }
            Err(e) => return Err(LoadError::Store(e).into()),
        };

        let session = Session::from_bytes(&bytes).map_err(LoadError::from)?;
        if session.id() != id {
            return Err(LoadError::AccountMismatch {
                requested: id.clone(),
                stored: session.id().clone(),
            }
            .into());
        }

        tracing::debug!(account = %id, "loaded account session");
        Self::bind(session, context, client)
    }

    /// Wrap a freshly obtained session and persist it.
    pub async fn create(session: Session, context: AccountContext, client: &dyn AuthClient) -> Result<Self> {
        let record = Self::bind(session, context, client)?;
        let session = record.session()?;
        record.context.save(&session).await?;
        tracing::info!(account = %record.id, "created account");
        Ok(record)
    }

    fn bind(session: Session, context: AccountContext, client: &dyn AuthClient) -> Result<Self> {
        let id = session.id().clone();
        let consumer = client.consumer(&session);
        let record_id = context.arena.insert(session)?;

        let listener_context = context.clone();
        let rotation = consumer.on_session_update(Box::new(move |session: &Session| {
            listener_context.rotate(record_id, session.clone());
        }));

        Ok(Self {
            id,
            record_id,
            context,
            consumer,
            _rotation: rotation,
        })
    }

    pub fn id(&self) -> &AccountId {
        &self.id
    }

    pub fn record_id(&self) -> RecordId {
        self.record_id
    }

    /// Current session.
    pub fn session(&self) -> Result<Session> {
        self.context
            .arena
            .get(&self.record_id)?
            .ok_or(BrokerError::RecordNotFound(self.record_id))
    }

    pub fn region(&self) -> Result<Region> {
        Ok(self.session()?.region)
    }

    /// Whether the session is missing or expired.
    pub fn has_expired(&self) -> bool {
        self.session().map(|s| s.has_expired()).unwrap_or(true)
    }

    /// The network consumer bound to this account.
    pub fn client(&self) -> Arc<dyn SessionConsumer> {
        Arc::clone(&self.consumer)
    }

    /// Replace the session and persist it. Persistence failures are logged.
    pub fn on_session_rotated(&self, session: Session) {
        self.context.rotate(self.record_id, session);
    }

    /// Apply `version` to the consumer and re-save the session.
    pub async fn set_client_version(&self, version: &str) {
        self.consumer.set_client_version(version);
        self.try_save().await;
    }

    /// Persist the current session, logging any failure.
    pub async fn try_save(&self) {
        match self.session() {
            Ok(session) => {
                let result = self.context.save(&session).await;
                AccountContext::log_saved(&session, result);
            }
            Err(e) => tracing::warn!(account = %self.id, error = %e, "no session to save"),
        }
    }
}

impl Drop for AccountRecord {
    fn drop(&mut self) {
        if let Err(e) = self.context.arena.remove(&self.record_id) {
            tracing::warn!(record = %self.record_id, error = %e, "failed to free session slot");
        }
    }
}

impl std::fmt::Debug for AccountRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountRecord")
            .field("id", &self.id)
            .field("record_id", &self.record_id)
            .finish()
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ConfigSource, SessionListeners};
    use crate::cache::RegionConfig;
    use crate::error::{AuthError, FetchError};
    use crate::multifactor::MultifactorHandler;
    use crate::session::Credentials;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use std::sync::Mutex;

    #[derive(Default)]
    struct StubConsumer {
        listeners: SessionListeners,
        version: Mutex<Option<String>>,
    }

    #[async_trait]
    impl ConfigSource for StubConsumer {
        async fn fetch_config(&self, _region: &Region) -> std::result::Result<RegionConfig, FetchError> {
            unimplemented!("records never fetch on their own")
        }
    }

    impl SessionConsumer for StubConsumer {
        fn on_session_update(&self, listener: crate::client::SessionListener) -> Subscription {
            self.listeners.subscribe(listener)
        }

        fn set_client_version(&self, version: &str) {
            *self.version.lock().unwrap() = Some(version.to_string());
        }

        fn client_version(&self) -> Option<String> {
            self.version.lock().unwrap().clone()
        }
    }

    #[derive(Default)]
    struct StubClient {
        consumer: Arc<StubConsumer>,
    }

    #[async_trait]
    impl AuthClient for StubClient {
        async fn login(
            &self,
            _credentials: &Credentials,
            _carry_over: Option<&Session>,
            _multifactor: &dyn MultifactorHandler,
        ) -> std::result::Result<Session, AuthError> {
            unimplemented!("records are built from existing sessions")
        }

        fn consumer(&self, _session: &Session) -> Arc<dyn SessionConsumer> {
            self.consumer.clone()
        }
    }

    struct FailingStore;

    impl SecureStore for FailingStore {
        fn load(&self, key: &str) -> std::result::Result<Vec<u8>, StoreError> {
            Err(StoreError::KeyNotFound(key.to_string()))
        }

        fn store(&self, _key: &str, _value: &[u8]) -> std::result::Result<(), StoreError> {
            Err(StoreError::Write("read-only".into()))
        }
    }

    fn session(token: &str) -> Session {
        Session {
            account_id: AccountId::new("user-1").unwrap(),
            username: "alice".into(),
            access_token: token.into(),
            refresh_token: Some("refresh".into()),
            cookies: Default::default(),
            expires_at: Utc::now() + Duration::hours(1),
            region: Region::new("eu").unwrap(),
        }
    }

    fn context(store: Arc<dyn SecureStore>) -> AccountContext {
        AccountContext::new(store, PersistPolicy::OnMutation)
    }

    #[tokio::test]
    async fn test_create_persists() {
        let store = Arc::new(MemoryStore::new());
        let client = StubClient::default();
        let original = session("t1");

        let record = AccountRecord::create(original.clone(), context(store.clone()), &client)
            .await
            .unwrap();
        assert_eq!(record.id().as_str(), "user-1");
        assert!(store.contains("user-1"));

        let stored = Session::from_bytes(&store.load("user-1").unwrap()).unwrap();
        assert_eq!(stored, original);
    }

    #[tokio::test]
    async fn test_create_with_never_policy_skips_store() {
        let store = Arc::new(MemoryStore::new());
        let client = StubClient::default();
        let context = AccountContext::new(store.clone(), PersistPolicy::Never);

        let record = AccountRecord::create(session("t1"), context, &client).await.unwrap();
        record.on_session_rotated(session("t2"));

        assert!(store.is_empty());
        assert_eq!(record.session().unwrap().access_token, "t2");
    }

    #[tokio::test]
    async fn test_create_propagates_store_failure() {
        let client = StubClient::default();
        let result =
            AccountRecord::create(session("t1"), context(Arc::new(FailingStore)), &client).await;
        assert!(matches!(result, Err(BrokerError::Store(StoreError::Write(_)))));
    }

    #[tokio::test]
    async fn test_load_round_trips_created_session() {
        let store = Arc::new(MemoryStore::new());
        let client = StubClient::default();
        let created = AccountRecord::create(session("t1"), context(store.clone()), &client)
            .await
            .unwrap();
        drop(created);

        let id = AccountId::new("user-1").unwrap();
        let loaded = AccountRecord::load(&id, context(store), &client).await.unwrap();
        assert_eq!(loaded.id(), &id);
        assert_eq!(loaded.session().unwrap().access_token, "t1");
    }

    #[tokio::test]
    async fn test_load_missing_session() {
        let client = StubClient::default();
        let id = AccountId::new("ghost").unwrap();

        let err = AccountRecord::load(&id, context(Arc::new(MemoryStore::new())), &client)
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::Load(LoadError::NoStoredSession(missing)) if missing == id));
    }

    #[tokio::test]
    async fn test_load_corrupt_session() {
        let store = Arc::new(MemoryStore::new());
        store.store("user-1", b"not json").unwrap();
        let client = StubClient::default();
        let id = AccountId::new("user-1").unwrap();

        let err = AccountRecord::load(&id, context(store), &client).await.unwrap_err();
        assert!(matches!(err, BrokerError::Load(LoadError::Decode(_))));
    }

    #[tokio::test]
    async fn test_load_rejects_session_of_another_account() {
        let store = Arc::new(MemoryStore::new());
        store
            .store("user-9", &session("t1").to_bytes().unwrap())
            .unwrap();
        let client = StubClient::default();
        let ctx = context(store);
        let id = AccountId::new("user-9").unwrap();

        let err = AccountRecord::load(&id, ctx.clone(), &client).await.unwrap_err();
        match err {
            BrokerError::Load(LoadError::AccountMismatch { requested, stored }) => {
                assert_eq!(requested, id);
                assert_eq!(stored.as_str(), "user-1");
            }
            other => panic!("expected account mismatch, got {:?}", other),
        }
        assert_eq!(ctx.arena().count(), 0);
        assert_eq!(client.consumer.listeners.len(), 0);
    }

    /// Answers like a keychain that takes a while to unlock.
    struct SlowStore {
        inner: MemoryStore,
    }

    impl SecureStore for SlowStore {
        fn load(&self, key: &str) -> std::result::Result<Vec<u8>, StoreError> {
            std::thread::sleep(std::time::Duration::from_millis(200));
            self.inner.load(key)
        }

        fn store(&self, key: &str, value: &[u8]) -> std::result::Result<(), StoreError> {
            self.inner.store(key, value)
        }
    }

    #[tokio::test]
    async fn test_slow_store_does_not_stall_runtime() {
        let inner = MemoryStore::new();
        inner.store("user-1", &session("t1").to_bytes().unwrap()).unwrap();
        let client = StubClient::default();
        let ctx = context(Arc::new(SlowStore { inner }));

        let ticks = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let ticker = {
            let ticks = Arc::clone(&ticks);
            tokio::spawn(async move {
                loop {
                    ticks.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                }
            })
        };

        let id = AccountId::new("user-1").unwrap();
        let record = AccountRecord::load(&id, ctx, &client).await.unwrap();
        ticker.abort();

        assert_eq!(record.session().unwrap().access_token, "t1");
        assert!(ticks.load(std::sync::atomic::Ordering::SeqCst) >= 5);
    }

    #[test]
    fn test_rotation_through_consumer_persists() {
        let store = Arc::new(MemoryStore::new());
        let client = StubClient::default();
        let record = AccountRecord::bind(session("t1"), context(store.clone()), &client).unwrap();

        client.consumer.listeners.notify(&session("t2"));

        assert_eq!(record.session().unwrap().access_token, "t2");
        let stored = Session::from_bytes(&store.load("user-1").unwrap()).unwrap();
        assert_eq!(stored.access_token, "t2");
    }

    #[tokio::test]
    async fn test_rotation_inside_runtime_persists_in_background() {
        let store = Arc::new(MemoryStore::new());
        let client = StubClient::default();
        let record = AccountRecord::create(session("t1"), context(store.clone()), &client)
            .await
            .unwrap();

        client.consumer.listeners.notify(&session("t2"));
        client.consumer.listeners.notify(&session("t3"));
        assert_eq!(record.session().unwrap().access_token, "t3");

        let stored = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            loop {
                let stored = Session::from_bytes(&store.load("user-1").unwrap()).unwrap();
                if stored.access_token == "t3" {
                    break stored;
                }
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(stored.access_token, "t3");
    }

    #[test]
    fn test_rotation_after_drop_is_ignored() {
        let store = Arc::new(MemoryStore::new());
        let client = StubClient::default();
        let ctx = context(store.clone());
        let record = AccountRecord::bind(session("t1"), ctx.clone(), &client).unwrap();
        assert_eq!(client.consumer.listeners.len(), 1);

        drop(record);
        assert_eq!(client.consumer.listeners.len(), 0);
        assert_eq!(ctx.arena().count(), 0);

        client.consumer.listeners.notify(&session("t2"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_rotation_save_failure_keeps_session() {
        let client = StubClient::default();
        let ctx = context(Arc::new(FailingStore));
        let record = AccountRecord::bind(session("t1"), ctx, &client).unwrap();

        record.on_session_rotated(session("t2"));

        assert_eq!(record.session().unwrap().access_token, "t2");
    }

    #[tokio::test]
    async fn test_set_client_version_reaches_consumer() {
        let store = Arc::new(MemoryStore::new());
        let client = StubClient::default();
        let record = AccountRecord::create(session("t1"), context(store), &client)
            .await
            .unwrap();

        record.set_client_version("release-09.01").await;
        assert_eq!(record.client().client_version().as_deref(), Some("release-09.01"));
    }
}

//! Shared fixtures: a scripted auth client, in-memory stores, and a
//! registry harness backed by a temp directory.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::broadcast;

use account_broker::account::{AccountContext, PersistPolicy};
use account_broker::cache::RegionConfig;
use account_broker::client::{
    AuthClient, ConfigSource, SessionConsumer, SessionListener, SessionListeners, Subscription,
};
use account_broker::error::{AuthError, FetchError, StoreError};
use account_broker::multifactor::{MultifactorHandler, MultifactorInfo, PromptSlot};
use account_broker::registry::{EventBus, RegistryEvent, SessionRegistry};
use account_broker::store::{JsonFile, MemoryStore, SecureStore};
use account_broker::{AccountId, Credentials, Region, Session};

pub fn account(id: &str) -> AccountId {
    AccountId::new(id).unwrap()
}

pub fn region(raw: &str) -> Region {
    Region::new(raw).unwrap()
}

/// A session valid for an hour.
pub fn session(id: &str, username: &str, region_tag: &str) -> Session {
    Session {
        account_id: account(id),
        username: username.to_string(),
        access_token: format!("access-{}", id),
        refresh_token: Some(format!("refresh-{}", id)),
        cookies: Default::default(),
        expires_at: Utc::now() + chrono::Duration::hours(1),
        region: region(region_tag),
    }
}

pub fn credentials(username: &str) -> Credentials {
    Credentials::new(username, "password")
}

/// Scripted result of one login call.
pub enum LoginStep {
    Succeed(Session),
    /// Ask for a second factor and succeed if the answer matches `code`.
    Multifactor {
        info: MultifactorInfo,
        code: String,
        session: Session,
    },
    Fail(AuthError),
}

/// Auth client that replays a script of login outcomes.
#[derive(Default)]
pub struct FakeAuth {
    script: Mutex<VecDeque<LoginStep>>,
    logins: AtomicUsize,
    carry_overs: Mutex<Vec<Option<Session>>>,
    consumers: Mutex<Vec<Arc<FakeConsumer>>>,
    fetches: Arc<AtomicUsize>,
    failing_fetches: bool,
}

impl FakeAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumers created by this client fail every config fetch.
    pub fn with_failing_fetches() -> Self {
        Self {
            failing_fetches: true,
            ..Self::default()
        }
    }

    pub fn push(&self, step: LoginStep) {
        self.script.lock().unwrap().push_back(step);
    }

    pub fn succeed_with(&self, session: Session) {
        self.push(LoginStep::Succeed(session));
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    /// Carry-over session passed to each login, in call order.
    pub fn carry_overs(&self) -> Vec<Option<Session>> {
        self.carry_overs.lock().unwrap().clone()
    }

    pub fn last_consumer(&self) -> Arc<FakeConsumer> {
        self.consumers.lock().unwrap().last().cloned().unwrap()
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.lock().unwrap().len()
    }

    /// Config fetches across all consumers.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthClient for FakeAuth {
    async fn login(
        &self,
        _credentials: &Credentials,
        carry_over: Option<&Session>,
        multifactor: &dyn MultifactorHandler,
    ) -> Result<Session, AuthError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        self.carry_overs.lock().unwrap().push(carry_over.cloned());

        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .expect("unscripted login");

        match step {
            LoginStep::Succeed(session) => Ok(session),
            LoginStep::Fail(e) => Err(e),
            LoginStep::Multifactor {
                info,
                code,
                session,
            } => {
                let answer = multifactor.request_code(info).await?;
                if answer == code {
                    Ok(session)
                } else {
                    Err(AuthError::Rejected("wrong code".into()))
                }
            }
        }
    }

    fn consumer(&self, _session: &Session) -> Arc<dyn SessionConsumer> {
        let consumer = Arc::new(FakeConsumer {
            listeners: SessionListeners::new(),
            version: RwLock::new(None),
            fetches: Arc::clone(&self.fetches),
            failing: self.failing_fetches,
        });
        self.consumers.lock().unwrap().push(Arc::clone(&consumer));
        consumer
    }
}

/// Consumer whose config is `{"region": <tag>}`.
pub struct FakeConsumer {
    listeners: SessionListeners,
    version: RwLock<Option<String>>,
    fetches: Arc<AtomicUsize>,
    failing: bool,
}

impl FakeConsumer {
    /// Simulate the server rotating the session.
    pub fn rotate(&self, session: &Session) {
        self.listeners.notify(session);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

#[async_trait]
impl ConfigSource for FakeConsumer {
    async fn fetch_config(&self, region: &Region) -> Result<RegionConfig, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(FetchError::Status {
                status: 503,
                body: "unavailable".into(),
            });
        }
        Ok(RegionConfig::new(json!({ "region": region.as_str() })))
    }
}

impl SessionConsumer for FakeConsumer {
    fn on_session_update(&self, listener: SessionListener) -> Subscription {
        self.listeners.subscribe(listener)
    }

    fn set_client_version(&self, version: &str) {
        *self.version.write().unwrap() = Some(version.to_string());
    }

    fn client_version(&self) -> Option<String> {
        self.version.read().unwrap().clone()
    }
}

/// Store whose reads and writes always fail.
pub struct FailingStore;

impl SecureStore for FailingStore {
    fn load(&self, _key: &str) -> Result<Vec<u8>, StoreError> {
        Err(StoreError::Backend("keychain locked".into()))
    }

    fn store(&self, _key: &str, _value: &[u8]) -> Result<(), StoreError> {
        Err(StoreError::Write("keychain locked".into()))
    }
}

/// A registry over a memory store and a temp state directory.
pub struct Harness {
    pub registry: Arc<SessionRegistry>,
    pub store: Arc<MemoryStore>,
    pub auth: Arc<FakeAuth>,
    pub dir: TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_auth(FakeAuth::new()).await
    }

    pub async fn with_auth(auth: FakeAuth) -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let auth = Arc::new(auth);
        let registry = open_registry(&auth, store.clone(), &dir).await;
        Self {
            registry,
            store,
            auth,
            dir,
        }
    }

    /// Simulate a restart: a fresh registry over the same store and files.
    pub async fn reopen(&self) -> Arc<SessionRegistry> {
        open_registry(&self.auth, self.store.clone(), &self.dir).await
    }

    pub fn registry_path(&self) -> PathBuf {
        self.dir.path().join("registry.json")
    }

    pub fn stored_session(&self, id: &str) -> Option<Session> {
        self.store
            .load(id)
            .ok()
            .map(|bytes| Session::from_bytes(&bytes).unwrap())
    }

    /// Wait until the stored session for `id` carries `access_token`.
    ///
    /// Rotations are written to the store in the background.
    pub async fn wait_for_stored_token(&self, id: &str, access_token: &str) -> Session {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(session) = self.stored_session(id) {
                    if session.access_token == access_token {
                        return session;
                    }
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("timed out waiting for stored session")
    }
}

async fn open_registry(auth: &Arc<FakeAuth>, store: Arc<MemoryStore>, dir: &TempDir) -> Arc<SessionRegistry> {
    let context = AccountContext::new(store, PersistPolicy::OnMutation);
    let prompts = Arc::new(PromptSlot::new(EventBus::default()));
    Arc::new(
        SessionRegistry::open(
            auth.clone(),
            context,
            prompts,
            JsonFile::at(dir.path().join("registry.json")),
        )
        .await,
    )
}

/// Next event, failing the test after a few seconds of silence.
pub async fn next_event(rx: &mut broadcast::Receiver<RegistryEvent>) -> RegistryEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for registry event")
        .expect("event bus closed")
}

/// Every event already queued on `rx`.
pub fn drain(rx: &mut broadcast::Receiver<RegistryEvent>) -> Vec<RegistryEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

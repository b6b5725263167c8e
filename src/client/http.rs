//! JSON-over-HTTP auth and config client.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{AuthClient, ConfigSource, SessionConsumer, SessionListener, SessionListeners, Subscription};
use crate::cache::RegionConfig;
use crate::error::{AuthError, FetchError};
use crate::multifactor::{MultifactorHandler, MultifactorInfo};
use crate::session::{Credentials, Region, Session};

/// Header carrying the client version on config requests.
pub const CLIENT_VERSION_HEADER: &str = "X-Client-Version";

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<&'a Session>,
}

#[derive(Serialize)]
struct MultifactorRequest<'a> {
    ticket: &'a str,
    code: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    session: &'a Session,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AuthResponse {
    Session { session: Session },
    Multifactor { ticket: String, info: MultifactorInfo },
}

/// Auth server client rooted at a base URL.
#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn req(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/{}", self.base_url, path))
            .timeout(self.timeout)
            .header(
                reqwest::header::USER_AGENT,
                format!("account-broker/{}", env!("CARGO_PKG_VERSION")),
            )
    }

    async fn send_auth<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<AuthResponse, AuthError> {
        let response = self
            .req(Method::POST, path)
            .json(body)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AuthError::InvalidCredentials);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected(format!("{}: {}", status, body)));
        }

        response
            .json::<AuthResponse>()
            .await
            .map_err(|e| AuthError::Rejected(format!("malformed auth response: {}", e)))
    }

    /// Exchange `session` for a fresh one.
    pub async fn refresh(&self, session: &Session) -> Result<Session, AuthError> {
        tracing::debug!(account = %session.id(), "refreshing session");
        match self.send_auth("auth/refresh", &RefreshRequest { session }).await? {
            AuthResponse::Session { session } => Ok(session),
            AuthResponse::Multifactor { .. } => Err(AuthError::Rejected(
                "session refresh requires multifactor login".into(),
            )),
        }
    }
}

#[async_trait]
impl AuthClient for HttpClient {
    async fn login(
        &self,
        credentials: &Credentials,
        carry_over: Option<&Session>,
        multifactor: &dyn MultifactorHandler,
    ) -> Result<Session, AuthError> {
        let request = LoginRequest {
            username: &credentials.username,
            password: &credentials.password,
            session: carry_over,
        };

        match self.send_auth("auth/login", &request).await? {
            AuthResponse::Session { session } => Ok(session),
            AuthResponse::Multifactor { ticket, info } => {
                let code = multifactor.request_code(info).await?;
                let answer = MultifactorRequest {
                    ticket: &ticket,
                    code: &code,
                };
                match self.send_auth("auth/multifactor", &answer).await? {
                    AuthResponse::Session { session } => Ok(session),
                    AuthResponse::Multifactor { .. } => {
                        Err(AuthError::Rejected("multifactor code not accepted".into()))
                    }
                }
            }
        }
    }

    fn consumer(&self, session: &Session) -> Arc<dyn SessionConsumer> {
        Arc::new(HttpConsumer::new(self.clone(), session.clone()))
    }
}

/// Config client bound to one session.
///
/// Expired sessions are refreshed before a request and the rotated session
/// is reported to every listener.
pub struct HttpConsumer {
    client: HttpClient,
    session: Mutex<Session>,
    listeners: SessionListeners,
    client_version: RwLock<Option<String>>,
}

impl HttpConsumer {
    pub fn new(client: HttpClient, session: Session) -> Self {
        Self {
            client,
            session: Mutex::new(session),
            listeners: SessionListeners::new(),
            client_version: RwLock::new(None),
        }
    }

    /// The session the next request will use.
    pub async fn session(&self) -> Session {
        self.session.lock().await.clone()
    }

    async fn current_session(&self) -> Result<Session, AuthError> {
        let mut session = self.session.lock().await;
        if !session.has_expired() {
            return Ok(session.clone());
        }

        let refreshed = self.client.refresh(&session).await?;
        *session = refreshed.clone();
        drop(session);

        tracing::info!(account = %refreshed.id(), "session rotated");
        self.listeners.notify(&refreshed);
        Ok(refreshed)
    }
}

#[async_trait]
impl ConfigSource for HttpConsumer {
    async fn fetch_config(&self, region: &Region) -> Result<RegionConfig, FetchError> {
        let session = self.current_session().await?;

        let mut request = self
            .client
            .req(Method::GET, &format!("configs/{}", region))
            .bearer_auth(&session.access_token);
        if let Some(version) = self.client_version() {
            request = request.header(CLIENT_VERSION_HEADER, version);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<RegionConfig>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

impl SessionConsumer for HttpConsumer {
    fn on_session_update(&self, listener: SessionListener) -> Subscription {
        self.listeners.subscribe(listener)
    }

    fn set_client_version(&self, version: &str) {
        *self
            .client_version
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(version.to_string());
    }

    fn client_version(&self) -> Option<String> {
        self.client_version
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl std::fmt::Debug for HttpConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpConsumer")
            .field("base_url", &self.client.base_url)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

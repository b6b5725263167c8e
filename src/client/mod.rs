//! Network collaborator boundary.
//!
//! The broker never talks to the network directly. It logs in through an
//! [`AuthClient`], and every account record gets its own
//! [`SessionConsumer`] that performs authenticated requests and reports
//! token rotation back through a listener.

mod http;
mod listeners;

pub use http::{HttpClient, HttpConsumer, CLIENT_VERSION_HEADER, DEFAULT_TIMEOUT_SECS};
pub use listeners::{SessionListener, SessionListeners, Subscription};

use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::RegionConfig;
use crate::error::{AuthError, FetchError};
use crate::multifactor::MultifactorHandler;
use crate::session::{Credentials, Region, Session};

/// Performs logins and binds sessions to request-capable consumers.
#[async_trait]
pub trait AuthClient: Send + Sync {
    /// Log in with `credentials`.
    ///
    /// `carry_over` is an existing session for the same username whose
    /// cookies should be reused. When the server asks for a second factor
    /// the client must call `multifactor` exactly once and wait for it.
    async fn login(
        &self,
        credentials: &Credentials,
        carry_over: Option<&Session>,
        multifactor: &dyn MultifactorHandler,
    ) -> Result<Session, AuthError>;

    /// Create the consumer that performs requests on behalf of `session`.
    fn consumer(&self, session: &Session) -> Arc<dyn SessionConsumer>;
}

/// Source of per-region remote configuration.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn fetch_config(&self, region: &Region) -> Result<RegionConfig, FetchError>;
}

/// Request-capable client bound to one account's session.
pub trait SessionConsumer: ConfigSource {
    /// Register a callback fired whenever the server rotates the session.
    fn on_session_update(&self, listener: SessionListener) -> Subscription;

    /// Client version sent with subsequent requests.
    fn set_client_version(&self, version: &str);

    fn client_version(&self) -> Option<String>;
}

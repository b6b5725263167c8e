//! API key authentication for the control API.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::api::ErrorResponse;

/// API key configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Whether authentication is enabled.
    pub enabled: bool,
    /// Prefix for the API key (default: "Bearer ").
    pub prefix: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix: "Bearer ".to_string(),
        }
    }
}

impl AuthConfig {
    /// Create a disabled auth config (for development).
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

/// Thread-safe API key store.
///
/// Requests are only checked while the store is enabled and holds at least
/// one key.
#[derive(Debug)]
pub struct ApiKeyStore {
    keys: RwLock<HashSet<String>>,
    config: AuthConfig,
}

impl ApiKeyStore {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            keys: RwLock::new(HashSet::new()),
            config,
        }
    }

    /// Create a store with authentication disabled.
    pub fn disabled() -> Self {
        Self::new(AuthConfig::disabled())
    }

    /// Enabled store holding `keys`. Empty keys are skipped.
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::default();
        for key in keys {
            store.add_key(key);
        }
        store
    }

    pub fn add_key(&self, key: impl Into<String>) {
        let key = key.into();
        if key.is_empty() {
            return;
        }
        if let Ok(mut keys) = self.keys.write() {
            keys.insert(key);
        }
    }

    pub fn remove_key(&self, key: &str) -> bool {
        self.keys
            .write()
            .map(|mut keys| keys.remove(key))
            .unwrap_or(false)
    }

    pub fn is_valid(&self, key: &str) -> bool {
        self.keys
            .read()
            .map(|keys| keys.contains(key))
            .unwrap_or(false)
    }

    pub fn count(&self) -> usize {
        self.keys.read().map(|k| k.len()).unwrap_or(0)
    }

    /// Whether requests must carry a valid key.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled && self.count() > 0
    }

    /// Extract API key from authorization header.
    pub fn extract_key<'a>(&self, header_value: &'a str) -> Option<&'a str> {
        header_value.strip_prefix(self.config.prefix.as_str())
    }
}

impl Default for ApiKeyStore {
    fn default() -> Self {
        Self::new(AuthConfig::default())
    }
}

/// Authentication middleware for axum.
pub async fn auth_middleware(
    State(store): State<Arc<ApiKeyStore>>,
    request: Request,
    next: Next,
) -> Response {
    if !store.is_enabled() || request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let authorized = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|header| store.extract_key(header))
        .is_some_and(|key| store.is_valid(key));

    if authorized {
        next.run(request).await
    } else {
        tracing::debug!(path = %request.uri().path(), "rejected request without valid API key");
        (StatusCode::UNAUTHORIZED, Json(ErrorResponse::unauthorized())).into_response()
    }
}

//! API request and response types.

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::account::AccountRecord;
use crate::cache::{ConfigEntry, RefreshOutcome, RegionConfig};
use crate::error::{AuthError, BrokerError, FetchError, LoadError};
use crate::session::{AccountId, Region};

/// Registry overview.
#[derive(Debug, Clone, Serialize)]
pub struct AccountsResponse {
    pub stored: Vec<AccountId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<AccountId>,
    /// True when the user has to log in before anything can be fetched.
    pub requires_action: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_version: Option<String>,
}

/// One account's session summary. Token material is never included.
#[derive(Debug, Clone, Serialize)]
pub struct AccountResponse {
    pub account_id: AccountId,
    pub username: String,
    pub region: Region,
    pub expires_at: DateTime<Utc>,
}

impl AccountResponse {
    pub fn from_record(record: &AccountRecord) -> crate::Result<Self> {
        let session = record.session()?;
        Ok(Self {
            account_id: session.account_id,
            username: session.username,
            region: session.region,
            expires_at: session.expires_at,
        })
    }
}

/// Request to activate an account.
#[derive(Debug, Clone, Deserialize)]
pub struct SetActiveRequest {
    pub account_id: AccountId,
}

/// Request to change the client version.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientVersionRequest {
    pub version: String,
}

/// Answer to a multifactor challenge.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitCodeRequest {
    pub code: String,
}

/// Cached config for one region.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigResponse {
    pub region: Region,
    pub last_update: DateTime<Utc>,
    pub config: RegionConfig,
}

impl ConfigResponse {
    pub fn new(region: Region, entry: ConfigEntry) -> Self {
        Self {
            region,
            last_update: entry.last_update,
            config: entry.config,
        }
    }
}

/// Result of a refresh request.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshResponse {
    pub region: Region,
    pub outcome: RefreshOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
}

/// Generic API error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "ACCOUNT_NOT_FOUND").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn not_found(what: &str) -> Self {
        Self::new("NOT_FOUND", format!("{} not found", what))
    }

    pub fn unauthorized() -> Self {
        Self::new("UNAUTHORIZED", "Missing or invalid API key")
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    /// Status and body for a broker error.
    pub fn from_broker(err: &BrokerError) -> (StatusCode, Self) {
        let message = err.to_string();
        let (status, code) = match err {
            BrokerError::Load(LoadError::NoStoredSession(_)) => {
                (StatusCode::NOT_FOUND, "ACCOUNT_NOT_FOUND")
            }
            BrokerError::Load(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ACCOUNT_LOAD_FAILED"),
            BrokerError::Auth(AuthError::MultifactorCancelled) => {
                (StatusCode::CONFLICT, "MULTIFACTOR_CANCELLED")
            }
            BrokerError::Auth(AuthError::InvalidCredentials) => {
                (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS")
            }
            BrokerError::Auth(AuthError::Rejected(_)) => (StatusCode::BAD_GATEWAY, "LOGIN_REJECTED"),
            BrokerError::Auth(AuthError::Network(_)) => {
                (StatusCode::BAD_GATEWAY, "UPSTREAM_UNAVAILABLE")
            }
            BrokerError::Fetch(FetchError::NoConfig(_)) => (StatusCode::NOT_FOUND, "CONFIG_NOT_FOUND"),
            BrokerError::Fetch(_) => (StatusCode::BAD_GATEWAY, "FETCH_FAILED"),
            BrokerError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
            BrokerError::ChallengeNotFound(_) => (StatusCode::NOT_FOUND, "CHALLENGE_NOT_FOUND"),
            BrokerError::ChallengeResolved(_) => (StatusCode::CONFLICT, "CHALLENGE_RESOLVED"),
            BrokerError::NoActiveAccount => (StatusCode::CONFLICT, "NO_ACTIVE_ACCOUNT"),
            BrokerError::InvalidAccountId(_) | BrokerError::InvalidRegion(_) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST")
            }
            BrokerError::RecordNotFound(_)
            | BrokerError::Io(_)
            | BrokerError::Json(_)
            | BrokerError::LockPoisoned => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };
        (status, Self::new(code, message))
    }
}

/// Control messages on the events socket. Registry events are sent as
/// their own JSON objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// The socket fell behind and missed events.
    Lagged { skipped: u64 },
    /// Error message.
    Error { code: String, message: String },
    /// Ping/pong for connection health.
    Ping,
    Pong,
}

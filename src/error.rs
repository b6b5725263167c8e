//! Error types for account-broker.

use thiserror::Error;

use crate::session::{AccountId, ChallengeId, RecordId, Region};

/// Secure store failures.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store has no entry for the key.
    #[error("no stored entry for key: {0}")]
    KeyNotFound(String),

    /// Writing the entry failed.
    #[error("secure store write failed: {0}")]
    Write(String),

    /// The backing store could not be reached.
    #[error("secure store unavailable: {0}")]
    Backend(String),
}

/// Failures while loading a persisted account.
#[derive(Error, Debug)]
pub enum LoadError {
    /// No session bytes exist for the account.
    #[error("missing session for account {0}; add the account again to replace it")]
    NoStoredSession(AccountId),

    /// Session bytes exist but could not be parsed.
    #[error("stored session is corrupt: {0}")]
    Decode(#[source] serde_json::Error),

    /// The bytes under the account's key hold another account's session.
    #[error("stored session for account {requested} belongs to account {stored}")]
    AccountMismatch {
        requested: AccountId,
        stored: AccountId,
    },

    /// The store failed for another reason.
    #[error(transparent)]
    Store(StoreError),
}

/// Login failures reported by the auth collaborator.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Username or password were rejected.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// The multifactor prompt was dismissed. Not a user-facing failure.
    #[error("multifactor prompt cancelled")]
    MultifactorCancelled,

    /// The server refused the login.
    #[error("login rejected: {0}")]
    Rejected(String),

    /// Transport failure.
    #[error("network error: {0}")]
    Network(String),
}

/// Failures while fetching remote data for an account.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport failure.
    #[error("network error: {0}")]
    Network(String),

    /// Non-success HTTP status.
    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// Session refresh failed before the request could be made.
    #[error("session refresh failed: {0}")]
    Auth(#[from] AuthError),

    /// No configuration is cached for the region.
    #[error("missing configuration data for region {0}")]
    NoConfig(Region),

    /// Response body could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),
}

/// Main error type for account-broker operations.
#[derive(Error, Debug)]
pub enum BrokerError {
    /// Loading a stored account failed.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Login failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Secure store failure on a path that must succeed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Remote fetch failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,

    /// No multifactor challenge with this id is pending.
    #[error("multifactor challenge not found: {0}")]
    ChallengeNotFound(String),

    /// The challenge was already answered or cancelled.
    #[error("multifactor challenge already resolved: {0}")]
    ChallengeResolved(ChallengeId),

    /// The record's session slot is gone.
    #[error("session slot not found: {0}")]
    RecordNotFound(RecordId),

    /// The operation needs an active account.
    #[error("no active account")]
    NoActiveAccount,

    /// Account id could not be parsed.
    #[error("invalid account id: {0:?}")]
    InvalidAccountId(String),

    /// Region could not be parsed.
    #[error("invalid region: {0:?}")]
    InvalidRegion(String),
}

impl BrokerError {
    /// Whether this error only unwinds a dismissed multifactor prompt.
    ///
    /// Callers should not render these as failures.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, BrokerError::Auth(AuthError::MultifactorCancelled))
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(err: serde_json::Error) -> Self {
        LoadError::Decode(err)
    }
}

/// Convenience Result type for account-broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;

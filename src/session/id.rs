//! Account, record, and challenge identifiers.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::BrokerError;

/// Stable identifier of a remote account.
///
/// Derived from the session (the remote user id) and used verbatim as the
/// secure-store key for that account's session bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    /// Create an account id, rejecting empty or whitespace-only input.
    pub fn new(raw: impl Into<String>) -> crate::Result<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() || raw.chars().any(char::is_control) {
            return Err(BrokerError::InvalidAccountId(raw));
        }
        Ok(Self(raw))
    }

    /// The raw id, also the secure-store key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccountId {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for AccountId {
    type Error = BrokerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

/// Global counter for record id generation.
static RECORD_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Global counter for challenge id generation.
static CHALLENGE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique handle of a session slot in the arena.
///
/// Displayed as `rec-XXXXXXXX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(u64);

impl RecordId {
    /// Allocate a new unique record id.
    pub fn new() -> Self {
        Self(RECORD_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw u64 value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Create a RecordId from a raw value.
    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rec-{:08x}", self.0)
    }
}

/// Process-unique id of a multifactor challenge.
///
/// Displayed as `mfa-XXXXXXXX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChallengeId(u64);

impl ChallengeId {
    /// Allocate a new unique challenge id.
    pub fn new() -> Self {
        Self(CHALLENGE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw u64 value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ChallengeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mfa-{:08x}", self.0)
    }
}

impl FromStr for ChallengeId {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("mfa-")
            .and_then(|hex| u64::from_str_radix(hex, 16).ok())
            .map(ChallengeId)
            .ok_or_else(|| BrokerError::ChallengeNotFound(s.into()))
    }
}

impl TryFrom<String> for ChallengeId {
    type Error = BrokerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChallengeId> for String {
    fn from(id: ChallengeId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_account_id_rejects_blank() {
        assert!(AccountId::new("").is_err());
        assert!(AccountId::new("   ").is_err());
        assert!(AccountId::new("a\nb").is_err());
        assert!(AccountId::new("8f1c-2b").is_ok());
    }

    #[test]
    fn test_account_id_serde_is_plain_string() {
        let id = AccountId::new("puuid-42").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"puuid-42\"");

        let back: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<AccountId>("\"\"").is_err());
    }

    #[test]
    fn test_record_id_uniqueness() {
        let mut ids = HashSet::new();
        for _ in 0..10_000 {
            let id = RecordId::new();
            assert!(ids.insert(id), "Duplicate ID generated: {}", id);
        }
    }

    #[test]
    fn test_record_id_display() {
        assert_eq!(RecordId::from_raw(255).to_string(), "rec-000000ff");
    }

    #[test]
    fn test_challenge_id_parse() {
        let id = ChallengeId::new();
        let parsed: ChallengeId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);

        assert!("000000ff".parse::<ChallengeId>().is_err());
        assert!("rec-000000ff".parse::<ChallengeId>().is_err());
        assert!("mfa-zzzz".parse::<ChallengeId>().is_err());
    }
}

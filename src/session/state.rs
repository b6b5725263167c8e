//! Authentication state for one account.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, Region};

/// Session material for one account.
///
/// Tokens rotate over the session's lifetime; the serialized form is what
/// gets written to the secure store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Remote user id.
    pub account_id: AccountId,
    /// Login name the session was created with.
    pub username: String,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Cookies carried between logins for the same username.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cookies: BTreeMap<String, String>,
    pub expires_at: DateTime<Utc>,
    pub region: Region,
}

impl Session {
    pub fn id(&self) -> &AccountId {
        &self.account_id
    }

    /// Whether the access token is no longer valid.
    pub fn has_expired(&self) -> bool {
        self.has_expired_at(Utc::now())
    }

    pub fn has_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Serialize for the secure store.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parse bytes read from the secure store.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("account_id", &self.account_id)
            .field("username", &self.username)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("cookies", &self.cookies.keys().collect::<Vec<_>>())
            .field("expires_at", &self.expires_at)
            .field("region", &self.region)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session() -> Session {
        let mut cookies = BTreeMap::new();
        cookies.insert("ssid".to_string(), "abc".to_string());
        Session {
            account_id: AccountId::new("user-1").unwrap(),
            username: "alice".into(),
            access_token: "access-1".into(),
            refresh_token: Some("refresh-1".into()),
            cookies,
            expires_at: Utc::now() + Duration::hours(1),
            region: Region::new("eu").unwrap(),
        }
    }

    #[test]
    fn test_bytes_roundtrip_preserves_fields() {
        let original = session();
        let bytes = original.to_bytes().unwrap();
        let decoded = Session::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_roundtrip_without_optional_fields() {
        let mut original = session();
        original.refresh_token = None;
        original.cookies.clear();

        let json = String::from_utf8(original.to_bytes().unwrap()).unwrap();
        assert!(!json.contains("refresh_token"));
        assert!(!json.contains("cookies"));
        assert_eq!(Session::from_bytes(json.as_bytes()).unwrap(), original);
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(Session::from_bytes(b"not json").is_err());
        assert!(Session::from_bytes(br#"{"account_id": ""}"#).is_err());
    }

    #[test]
    fn test_has_expired() {
        let mut s = session();
        assert!(!s.has_expired());

        s.expires_at = Utc::now() - Duration::seconds(1);
        assert!(s.has_expired());
        assert!(s.has_expired_at(s.expires_at));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let debug = format!("{:?}", session());
        assert!(debug.contains("alice"));
        assert!(!debug.contains("access-1"));
        assert!(!debug.contains("refresh-1"));
        assert!(!debug.contains("abc"));
    }
}

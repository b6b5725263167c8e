//! OS keychain backed secure store.

use super::SecureStore;
use crate::error::StoreError;

/// Default keychain service name.
pub const DEFAULT_SERVICE: &str = "account-broker";

/// Stores each session as a keychain secret under `(service, key)`.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, keyring::Error> {
        keyring::Entry::new(&self.service, key)
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE)
    }
}

impl SecureStore for KeyringStore {
    fn load(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let entry = self
            .entry(key)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        match entry.get_secret() {
            Ok(bytes) => Ok(bytes),
            Err(keyring::Error::NoEntry) => Err(StoreError::KeyNotFound(key.to_string())),
            Err(e) => Err(StoreError::Backend(e.to_string())),
        }
    }

    fn store(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let entry = self
            .entry(key)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        entry
            .set_secret(value)
            .map_err(|e| StoreError::Write(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_service() {
        let store = KeyringStore::default();
        assert_eq!(store.service(), DEFAULT_SERVICE);
    }

    #[test]
    fn test_custom_service() {
        let store = KeyringStore::new("broker-test");
        assert_eq!(store.service(), "broker-test");
    }
}

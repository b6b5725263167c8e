//! In-memory secure store.

use std::collections::HashMap;
use std::sync::RwLock;

use super::SecureStore;
use crate::error::StoreError;

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` has a value.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .map(|e| e.contains_key(key))
            .unwrap_or(false)
    }
}

impl SecureStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))?;

        entries
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))
    }

    fn store(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StoreError::Write("memory store lock poisoned".into()))?;

        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

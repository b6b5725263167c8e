//! Persistence backends.
//!
//! Session bytes go to a [`SecureStore`] (OS keychain in production, memory
//! in tests). Registry and config-cache state go to plain JSON documents
//! through [`JsonFile`].

mod json_file;
mod keychain;
mod memory;

pub use json_file::JsonFile;
pub use keychain::{KeyringStore, DEFAULT_SERVICE};
pub use memory::MemoryStore;

use crate::error::StoreError;

/// Key to bytes secure storage.
///
/// Keys are account id strings. Implementations must be safe for
/// concurrent access to disjoint keys.
pub trait SecureStore: Send + Sync {
    /// Read the bytes stored under `key`.
    ///
    /// Returns [`StoreError::KeyNotFound`] if nothing is stored.
    fn load(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Write `value` under `key`, replacing any previous value.
    fn store(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
}

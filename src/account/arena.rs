//! Session slot storage shared by all account records.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::BrokerError;
use crate::session::{RecordId, Session};
use crate::Result;

/// Thread-safe table of live sessions keyed by record.
///
/// Each [`AccountRecord`](super::AccountRecord) owns one slot. Rotation
/// listeners reach a record's session through its [`RecordId`] instead of
/// holding the record itself.
pub struct SessionArena {
    slots: RwLock<HashMap<RecordId, Session>>,
}

impl SessionArena {
    /// Create a new empty arena.
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Store `session` in a fresh slot and return its id.
    pub fn insert(&self, session: Session) -> Result<RecordId> {
        let id = RecordId::new();

        let mut slots = self
            .slots
            .write()
            .map_err(|_| BrokerError::LockPoisoned)?;

        slots.insert(id, session);
        Ok(id)
    }

    /// Get a clone of the session in slot `id`.
    pub fn get(&self, id: &RecordId) -> Result<Option<Session>> {
        let slots = self.slots.read().map_err(|_| BrokerError::LockPoisoned)?;
        Ok(slots.get(id).cloned())
    }

    pub fn contains(&self, id: &RecordId) -> Result<bool> {
        let slots = self.slots.read().map_err(|_| BrokerError::LockPoisoned)?;
        Ok(slots.contains_key(id))
    }

    /// Replace the session in slot `id`, returning the previous one.
    pub fn replace(&self, id: &RecordId, session: Session) -> Result<Session> {
        let mut slots = self
            .slots
            .write()
            .map_err(|_| BrokerError::LockPoisoned)?;

        let slot = slots
            .get_mut(id)
            .ok_or(BrokerError::RecordNotFound(*id))?;

        Ok(std::mem::replace(slot, session))
    }

    /// Update a session in place.
    ///
    /// Returns an error if the slot doesn't exist.
    pub fn update<F, T>(&self, id: &RecordId, f: F) -> Result<T>
    where
        F: FnOnce(&mut Session) -> T,
    {
        let mut slots = self
            .slots
            .write()
            .map_err(|_| BrokerError::LockPoisoned)?;

        let session = slots
            .get_mut(id)
            .ok_or(BrokerError::RecordNotFound(*id))?;

        Ok(f(session))
    }

    /// Free slot `id`.
    pub fn remove(&self, id: &RecordId) -> Result<Option<Session>> {
        let mut slots = self
            .slots
            .write()
            .map_err(|_| BrokerError::LockPoisoned)?;
        Ok(slots.remove(id))
    }

    /// Number of live slots.
    pub fn count(&self) -> usize {
        self.slots.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn list_ids(&self) -> Result<Vec<RecordId>> {
        let slots = self.slots.read().map_err(|_| BrokerError::LockPoisoned)?;
        Ok(slots.keys().copied().collect())
    }
}

impl Default for SessionArena {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionArena")
            .field("slots", &self.count())
            .finish()
    }
}

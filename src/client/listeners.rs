//! Session rotation listener table.

use std::sync::{Arc, Mutex, Weak};

use crate::session::Session;

/// Callback invoked with the new session after the server rotates tokens.
pub type SessionListener = Box<dyn Fn(&Session) + Send + Sync>;

#[derive(Default)]
struct ListenerTable {
    next_id: u64,
    entries: Vec<(u64, SessionListener)>,
}

/// Listener registry that [`SessionConsumer`](super::SessionConsumer)
/// implementations embed to support `on_session_update`.
#[derive(Clone, Default)]
pub struct SessionListeners {
    table: Arc<Mutex<ListenerTable>>,
}

impl SessionListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. It stays registered until the returned
    /// subscription is dropped.
    pub fn subscribe(&self, listener: SessionListener) -> Subscription {
        let id = match self.table.lock() {
            Ok(mut table) => {
                let id = table.next_id;
                table.next_id += 1;
                table.entries.push((id, listener));
                id
            }
            Err(_) => {
                tracing::error!("session listener table poisoned; listener not registered");
                u64::MAX
            }
        };

        Subscription {
            id,
            table: Arc::downgrade(&self.table),
        }
    }

    /// Invoke every registered listener with `session`.
    pub fn notify(&self, session: &Session) {
        if let Ok(table) = self.table.lock() {
            for (_, listener) in &table.entries {
                listener(session);
            }
        }
    }

    /// Number of live listeners.
    pub fn len(&self) -> usize {
        self.table.lock().map(|t| t.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle to a registered listener; dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    table: Weak<Mutex<ListenerTable>>,
}

impl Subscription {
    /// A subscription attached to nothing.
    pub fn detached() -> Self {
        Self {
            id: u64::MAX,
            table: Weak::new(),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(table) = self.table.upgrade() {
            if let Ok(mut table) = table.lock() {
                table.entries.retain(|(id, _)| *id != self.id);
            }
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

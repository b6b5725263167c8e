//! Change notifications for UI surfaces.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::multifactor::ChallengeView;
use crate::session::AccountId;

/// Default number of buffered events per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// A committed state change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryEvent {
    ActiveAccountChanged {
        account: Option<AccountId>,
    },
    StoredAccountsChanged {
        accounts: Vec<AccountId>,
    },
    ClientVersionChanged {
        version: String,
    },
    /// A multifactor prompt appeared (`Some`) or was cleared (`None`).
    MultifactorPrompt {
        challenge: Option<ChallengeView>,
    },
    /// Surfaces derived from the active account should reload.
    SurfacesInvalidated,
}

/// Broadcast channel shared by the registry and the prompt slot.
///
/// Dropping a receiver unsubscribes it.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RegistryEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.tx.subscribe()
    }

    /// Publish `event` to current subscribers. Having none is fine.
    pub fn emit(&self, event: RegistryEvent) {
        tracing::debug!(?event, "registry event");
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

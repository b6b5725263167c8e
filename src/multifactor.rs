//! Interactive multifactor challenge/response.
//!
//! A login that needs a second factor calls
//! [`MultifactorHandler::request_code`]. The [`PromptSlot`] implementation
//! publishes a [`MultifactorChallenge`] for whichever UI is listening and
//! suspends until the UI submits a code or cancels. Each challenge resolves
//! exactly once; later attempts are rejected.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::{AuthError, BrokerError};
use crate::registry::{EventBus, RegistryEvent};
use crate::session::ChallengeId;

/// Second-factor details passed through from the auth server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultifactorInfo {
    /// Delivery method, e.g. `email`.
    pub method: String,
    /// Masked destination the code was sent to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_length: Option<u32>,
}

/// Supplies second-factor codes to a login in progress.
#[async_trait]
pub trait MultifactorHandler: Send + Sync {
    /// Obtain a code for `info`, or fail with
    /// [`AuthError::MultifactorCancelled`].
    async fn request_code(&self, info: MultifactorInfo) -> Result<String, AuthError>;
}

type Answer = Result<String, AuthError>;

/// One pending second-factor prompt.
#[derive(Debug)]
pub struct MultifactorChallenge {
    id: ChallengeId,
    info: MultifactorInfo,
    answer: Mutex<Option<oneshot::Sender<Answer>>>,
}

impl MultifactorChallenge {
    fn new(info: MultifactorInfo) -> (Self, oneshot::Receiver<Answer>) {
        let (tx, rx) = oneshot::channel();
        let challenge = Self {
            id: ChallengeId::new(),
            info,
            answer: Mutex::new(Some(tx)),
        };
        (challenge, rx)
    }

    pub fn id(&self) -> ChallengeId {
        self.id
    }

    pub fn info(&self) -> &MultifactorInfo {
        &self.info
    }

    pub fn is_resolved(&self) -> bool {
        self.answer
            .lock()
            .map(|slot| slot.is_none())
            .unwrap_or(true)
    }

    /// Answer the challenge with `code`.
    pub fn submit(&self, code: impl Into<String>) -> crate::Result<()> {
        self.resolve(Ok(code.into()))
    }

    /// Dismiss the challenge; the waiting login fails with
    /// [`AuthError::MultifactorCancelled`].
    pub fn cancel(&self) -> crate::Result<()> {
        self.resolve(Err(AuthError::MultifactorCancelled))
    }

    fn resolve(&self, answer: Answer) -> crate::Result<()> {
        let sender = self
            .answer
            .lock()
            .map_err(|_| BrokerError::LockPoisoned)?
            .take();

        let Some(sender) = sender else {
            tracing::warn!(challenge = %self.id, "ignoring repeated multifactor resolution");
            return Err(BrokerError::ChallengeResolved(self.id));
        };

        if sender.send(answer).is_err() {
            tracing::debug!(challenge = %self.id, "login stopped waiting before resolution");
        }
        Ok(())
    }

    pub fn view(&self) -> ChallengeView {
        ChallengeView {
            id: self.id,
            info: self.info.clone(),
        }
    }
}

/// Serializable snapshot of a challenge for UI surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChallengeView {
    pub id: ChallengeId,
    pub info: MultifactorInfo,
}

/// The single process-wide prompt slot.
#[derive(Debug)]
pub struct PromptSlot {
    current: RwLock<Option<Arc<MultifactorChallenge>>>,
    events: EventBus,
}

impl PromptSlot {
    pub fn new(events: EventBus) -> Self {
        Self {
            current: RwLock::new(None),
            events,
        }
    }

    /// Event bus prompt changes are published on.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// The challenge currently awaiting an answer.
    pub fn current(&self) -> Option<Arc<MultifactorChallenge>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Submit `code` to the pending challenge `id`.
    pub fn submit(&self, id: ChallengeId, code: impl Into<String>) -> crate::Result<()> {
        self.find(id)?.submit(code)
    }

    /// Cancel the pending challenge `id`.
    pub fn cancel(&self, id: ChallengeId) -> crate::Result<()> {
        self.find(id)?.cancel()
    }

    fn find(&self, id: ChallengeId) -> crate::Result<Arc<MultifactorChallenge>> {
        self.current()
            .filter(|challenge| challenge.id() == id)
            .ok_or_else(|| BrokerError::ChallengeNotFound(id.to_string()))
    }

    fn present(&self, challenge: Arc<MultifactorChallenge>) -> PromptGuard<'_> {
        let view = challenge.view();
        let id = challenge.id();

        let previous = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(challenge);

        // A replaced prompt can never be answered, so unblock its login.
        if let Some(previous) = previous {
            if !previous.is_resolved() {
                tracing::info!(challenge = %previous.id(), "cancelling superseded multifactor prompt");
                let _ = previous.cancel();
            }
        }

        self.events.emit(RegistryEvent::MultifactorPrompt {
            challenge: Some(view),
        });
        PromptGuard { slot: self, id }
    }

    fn clear(&self, id: ChallengeId) {
        let cleared = {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            if current.as_ref().is_some_and(|c| c.id() == id) {
                *current = None;
                true
            } else {
                false
            }
        };

        if cleared {
            self.events
                .emit(RegistryEvent::MultifactorPrompt { challenge: None });
        }
    }
}

impl Default for PromptSlot {
    fn default() -> Self {
        Self::new(EventBus::default())
    }
}

/// Clears the slot when the waiting login finishes or is dropped.
struct PromptGuard<'a> {
    slot: &'a PromptSlot,
    id: ChallengeId,
}

impl Drop for PromptGuard<'_> {
    fn drop(&mut self) {
        self.slot.clear(self.id);
    }
}

#[async_trait]
impl MultifactorHandler for PromptSlot {
    async fn request_code(&self, info: MultifactorInfo) -> Result<String, AuthError> {
        let (challenge, answer) = MultifactorChallenge::new(info);
        let challenge = Arc::new(challenge);
        tracing::info!(
            challenge = %challenge.id(),
            method = %challenge.info().method,
            "waiting for multifactor code"
        );

        let _guard = self.present(Arc::clone(&challenge));
        match answer.await {
            Ok(answer) => answer,
            Err(_) => Err(AuthError::MultifactorCancelled),
        }
    }
}

//! Persisted registry document.

use serde::{Deserialize, Serialize};

use crate::session::AccountId;

/// Which accounts are known and which one is active.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_account: Option<AccountId>,
    #[serde(default)]
    pub stored_accounts: Vec<AccountId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_version: Option<String>,
}

impl RegistryState {
    /// Drop duplicate ids and make sure the active id is stored.
    ///
    /// Returns whether anything changed.
    pub fn repair(&mut self) -> bool {
        let before = self.stored_accounts.len();
        let mut seen = std::collections::HashSet::new();
        self.stored_accounts.retain(|id| seen.insert(id.clone()));
        let mut changed = self.stored_accounts.len() != before;

        if let Some(active) = &self.active_account {
            if !self.stored_accounts.contains(active) {
                tracing::warn!(account = %active, "active account missing from stored accounts");
                self.stored_accounts.push(active.clone());
                changed = true;
            }
        }

        changed
    }
}

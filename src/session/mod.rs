//! Session data model.
//!
//! This module provides the identifiers, credentials, and serializable
//! session state shared by the account registry and the config cache.

mod credentials;
mod id;
mod region;
mod state;

pub use credentials::Credentials;
pub use id::{AccountId, ChallengeId, RecordId};
pub use region::Region;
pub use state::Session;

//! # account-broker
//!
//! Multi-account session broker.
//!
//! Keeps several logged-in accounts for a remote service, persists their
//! sessions in the OS keychain, lets one of them be active, and caches a
//! per-region config document that is refreshed through the active
//! account. Multifactor codes requested during login are surfaced as
//! prompts that a UI answers over the control API.
//!
//! ## Features
//!
//! - **Session registry**: stored accounts, the active one, and change events
//! - **Secure storage**: session bytes live in the OS keychain
//! - **Multifactor prompts**: a login waits until the prompt is answered
//! - **Config cache**: per-region documents with deduplicated refreshes
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use account_broker::account::{AccountContext, PersistPolicy};
//! use account_broker::client::HttpClient;
//! use account_broker::multifactor::PromptSlot;
//! use account_broker::registry::{EventBus, SessionRegistry};
//! use account_broker::store::{JsonFile, KeyringStore, DEFAULT_SERVICE};
//! use account_broker::Credentials;
//!
//! #[tokio::main]
//! async fn main() -> account_broker::Result<()> {
//!     account_broker::logging::try_init().ok();
//!
//!     let context = AccountContext::new(
//!         Arc::new(KeyringStore::new(DEFAULT_SERVICE)),
//!         PersistPolicy::OnMutation,
//!     );
//!     let registry = SessionRegistry::open(
//!         Arc::new(HttpClient::new("https://auth.example.com")),
//!         context,
//!         Arc::new(PromptSlot::new(EventBus::default())),
//!         JsonFile::at("registry.json"),
//!     )
//!     .await;
//!
//!     let record = registry
//!         .add_account(Credentials::new("alice", "hunter2"))
//!         .await?;
//!     println!("active account: {}", record.id());
//!
//!     Ok(())
//! }
//! ```

pub mod account;
pub mod api;
pub mod cache;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod multifactor;
pub mod registry;
pub mod security;
pub mod session;
pub mod store;

pub use account::{AccountContext, AccountRecord, PersistPolicy, SessionArena};
pub use cache::{ConfigCache, ConfigEntry, RefreshOutcome, RegionConfig};
pub use client::{AuthClient, ConfigSource, SessionConsumer};
pub use error::{AuthError, BrokerError, FetchError, LoadError, Result, StoreError};
pub use fetch::{fetch_entry, FetchContext, FetchedEntry};
pub use multifactor::{MultifactorChallenge, MultifactorHandler, MultifactorInfo, PromptSlot};
pub use registry::{RegistryEvent, SessionRegistry};
pub use session::{AccountId, ChallengeId, Credentials, RecordId, Region, Session};
pub use store::SecureStore;

//! Control API for the broker.
//!
//! REST endpoints manage accounts, answer multifactor prompts, and expose
//! cached region configs. A WebSocket streams registry events.
//!
//! ## Endpoints
//!
//! ### Health & Info
//! - `GET /health` - Health check
//! - `GET /api/v1/` - API information
//!
//! ### Accounts
//! - `GET /api/v1/accounts` - Stored and active accounts
//! - `POST /api/v1/accounts` - Log in and activate a new account
//! - `DELETE /api/v1/accounts` - Forget all accounts
//! - `PUT /api/v1/accounts/active` - Make a stored account active
//! - `POST /api/v1/accounts/{id}/toggle` - Toggle an account's active state
//! - `PUT /api/v1/client-version` - Set the client version header
//!
//! ### Multifactor
//! - `GET /api/v1/multifactor` - Pending prompt
//! - `POST /api/v1/multifactor/{id}/code` - Answer a prompt
//! - `POST /api/v1/multifactor/{id}/cancel` - Dismiss a prompt
//!
//! ### Configs
//! - `GET /api/v1/configs/{region}` - Cached config for a region
//! - `POST /api/v1/configs/{region}/refresh` - Refresh through the active account
//!
//! ### Events
//! - `WS /api/v1/events` - Registry event stream
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use account_broker::account::{AccountContext, PersistPolicy};
//! use account_broker::api::{serve, AppState, ServerConfig};
//! use account_broker::cache::ConfigCache;
//! use account_broker::client::HttpClient;
//! use account_broker::multifactor::PromptSlot;
//! use account_broker::registry::{EventBus, SessionRegistry};
//! use account_broker::store::{JsonFile, MemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> account_broker::Result<()> {
//!     let context = AccountContext::new(Arc::new(MemoryStore::new()), PersistPolicy::OnMutation);
//!     let prompts = Arc::new(PromptSlot::new(EventBus::default()));
//!     let registry = SessionRegistry::open(
//!         Arc::new(HttpClient::new("https://auth.example.com")),
//!         context,
//!         prompts,
//!         JsonFile::ephemeral(),
//!     )
//!     .await;
//!     let state = AppState::new(Arc::new(registry), Arc::new(ConfigCache::in_memory()));
//!     serve(ServerConfig::new("127.0.0.1", 3900), state).await
//! }
//! ```

pub mod handlers;
pub mod router;
pub mod types;
pub mod websocket;

pub use handlers::AppState;
pub use router::{create_router, serve, ServerConfig};
pub use types::{
    AccountResponse, AccountsResponse, ClientVersionRequest, ConfigResponse, ErrorResponse,
    RefreshResponse, SetActiveRequest, SubmitCodeRequest, WsMessage,
};

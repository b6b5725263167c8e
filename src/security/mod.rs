//! Control API security.
//!
//! ## Example
//!
//! ```rust
//! use account_broker::security::ApiKeyStore;
//!
//! let auth = ApiKeyStore::default();
//! assert!(!auth.is_enabled());
//!
//! auth.add_key("my-secret-key");
//! assert!(auth.is_enabled());
//! assert!(auth.is_valid("my-secret-key"));
//! ```

pub mod auth;

pub use auth::{auth_middleware, ApiKeyStore, AuthConfig};

//! Per-account session ownership.
//!
//! An [`AccountRecord`] keeps one account's session in a [`SessionArena`]
//! slot and writes it to the secure store whenever it changes.

mod arena;
mod record;

pub use arena::SessionArena;
pub use record::{AccountContext, AccountRecord, PersistPolicy};

//! Per-region remote configuration cache.

mod entry;
mod guard;
mod store;

pub use entry::{ConfigEntry, RegionConfig, StoredConfigs};
pub use guard::{RefreshGuard, Reservation};
pub use store::{ConfigCache, RefreshOutcome, DEFAULT_REFRESH_SECS};

//! In-flight refresh reservations.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::session::Region;

/// Set of regions with a refresh in progress.
#[derive(Debug, Clone, Default)]
pub struct RefreshGuard {
    in_progress: Arc<Mutex<HashSet<Region>>>,
}

impl RefreshGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `region`. Returns `None` if it is already reserved.
    ///
    /// The reservation is released when the returned value is dropped.
    pub fn reserve(&self, region: &Region) -> Option<Reservation> {
        let inserted = self
            .in_progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(region.clone());

        inserted.then(|| Reservation {
            region: region.clone(),
            in_progress: Arc::clone(&self.in_progress),
        })
    }

    pub fn is_reserved(&self, region: &Region) -> bool {
        self.in_progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(region)
    }
}

/// A held reservation for one region.
#[derive(Debug)]
pub struct Reservation {
    region: Region,
    in_progress: Arc<Mutex<HashSet<Region>>>,
}

impl Reservation {
    pub fn region(&self) -> &Region {
        &self.region
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.in_progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.region);
    }
}

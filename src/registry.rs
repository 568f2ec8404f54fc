//! Acquisition check for physical cameras.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// Ids of the cameras currently held by a controller. Controllers built
/// against the same registry never hold the same camera at once.
#[derive(Debug, Default)]
pub struct CameraRegistry {
    held: Mutex<HashSet<usize>>,
}

impl CameraRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id`. False if another controller holds it.
    pub fn acquire(&self, id: usize) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id)
    }

    pub fn release(&self, id: usize) {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    pub fn is_held(&self, id: usize) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }
}

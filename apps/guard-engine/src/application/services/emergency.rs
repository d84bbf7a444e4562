//! Emergency Stop flag.
//!
//! Process-wide and sticky: only an explicit reset clears it.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::domain::shared::Timestamp;

/// Process-wide emergency stop flag.
#[derive(Debug, Default)]
pub struct EmergencyStop {
    active: AtomicBool,
    activated_at: Mutex<Option<Timestamp>>,
}

impl EmergencyStop {
    /// Create a cleared flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Returns true only for the call that set it.
    pub fn engage(&self, now: Timestamp) -> bool {
        let newly = !self.active.swap(true, Ordering::SeqCst);
        if newly {
            *self.activated_at.lock() = Some(now);
        }
        newly
    }

    /// Clear the flag. Returns true only if it was set.
    pub fn clear(&self) -> bool {
        let was = self.active.swap(false, Ordering::SeqCst);
        if was {
            *self.activated_at.lock() = None;
        }
        was
    }

    /// Whether the flag is set.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// When the current stop was engaged.
    #[must_use]
    pub fn activated_at(&self) -> Option<Timestamp> {
        *self.activated_at.lock()
    }
}

//! Lockout state value objects.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::shared::Timestamp;

/// Whether an account may trade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockoutStatus {
    /// Trading allowed.
    #[default]
    Active,
    /// Trading suspended.
    LockedOut,
}

impl fmt::Display for LockoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::LockedOut => write!(f, "LOCKED_OUT"),
        }
    }
}

/// Why an account is locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockReason {
    /// A BREACH-severity violation.
    Breach,
    /// Operator emergency stop.
    EmergencyStop,
}

impl fmt::Display for LockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Breach => write!(f, "BREACH"),
            Self::EmergencyStop => write!(f, "EMERGENCY_STOP"),
        }
    }
}

/// Persisted lockout record for one account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutState {
    /// Current status.
    pub status: LockoutStatus,
    /// Earliest instant the account may return to ACTIVE.
    pub locked_until: Option<Timestamp>,
    /// Number of times the account has been locked for a breach.
    pub violation_count: u32,
    /// Reason for the current lock.
    #[serde(default)]
    pub reason: Option<LockReason>,
}

impl LockoutState {
    /// Returns true if the account is locked.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.status == LockoutStatus::LockedOut
    }

    /// Returns true if the account is locked for a breach.
    #[must_use]
    pub fn is_breach_locked(&self) -> bool {
        self.is_locked() && self.reason == Some(LockReason::Breach)
    }
}

/// A status change produced by the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutTransition {
    /// Status before.
    pub from: LockoutStatus,
    /// Status after.
    pub to: LockoutStatus,
    /// Lock reason after the transition, if locked.
    pub reason: Option<LockReason>,
    /// State after the transition.
    pub state: LockoutState,
    /// When the transition happened.
    pub at: Timestamp,
}

//! Lockout State Machine
//!
//! ACTIVE -> LOCKED_OUT on a BREACH violation (or an emergency stop);
//! LOCKED_OUT -> ACTIVE at the start of a cycle once `now >= locked_until`
//! and no emergency stop is in force.

use super::state::{LockReason, LockoutState, LockoutStatus, LockoutTransition};
use crate::domain::compliance::{Severity, Violation};
use crate::domain::shared::{Timestamp, TradingCalendar};

/// Per-account lockout state machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockoutStateMachine {
    state: LockoutState,
}

impl LockoutStateMachine {
    /// Start ACTIVE.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a persisted state.
    #[must_use]
    pub const fn restore(state: LockoutState) -> Self {
        Self { state }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &LockoutState {
        &self.state
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> LockoutStatus {
        self.state.status
    }

    /// Check if a status change is allowed.
    #[must_use]
    pub const fn is_valid_transition(from: LockoutStatus, to: LockoutStatus) -> bool {
        matches!(
            (from, to),
            (LockoutStatus::Active, LockoutStatus::LockedOut)
                | (LockoutStatus::LockedOut, LockoutStatus::Active)
        )
    }

    /// Consume one cycle's violations. Only BREACH-level violations change state.
    pub fn apply_violations(
        &mut self,
        violations: &[Violation],
        calendar: &TradingCalendar,
        now: Timestamp,
    ) -> Option<LockoutTransition> {
        if !violations.iter().any(|v| v.severity == Severity::Breach) {
            return None;
        }
        let until = calendar.next_session_open_after(now);

        match (self.state.status, self.state.reason) {
            (LockoutStatus::LockedOut, Some(LockReason::Breach)) => {
                if self.state.locked_until.is_none_or(|current| until > current) {
                    self.state.locked_until = Some(until);
                }
                None
            }
            (from, _) => {
                self.state = LockoutState {
                    status: LockoutStatus::LockedOut,
                    locked_until: Some(until),
                    violation_count: self.state.violation_count + 1,
                    reason: Some(LockReason::Breach),
                };
                tracing::debug!(locked_until = %until, "Breach lockout entered");
                Some(self.transition(from, now))
            }
        }
    }

    /// Re-evaluate expiry at the start of a cycle.
    pub fn refresh(&mut self, now: Timestamp, emergency_active: bool) -> Option<LockoutTransition> {
        if !self.state.is_locked() || emergency_active {
            return None;
        }
        let expired = self.state.locked_until.is_none_or(|until| now >= until);
        if !expired {
            return None;
        }
        self.state.status = LockoutStatus::Active;
        self.state.locked_until = None;
        self.state.reason = None;
        Some(self.transition(LockoutStatus::LockedOut, now))
    }

    /// Lock immediately for an emergency stop. A breach lock is left in place.
    pub fn lock_for_emergency(&mut self, now: Timestamp) -> Option<LockoutTransition> {
        if self.state.is_locked() {
            return None;
        }
        self.state.status = LockoutStatus::LockedOut;
        self.state.locked_until = Some(now);
        self.state.reason = Some(LockReason::EmergencyStop);
        Some(self.transition(LockoutStatus::Active, now))
    }

    fn transition(&self, from: LockoutStatus, at: Timestamp) -> LockoutTransition {
        debug_assert!(
            from == self.state.status || Self::is_valid_transition(from, self.state.status)
        );
        LockoutTransition {
            from,
            to: self.state.status,
            reason: self.state.reason,
            state: self.state.clone(),
            at,
        }
    }
}

//! Engine Events
//!
//! Plain data published on a broadcast channel for presentation,
//! notification and audit collaborators.

use serde::{Deserialize, Serialize};

use crate::domain::compliance::Violation;
use crate::domain::decision::Decision;
use crate::domain::lockout::LockoutTransition;
use crate::domain::shared::{AccountId, ChartId, Timestamp};

/// Operational warnings. Never account violations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum SystemWarning {
    /// A chart's sensor failed this many polls in a row.
    SensorFailures {
        /// Chart whose sensor is failing.
        chart_id: ChartId,
        /// Consecutive failed polls.
        consecutive: u32,
        /// Last failure.
        last_error: String,
    },
    /// A bounded wait for an account lock expired.
    LockContention {
        /// Contended account.
        account_id: AccountId,
        /// How long the waiter gave up after.
        waited_ms: u64,
    },
    /// An aggregator pass overran its interval.
    StatusLag {
        /// Duration of the pass.
        elapsed_ms: u64,
        /// Configured interval.
        interval_ms: u64,
    },
}

/// Everything the engine publishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A chart cycle produced a decision.
    Decision {
        /// Owning account.
        account_id: AccountId,
        /// The decision.
        decision: Decision,
    },
    /// A violation appeared that was not present on the chart's previous cycle.
    Violation {
        /// Account the violation applies to.
        account_id: AccountId,
        /// Chart whose cycle raised it.
        chart_id: ChartId,
        /// The violation.
        violation: Violation,
    },
    /// An account's lockout state changed.
    LockoutChanged {
        /// Account.
        account_id: AccountId,
        /// Transition details including the new state.
        transition: LockoutTransition,
    },
    /// Operational warning.
    SystemWarning(SystemWarning),
    /// Emergency stop engaged.
    EmergencyStop {
        /// Activation time.
        at: Timestamp,
    },
    /// Emergency stop cleared by an operator.
    EmergencyCleared {
        /// Clear time.
        at: Timestamp,
    },
}

impl EngineEvent {
    /// Stable label for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Decision { .. } => "decision",
            Self::Violation { .. } => "violation",
            Self::LockoutChanged { .. } => "lockout_changed",
            Self::SystemWarning(_) => "system_warning",
            Self::EmergencyStop { .. } => "emergency_stop",
            Self::EmergencyCleared { .. } => "emergency_cleared",
        }
    }

    /// Violations and lockout changes, which the audit trail must never drop.
    #[must_use]
    pub const fn is_audit_record(&self) -> bool {
        matches!(self, Self::Violation { .. } | Self::LockoutChanged { .. })
    }
}

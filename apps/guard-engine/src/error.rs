//! Engine-level errors.
//!
//! Compliance violations are not errors; they travel as [`Violation`] data.
//!
//! [`Violation`]: crate::domain::compliance::Violation

use thiserror::Error;

use crate::application::ports::PersistenceError;
use crate::domain::account::LedgerError;
use crate::domain::shared::{AccountId, ChartId};

/// Errors raised while building or operating the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No account with this id is registered.
    #[error("unknown account: {0}")]
    UnknownAccount(AccountId),

    /// No chart with this id is registered.
    #[error("unknown chart: {0}")]
    UnknownChart(ChartId),

    /// Account id registered twice.
    #[error("duplicate account: {0}")]
    DuplicateAccount(AccountId),

    /// Chart id registered twice.
    #[error("duplicate chart: {0}")]
    DuplicateChart(ChartId),

    /// An account references a rule set that is not configured.
    #[error("account {account_id} references unknown rule set '{rule_set}'")]
    UnknownRuleSet {
        /// Account referencing the rule set.
        account_id: AccountId,
        /// Missing rule set name.
        rule_set: String,
    },

    /// The per-account lock could not be acquired within the bounded wait.
    #[error("account {account_id} lock not acquired within {waited_ms}ms")]
    LockContention {
        /// Contended account.
        account_id: AccountId,
        /// How long the caller waited.
        waited_ms: u64,
    },

    /// Ledger rejected an update.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Audit persistence failed.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contention_message_names_account() {
        let err = EngineError::LockContention {
            account_id: AccountId::new("apex-1"),
            waited_ms: 250,
        };
        assert_eq!(err.to_string(), "account apex-1 lock not acquired within 250ms");
    }

    #[test]
    fn ledger_error_converts() {
        let err: EngineError = LedgerError::ContractUnderflow { open: 1, delta: -2 }.into();
        assert!(matches!(err, EngineError::Ledger(_)));
    }
}

//! Account ledger errors.

use std::fmt;

/// Errors from ledger mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A contract update would leave a negative open position count.
    ContractUnderflow {
        /// Contracts open before the update.
        open: u32,
        /// Requested change.
        delta: i64,
    },
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContractUnderflow { open, delta } => {
                write!(f, "cannot apply contract change {delta} to {open} open contracts")
            }
        }
    }
}

impl std::error::Error for LedgerError {}

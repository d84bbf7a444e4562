//! Account Bounded Context
//!
//! Funded account ledger: balances, P&L, high-water mark and open contracts.

pub mod errors;
pub mod ledger;
pub mod value_objects;

pub use errors::LedgerError;
pub use ledger::AccountLedger;
pub use value_objects::{AccountPhase, AccountSnapshot};

//! Execution Feed Port (Driven Port)
//!
//! Fills and P&L confirmed by the external execution collaborator. The
//! engine only recommends; it learns about trades through this port.

use serde::{Deserialize, Serialize};

use crate::domain::shared::{AccountId, Money};

/// A confirmed change to an account's ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerUpdate {
    /// Realized or marked P&L change.
    pub pnl_delta: Money,
    /// Change in open contracts (positive opens, negative closes).
    #[serde(default)]
    pub contracts_delta: i64,
}

impl LedgerUpdate {
    /// P&L change with no position change.
    #[must_use]
    pub const fn pnl(pnl_delta: Money) -> Self {
        Self {
            pnl_delta,
            contracts_delta: 0,
        }
    }

    /// Fill that changes the open position and P&L.
    #[must_use]
    pub const fn fill(pnl_delta: Money, contracts_delta: i64) -> Self {
        Self {
            pnl_delta,
            contracts_delta,
        }
    }
}

/// Port for draining confirmed ledger updates.
///
/// Called inside the account critical section, so implementations must not block.
pub trait ExecutionFeedPort: Send + Sync {
    /// Take every pending update for the account, oldest first.
    fn drain(&self, account_id: &AccountId) -> Vec<LedgerUpdate>;
}

/// Feed that never reports anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopExecutionFeed;

impl ExecutionFeedPort for NoopExecutionFeed {
    fn drain(&self, _account_id: &AccountId) -> Vec<LedgerUpdate> {
        Vec::new()
    }
}

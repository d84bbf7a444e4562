//! Account value objects.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::shared::{AccountId, Money};

/// Funding stage of a prop-firm account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountPhase {
    /// Evaluation / challenge account.
    #[default]
    Evaluation,
    /// Passed evaluation, simulated funded account.
    Funded,
    /// Live capital account.
    Live,
}

impl fmt::Display for AccountPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Evaluation => "EVALUATION",
            Self::Funded => "FUNDED",
            Self::Live => "LIVE",
        };
        f.write_str(name)
    }
}

/// Point-in-time copy of an account ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Account identifier.
    pub account_id: AccountId,
    /// Balance at account creation.
    pub starting_balance: Money,
    /// Current balance including open P&L.
    pub current_balance: Money,
    /// P&L since the start of the trading day.
    pub daily_pnl: Money,
    /// P&L since account creation.
    pub total_pnl: Money,
    /// Highest balance reached.
    pub high_water_mark: Money,
    /// Contracts currently open.
    pub open_contracts: u32,
    /// Funding phase.
    pub phase: AccountPhase,
}

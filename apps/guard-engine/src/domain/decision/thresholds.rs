//! Decision thresholds.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::domain::shared::Money;

/// Risk appetite knobs for the decision algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionThresholds {
    /// Below this remaining drawdown the decision is at best CAUTION.
    pub low_drawdown_threshold: Money,
    /// GO requires remaining drawdown strictly above this.
    pub safe_drawdown_threshold: Money,
    /// Below this success probability the decision is at best CAUTION.
    pub probability_floor: Decimal,
    /// GO requires success probability at or above this.
    pub probability_ceiling: Decimal,
    /// Share of the theoretical size actually recommended, 0-100.
    pub safety_ratio_pct: Decimal,
    /// Dollars risked per contract (stop distance times tick value).
    pub dollar_risk_per_contract: Money,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self {
            low_drawdown_threshold: Money::dollars(300),
            safe_drawdown_threshold: Money::dollars(500),
            probability_floor: dec!(60),
            probability_ceiling: dec!(70),
            safety_ratio_pct: dec!(50),
            dollar_risk_per_contract: Money::dollars(250),
        }
    }
}

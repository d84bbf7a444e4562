//! Decision value objects.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::shared::{ChartId, Timestamp};

/// Tri-state trade recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionState {
    /// Do not trade.
    Stop,
    /// Trade only with extra care, no size recommended.
    Caution,
    /// Conditions favourable; size recommended.
    Go,
}

impl DecisionState {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "STOP",
            Self::Caution => "CAUTION",
            Self::Go => "GO",
        }
    }
}

impl fmt::Display for DecisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One evaluation cycle's output for a chart. Immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Chart decided for.
    pub chart_id: ChartId,
    /// Recommendation.
    pub state: DecisionState,
    /// Contracts to trade (zero unless GO).
    pub recommended_contracts: u32,
    /// Why.
    pub reason: String,
    /// Evaluation instant.
    pub decided_at: Timestamp,
}

impl Decision {
    /// STOP with zero contracts.
    #[must_use]
    pub fn stop(chart_id: ChartId, reason: impl Into<String>, decided_at: Timestamp) -> Self {
        Self::new(chart_id, DecisionState::Stop, 0, reason, decided_at)
    }

    /// CAUTION with zero contracts.
    #[must_use]
    pub fn caution(chart_id: ChartId, reason: impl Into<String>, decided_at: Timestamp) -> Self {
        Self::new(chart_id, DecisionState::Caution, 0, reason, decided_at)
    }

    /// GO with a contract recommendation.
    #[must_use]
    pub fn go(
        chart_id: ChartId,
        contracts: u32,
        reason: impl Into<String>,
        decided_at: Timestamp,
    ) -> Self {
        Self::new(chart_id, DecisionState::Go, contracts, reason, decided_at)
    }

    fn new(
        chart_id: ChartId,
        state: DecisionState,
        recommended_contracts: u32,
        reason: impl Into<String>,
        decided_at: Timestamp,
    ) -> Self {
        Self {
            chart_id,
            state,
            recommended_contracts,
            reason: reason.into(),
            decided_at,
        }
    }

    /// Returns true for STOP.
    #[must_use]
    pub fn is_stop(&self) -> bool {
        self.state == DecisionState::Stop
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chart {} {} x{}: {}",
            self.chart_id, self.state, self.recommended_contracts, self.reason
        )
    }
}

//! System Status
//!
//! Read-copy aggregate of every account and chart, rebuilt from immutable
//! snapshots on each aggregator pass.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::account::AccountSnapshot;
use crate::domain::decision::{Decision, DecisionState};
use crate::domain::lockout::{LockoutState, LockoutStatus};
use crate::domain::shared::{AccountId, ChartId, Money, Timestamp};

/// Overall health indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemHealth {
    /// Plenty of margin, nothing stopped.
    Healthy,
    /// Margin shrinking or a chart is stopped.
    Warning,
    /// Margin nearly gone, a breach lockout, or nothing tradable.
    Danger,
    /// Emergency stop engaged.
    Emergency,
}

impl SystemHealth {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "HEALTHY",
            Self::Warning => "WARNING",
            Self::Danger => "DANGER",
            Self::Emergency => "EMERGENCY",
        }
    }
}

impl fmt::Display for SystemHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Margin percentages separating the health bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthBands {
    /// Below this margin percentage health is at least WARNING.
    pub warning_margin_pct: Decimal,
    /// Below this margin percentage health is DANGER.
    pub danger_margin_pct: Decimal,
}

impl Default for HealthBands {
    fn default() -> Self {
        Self {
            warning_margin_pct: dec!(1.5),
            danger_margin_pct: dec!(0.75),
        }
    }
}

/// Per-account row of the system status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStatus {
    /// Ledger snapshot.
    pub snapshot: AccountSnapshot,
    /// Lockout state at snapshot time.
    pub lockout: LockoutState,
    /// Remaining drawdown under the account's rule set.
    pub remaining_drawdown: Money,
}

impl AccountStatus {
    /// Account identifier.
    #[must_use]
    pub const fn account_id(&self) -> &AccountId {
        &self.snapshot.account_id
    }

    /// Whether the account counts toward the overall margin.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.lockout.status == LockoutStatus::Active
    }
}

/// Per-chart row of the system status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartStatus {
    /// Chart identifier.
    pub chart_id: ChartId,
    /// Owning account.
    pub account_id: AccountId,
    /// Whether the chart is enabled.
    pub enabled: bool,
    /// Latest decision.
    pub decision: Decision,
}

/// System-wide aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStatus {
    /// Sum of remaining drawdown over sum of starting balance, active accounts, percent.
    pub overall_margin_remaining_pct: Decimal,
    /// Sum of remaining drawdown over active accounts.
    pub overall_margin_remaining_amount: Money,
    /// Enabled charts whose account is active.
    pub active_chart_count: usize,
    /// Whether the emergency stop is engaged.
    pub emergency_stop_active: bool,
    /// Overall health.
    pub health: SystemHealth,
    /// When this status was computed.
    pub computed_at: Timestamp,
    /// Chart rows, ordered by chart id.
    pub charts: Vec<ChartStatus>,
    /// Account rows, ordered by account id.
    pub accounts: Vec<AccountStatus>,
}

impl SystemStatus {
    /// Status before the first aggregator pass.
    #[must_use]
    pub const fn empty(computed_at: Timestamp) -> Self {
        Self {
            overall_margin_remaining_pct: Decimal::ZERO,
            overall_margin_remaining_amount: Money::ZERO,
            active_chart_count: 0,
            emergency_stop_active: false,
            health: SystemHealth::Danger,
            computed_at,
            charts: Vec::new(),
            accounts: Vec::new(),
        }
    }

    /// Build the aggregate from per-account and per-chart snapshots.
    #[must_use]
    pub fn compute(
        mut accounts: Vec<AccountStatus>,
        mut charts: Vec<ChartStatus>,
        emergency_stop_active: bool,
        bands: &HealthBands,
        computed_at: Timestamp,
    ) -> Self {
        accounts.sort_by(|a, b| a.account_id().cmp(b.account_id()));
        charts.sort_by_key(|c| c.chart_id);

        let active: Vec<&AccountStatus> = accounts.iter().filter(|a| a.is_active()).collect();
        let remaining: Money = active.iter().map(|a| a.remaining_drawdown).sum();
        let size: Money = active.iter().map(|a| a.snapshot.starting_balance).sum();
        let pct = if size.is_positive() {
            remaining.ratio_pct(size).round_dp(2)
        } else {
            Decimal::ZERO
        };

        let active_chart_count = charts
            .iter()
            .filter(|c| {
                c.enabled
                    && accounts
                        .iter()
                        .any(|a| a.account_id() == &c.account_id && a.is_active())
            })
            .count();

        let any_breach_lock = accounts.iter().any(|a| a.lockout.is_breach_locked());
        let any_stop = charts.iter().any(|c| c.decision.state == DecisionState::Stop);

        let health = if emergency_stop_active {
            SystemHealth::Emergency
        } else if pct < bands.danger_margin_pct || any_breach_lock || active.is_empty() {
            SystemHealth::Danger
        } else if pct < bands.warning_margin_pct || any_stop {
            SystemHealth::Warning
        } else {
            SystemHealth::Healthy
        };

        Self {
            overall_margin_remaining_pct: pct,
            overall_margin_remaining_amount: remaining,
            active_chart_count,
            emergency_stop_active,
            health,
            computed_at,
            charts,
            accounts,
        }
    }

    /// Account row by id.
    #[must_use]
    pub fn account(&self, account_id: &AccountId) -> Option<&AccountStatus> {
        self.accounts.iter().find(|a| a.account_id() == account_id)
    }

    /// Chart row by id.
    #[must_use]
    pub fn chart(&self, chart_id: ChartId) -> Option<&ChartStatus> {
        self.charts.iter().find(|c| c.chart_id == chart_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::AccountPhase;
    use crate::domain::lockout::LockReason;

    fn now() -> Timestamp {
        Timestamp::parse("2026-01-14T15:00:00Z").unwrap()
    }

    fn account(id: &str, start: i64, remaining: i64, lockout: LockoutState) -> AccountStatus {
        AccountStatus {
            snapshot: AccountSnapshot {
                account_id: AccountId::new(id),
                starting_balance: Money::dollars(start),
                current_balance: Money::dollars(start),
                daily_pnl: Money::ZERO,
                total_pnl: Money::ZERO,
                high_water_mark: Money::dollars(start),
                open_contracts: 0,
                phase: AccountPhase::Evaluation,
            },
            lockout,
            remaining_drawdown: Money::dollars(remaining),
        }
    }

    fn chart(id: u32, account: &str, state: DecisionState) -> ChartStatus {
        let chart_id = ChartId::new(id);
        let decision = match state {
            DecisionState::Stop => Decision::stop(chart_id, "test", now()),
            DecisionState::Caution => Decision::caution(chart_id, "test", now()),
            DecisionState::Go => Decision::go(chart_id, 1, "test", now()),
        };
        ChartStatus {
            chart_id,
            account_id: AccountId::new(account),
            enabled: true,
            decision,
        }
    }

    fn breach_locked() -> LockoutState {
        LockoutState {
            status: LockoutStatus::LockedOut,
            locked_until: Some(now()),
            violation_count: 1,
            reason: Some(LockReason::Breach),
        }
    }

    #[test]
    fn margin_sums_active_accounts_only() {
        let status = SystemStatus::compute(
            vec![
                account("a", 50_000, 1_000, LockoutState::default()),
                account("b", 50_000, 1_500, LockoutState::default()),
                account("c", 100_000, 0, breach_locked()),
            ],
            vec![
                chart(1, "a", DecisionState::Go),
                chart(2, "b", DecisionState::Caution),
                chart(3, "c", DecisionState::Stop),
            ],
            false,
            &HealthBands::default(),
            now(),
        );

        assert_eq!(status.overall_margin_remaining_amount, Money::dollars(2_500));
        assert_eq!(status.overall_margin_remaining_pct, dec!(2.50));
        assert_eq!(status.active_chart_count, 2);
        assert_eq!(status.health, SystemHealth::Danger);
    }

    #[test]
    fn healthy_when_margin_high_and_nothing_stopped() {
        let bands = HealthBands {
            warning_margin_pct: dec!(2),
            danger_margin_pct: dec!(1),
        };
        let status = SystemStatus::compute(
            vec![account("a", 50_000, 2_000, LockoutState::default())],
            vec![chart(1, "a", DecisionState::Go)],
            false,
            &bands,
            now(),
        );
        assert_eq!(status.overall_margin_remaining_pct, dec!(4));
        assert_eq!(status.health, SystemHealth::Healthy);
    }

    #[test]
    fn stop_decision_is_warning() {
        let bands = HealthBands {
            warning_margin_pct: dec!(2),
            danger_margin_pct: dec!(1),
        };
        let status = SystemStatus::compute(
            vec![account("a", 50_000, 2_000, LockoutState::default())],
            vec![chart(1, "a", DecisionState::Stop)],
            false,
            &bands,
            now(),
        );
        assert_eq!(status.health, SystemHealth::Warning);
    }

    #[test]
    fn no_active_accounts_is_zero_margin() {
        let status = SystemStatus::compute(
            vec![account("a", 50_000, 2_000, breach_locked())],
            vec![chart(1, "a", DecisionState::Stop)],
            false,
            &HealthBands::default(),
            now(),
        );
        assert_eq!(status.overall_margin_remaining_pct, Decimal::ZERO);
        assert!(status.overall_margin_remaining_amount.is_zero());
        assert_eq!(status.active_chart_count, 0);
        assert_eq!(status.health, SystemHealth::Danger);
    }

    #[test]
    fn emergency_overrides_every_band() {
        let status = SystemStatus::compute(
            vec![account("a", 50_000, 2_000, LockoutState::default())],
            vec![chart(1, "a", DecisionState::Go)],
            true,
            &HealthBands::default(),
            now(),
        );
        assert_eq!(status.health, SystemHealth::Emergency);
        assert!(status.emergency_stop_active);
    }

    #[test]
    fn rows_are_sorted_and_addressable() {
        let status = SystemStatus::compute(
            vec![
                account("b", 50_000, 2_000, LockoutState::default()),
                account("a", 50_000, 2_000, LockoutState::default()),
            ],
            vec![chart(2, "b", DecisionState::Go), chart(1, "a", DecisionState::Go)],
            false,
            &HealthBands::default(),
            now(),
        );
        assert_eq!(status.accounts[0].account_id().as_str(), "a");
        assert_eq!(status.charts[0].chart_id, ChartId::new(1));
        assert!(status.chart(ChartId::new(2)).is_some());
        assert!(status.account(&AccountId::new("z")).is_none());
    }
}

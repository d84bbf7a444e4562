//! Decision Engine
//!
//! Deterministic precedence, first match wins:
//!
//! 1. emergency stop, chart disabled or account locked out -> STOP
//! 2. a STOP-severity violation this cycle -> STOP
//! 3. no drawdown remaining -> STOP
//! 4. drawdown below the low threshold -> CAUTION
//! 5. probability below the floor -> CAUTION
//! 6. probability at/above the ceiling and drawdown above the safe threshold -> GO
//! 7. otherwise -> CAUTION (marginal)

use rust_decimal::Decimal;

use super::decision::{Decision, DecisionState};
use super::sizing::risk_scaled_contracts;
use super::thresholds::DecisionThresholds;
use crate::domain::lockout::{LockReason, LockoutStatus};
use crate::domain::shared::{ChartId, Money, Timestamp};

/// Everything about the chart and account the decision depends on, apart from the signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionContext {
    /// Chart being decided.
    pub chart_id: ChartId,
    /// Whether the chart is enabled.
    pub chart_enabled: bool,
    /// Whether the process-wide emergency stop is set.
    pub emergency_active: bool,
    /// Account lockout status.
    pub lockout: LockoutStatus,
    /// Reason for the lock, if locked.
    pub lock_reason: Option<LockReason>,
    /// Lock expiry, if locked.
    pub locked_until: Option<Timestamp>,
    /// Message of the first STOP-severity violation this cycle.
    pub stop_violation: Option<String>,
    /// Dollars that can still be lost.
    pub remaining_drawdown: Money,
    /// Rule set per-trade contract limit.
    pub max_contracts_per_trade: u32,
    /// Contracts the account can still add before its total limit.
    pub available_contracts: u32,
}

impl DecisionContext {
    /// Context for an enabled chart on an active account.
    #[must_use]
    pub const fn new(chart_id: ChartId, remaining_drawdown: Money) -> Self {
        Self {
            chart_id,
            chart_enabled: true,
            emergency_active: false,
            lockout: LockoutStatus::Active,
            lock_reason: None,
            locked_until: None,
            stop_violation: None,
            remaining_drawdown,
            max_contracts_per_trade: 1,
            available_contracts: 1,
        }
    }

    /// Set contract limits.
    #[must_use]
    pub const fn with_contract_limits(mut self, per_trade: u32, available: u32) -> Self {
        self.max_contracts_per_trade = per_trade;
        self.available_contracts = available;
        self
    }
}

/// Combines risk figures and success probability into a decision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecisionEngine {
    thresholds: DecisionThresholds,
}

impl DecisionEngine {
    /// Create an engine with the given thresholds.
    #[must_use]
    pub const fn new(thresholds: DecisionThresholds) -> Self {
        Self { thresholds }
    }

    /// Thresholds in use.
    #[must_use]
    pub const fn thresholds(&self) -> &DecisionThresholds {
        &self.thresholds
    }

    /// The STOP that applies regardless of the signal, if any.
    #[must_use]
    pub fn forced_stop(&self, ctx: &DecisionContext, now: Timestamp) -> Option<Decision> {
        if ctx.emergency_active {
            return Some(Decision::stop(ctx.chart_id, "emergency stop active", now));
        }
        if !ctx.chart_enabled {
            return Some(Decision::stop(ctx.chart_id, "disabled", now));
        }
        if ctx.lockout == LockoutStatus::LockedOut {
            let reason = match (ctx.lock_reason, ctx.locked_until) {
                (Some(LockReason::EmergencyStop), _) => {
                    "locked out: emergency stop not cleared".to_string()
                }
                (_, Some(until)) => format!("locked out until {until}"),
                (_, None) => "locked out".to_string(),
            };
            return Some(Decision::stop(ctx.chart_id, reason, now));
        }
        if let Some(message) = &ctx.stop_violation {
            return Some(Decision::stop(
                ctx.chart_id,
                format!("compliance stop: {message}"),
                now,
            ));
        }
        if !ctx.remaining_drawdown.is_positive() {
            return Some(Decision::stop(ctx.chart_id, "no drawdown remaining", now));
        }
        None
    }

    fn low_drawdown_caution(&self, ctx: &DecisionContext, now: Timestamp) -> Option<Decision> {
        let low = self.thresholds.low_drawdown_threshold;
        (ctx.remaining_drawdown < low).then(|| {
            Decision::caution(
                ctx.chart_id,
                format!(
                    "remaining drawdown {} below caution threshold {low}",
                    ctx.remaining_drawdown
                ),
                now,
            )
        })
    }

    /// Decide for a cycle without a valid signal.
    ///
    /// `held` is the probability of the last valid signal and the non-forced
    /// decision it produced. The rules are re-run against the current context
    /// with that probability; the result is never more permissive than the held
    /// decision and a GO never grows past the held size.
    #[must_use]
    pub fn hold(
        &self,
        ctx: &DecisionContext,
        held: Option<(Decimal, &Decision)>,
        now: Timestamp,
    ) -> Decision {
        let Some((probability, previous)) = held else {
            return self
                .forced_stop(ctx, now)
                .or_else(|| self.low_drawdown_caution(ctx, now))
                .unwrap_or_else(|| Decision::caution(ctx.chart_id, "awaiting signal", now));
        };

        let mut fresh = self.evaluate(ctx, probability, now);
        if fresh.state > previous.state {
            return Decision::caution(ctx.chart_id, "signal unavailable, holding caution", now);
        }
        if fresh.state == DecisionState::Go {
            fresh.recommended_contracts = fresh
                .recommended_contracts
                .min(previous.recommended_contracts);
        }
        fresh
    }

    /// Decide for a valid signal with the given success probability (0-100).
    #[must_use]
    pub fn evaluate(
        &self,
        ctx: &DecisionContext,
        success_probability: Decimal,
        now: Timestamp,
    ) -> Decision {
        if let Some(stop) = self.forced_stop(ctx, now) {
            return stop;
        }

        if let Some(caution) = self.low_drawdown_caution(ctx, now) {
            return caution;
        }

        let t = &self.thresholds;
        let remaining = ctx.remaining_drawdown;

        if success_probability < t.probability_floor {
            return Decision::caution(
                ctx.chart_id,
                format!(
                    "success probability {}% below floor {}%",
                    success_probability.round_dp(1),
                    t.probability_floor
                ),
                now,
            );
        }

        if success_probability >= t.probability_ceiling && remaining > t.safe_drawdown_threshold {
            let cap = ctx.max_contracts_per_trade.min(ctx.available_contracts);
            let contracts = risk_scaled_contracts(
                remaining,
                t.dollar_risk_per_contract,
                t.safety_ratio_pct,
                success_probability,
                cap,
            );
            if contracts == 0 {
                return Decision::caution(ctx.chart_id, "no contract capacity", now);
            }
            return Decision::go(
                ctx.chart_id,
                contracts,
                format!(
                    "success probability {}% with {remaining} drawdown remaining",
                    success_probability.round_dp(1)
                ),
                now,
            );
        }

        Decision::caution(
            ctx.chart_id,
            format!(
                "marginal: probability {}%, drawdown {remaining}",
                success_probability.round_dp(1)
            ),
            now,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    fn now() -> Timestamp {
        Timestamp::parse("2026-01-14T15:00:00Z").unwrap()
    }

    fn ctx(remaining: i64) -> DecisionContext {
        DecisionContext::new(ChartId::new(1), Money::dollars(remaining)).with_contract_limits(5, 5)
    }

    #[test]
    fn scenario_go_with_size() {
        let decision = DecisionEngine::default().evaluate(&ctx(2000), dec!(75), now());
        assert_eq!(decision.state, DecisionState::Go);
        assert!(decision.recommended_contracts >= 1);
        assert_eq!(decision.recommended_contracts, 3);
    }

    #[test]
    fn scenario_low_drawdown_is_caution_regardless_of_probability() {
        for probability in [dec!(0), dec!(65), dec!(99)] {
            let decision = DecisionEngine::default().evaluate(&ctx(150), probability, now());
            assert_eq!(decision.state, DecisionState::Caution);
            assert_eq!(decision.recommended_contracts, 0);
        }
    }

    #[test_case(0, dec!(90), DecisionState::Stop ; "no drawdown")]
    #[test_case(299, dec!(90), DecisionState::Caution ; "below low threshold")]
    #[test_case(1000, dec!(59), DecisionState::Caution ; "below probability floor")]
    #[test_case(1000, dec!(65), DecisionState::Caution ; "between floor and ceiling")]
    #[test_case(500, dec!(90), DecisionState::Caution ; "not above safe threshold")]
    #[test_case(501, dec!(70), DecisionState::Go ; "at ceiling above safe")]
    fn precedence(remaining: i64, probability: Decimal, expected: DecisionState) {
        let decision = DecisionEngine::default().evaluate(&ctx(remaining), probability, now());
        assert_eq!(decision.state, expected, "{decision}");
    }

    #[test]
    fn lockout_beats_everything_but_emergency() {
        let mut locked = ctx(5000);
        locked.lockout = LockoutStatus::LockedOut;
        locked.lock_reason = Some(LockReason::Breach);
        locked.locked_until = Some(now());
        let decision = DecisionEngine::default().evaluate(&locked, dec!(95), now());
        assert_eq!(decision.state, DecisionState::Stop);
        assert!(decision.reason.starts_with("locked out until"));

        locked.emergency_active = true;
        let decision = DecisionEngine::default().evaluate(&locked, dec!(95), now());
        assert_eq!(decision.reason, "emergency stop active");
    }

    #[test]
    fn disabled_chart_is_stop() {
        let mut disabled = ctx(5000);
        disabled.chart_enabled = false;
        let decision = DecisionEngine::default().evaluate(&disabled, dec!(95), now());
        assert_eq!(decision.state, DecisionState::Stop);
        assert_eq!(decision.reason, "disabled");
    }

    #[test]
    fn stop_violation_forces_stop() {
        let mut stopped = ctx(5000);
        stopped.stop_violation = Some("outside trading hours".to_string());
        let decision = DecisionEngine::default().evaluate(&stopped, dec!(95), now());
        assert_eq!(decision.state, DecisionState::Stop);
        assert!(decision.reason.contains("outside trading hours"));
    }

    #[test]
    fn no_capacity_downgrades_go() {
        let full = ctx(5000).with_contract_limits(5, 0);
        let decision = DecisionEngine::default().evaluate(&full, dec!(95), now());
        assert_eq!(decision.state, DecisionState::Caution);
        assert_eq!(decision.reason, "no contract capacity");
    }

    #[test]
    fn forced_stop_is_none_for_healthy_context() {
        assert!(DecisionEngine::default().forced_stop(&ctx(2000), now()).is_none());
    }

    #[test]
    fn hold_rechecks_drawdown_after_a_loss() {
        let engine = DecisionEngine::default();
        let held = engine.evaluate(&ctx(2000), dec!(82), now());
        assert_eq!(held.state, DecisionState::Go);

        let decision = engine.hold(&ctx(250), Some((dec!(82), &held)), now());
        assert_eq!(decision.state, DecisionState::Caution);
        assert_eq!(decision.recommended_contracts, 0);
        assert!(decision.reason.contains("$250.00"), "{decision}");
    }

    #[test]
    fn hold_clamps_go_to_current_capacity() {
        let engine = DecisionEngine::default();
        let held = Decision::go(ChartId::new(1), 3, "earlier", now());

        let decision = engine.hold(
            &ctx(5000).with_contract_limits(5, 1),
            Some((dec!(95), &held)),
            now(),
        );
        assert_eq!(decision.state, DecisionState::Go);
        assert_eq!(decision.recommended_contracts, 1);
    }

    #[test]
    fn hold_never_upgrades_held_caution() {
        let engine = DecisionEngine::default();
        let held = engine.evaluate(&ctx(400), dec!(95), now());
        assert_eq!(held.state, DecisionState::Caution);

        let decision = engine.hold(&ctx(5000), Some((dec!(95), &held)), now());
        assert_eq!(decision.state, DecisionState::Caution);
        assert_eq!(decision.reason, "signal unavailable, holding caution");
    }

    #[test_case(5000, "awaiting signal" ; "healthy account")]
    #[test_case(150, "below caution threshold" ; "low drawdown")]
    #[test_case(0, "no drawdown remaining" ; "exhausted")]
    fn hold_without_previous_signal(remaining: i64, expected: &str) {
        let decision = DecisionEngine::default().hold(&ctx(remaining), None, now());
        assert_ne!(decision.state, DecisionState::Go);
        assert!(decision.reason.contains(expected), "{decision}");
    }

    proptest! {
        #[test]
        fn shrinking_drawdown_never_upgrades_to_go(
            high in 0i64..10_000,
            cut in 0i64..10_000,
            probability in 0u32..=100,
        ) {
            let low = (high - cut).max(0);
            let engine = DecisionEngine::default();
            let p = Decimal::from(probability);
            let before = engine.evaluate(&ctx(high), p, now());
            let after = engine.evaluate(&ctx(low), p, now());
            if before.state != DecisionState::Go {
                prop_assert_ne!(after.state, DecisionState::Go);
            }
            prop_assert!(after.state <= before.state);
        }
    }
}

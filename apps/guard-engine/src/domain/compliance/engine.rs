//! Compliance Engine
//!
//! Stateless evaluation of an account snapshot and a candidate trade against
//! a firm rule set. All checks run on every call and are reported in a fixed
//! order; the only clock is the explicit `now` argument.

use chrono::{Duration, NaiveTime, Timelike};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::rule_set::RuleSet;
use super::violation::{ComplianceReport, Severity, Violation, ViolationKind};
use crate::domain::account::AccountSnapshot;
use crate::domain::shared::{Timestamp, TradingCalendar};

/// The trade a chart would place this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeCandidate {
    /// Instrument symbol (e.g. "MES").
    pub instrument: String,
    /// Contracts the chart would request.
    pub requested_contracts: u32,
}

impl TradeCandidate {
    /// Create a candidate trade.
    #[must_use]
    pub fn new(instrument: impl Into<String>, requested_contracts: u32) -> Self {
        Self {
            instrument: instrument.into(),
            requested_contracts,
        }
    }
}

/// A scheduled market-moving release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsEvent {
    /// Release name (e.g. "FOMC").
    pub title: String,
    /// Scheduled release time.
    pub at: Timestamp,
}

/// Rule evaluator bound to a trading calendar and news schedule.
#[derive(Debug, Clone, Default)]
pub struct ComplianceEngine {
    calendar: TradingCalendar,
    news: Vec<NewsEvent>,
}

impl ComplianceEngine {
    /// Create an engine for the given calendar with no scheduled news.
    #[must_use]
    pub const fn new(calendar: TradingCalendar) -> Self {
        Self {
            calendar,
            news: Vec::new(),
        }
    }

    /// Attach a news schedule.
    #[must_use]
    pub fn with_news(mut self, news: Vec<NewsEvent>) -> Self {
        self.news = news;
        self
    }

    /// Trading calendar in use.
    #[must_use]
    pub const fn calendar(&self) -> &TradingCalendar {
        &self.calendar
    }

    /// Evaluate every rule. Identical inputs always produce an identical report.
    #[must_use]
    pub fn evaluate(
        &self,
        rules: &RuleSet,
        account: &AccountSnapshot,
        candidate: &TradeCandidate,
        now: Timestamp,
    ) -> ComplianceReport {
        let mut violations = Vec::new();

        self.check_daily_loss(rules, account, now, &mut violations);
        self.check_trailing_drawdown(rules, account, now, &mut violations);
        self.check_consistency(rules, account, now, &mut violations);
        self.check_position_size(rules, account, candidate, now, &mut violations);
        self.check_forbidden_instrument(rules, candidate, now, &mut violations);
        self.check_trading_hours(rules, now, &mut violations);
        self.check_news_blackout(rules, now, &mut violations);
        self.check_weekend_holding(rules, account, candidate, now, &mut violations);

        ComplianceReport::new(violations)
    }

    fn check_daily_loss(
        &self,
        rules: &RuleSet,
        account: &AccountSnapshot,
        now: Timestamp,
        out: &mut Vec<Violation>,
    ) {
        let loss = (-account.daily_pnl).floor_zero();
        let limit = rules.daily_loss_limit_amount(account.starting_balance);
        if loss >= limit {
            out.push(Violation::new(
                ViolationKind::DailyLoss,
                Severity::Breach,
                format!("Daily loss {loss} reached limit {limit}"),
                loss.amount(),
                limit.amount(),
                now,
            ));
        }
    }

    fn check_trailing_drawdown(
        &self,
        rules: &RuleSet,
        account: &AccountSnapshot,
        now: Timestamp,
        out: &mut Vec<Violation>,
    ) {
        let drawdown = (account.high_water_mark - account.current_balance).floor_zero();
        let limit = rules.trailing_drawdown_amount(account.starting_balance);
        if drawdown >= limit {
            out.push(Violation::new(
                ViolationKind::TrailingDrawdown,
                Severity::Breach,
                format!("Drawdown {drawdown} from peak reached limit {limit}"),
                drawdown.amount(),
                limit.amount(),
                now,
            ));
        }
    }

    fn check_consistency(
        &self,
        rules: &RuleSet,
        account: &AccountSnapshot,
        now: Timestamp,
        out: &mut Vec<Violation>,
    ) {
        if !account.total_pnl.is_positive() {
            return;
        }
        let limit = account.total_pnl.percent(rules.consistency_limit_pct);
        if account.daily_pnl > limit {
            out.push(Violation::new(
                ViolationKind::Consistency,
                rules.consistency_severity,
                format!(
                    "Today's profit {} exceeds {}% of total profit",
                    account.daily_pnl, rules.consistency_limit_pct
                ),
                account.daily_pnl.amount(),
                limit.amount(),
                now,
            ));
        }
    }

    fn check_position_size(
        &self,
        rules: &RuleSet,
        account: &AccountSnapshot,
        candidate: &TradeCandidate,
        now: Timestamp,
        out: &mut Vec<Violation>,
    ) {
        if candidate.requested_contracts > rules.max_contracts_per_trade {
            out.push(Violation::new(
                ViolationKind::PositionSize,
                Severity::Stop,
                format!(
                    "Order of {} contracts exceeds per-trade limit {}",
                    candidate.requested_contracts, rules.max_contracts_per_trade
                ),
                Decimal::from(candidate.requested_contracts),
                Decimal::from(rules.max_contracts_per_trade),
                now,
            ));
        }

        let cumulative = account
            .open_contracts
            .saturating_add(candidate.requested_contracts);
        if cumulative > rules.max_total_contracts {
            out.push(Violation::new(
                ViolationKind::PositionSize,
                Severity::Stop,
                format!(
                    "{} open plus {} requested exceeds total limit {}",
                    account.open_contracts,
                    candidate.requested_contracts,
                    rules.max_total_contracts
                ),
                Decimal::from(cumulative),
                Decimal::from(rules.max_total_contracts),
                now,
            ));
        }
    }

    fn check_forbidden_instrument(
        &self,
        rules: &RuleSet,
        candidate: &TradeCandidate,
        now: Timestamp,
        out: &mut Vec<Violation>,
    ) {
        if rules.is_forbidden(&candidate.instrument) {
            out.push(Violation::new(
                ViolationKind::ForbiddenInstrument,
                Severity::Stop,
                format!("{} may not be traded under {}", candidate.instrument, rules.name),
                Decimal::ONE,
                Decimal::ZERO,
                now,
            ));
        }
    }

    fn check_trading_hours(&self, rules: &RuleSet, now: Timestamp, out: &mut Vec<Violation>) {
        let local = self.calendar.local(now).time();
        let day = self.calendar.trading_day(now);
        if !self.calendar.is_trading_day(day) || !rules.trading_hours.contains(local) {
            out.push(Violation::new(
                ViolationKind::TimeRestriction,
                Severity::Stop,
                format!(
                    "{} is outside allowed trading hours {}",
                    local.format("%H:%M"),
                    rules.trading_hours
                ),
                clock_value(local),
                clock_value(rules.trading_hours.close()),
                now,
            ));
        }
    }

    fn check_news_blackout(&self, rules: &RuleSet, now: Timestamp, out: &mut Vec<Violation>) {
        if rules.news_blackout_minutes == 0 {
            return;
        }
        let window = Duration::minutes(i64::from(rules.news_blackout_minutes));
        let hit = self
            .news
            .iter()
            .find(|event| now.duration_since(event.at).abs() <= window);

        if let Some(event) = hit {
            let minutes_away = now.duration_since(event.at).num_minutes().abs();
            out.push(Violation::new(
                ViolationKind::TimeRestriction,
                Severity::Stop,
                format!("News blackout around {}", event.title),
                Decimal::from(minutes_away),
                Decimal::from(rules.news_blackout_minutes),
                now,
            ));
        }
    }

    fn check_weekend_holding(
        &self,
        rules: &RuleSet,
        account: &AccountSnapshot,
        candidate: &TradeCandidate,
        now: Timestamp,
        out: &mut Vec<Violation>,
    ) {
        if rules.weekend_holding_allowed || !self.calendar.is_weekend_closure(now) {
            return;
        }
        if account.open_contracts > 0 {
            out.push(Violation::new(
                ViolationKind::WeekendHolding,
                Severity::Stop,
                format!(
                    "{} contracts of {} held into the weekend closure",
                    account.open_contracts, candidate.instrument
                ),
                Decimal::from(account.open_contracts),
                Decimal::ZERO,
                now,
            ));
        }
    }
}

/// Wall-clock time as an HHMM number (17:30 -> 1730).
fn clock_value(time: NaiveTime) -> Decimal {
    Decimal::from(time.hour() * 100 + time.minute())
}

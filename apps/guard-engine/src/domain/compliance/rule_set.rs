//! Per-firm, per-account-size rule sets.
//!
//! Firms are a closed set resolved once at configuration load. The preset
//! numbers are representative starting points; operators override any of
//! them (or use [`PropFirm::Custom`]) to match a firm's current terms.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::violation::Severity;
use crate::domain::shared::{Money, TradingHours};

/// Prop firm whose evaluation rules apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropFirm {
    /// Topstep.
    Topstep,
    /// Apex Trader Funding.
    Apex,
    /// TradeDay.
    TradeDay,
    /// Operator-defined rules.
    Custom,
}

impl fmt::Display for PropFirm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Topstep => "topstep",
            Self::Apex => "apex",
            Self::TradeDay => "trade_day",
            Self::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// Account size tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountTier {
    /// $25,000 account.
    #[serde(rename = "25K", alias = "25k")]
    K25,
    /// $50,000 account.
    #[serde(rename = "50K", alias = "50k")]
    K50,
    /// $100,000 account.
    #[serde(rename = "100K", alias = "100k")]
    K100,
    /// $150,000 account.
    #[serde(rename = "150K", alias = "150k")]
    K150,
}

impl AccountTier {
    /// Starting balance of the tier.
    #[must_use]
    pub fn starting_balance(&self) -> Money {
        Money::dollars(match self {
            Self::K25 => 25_000,
            Self::K50 => 50_000,
            Self::K100 => 100_000,
            Self::K150 => 150_000,
        })
    }

    /// (per-trade, total) contract limits for the tier.
    const fn contract_limits(&self) -> (u32, u32) {
        match self {
            Self::K25 => (3, 3),
            Self::K50 => (5, 5),
            Self::K100 => (10, 10),
            Self::K150 => (15, 15),
        }
    }
}

/// Immutable compliance limits for one firm and account size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    /// Rule set name (configuration key).
    pub name: String,
    /// Firm the rules come from.
    pub firm: PropFirm,
    /// Daily loss limit as a percentage of starting balance.
    pub daily_loss_limit_pct: Decimal,
    /// Trailing drawdown as a percentage of starting balance.
    pub trailing_drawdown_pct: Decimal,
    /// Maximum share of total profit allowed from one day, in percent.
    pub consistency_limit_pct: Decimal,
    /// Severity of consistency violations.
    pub consistency_severity: Severity,
    /// Maximum contracts in a single order.
    pub max_contracts_per_trade: u32,
    /// Maximum open contracts across the account.
    pub max_total_contracts: u32,
    /// Instruments that may not be traded (upper-case symbols).
    pub forbidden_instruments: BTreeSet<String>,
    /// Window in which trading is allowed, exchange-local time.
    pub trading_hours: TradingHours,
    /// Whether positions may be held through the weekend closure.
    pub weekend_holding_allowed: bool,
    /// Minutes either side of a scheduled news event in which trading is blocked.
    pub news_blackout_minutes: u32,
}

impl RuleSet {
    /// Resolve a firm preset for an account tier.
    #[must_use]
    pub fn preset(firm: PropFirm, tier: AccountTier) -> Self {
        let (per_trade, total) = tier.contract_limits();
        let (daily, trailing, consistency, hours, news) = match firm {
            PropFirm::Topstep => (
                dec!(2.0),
                dec!(4.0),
                dec!(50),
                TradingHours::from_hm((18, 0), (16, 10)),
                0,
            ),
            PropFirm::Apex => (
                dec!(2.5),
                dec!(5.0),
                dec!(30),
                TradingHours::from_hm((18, 0), (16, 59)),
                0,
            ),
            PropFirm::TradeDay => (
                dec!(2.0),
                dec!(4.0),
                dec!(30),
                TradingHours::from_hm((18, 0), (16, 0)),
                2,
            ),
            PropFirm::Custom => (
                dec!(2.0),
                dec!(4.0),
                dec!(30),
                TradingHours::from_hm((18, 0), (17, 0)),
                0,
            ),
        };

        Self {
            name: format!("{firm}-{}", tier_label(tier)),
            firm,
            daily_loss_limit_pct: daily,
            trailing_drawdown_pct: trailing,
            consistency_limit_pct: consistency,
            consistency_severity: Severity::Warning,
            max_contracts_per_trade: per_trade,
            max_total_contracts: total,
            forbidden_instruments: BTreeSet::new(),
            trading_hours: hours,
            weekend_holding_allowed: false,
            news_blackout_minutes: news,
        }
    }

    /// Rename the rule set.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replace the forbidden instrument list (symbols are upper-cased).
    #[must_use]
    pub fn with_forbidden_instruments<I, S>(mut self, instruments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.forbidden_instruments = instruments
            .into_iter()
            .map(|s| s.as_ref().trim().to_ascii_uppercase())
            .collect();
        self
    }

    /// Daily loss limit in dollars for an account of `starting_balance`.
    #[must_use]
    pub fn daily_loss_limit_amount(&self, starting_balance: Money) -> Money {
        starting_balance.percent(self.daily_loss_limit_pct)
    }

    /// Trailing drawdown allowance in dollars for an account of `starting_balance`.
    #[must_use]
    pub fn trailing_drawdown_amount(&self, starting_balance: Money) -> Money {
        starting_balance.percent(self.trailing_drawdown_pct)
    }

    /// Returns true if `instrument` is on the forbidden list.
    #[must_use]
    pub fn is_forbidden(&self, instrument: &str) -> bool {
        self.forbidden_instruments
            .contains(&instrument.trim().to_ascii_uppercase())
    }
}

const fn tier_label(tier: AccountTier) -> &'static str {
    match tier {
        AccountTier::K25 => "25k",
        AccountTier::K50 => "50k",
        AccountTier::K100 => "100k",
        AccountTier::K150 => "150k",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apex_50k_daily_limit_is_1250() {
        let rules = RuleSet::preset(PropFirm::Apex, AccountTier::K50);
        assert_eq!(
            rules.daily_loss_limit_amount(AccountTier::K50.starting_balance()),
            Money::dollars(1250)
        );
        assert_eq!(
            rules.trailing_drawdown_amount(AccountTier::K50.starting_balance()),
            Money::dollars(2500)
        );
        assert_eq!(rules.name, "apex-50k");
    }

    #[test]
    fn presets_scale_contracts_with_tier() {
        let small = RuleSet::preset(PropFirm::Topstep, AccountTier::K25);
        let large = RuleSet::preset(PropFirm::Topstep, AccountTier::K150);
        assert!(large.max_contracts_per_trade > small.max_contracts_per_trade);
        assert!(small.max_contracts_per_trade <= small.max_total_contracts);
    }

    #[test]
    fn consistency_defaults_to_warning() {
        for firm in [PropFirm::Topstep, PropFirm::Apex, PropFirm::TradeDay, PropFirm::Custom] {
            let rules = RuleSet::preset(firm, AccountTier::K50);
            assert_eq!(rules.consistency_severity, Severity::Warning);
            assert!(!rules.weekend_holding_allowed);
        }
    }

    #[test]
    fn forbidden_instruments_are_case_insensitive() {
        let rules = RuleSet::preset(PropFirm::Custom, AccountTier::K50)
            .with_forbidden_instruments(["cl", " NG "]);
        assert!(rules.is_forbidden("CL"));
        assert!(rules.is_forbidden("ng"));
        assert!(!rules.is_forbidden("ES"));
    }

    #[test]
    fn tier_deserializes_from_label() {
        let tier: AccountTier = serde_json::from_str("\"100K\"").unwrap();
        assert_eq!(tier, AccountTier::K100);
        let tier: AccountTier = serde_json::from_str("\"25k\"").unwrap();
        assert_eq!(tier, AccountTier::K25);
    }
}

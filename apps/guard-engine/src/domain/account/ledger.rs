//! Account Ledger Aggregate
//!
//! Single source of truth for one account's financial state. Callers hold
//! the account's exclusive lock while mutating it.

use chrono::NaiveDate;

use super::errors::LedgerError;
use super::value_objects::{AccountPhase, AccountSnapshot};
use crate::domain::compliance::RuleSet;
use crate::domain::shared::{AccountId, Money};

/// Per-account financial state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountLedger {
    account_id: AccountId,
    starting_balance: Money,
    current_balance: Money,
    daily_pnl: Money,
    total_pnl: Money,
    high_water_mark: Money,
    open_contracts: u32,
    phase: AccountPhase,
    trading_day: Option<NaiveDate>,
}

impl AccountLedger {
    /// Create a fresh account at its starting balance.
    #[must_use]
    pub const fn new(account_id: AccountId, starting_balance: Money, phase: AccountPhase) -> Self {
        Self {
            account_id,
            starting_balance,
            current_balance: starting_balance,
            daily_pnl: Money::ZERO,
            total_pnl: Money::ZERO,
            high_water_mark: starting_balance,
            open_contracts: 0,
            phase,
            trading_day: None,
        }
    }

    /// Rebuild a ledger from a snapshot (e.g. an account already mid-evaluation).
    ///
    /// The high-water mark is raised to the current balance if it is below it.
    #[must_use]
    pub fn from_snapshot(snapshot: AccountSnapshot) -> Self {
        let high_water_mark = snapshot.high_water_mark.max(snapshot.current_balance);
        Self {
            account_id: snapshot.account_id,
            starting_balance: snapshot.starting_balance,
            current_balance: snapshot.current_balance,
            daily_pnl: snapshot.daily_pnl,
            total_pnl: snapshot.total_pnl,
            high_water_mark,
            open_contracts: snapshot.open_contracts,
            phase: snapshot.phase,
            trading_day: None,
        }
    }

    /// Apply a confirmed P&L change.
    pub fn apply_tick(&mut self, pnl_delta: Money) {
        self.current_balance += pnl_delta;
        self.daily_pnl += pnl_delta;
        self.total_pnl += pnl_delta;
        if self.current_balance > self.high_water_mark {
            self.high_water_mark = self.current_balance;
        }
    }

    /// Apply a confirmed change in open contracts.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::ContractUnderflow` if the count would go negative
    /// or overflow; the ledger is unchanged in that case.
    pub fn apply_contracts(&mut self, delta: i64) -> Result<(), LedgerError> {
        let underflow = LedgerError::ContractUnderflow {
            open: self.open_contracts,
            delta,
        };
        let next = i64::from(self.open_contracts)
            .checked_add(delta)
            .ok_or_else(|| underflow.clone())?;
        self.open_contracts = u32::try_from(next).map_err(|_| underflow)?;
        Ok(())
    }

    /// Apply a fill: contracts first, then P&L, so a rejected contract change
    /// leaves the ledger untouched.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::ContractUnderflow` for an impossible contract change.
    pub fn apply_fill(&mut self, pnl_delta: Money, contracts_delta: i64) -> Result<(), LedgerError> {
        self.apply_contracts(contracts_delta)?;
        self.apply_tick(pnl_delta);
        Ok(())
    }

    /// Dollars that can still be lost before the first drawdown limit, floored at zero.
    #[must_use]
    pub fn remaining_drawdown(&self, rules: &RuleSet) -> Money {
        let daily_loss = (-self.daily_pnl).floor_zero();
        let daily_room = rules.daily_loss_limit_amount(self.starting_balance) - daily_loss;
        let trailing_room = rules.trailing_drawdown_amount(self.starting_balance)
            - (self.high_water_mark - self.current_balance);
        daily_room.min(trailing_room).floor_zero()
    }

    /// Start a new trading day. Keeps the high-water mark and total P&L.
    pub fn reset_daily(&mut self) {
        self.daily_pnl = Money::ZERO;
    }

    /// Record the trading day of the current cycle, resetting daily figures
    /// when it differs from the last one seen. Returns true if a reset happened.
    pub fn roll_to(&mut self, trading_day: NaiveDate) -> bool {
        match self.trading_day {
            Some(current) if current == trading_day => false,
            Some(_) => {
                self.trading_day = Some(trading_day);
                self.reset_daily();
                true
            }
            None => {
                self.trading_day = Some(trading_day);
                false
            }
        }
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            account_id: self.account_id.clone(),
            starting_balance: self.starting_balance,
            current_balance: self.current_balance,
            daily_pnl: self.daily_pnl,
            total_pnl: self.total_pnl,
            high_water_mark: self.high_water_mark,
            open_contracts: self.open_contracts,
            phase: self.phase,
        }
    }

    /// Account identifier.
    #[must_use]
    pub const fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    /// Balance at account creation.
    #[must_use]
    pub const fn starting_balance(&self) -> Money {
        self.starting_balance
    }

    /// Current balance.
    #[must_use]
    pub const fn current_balance(&self) -> Money {
        self.current_balance
    }

    /// P&L since the start of the trading day.
    #[must_use]
    pub const fn daily_pnl(&self) -> Money {
        self.daily_pnl
    }

    /// Highest balance reached.
    #[must_use]
    pub const fn high_water_mark(&self) -> Money {
        self.high_water_mark
    }

    /// Contracts currently open.
    #[must_use]
    pub const fn open_contracts(&self) -> u32 {
        self.open_contracts
    }

    /// Trading day of the last cycle, if any.
    #[must_use]
    pub const fn trading_day(&self) -> Option<NaiveDate> {
        self.trading_day
    }
}

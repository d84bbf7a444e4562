//! Account Registry
//!
//! One exclusive lock per account. Every mutation of an account's ledger or
//! lockout state happens under that lock, so updates to one account are
//! totally ordered while different accounts never wait on each other.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use crate::application::ports::LedgerUpdate;
use crate::domain::account::{AccountLedger, AccountSnapshot};
use crate::domain::lockout::{LockoutState, LockoutStateMachine};
use crate::domain::shared::AccountId;
use crate::error::EngineError;

/// Mutable state of one account.
#[derive(Debug, Clone)]
pub struct AccountState {
    /// Financial state.
    pub ledger: AccountLedger,
    /// Lockout state machine.
    pub lockout: LockoutStateMachine,
    /// Name of the rule set governing the account.
    pub rule_set: String,
}

impl AccountState {
    /// New ACTIVE account.
    #[must_use]
    pub fn new(ledger: AccountLedger, rule_set: impl Into<String>) -> Self {
        Self {
            ledger,
            lockout: LockoutStateMachine::new(),
            rule_set: rule_set.into(),
        }
    }
}

/// Registry of accounts. The set of accounts is fixed at construction.
#[derive(Debug)]
pub struct AccountRegistry {
    accounts: BTreeMap<AccountId, Arc<Mutex<AccountState>>>,
    lock_timeout: Duration,
}

impl AccountRegistry {
    /// Empty registry with the given bounded lock wait.
    #[must_use]
    pub const fn new(lock_timeout: Duration) -> Self {
        Self {
            accounts: BTreeMap::new(),
            lock_timeout,
        }
    }

    /// Register an account.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::DuplicateAccount` if the id is already registered.
    pub fn insert(&mut self, state: AccountState) -> Result<(), EngineError> {
        let id = state.ledger.account_id().clone();
        if self.accounts.contains_key(&id) {
            return Err(EngineError::DuplicateAccount(id));
        }
        self.accounts.insert(id, Arc::new(Mutex::new(state)));
        Ok(())
    }

    /// Whether the account is registered.
    #[must_use]
    pub fn contains(&self, account_id: &AccountId) -> bool {
        self.accounts.contains_key(account_id)
    }

    /// Registered ids in order.
    pub fn ids(&self) -> impl Iterator<Item = &AccountId> {
        self.accounts.keys()
    }

    /// Number of accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Bounded lock wait.
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Acquire an account's lock, waiting at most the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAccount` or `LockContention`.
    pub fn lock(&self, account_id: &AccountId) -> Result<MutexGuard<'_, AccountState>, EngineError> {
        let cell = self
            .accounts
            .get(account_id)
            .ok_or_else(|| EngineError::UnknownAccount(account_id.clone()))?;

        cell.try_lock_for(self.lock_timeout)
            .ok_or_else(|| EngineError::LockContention {
                account_id: account_id.clone(),
                waited_ms: self.lock_timeout.as_millis() as u64,
            })
    }

    /// Run `f` with exclusive access to an account.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAccount` or `LockContention`.
    pub fn with_account<R>(
        &self,
        account_id: &AccountId,
        f: impl FnOnce(&mut AccountState) -> R,
    ) -> Result<R, EngineError> {
        let mut guard = self.lock(account_id)?;
        Ok(f(&mut guard))
    }

    /// Apply a confirmed update directly.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAccount`, `LockContention` or a ledger error.
    pub fn apply_update(
        &self,
        account_id: &AccountId,
        update: LedgerUpdate,
    ) -> Result<AccountSnapshot, EngineError> {
        self.with_account(account_id, |state| -> Result<AccountSnapshot, EngineError> {
            state
                .ledger
                .apply_fill(update.pnl_delta, update.contracts_delta)?;
            Ok(state.ledger.snapshot())
        })?
    }

    /// Current ledger snapshot.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAccount` or `LockContention`.
    pub fn snapshot(&self, account_id: &AccountId) -> Result<AccountSnapshot, EngineError> {
        self.with_account(account_id, |state| state.ledger.snapshot())
    }

    /// Current lockout state.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAccount` or `LockContention`.
    pub fn lockout(&self, account_id: &AccountId) -> Result<LockoutState, EngineError> {
        self.with_account(account_id, |state| state.lockout.state().clone())
    }

    /// Replace an account's lockout state with a persisted one.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAccount` or `LockContention`.
    pub fn restore_lockout(
        &self,
        account_id: &AccountId,
        state: LockoutState,
    ) -> Result<(), EngineError> {
        self.with_account(account_id, |account| {
            account.lockout = LockoutStateMachine::restore(state);
        })
    }
}

//! In-memory audit persistence for testing.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::application::ports::{
    LockoutStorePort, PersistenceError, ViolationLogPort, ViolationRecord,
};
use crate::domain::lockout::LockoutState;
use crate::domain::shared::AccountId;

/// In-memory implementation of `ViolationLogPort`.
///
/// Suitable for testing and development. Not for production use.
#[derive(Debug, Default)]
pub struct InMemoryViolationLog {
    records: RwLock<Vec<ViolationRecord>>,
}

impl InMemoryViolationLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl ViolationLogPort for InMemoryViolationLog {
    async fn append(&self, record: &ViolationRecord) -> Result<(), PersistenceError> {
        self.records.write().push(record.clone());
        Ok(())
    }

    async fn list(&self, account_id: &AccountId) -> Result<Vec<ViolationRecord>, PersistenceError> {
        let mut records: Vec<ViolationRecord> = self
            .records
            .read()
            .iter()
            .filter(|r| &r.account_id == account_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.violation.occurred_at);
        Ok(records)
    }
}

/// In-memory implementation of `LockoutStorePort`.
#[derive(Debug, Default)]
pub struct InMemoryLockoutStore {
    states: RwLock<BTreeMap<AccountId, LockoutState>>,
}

impl InMemoryLockoutStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockoutStorePort for InMemoryLockoutStore {
    async fn save(
        &self,
        account_id: &AccountId,
        state: &LockoutState,
    ) -> Result<(), PersistenceError> {
        self.states.write().insert(account_id.clone(), state.clone());
        Ok(())
    }

    async fn load(&self, account_id: &AccountId) -> Result<Option<LockoutState>, PersistenceError> {
        Ok(self.states.read().get(account_id).cloned())
    }

    async fn load_all(&self) -> Result<Vec<(AccountId, LockoutState)>, PersistenceError> {
        Ok(self
            .states
            .read()
            .iter()
            .map(|(id, state)| (id.clone(), state.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::compliance::{Severity, Violation, ViolationKind};
    use crate::domain::lockout::LockoutStatus;
    use crate::domain::shared::Timestamp;
    use rust_decimal_macros::dec;

    fn record(account: &str, at: &str) -> ViolationRecord {
        ViolationRecord::new(
            AccountId::new(account),
            None,
            Violation::new(
                ViolationKind::DailyLoss,
                Severity::Breach,
                "daily loss limit reached",
                dec!(1250),
                dec!(1250),
                Timestamp::parse(at).unwrap(),
            ),
        )
    }

    #[tokio::test]
    async fn list_filters_and_orders_by_time() {
        let log = InMemoryViolationLog::new();
        log.append(&record("a", "2026-01-14T16:00:00Z")).await.unwrap();
        log.append(&record("b", "2026-01-14T15:00:00Z")).await.unwrap();
        log.append(&record("a", "2026-01-14T15:00:00Z")).await.unwrap();

        let listed = log.list(&AccountId::new("a")).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].violation.occurred_at < listed[1].violation.occurred_at);
        assert_eq!(log.len(), 3);
    }

    #[tokio::test]
    async fn lockout_store_replaces_state() {
        let store = InMemoryLockoutStore::new();
        let id = AccountId::new("a");
        assert!(store.load(&id).await.unwrap().is_none());

        let locked = LockoutState {
            status: LockoutStatus::LockedOut,
            locked_until: None,
            violation_count: 1,
            reason: None,
        };
        store.save(&id, &locked).await.unwrap();
        store.save(&id, &LockoutState::default()).await.unwrap();

        assert_eq!(store.load(&id).await.unwrap(), Some(LockoutState::default()));
        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }
}

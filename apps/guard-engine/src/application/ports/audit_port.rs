//! Audit Persistence Ports (Driven Ports)
//!
//! Violations are appended and never mutated. The lockout state is the only
//! mutable persisted record, keyed by account.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::compliance::Violation;
use crate::domain::lockout::LockoutState;
use crate::domain::shared::{AccountId, ChartId, RecordId};

/// Persistence error.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Filesystem error.
    #[error("persistence I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be encoded or decoded.
    #[error("persistence serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored data is unreadable.
    #[error("corrupt record at {location}: {message}")]
    Corrupt {
        /// File and line, or key.
        location: String,
        /// Error details.
        message: String,
    },
}

/// One archived violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationRecord {
    /// Unique record id.
    pub id: RecordId,
    /// Account the violation was raised against.
    pub account_id: AccountId,
    /// Chart whose cycle raised it.
    pub chart_id: Option<ChartId>,
    /// The violation itself.
    pub violation: Violation,
}

impl ViolationRecord {
    /// Create a record with a fresh id.
    #[must_use]
    pub fn new(account_id: AccountId, chart_id: Option<ChartId>, violation: Violation) -> Self {
        Self {
            id: RecordId::generate(),
            account_id,
            chart_id,
            violation,
        }
    }
}

/// Append-only violation log keyed by `(account_id, occurred_at)`.
#[async_trait]
pub trait ViolationLogPort: Send + Sync {
    /// Append a record.
    async fn append(&self, record: &ViolationRecord) -> Result<(), PersistenceError>;

    /// Records for an account, ordered by `occurred_at`.
    async fn list(&self, account_id: &AccountId) -> Result<Vec<ViolationRecord>, PersistenceError>;
}

/// Store of the latest lockout state per account.
#[async_trait]
pub trait LockoutStorePort: Send + Sync {
    /// Replace the stored state for an account.
    async fn save(&self, account_id: &AccountId, state: &LockoutState)
    -> Result<(), PersistenceError>;

    /// Stored state for an account.
    async fn load(&self, account_id: &AccountId) -> Result<Option<LockoutState>, PersistenceError>;

    /// Every stored state.
    async fn load_all(&self) -> Result<Vec<(AccountId, LockoutState)>, PersistenceError>;
}

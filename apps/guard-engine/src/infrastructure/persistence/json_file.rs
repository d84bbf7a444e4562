//! File-backed audit persistence.
//!
//! - `JsonlViolationLog`: one JSON object per line, opened in append mode.
//! - `JsonLockoutStore`: one JSON document mapping account id to lockout
//!   state, rewritten through a temporary file and a rename.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::application::ports::{
    LockoutStorePort, PersistenceError, ViolationLogPort, ViolationRecord,
};
use crate::domain::lockout::LockoutState;
use crate::domain::shared::AccountId;

/// Append-only JSON-lines violation log.
#[derive(Debug)]
pub struct JsonlViolationLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlViolationLog {
    /// Log at `path`. The file and its parent directory are created on first append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Log file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ViolationLogPort for JsonlViolationLog {
    async fn append(&self, record: &ViolationRecord) -> Result<(), PersistenceError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        ensure_parent(&self.path).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn list(&self, account_id: &AccountId) -> Result<Vec<ViolationRecord>, PersistenceError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: ViolationRecord =
                serde_json::from_str(line).map_err(|e| PersistenceError::Corrupt {
                    location: format!("{}:{}", self.path.display(), index + 1),
                    message: e.to_string(),
                })?;
            if &record.account_id == account_id {
                records.push(record);
            }
        }
        records.sort_by_key(|r| r.violation.occurred_at);
        Ok(records)
    }
}

/// Lockout states persisted as one JSON document.
#[derive(Debug)]
pub struct JsonLockoutStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLockoutStore {
    /// Store at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<BTreeMap<AccountId, LockoutState>, PersistenceError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| PersistenceError::Corrupt {
                location: self.path.display().to_string(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl LockoutStorePort for JsonLockoutStore {
    async fn save(
        &self,
        account_id: &AccountId,
        state: &LockoutState,
    ) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        let mut states = self.read_all().await?;
        states.insert(account_id.clone(), state.clone());

        ensure_parent(&self.path).await?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&states)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn load(&self, account_id: &AccountId) -> Result<Option<LockoutState>, PersistenceError> {
        Ok(self.read_all().await?.remove(account_id))
    }

    async fn load_all(&self) -> Result<Vec<(AccountId, LockoutState)>, PersistenceError> {
        Ok(self.read_all().await?.into_iter().collect())
    }
}

async fn ensure_parent(path: &Path) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::compliance::{Severity, Violation, ViolationKind};
    use crate::domain::lockout::{LockReason, LockoutStatus};
    use crate::domain::shared::{ChartId, Timestamp};
    use rust_decimal_macros::dec;

    fn record(account: &str, at: &str) -> ViolationRecord {
        ViolationRecord::new(
            AccountId::new(account),
            Some(ChartId::new(1)),
            Violation::new(
                ViolationKind::TrailingDrawdown,
                Severity::Breach,
                "trailing drawdown reached",
                dec!(2500),
                dec!(2500),
                Timestamp::parse(at).unwrap(),
            ),
        )
    }

    #[tokio::test]
    async fn jsonl_appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlViolationLog::new(dir.path().join("audit/violations.jsonl"));

        log.append(&record("a", "2026-01-14T15:00:00Z")).await.unwrap();
        log.append(&record("b", "2026-01-14T15:01:00Z")).await.unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents.lines().count(), 2);

        let listed = log.list(&AccountId::new("a")).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].violation.kind, ViolationKind::TrailingDrawdown);
    }

    #[tokio::test]
    async fn jsonl_missing_file_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlViolationLog::new(dir.path().join("none.jsonl"));
        assert!(log.list(&AccountId::new("a")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn jsonl_corrupt_line_reports_location() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("violations.jsonl");
        std::fs::write(&path, "not json\n").unwrap();

        let Err(err) = JsonlViolationLog::new(&path).list(&AccountId::new("a")).await else {
            panic!("expected corrupt record");
        };
        assert!(matches!(err, PersistenceError::Corrupt { ref location, .. } if location.ends_with(":1")));
    }

    #[tokio::test]
    async fn lockout_store_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lockouts.json");
        let store = JsonLockoutStore::new(&path);

        let locked = LockoutState {
            status: LockoutStatus::LockedOut,
            locked_until: Some(Timestamp::parse("2026-01-14T23:00:00Z").unwrap()),
            violation_count: 1,
            reason: Some(LockReason::Breach),
        };
        store.save(&AccountId::new("a"), &locked).await.unwrap();
        store.save(&AccountId::new("b"), &LockoutState::default()).await.unwrap();

        let reopened = JsonLockoutStore::new(&path);
        assert_eq!(reopened.load(&AccountId::new("a")).await.unwrap(), Some(locked));
        assert_eq!(reopened.load_all().await.unwrap().len(), 2);
        assert!(reopened.load(&AccountId::new("c")).await.unwrap().is_none());
    }
}

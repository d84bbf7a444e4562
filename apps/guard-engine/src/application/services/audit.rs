//! Audit Recorder
//!
//! Persists violations and lockout changes from the engine's audit feed, off
//! the chart cycle's hot path.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

use crate::application::events::EngineEvent;
use crate::application::ports::{
    LockoutStorePort, PersistenceError, ViolationLogPort, ViolationRecord,
};
use crate::domain::lockout::LockoutState;
use crate::domain::shared::AccountId;

/// Writes audit records for engine events.
#[derive(Clone)]
pub struct AuditRecorder {
    violations: Arc<dyn ViolationLogPort>,
    lockouts: Arc<dyn LockoutStorePort>,
}

impl AuditRecorder {
    /// Create a recorder.
    #[must_use]
    pub fn new(violations: Arc<dyn ViolationLogPort>, lockouts: Arc<dyn LockoutStorePort>) -> Self {
        Self {
            violations,
            lockouts,
        }
    }

    /// Persisted lockout states, for restoring at engine construction.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn restore(&self) -> Result<Vec<(AccountId, LockoutState)>, PersistenceError> {
        self.lockouts.load_all().await
    }

    /// Persist one event. Returns true if anything was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn record(&self, event: &EngineEvent) -> Result<bool, PersistenceError> {
        match event {
            EngineEvent::Violation {
                account_id,
                chart_id,
                violation,
            } => {
                let record =
                    ViolationRecord::new(account_id.clone(), Some(*chart_id), violation.clone());
                self.violations.append(&record).await?;
                Ok(true)
            }
            EngineEvent::LockoutChanged {
                account_id,
                transition,
            } => {
                self.lockouts.save(account_id, &transition.state).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Record events from the audit feed until cancelled, then flush what is
    /// already queued.
    pub async fn run(self, mut events: UnboundedReceiver<EngineEvent>, shutdown: CancellationToken) {
        tracing::info!("Audit recorder started");
        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        tracing::info!("Audit feed closed");
                        break;
                    };
                    self.record_logged(&event).await;
                }
                () = shutdown.cancelled() => {
                    while let Ok(event) = events.try_recv() {
                        self.record_logged(&event).await;
                    }
                    tracing::info!("Audit recorder shutting down");
                    break;
                }
            }
        }
    }

    async fn record_logged(&self, event: &EngineEvent) {
        if let Err(error) = self.record(event).await {
            tracing::error!(event = event.kind(), %error, "Failed to persist audit record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::compliance::{Severity, Violation, ViolationKind};
    use crate::domain::lockout::{LockReason, LockoutStatus, LockoutTransition};
    use crate::domain::shared::{ChartId, Timestamp};
    use crate::infrastructure::{InMemoryLockoutStore, InMemoryViolationLog};
    use rust_decimal_macros::dec;

    fn at() -> Timestamp {
        Timestamp::parse("2026-01-14T15:00:00Z").unwrap()
    }

    fn locked() -> LockoutState {
        LockoutState {
            status: LockoutStatus::LockedOut,
            locked_until: Timestamp::parse("2026-01-14T23:00:00Z").ok(),
            violation_count: 1,
            reason: Some(LockReason::Breach),
        }
    }

    fn recorder() -> (AuditRecorder, Arc<InMemoryViolationLog>, Arc<InMemoryLockoutStore>) {
        let log = Arc::new(InMemoryViolationLog::new());
        let store = Arc::new(InMemoryLockoutStore::new());
        let recorder = AuditRecorder::new(
            Arc::clone(&log) as Arc<dyn ViolationLogPort>,
            Arc::clone(&store) as Arc<dyn LockoutStorePort>,
        );
        (recorder, log, store)
    }

    fn violation_event() -> EngineEvent {
        EngineEvent::Violation {
            account_id: AccountId::new("apex-1"),
            chart_id: ChartId::new(1),
            violation: Violation::new(
                ViolationKind::DailyLoss,
                Severity::Breach,
                "daily loss limit reached",
                dec!(1250),
                dec!(1250),
                at(),
            ),
        }
    }

    fn lockout_event() -> EngineEvent {
        EngineEvent::LockoutChanged {
            account_id: AccountId::new("apex-1"),
            transition: LockoutTransition {
                from: LockoutStatus::Active,
                to: LockoutStatus::LockedOut,
                reason: Some(LockReason::Breach),
                state: locked(),
                at: at(),
            },
        }
    }

    #[tokio::test]
    async fn violation_is_appended_with_chart() {
        let (recorder, log, _) = recorder();

        assert!(recorder.record(&violation_event()).await.unwrap());

        let records = log.list(&AccountId::new("apex-1")).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].chart_id, Some(ChartId::new(1)));
        assert_eq!(records[0].violation.kind, ViolationKind::DailyLoss);
    }

    #[tokio::test]
    async fn lockout_change_is_saved_and_restorable() {
        let (recorder, _, _) = recorder();

        assert!(recorder.record(&lockout_event()).await.unwrap());

        let restored = recorder.restore().await.unwrap();
        assert_eq!(restored, vec![(AccountId::new("apex-1"), locked())]);
    }

    #[tokio::test]
    async fn other_events_are_ignored() {
        let (recorder, log, store) = recorder();

        let written = recorder
            .record(&EngineEvent::EmergencyStop { at: at() })
            .await
            .unwrap();

        assert!(!written);
        assert!(log.is_empty());
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_flushes_queued_events_on_shutdown() {
        let (recorder, log, store) = recorder();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tx.send(violation_event()).unwrap();
        tx.send(lockout_event()).unwrap();

        let token = CancellationToken::new();
        token.cancel();
        recorder.run(rx, token).await;

        assert_eq!(log.len(), 1);
        assert!(store.load(&AccountId::new("apex-1")).await.unwrap().is_some());
    }
}

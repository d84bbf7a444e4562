//! State shared by every chart worker and the aggregator.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};

use super::emergency::EmergencyStop;
use super::registry::AccountRegistry;
use super::settings::SettingsCell;
use crate::application::events::EngineEvent;
use crate::application::ports::ExecutionFeedPort;

/// Shared engine state. Cheap to reach through an `Arc`.
pub struct EngineContext {
    /// Per-account state behind per-account locks.
    pub registry: AccountRegistry,
    /// Active and staged runtime settings.
    pub settings: SettingsCell,
    /// Process-wide emergency stop.
    pub emergency: EmergencyStop,
    /// Confirmed fills and P&L.
    pub feed: Arc<dyn ExecutionFeedPort>,
    events: broadcast::Sender<EngineEvent>,
    audit: Mutex<Option<mpsc::UnboundedSender<EngineEvent>>>,
}

impl EngineContext {
    /// Create the shared state.
    #[must_use]
    pub fn new(
        registry: AccountRegistry,
        settings: SettingsCell,
        feed: Arc<dyn ExecutionFeedPort>,
        event_capacity: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            registry,
            settings,
            emergency: EmergencyStop::new(),
            feed,
            events,
            audit: Mutex::new(None),
        }
    }

    /// Publish an event. Having no subscribers is not an error.
    ///
    /// Audit records also go to the audit feed, which is unbounded so a slow
    /// writer delays them instead of losing them.
    pub fn publish(&self, event: EngineEvent) {
        if event.is_audit_record() {
            let mut audit = self.audit.lock();
            if let Some(tx) = audit.as_ref()
                && tx.send(event.clone()).is_err()
            {
                tracing::warn!("Audit feed receiver dropped");
                *audit = None;
            }
        }
        let _ = self.events.send(event);
    }

    /// Take the audit feed. Replaces any earlier receiver.
    #[must_use]
    pub fn audit_feed(&self) -> mpsc::UnboundedReceiver<EngineEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.audit.lock() = Some(tx);
        rx
    }

    /// Subscribe to engine events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }
}

impl fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineContext")
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .field("emergency", &self.emergency)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::NoopExecutionFeed;
    use crate::application::services::settings::RuntimeSettings;
    use crate::domain::shared::Timestamp;

    fn context(capacity: usize) -> EngineContext {
        EngineContext::new(
            AccountRegistry::new(std::time::Duration::from_millis(10)),
            SettingsCell::new(RuntimeSettings::new(std::iter::empty())),
            Arc::new(NoopExecutionFeed),
            capacity,
        )
    }

    fn emergency(at: &str) -> EngineEvent {
        EngineEvent::EmergencyStop {
            at: Timestamp::parse(at).unwrap(),
        }
    }

    #[test]
    fn audit_feed_survives_a_lagging_broadcast() {
        use crate::domain::lockout::{LockReason, LockoutState, LockoutStatus, LockoutTransition};
        use crate::domain::shared::AccountId;

        let ctx = context(2);
        let mut broadcast_rx = ctx.subscribe();
        let mut audit_rx = ctx.audit_feed();
        let at = Timestamp::parse("2026-01-14T15:00:00Z").unwrap();

        for i in 0..10 {
            ctx.publish(emergency("2026-01-14T15:00:00Z"));
            ctx.publish(EngineEvent::LockoutChanged {
                account_id: AccountId::new(format!("acct-{i}")),
                transition: LockoutTransition {
                    from: LockoutStatus::Active,
                    to: LockoutStatus::LockedOut,
                    reason: Some(LockReason::Breach),
                    state: LockoutState::default(),
                    at,
                },
            });
        }

        assert!(matches!(
            broadcast_rx.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(_))
        ));
        let mut audited = 0;
        while let Ok(event) = audit_rx.try_recv() {
            assert!(event.is_audit_record());
            audited += 1;
        }
        assert_eq!(audited, 10);
    }

    #[test]
    fn dropped_audit_receiver_does_not_block_publishing() {
        let ctx = context(4);
        drop(ctx.audit_feed());
        let mut rx = ctx.subscribe();

        ctx.publish(emergency("2026-01-14T15:00:00Z"));

        assert!(rx.try_recv().is_ok());
    }
}

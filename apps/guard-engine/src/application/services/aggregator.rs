//! Aggregator and Emergency Stop
//!
//! Rebuilds the system status from per-account snapshots and owns the
//! emergency stop control. In worker mode the aggregator only reads account
//! state; `tick` additionally drives every chart cycle in sequence for
//! embedders and tests that want one deterministic pass.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rust_decimal::prelude::ToPrimitive;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::chart_monitor::ChartMonitor;
use super::context::EngineContext;
use crate::application::events::{EngineEvent, SystemWarning};
use crate::domain::shared::{Money, Timestamp};
use crate::domain::system::{AccountStatus, ChartStatus, SystemHealth, SystemStatus};
use crate::error::EngineError;
use crate::observability;

/// System status aggregator.
pub struct Aggregator {
    ctx: Arc<EngineContext>,
    charts: Vec<Arc<ChartMonitor>>,
    status_tx: watch::Sender<Arc<SystemStatus>>,
    interval: Duration,
    kill_file: Option<PathBuf>,
}

impl Aggregator {
    /// Create an aggregator over the given charts.
    #[must_use]
    pub fn new(ctx: Arc<EngineContext>, charts: Vec<Arc<ChartMonitor>>, interval: Duration) -> Self {
        let (status_tx, _) = watch::channel(Arc::new(SystemStatus::empty(Timestamp::now())));
        Self {
            ctx,
            charts,
            status_tx,
            interval,
            kill_file: None,
        }
    }

    /// Watch a kill file; its presence triggers the emergency stop.
    #[must_use]
    pub fn with_kill_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.kill_file = Some(path.into());
        self
    }

    /// Latest published status.
    #[must_use]
    pub fn status(&self) -> Arc<SystemStatus> {
        Arc::clone(&*self.status_tx.borrow())
    }

    /// Subscribe to status updates.
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<Arc<SystemStatus>> {
        self.status_tx.subscribe()
    }

    /// One full pass: promote staged settings, run every chart cycle, then
    /// rebuild the status.
    pub async fn tick(&self, now: Timestamp) -> Arc<SystemStatus> {
        self.prepare(now);
        for chart in &self.charts {
            chart.run_cycle(now).await;
        }
        self.refresh(now)
    }

    /// Work done at the start of every aggregator tick.
    fn prepare(&self, now: Timestamp) {
        if self.ctx.settings.promote() {
            tracing::info!("Staged settings promoted");
        }

        if let Some(path) = &self.kill_file
            && !self.ctx.emergency.is_active()
            && path.exists()
        {
            tracing::warn!(path = %path.display(), "Kill file present");
            self.emergency_stop(now);
        }
    }

    /// Rebuild and publish the status without touching chart or account state.
    pub fn refresh(&self, now: Timestamp) -> Arc<SystemStatus> {
        let previous = self.status();
        let status = Arc::new(self.compute_status(&previous, now));

        if status.health != previous.health {
            if status.health >= SystemHealth::Danger {
                tracing::warn!(
                    from = previous.health.as_str(),
                    to = status.health.as_str(),
                    margin_pct = %status.overall_margin_remaining_pct,
                    "System health changed"
                );
            } else {
                tracing::info!(
                    from = previous.health.as_str(),
                    to = status.health.as_str(),
                    margin_pct = %status.overall_margin_remaining_pct,
                    "System health changed"
                );
            }
        }

        observability::update_overall_margin(
            status.overall_margin_remaining_pct.to_f64().unwrap_or(0.0),
        );
        observability::update_active_charts(status.active_chart_count);

        self.status_tx.send_replace(Arc::clone(&status));
        status
    }

    /// Compute the aggregate from fresh account and chart snapshots.
    ///
    /// An account whose lock cannot be taken in time keeps its previous row.
    #[must_use]
    pub fn compute_status(&self, previous: &SystemStatus, now: Timestamp) -> SystemStatus {
        let settings = self.ctx.settings.current();
        let registry = &self.ctx.registry;

        let mut accounts = Vec::with_capacity(registry.len());
        for account_id in registry.ids() {
            let row = registry.with_account(account_id, |account| AccountStatus {
                snapshot: account.ledger.snapshot(),
                lockout: account.lockout.state().clone(),
                remaining_drawdown: settings
                    .rule_set(&account.rule_set)
                    .map_or(Money::ZERO, |rules| account.ledger.remaining_drawdown(rules)),
            });
            match row {
                Ok(row) => accounts.push(row),
                Err(error) => {
                    tracing::warn!(%account_id, %error, "Using previous status row");
                    if let EngineError::LockContention { waited_ms, .. } = error {
                        observability::record_lock_contention(account_id.as_str());
                        self.ctx
                            .publish(EngineEvent::SystemWarning(SystemWarning::LockContention {
                                account_id: account_id.clone(),
                                waited_ms,
                            }));
                    }
                    if let Some(row) = previous.account(account_id) {
                        accounts.push(row.clone());
                    }
                }
            }
        }

        let charts = self
            .charts
            .iter()
            .map(|chart| ChartStatus {
                chart_id: chart.chart_id(),
                account_id: chart.account_id().clone(),
                enabled: chart.is_enabled(),
                decision: chart.last_decision(),
            })
            .collect();

        SystemStatus::compute(
            accounts,
            charts,
            self.ctx.emergency.is_active(),
            &settings.health_bands,
            now,
        )
    }

    /// Engage the emergency stop: every chart STOP, every account LOCKED_OUT
    /// with `locked_until = now`. Idempotent. Returns true for the call that engaged it.
    pub fn emergency_stop(&self, now: Timestamp) -> bool {
        let newly = self.ctx.emergency.engage(now);
        if newly {
            tracing::warn!(at = %now, "EMERGENCY STOP engaged");
            observability::record_emergency_stop();
            self.ctx.publish(EngineEvent::EmergencyStop { at: now });
        }

        let registry = &self.ctx.registry;
        for account_id in registry.ids() {
            match registry.with_account(account_id, |account| account.lockout.lock_for_emergency(now)) {
                Ok(Some(transition)) => {
                    tracing::warn!(%account_id, "Account locked by emergency stop");
                    observability::record_lockout(account_id.as_str(), &transition.to.to_string());
                    self.ctx.publish(EngineEvent::LockoutChanged {
                        account_id: account_id.clone(),
                        transition,
                    });
                }
                Ok(None) => {}
                Err(error) => {
                    // The account's next cycle re-reads the flag and locks itself.
                    tracing::warn!(%account_id, %error, "Emergency lock deferred to next cycle");
                }
            }
        }

        for chart in &self.charts {
            chart.force_stop("emergency stop active", now);
        }

        self.refresh(now);
        newly
    }

    /// Clear the emergency stop. Accounts unlock at the start of their next cycle.
    /// Returns true if a stop was cleared.
    pub fn reset_emergency_stop(&self, now: Timestamp) -> bool {
        let cleared = self.ctx.emergency.clear();
        if cleared {
            tracing::info!(at = %now, "Emergency stop cleared");
            self.ctx.publish(EngineEvent::EmergencyCleared { at: now });
            self.refresh(now);
        }
        cleared
    }

    /// Whether the emergency stop is engaged.
    #[must_use]
    pub fn is_emergency_active(&self) -> bool {
        self.ctx.emergency.is_active()
    }

    /// Refresh the status on the configured interval until cancelled.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            charts = self.charts.len(),
            "Aggregator started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let started = Instant::now();
                    let now = Timestamp::now();
                    self.prepare(now);
                    self.refresh(now);

                    let elapsed = started.elapsed();
                    if elapsed > self.interval {
                        tracing::warn!(
                            elapsed_ms = elapsed.as_millis() as u64,
                            "Aggregator pass overran its interval"
                        );
                        self.ctx.publish(EngineEvent::SystemWarning(SystemWarning::StatusLag {
                            elapsed_ms: elapsed.as_millis() as u64,
                            interval_ms: self.interval.as_millis() as u64,
                        }));
                    }
                }
                () = shutdown.cancelled() => {
                    tracing::info!("Aggregator shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{NoopExecutionFeed, SignalSourcePort};
    use crate::application::services::chart_monitor::{ChartConfig, MonitorTiming};
    use crate::application::services::registry::{AccountRegistry, AccountState};
    use crate::application::services::settings::{RuntimeSettings, SettingsCell};
    use crate::domain::account::{AccountLedger, AccountPhase};
    use crate::domain::compliance::{AccountTier, PropFirm, RuleSet};
    use crate::domain::decision::{DecisionEngine, DecisionState, DecisionThresholds};
    use crate::domain::lockout::LockReason;
    use crate::domain::shared::{AccountId, ChartId};
    use crate::domain::signal::RawSignal;
    use crate::infrastructure::ScriptedSignalSource;
    use rust_decimal_macros::dec;

    fn now() -> Timestamp {
        Timestamp::parse("2026-01-14T15:00:00Z").unwrap()
    }

    fn rule_sets() -> Vec<RuleSet> {
        vec![
            RuleSet::preset(PropFirm::Apex, AccountTier::K50),
            RuleSet::preset(PropFirm::Topstep, AccountTier::K50),
        ]
    }

    fn aggregator() -> (Aggregator, Arc<EngineContext>) {
        let mut registry = AccountRegistry::new(Duration::from_millis(20));
        for (id, rules) in [("apex-1", "apex-50k"), ("topstep-1", "topstep-50k")] {
            let ledger = AccountLedger::new(
                AccountId::new(id),
                Money::dollars(50_000),
                AccountPhase::Evaluation,
            );
            registry.insert(AccountState::new(ledger, rules)).unwrap();
        }
        let ctx = Arc::new(EngineContext::new(
            registry,
            SettingsCell::new(RuntimeSettings::new(rule_sets())),
            Arc::new(NoopExecutionFeed),
            64,
        ));

        let source = Arc::new(ScriptedSignalSource::new());
        let charts = [(1, "apex-1"), (2, "topstep-1")]
            .into_iter()
            .map(|(chart, account)| {
                let chart = ChartId::new(chart);
                source.set(chart, RawSignal::new(100, "L4", "GREEN"));
                Arc::new(ChartMonitor::new(
                    ChartConfig::new(chart, AccountId::new(account), "MES"),
                    MonitorTiming::default(),
                    Arc::clone(&source) as Arc<dyn SignalSourcePort>,
                    Arc::clone(&ctx),
                ))
            })
            .collect();

        (
            Aggregator::new(Arc::clone(&ctx), charts, Duration::from_millis(10)),
            ctx,
        )
    }

    #[tokio::test]
    async fn tick_publishes_healthy_status() {
        let (aggregator, _ctx) = aggregator();
        let mut rx = aggregator.subscribe_status();

        let status = aggregator.tick(now()).await;

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), status);
        // 1250 + 1000 remaining out of 100k.
        assert_eq!(status.overall_margin_remaining_amount, Money::dollars(2_250));
        assert_eq!(status.overall_margin_remaining_pct, dec!(2.25));
        assert_eq!(status.active_chart_count, 2);
        assert_eq!(status.health, SystemHealth::Healthy);
        assert!(status.charts.iter().all(|c| c.decision.state == DecisionState::Go));
    }

    #[tokio::test]
    async fn emergency_stop_is_idempotent() {
        let (aggregator, ctx) = aggregator();
        let mut events = ctx.subscribe();
        aggregator.tick(now()).await;

        assert!(aggregator.emergency_stop(now()));
        assert!(!aggregator.emergency_stop(now()));

        let status = aggregator.status();
        assert_eq!(status.health, SystemHealth::Emergency);
        assert_eq!(status.active_chart_count, 0);
        assert!(status.charts.iter().all(|c| c.decision.is_stop()));
        for account in &status.accounts {
            assert_eq!(account.lockout.reason, Some(LockReason::EmergencyStop));
        }

        let mut stops = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, EngineEvent::EmergencyStop { .. }) {
                stops += 1;
            }
        }
        assert_eq!(stops, 1);
    }

    #[tokio::test]
    async fn charts_stay_stopped_until_reset() {
        let (aggregator, _ctx) = aggregator();
        aggregator.emergency_stop(now());

        let later = now().plus(chrono::Duration::minutes(5));
        let status = aggregator.tick(later).await;
        assert!(status.charts.iter().all(|c| c.decision.is_stop()));

        assert!(aggregator.reset_emergency_stop(later));
        assert!(!aggregator.reset_emergency_stop(later));

        let status = aggregator.tick(later).await;
        assert!(!status.emergency_stop_active);
        assert!(status.accounts.iter().all(AccountStatus::is_active));
        assert!(status.charts.iter().all(|c| c.decision.state == DecisionState::Go));
    }

    #[tokio::test]
    async fn kill_file_engages_stop_on_next_tick() {
        let dir = tempfile::tempdir().unwrap();
        let kill = dir.path().join("KILL");
        let (aggregator, _ctx) = aggregator();
        let aggregator = aggregator.with_kill_file(&kill);

        aggregator.tick(now()).await;
        assert!(!aggregator.is_emergency_active());

        std::fs::write(&kill, "").unwrap();
        let status = aggregator.tick(now()).await;
        assert!(aggregator.is_emergency_active());
        assert_eq!(status.health, SystemHealth::Emergency);

        // Removing the file does not clear the stop.
        std::fs::remove_file(&kill).unwrap();
        aggregator.tick(now()).await;
        assert!(aggregator.is_emergency_active());
    }

    #[tokio::test]
    async fn staged_settings_apply_from_next_tick() {
        let (aggregator, ctx) = aggregator();
        aggregator.tick(now()).await;

        let strict = DecisionThresholds {
            probability_ceiling: dec!(95),
            ..DecisionThresholds::default()
        };
        ctx.settings
            .stage(RuntimeSettings::new(rule_sets()).with_decisions(DecisionEngine::new(strict)));
        assert!(aggregator.status().charts.iter().all(|c| c.decision.state == DecisionState::Go));

        let status = aggregator.tick(now()).await;
        assert!(!ctx.settings.has_staged());
        assert!(status.charts.iter().all(|c| c.decision.state == DecisionState::Caution));
    }

    #[tokio::test]
    async fn contended_account_keeps_previous_row() {
        let (aggregator, ctx) = aggregator();
        let first = aggregator.tick(now()).await;

        let id = AccountId::new("apex-1");
        let _guard = ctx.registry.lock(&id).unwrap();
        let status = aggregator.compute_status(&first, now());

        assert_eq!(status.account(&id), first.account(&id));
        assert_eq!(status.accounts.len(), 2);
    }
}

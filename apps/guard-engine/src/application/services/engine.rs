//! Guard Engine facade.
//!
//! Wires accounts, chart workers and the aggregator together and exposes the
//! operations an embedder needs.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::aggregator::Aggregator;
use super::chart_monitor::{ChartConfig, ChartMonitor, MonitorTiming};
use super::context::EngineContext;
use super::registry::{AccountRegistry, AccountState};
use super::settings::{RuntimeSettings, SettingsCell};
use crate::application::events::EngineEvent;
use crate::application::ports::{
    ExecutionFeedPort, LedgerUpdate, NoopExecutionFeed, SignalSourcePort,
};
use crate::domain::account::{AccountLedger, AccountPhase, AccountSnapshot};
use crate::domain::decision::Decision;
use crate::domain::lockout::LockoutState;
use crate::domain::shared::{AccountId, ChartId, Money, Timestamp};
use crate::domain::system::SystemStatus;
use crate::error::EngineError;

/// Cadences, bounds and channel sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineTiming {
    /// Interval between chart cycles.
    pub chart_interval: Duration,
    /// Interval between aggregator passes.
    pub aggregator_interval: Duration,
    /// Bound on one sensor read.
    pub sensor_timeout: Duration,
    /// Consecutive failed polls that raise a system warning.
    pub failure_threshold: u32,
    /// Bounded wait for an account lock.
    pub lock_timeout: Duration,
    /// Engine event channel capacity.
    pub event_capacity: usize,
}

impl Default for EngineTiming {
    fn default() -> Self {
        Self {
            chart_interval: Duration::from_secs(1),
            aggregator_interval: Duration::from_secs(1),
            sensor_timeout: Duration::from_secs(3),
            failure_threshold: 3,
            lock_timeout: Duration::from_millis(250),
            event_capacity: 1024,
        }
    }
}

/// One account to register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSetup {
    /// Account id.
    pub account_id: AccountId,
    /// Starting balance (account size).
    pub starting_balance: Money,
    /// Evaluation / funded / live.
    pub phase: AccountPhase,
    /// Rule set name.
    pub rule_set: String,
}

/// Everything needed to build an engine.
#[derive(Debug, Clone)]
pub struct EngineSetup {
    /// Accounts.
    pub accounts: Vec<AccountSetup>,
    /// Charts.
    pub charts: Vec<ChartConfig>,
    /// Initial runtime settings.
    pub settings: RuntimeSettings,
    /// Timing.
    pub timing: EngineTiming,
}

/// Builder for [`GuardEngine`].
pub struct GuardEngineBuilder {
    setup: EngineSetup,
    source: Arc<dyn SignalSourcePort>,
    feed: Arc<dyn ExecutionFeedPort>,
    kill_file: Option<PathBuf>,
    lockouts: Vec<(AccountId, LockoutState)>,
}

impl GuardEngineBuilder {
    /// Use a fill/P&L feed.
    #[must_use]
    pub fn with_execution_feed(mut self, feed: Arc<dyn ExecutionFeedPort>) -> Self {
        self.feed = feed;
        self
    }

    /// Watch a kill file.
    #[must_use]
    pub fn with_kill_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.kill_file = Some(path.into());
        self
    }

    /// Resume persisted lockout states.
    #[must_use]
    pub fn with_restored_lockouts(mut self, lockouts: Vec<(AccountId, LockoutState)>) -> Self {
        self.lockouts = lockouts;
        self
    }

    /// Validate the setup and build the engine.
    ///
    /// # Errors
    ///
    /// Returns an error for duplicate ids, unknown accounts or unknown rule sets.
    pub fn build(self) -> Result<GuardEngine, EngineError> {
        let Self {
            setup,
            source,
            feed,
            kill_file,
            lockouts,
        } = self;
        let timing = setup.timing;

        let mut registry = AccountRegistry::new(timing.lock_timeout);
        for account in &setup.accounts {
            if setup.settings.rule_set(&account.rule_set).is_none() {
                return Err(EngineError::UnknownRuleSet {
                    account_id: account.account_id.clone(),
                    rule_set: account.rule_set.clone(),
                });
            }
            let ledger = AccountLedger::new(
                account.account_id.clone(),
                account.starting_balance,
                account.phase,
            );
            registry.insert(AccountState::new(ledger, account.rule_set.clone()))?;
        }

        for (account_id, state) in lockouts {
            if !registry.contains(&account_id) {
                tracing::warn!(%account_id, "Ignoring persisted lockout for unknown account");
                continue;
            }
            if state.is_locked() {
                tracing::info!(
                    %account_id,
                    locked_until = ?state.locked_until,
                    "Restored lockout"
                );
            }
            registry.restore_lockout(&account_id, state)?;
        }

        let ctx = Arc::new(EngineContext::new(
            registry,
            SettingsCell::new(setup.settings),
            feed,
            timing.event_capacity,
        ));

        let monitor_timing = MonitorTiming {
            poll_interval: timing.chart_interval,
            sensor_timeout: timing.sensor_timeout,
            failure_threshold: timing.failure_threshold,
        };

        let mut charts = BTreeMap::new();
        for config in setup.charts {
            if !ctx.registry.contains(&config.account_id) {
                return Err(EngineError::UnknownAccount(config.account_id));
            }
            let chart_id = config.chart_id;
            if charts.contains_key(&chart_id) {
                return Err(EngineError::DuplicateChart(chart_id));
            }
            let monitor = ChartMonitor::new(
                config,
                monitor_timing,
                Arc::clone(&source),
                Arc::clone(&ctx),
            );
            charts.insert(chart_id, Arc::new(monitor));
        }

        let mut aggregator = Aggregator::new(
            Arc::clone(&ctx),
            charts.values().cloned().collect(),
            timing.aggregator_interval,
        );
        if let Some(path) = kill_file {
            aggregator = aggregator.with_kill_file(path);
        }

        tracing::info!(
            accounts = ctx.registry.len(),
            charts = charts.len(),
            "Guard engine built"
        );

        Ok(GuardEngine {
            ctx,
            charts,
            aggregator: Arc::new(aggregator),
        })
    }
}

/// The guard engine.
pub struct GuardEngine {
    ctx: Arc<EngineContext>,
    charts: BTreeMap<ChartId, Arc<ChartMonitor>>,
    aggregator: Arc<Aggregator>,
}

impl GuardEngine {
    /// Start building an engine.
    #[must_use]
    pub fn builder(setup: EngineSetup, source: Arc<dyn SignalSourcePort>) -> GuardEngineBuilder {
        GuardEngineBuilder {
            setup,
            source,
            feed: Arc::new(NoopExecutionFeed),
            kill_file: None,
            lockouts: Vec::new(),
        }
    }

    /// Build an engine with no fill feed and no kill file.
    ///
    /// # Errors
    ///
    /// See [`GuardEngineBuilder::build`].
    pub fn new(setup: EngineSetup, source: Arc<dyn SignalSourcePort>) -> Result<Self, EngineError> {
        Self::builder(setup, source).build()
    }

    /// One deterministic pass over every chart, then a status rebuild.
    pub async fn tick(&self, now: Timestamp) -> Arc<SystemStatus> {
        self.aggregator.tick(now).await
    }

    /// Spawn one worker per chart plus the aggregator.
    #[must_use]
    pub fn start(&self, shutdown: &CancellationToken) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(self.charts.len() + 1);
        for chart in self.charts.values() {
            handles.push(tokio::spawn(Arc::clone(chart).run(shutdown.clone())));
        }
        handles.push(tokio::spawn(Arc::clone(&self.aggregator).run(shutdown.clone())));
        handles
    }

    /// Stage new settings, promoted at the start of the next aggregator tick.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRuleSet` if any account's rule set is missing from the new settings.
    pub fn stage_settings(&self, settings: RuntimeSettings) -> Result<(), EngineError> {
        let registry = &self.ctx.registry;
        let mut checked = HashSet::new();
        for account_id in registry.ids() {
            let rule_set = registry.with_account(account_id, |a| a.rule_set.clone())?;
            if checked.insert(rule_set.clone()) && settings.rule_set(&rule_set).is_none() {
                return Err(EngineError::UnknownRuleSet {
                    account_id: account_id.clone(),
                    rule_set,
                });
            }
        }
        tracing::info!(rule_sets = settings.rule_sets.len(), "Settings staged");
        self.ctx.settings.stage(settings);
        Ok(())
    }

    /// Enable or disable a chart. Takes effect on its next cycle.
    ///
    /// # Errors
    ///
    /// Returns `UnknownChart` for an unregistered chart.
    pub fn set_chart_enabled(&self, chart_id: ChartId, enabled: bool) -> Result<(), EngineError> {
        self.chart(chart_id)?.set_enabled(enabled);
        Ok(())
    }

    /// Engage the emergency stop. Idempotent.
    pub fn emergency_stop(&self, now: Timestamp) -> bool {
        self.aggregator.emergency_stop(now)
    }

    /// Clear the emergency stop.
    pub fn reset_emergency_stop(&self, now: Timestamp) -> bool {
        self.aggregator.reset_emergency_stop(now)
    }

    /// Whether the emergency stop is engaged.
    #[must_use]
    pub fn is_emergency_active(&self) -> bool {
        self.aggregator.is_emergency_active()
    }

    /// Subscribe to engine events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.ctx.subscribe()
    }

    /// Lossless feed of violations and lockout changes for the audit recorder.
    #[must_use]
    pub fn audit_feed(&self) -> mpsc::UnboundedReceiver<EngineEvent> {
        self.ctx.audit_feed()
    }

    /// Subscribe to status updates.
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<Arc<SystemStatus>> {
        self.aggregator.subscribe_status()
    }

    /// Latest status.
    #[must_use]
    pub fn status(&self) -> Arc<SystemStatus> {
        self.aggregator.status()
    }

    /// Registered chart ids.
    pub fn chart_ids(&self) -> impl Iterator<Item = ChartId> + '_ {
        self.charts.keys().copied()
    }

    /// Latest decision for a chart.
    ///
    /// # Errors
    ///
    /// Returns `UnknownChart` for an unregistered chart.
    pub fn last_decision(&self, chart_id: ChartId) -> Result<Decision, EngineError> {
        Ok(self.chart(chart_id)?.last_decision())
    }

    /// Current ledger snapshot for an account.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAccount` or `LockContention`.
    pub fn account_snapshot(&self, account_id: &AccountId) -> Result<AccountSnapshot, EngineError> {
        self.ctx.registry.snapshot(account_id)
    }

    /// Current lockout state for an account.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAccount` or `LockContention`.
    pub fn lockout_state(&self, account_id: &AccountId) -> Result<LockoutState, EngineError> {
        self.ctx.registry.lockout(account_id)
    }

    /// Apply a confirmed fill or P&L change directly, under the account lock.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAccount`, `LockContention` or a ledger error.
    pub fn apply_update(
        &self,
        account_id: &AccountId,
        update: LedgerUpdate,
    ) -> Result<AccountSnapshot, EngineError> {
        self.ctx.registry.apply_update(account_id, update)
    }

    fn chart(&self, chart_id: ChartId) -> Result<&Arc<ChartMonitor>, EngineError> {
        self.charts
            .get(&chart_id)
            .ok_or(EngineError::UnknownChart(chart_id))
    }
}

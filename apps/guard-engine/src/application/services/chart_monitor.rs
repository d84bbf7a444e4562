//! Chart Monitor Service
//!
//! One worker per chart. Each cycle polls the sensor (the only suspension
//! point), then evaluates compliance, lockout and the decision inside the
//! owning account's critical section, and publishes the result.
//!
//! Disabling a chart or engaging the emergency stop takes effect at the start
//! of the next cycle. A cycle already in flight always runs to completion.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::context::EngineContext;
use super::registry::AccountState;
use super::settings::RuntimeSettings;
use crate::application::events::{EngineEvent, SystemWarning};
use crate::application::ports::{SignalSourceError, SignalSourcePort};
use crate::domain::compliance::{Severity, TradeCandidate, Violation, ViolationKind};
use crate::domain::decision::{Decision, DecisionContext};
use crate::domain::lockout::{LockoutStatus, LockoutTransition};
use crate::domain::shared::{AccountId, ChartId, Money, Timestamp};
use crate::domain::signal::Signal;
use crate::error::EngineError;
use crate::observability;

/// Static configuration of one chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartConfig {
    /// Chart (sensor region) number.
    pub chart_id: ChartId,
    /// Account traded from this chart.
    pub account_id: AccountId,
    /// Instrument symbol traded on this chart.
    pub instrument: String,
    /// Standard order size checked against position limits each cycle.
    pub order_contracts: u32,
    /// Whether the chart starts enabled.
    pub enabled: bool,
}

impl ChartConfig {
    /// Enabled chart trading one contract of `instrument`.
    #[must_use]
    pub fn new(chart_id: ChartId, account_id: AccountId, instrument: impl Into<String>) -> Self {
        Self {
            chart_id,
            account_id,
            instrument: instrument.into(),
            order_contracts: 1,
            enabled: true,
        }
    }

    /// Set the standard order size.
    #[must_use]
    pub const fn with_order_contracts(mut self, contracts: u32) -> Self {
        self.order_contracts = contracts;
        self
    }
}

/// Worker cadence and sensor failure policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorTiming {
    /// Time between cycles.
    pub poll_interval: Duration,
    /// Bound on one sensor read.
    pub sensor_timeout: Duration,
    /// Consecutive failed polls that raise a system warning.
    pub failure_threshold: u32,
}

impl Default for MonitorTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            sensor_timeout: Duration::from_secs(3),
            failure_threshold: 3,
        }
    }
}

/// What a cycle learned inside the account critical section.
struct CycleOutcome {
    context: DecisionContext,
    violations: Vec<Violation>,
    transitions: Vec<LockoutTransition>,
}

/// Per-chart polling worker.
pub struct ChartMonitor {
    config: ChartConfig,
    timing: MonitorTiming,
    source: Arc<dyn SignalSourcePort>,
    ctx: Arc<EngineContext>,
    enabled: AtomicBool,
    consecutive_failures: AtomicU32,
    last_signal: Mutex<Option<Signal>>,
    /// Probability of the latest valid signal and the non-forced decision it
    /// produced. Cleared by forced STOPs.
    held: Mutex<Option<(Decimal, Decision)>>,
    last_decision: RwLock<Decision>,
    /// Violations present on the previous cycle, for change detection.
    raised: Mutex<Vec<(ViolationKind, Severity)>>,
}

impl ChartMonitor {
    /// Create a monitor. The initial decision is CAUTION until a valid signal arrives.
    #[must_use]
    pub fn new(
        config: ChartConfig,
        timing: MonitorTiming,
        source: Arc<dyn SignalSourcePort>,
        ctx: Arc<EngineContext>,
    ) -> Self {
        let now = Timestamp::now();
        let initial = if config.enabled {
            Decision::caution(config.chart_id, "awaiting signal", now)
        } else {
            Decision::stop(config.chart_id, "disabled", now)
        };
        Self {
            enabled: AtomicBool::new(config.enabled),
            held: Mutex::new(None),
            last_decision: RwLock::new(initial),
            config,
            timing,
            source,
            ctx,
            consecutive_failures: AtomicU32::new(0),
            last_signal: Mutex::new(None),
            raised: Mutex::new(Vec::new()),
        }
    }

    /// Chart id.
    #[must_use]
    pub const fn chart_id(&self) -> ChartId {
        self.config.chart_id
    }

    /// Owning account.
    #[must_use]
    pub const fn account_id(&self) -> &AccountId {
        &self.config.account_id
    }

    /// Static configuration.
    #[must_use]
    pub const fn config(&self) -> &ChartConfig {
        &self.config
    }

    /// Whether polling is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Consecutive failed polls.
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    /// Latest valid signal.
    #[must_use]
    pub fn last_signal(&self) -> Option<Signal> {
        self.last_signal.lock().clone()
    }

    /// Latest published decision.
    #[must_use]
    pub fn last_decision(&self) -> Decision {
        self.last_decision.read().clone()
    }

    /// Enable or disable the chart. Returns the previous setting.
    ///
    /// Takes effect on the next cycle, which then decides STOP "disabled".
    /// A disabled chart still keeps its account's day, feed and lockout current.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        let previous = self.enabled.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            tracing::info!(
                chart_id = %self.config.chart_id,
                account_id = %self.config.account_id,
                enabled,
                "Chart {}",
                if enabled { "enabled" } else { "disabled" }
            );
        }
        previous
    }

    /// Read and normalize one signal. Failures yield an invalid signal, never an error.
    pub async fn poll(&self, now: Timestamp) -> Signal {
        let chart_id = self.config.chart_id;
        let timeout = self.timing.sensor_timeout;

        let read = tokio::time::timeout(timeout, self.source.read(chart_id)).await;
        let result = match read {
            Ok(Ok(raw)) => {
                Signal::try_normalize(chart_id, &raw, now).map_err(|e| ("invalid", e.to_string()))
            }
            Ok(Err(error)) => Err((error.label(), error.to_string())),
            Err(_) => {
                let error = SignalSourceError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                };
                Err((error.label(), error.to_string()))
            }
        };

        match result {
            Ok(signal) => {
                let previous = self.consecutive_failures.swap(0, Ordering::SeqCst);
                if previous >= self.timing.failure_threshold {
                    tracing::info!(
                        chart_id = %chart_id,
                        failed_polls = previous,
                        "Sensor recovered"
                    );
                }
                *self.last_signal.lock() = Some(signal.clone());
                signal
            }
            Err((label, message)) => {
                self.record_failure(label, message);
                Signal::invalid(chart_id, now)
            }
        }
    }

    fn record_failure(&self, label: &str, message: String) {
        let chart_id = self.config.chart_id;
        let consecutive = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        observability::record_sensor_failure(chart_id.value(), label);
        tracing::warn!(
            chart_id = %chart_id,
            consecutive,
            error = %message,
            "Sensor poll failed"
        );

        if consecutive == self.timing.failure_threshold {
            tracing::warn!(
                chart_id = %chart_id,
                consecutive,
                "Sensor failing repeatedly"
            );
            self.ctx
                .publish(EngineEvent::SystemWarning(SystemWarning::SensorFailures {
                    chart_id,
                    consecutive,
                    last_error: message,
                }));
        }
    }

    /// Run one poll -> evaluate -> decide cycle and publish the decision.
    pub async fn run_cycle(&self, now: Timestamp) -> Decision {
        let chart_id = self.config.chart_id;
        let settings = self.ctx.settings.current();
        let enabled = self.is_enabled();

        let signal = if !enabled || self.ctx.emergency.is_active() {
            Signal::invalid(chart_id, now)
        } else {
            self.poll(now).await
        };
        let probability = if signal.is_valid() {
            settings.probability.success_probability(&signal)
        } else {
            Decimal::ZERO
        };

        let evaluated = self
            .ctx
            .registry
            .with_account(&self.config.account_id, |account| {
                self.evaluate_account(account, &settings, enabled, now)
            });

        let decision = match evaluated {
            Ok(outcome) => {
                self.publish_violations(&outcome.violations);
                self.publish_transitions(outcome.transitions);

                let engine = &settings.decisions;
                let mut held = self.held.lock();
                if signal.is_valid() {
                    let decision = engine.evaluate(&outcome.context, probability, now);
                    *held = (!decision.is_stop()).then(|| (probability, decision.clone()));
                    decision
                } else {
                    let decision = engine.hold(
                        &outcome.context,
                        held.as_ref().map(|(p, d)| (*p, d)),
                        now,
                    );
                    if decision.is_stop() {
                        *held = None;
                    }
                    decision
                }
            }
            Err(error) => {
                self.report_unavailable_account(&error);
                if enabled {
                    self.last_decision()
                } else {
                    Decision::stop(chart_id, "disabled", now)
                }
            }
        };

        self.store(decision)
    }

    /// Everything that must happen under the account lock.
    fn evaluate_account(
        &self,
        account: &mut AccountState,
        settings: &RuntimeSettings,
        enabled: bool,
        now: Timestamp,
    ) -> CycleOutcome {
        let chart_id = self.config.chart_id;
        let calendar = settings.compliance.calendar();

        if account.ledger.roll_to(calendar.trading_day(now)) {
            tracing::info!(
                account_id = %self.config.account_id,
                trading_day = ?account.ledger.trading_day(),
                "Trading day rolled, daily P&L reset"
            );
        }

        for update in self.ctx.feed.drain(&self.config.account_id) {
            if let Err(error) = account
                .ledger
                .apply_fill(update.pnl_delta, update.contracts_delta)
            {
                tracing::warn!(
                    account_id = %self.config.account_id,
                    %error,
                    "Rejected contract update, applying P&L only"
                );
                account.ledger.apply_tick(update.pnl_delta);
            }
        }

        // Re-read inside the critical section; the stop may have landed during the poll.
        let emergency = self.ctx.emergency.is_active();
        let mut transitions = Vec::new();
        transitions.extend(account.lockout.refresh(now, emergency));
        if emergency {
            transitions.extend(account.lockout.lock_for_emergency(now));
        }

        let mut context = DecisionContext::new(chart_id, Money::ZERO);
        context.emergency_active = emergency;
        context.chart_enabled = enabled;

        // A disabled chart places no trade, so its candidate is not checked.
        let rules = settings.rule_set(&account.rule_set).filter(|_| enabled);
        let Some(rules) = rules else {
            let state = account.lockout.state();
            context.lockout = state.status;
            context.lock_reason = state.reason;
            context.locked_until = state.locked_until;
            if enabled {
                context.stop_violation =
                    Some(format!("rule set '{}' is not configured", account.rule_set));
            }
            return CycleOutcome {
                context,
                violations: Vec::new(),
                transitions,
            };
        };

        let snapshot = account.ledger.snapshot();
        let candidate = TradeCandidate::new(self.config.instrument.clone(), self.config.order_contracts);
        let report = settings.compliance.evaluate(rules, &snapshot, &candidate, now);
        transitions.extend(account.lockout.apply_violations(report.violations(), calendar, now));

        let state = account.lockout.state();
        context.lockout = state.status;
        context.lock_reason = state.reason;
        context.locked_until = state.locked_until;
        context.stop_violation = report.first_at(Severity::Stop).map(|v| v.message.clone());
        context.remaining_drawdown = account.ledger.remaining_drawdown(rules);
        context.max_contracts_per_trade = rules.max_contracts_per_trade;
        context.available_contracts = rules
            .max_total_contracts
            .saturating_sub(snapshot.open_contracts);

        CycleOutcome {
            context,
            violations: report.into_violations(),
            transitions,
        }
    }

    /// Publish violations that were not present on the previous cycle.
    fn publish_violations(&self, violations: &[Violation]) {
        let mut raised = self.raised.lock();
        for violation in violations {
            let key = (violation.kind, violation.severity);
            if raised.contains(&key) {
                continue;
            }
            match violation.severity {
                Severity::Breach => tracing::error!(
                    chart_id = %self.config.chart_id,
                    account_id = %self.config.account_id,
                    kind = violation.kind.as_str(),
                    severity = violation.severity.as_str(),
                    current = %violation.current_value,
                    limit = %violation.limit_value,
                    "{}",
                    violation.message
                ),
                Severity::Stop => tracing::warn!(
                    chart_id = %self.config.chart_id,
                    account_id = %self.config.account_id,
                    kind = violation.kind.as_str(),
                    severity = violation.severity.as_str(),
                    "{}",
                    violation.message
                ),
                Severity::Warning => tracing::info!(
                    chart_id = %self.config.chart_id,
                    account_id = %self.config.account_id,
                    kind = violation.kind.as_str(),
                    severity = violation.severity.as_str(),
                    "{}",
                    violation.message
                ),
            }
            observability::record_violation(violation.kind.as_str(), violation.severity.as_str());
            self.ctx.publish(EngineEvent::Violation {
                account_id: self.config.account_id.clone(),
                chart_id: self.config.chart_id,
                violation: violation.clone(),
            });
        }
        *raised = violations.iter().map(|v| (v.kind, v.severity)).collect();
    }

    fn publish_transitions(&self, transitions: Vec<LockoutTransition>) {
        for transition in transitions {
            let account_id = &self.config.account_id;
            if transition.to == LockoutStatus::LockedOut {
                tracing::warn!(
                    account_id = %account_id,
                    reason = ?transition.reason,
                    locked_until = ?transition.state.locked_until,
                    violation_count = transition.state.violation_count,
                    "Account locked out"
                );
            } else {
                tracing::info!(account_id = %account_id, "Account lockout cleared");
            }
            observability::record_lockout(account_id.as_str(), &transition.to.to_string());
            self.ctx.publish(EngineEvent::LockoutChanged {
                account_id: account_id.clone(),
                transition,
            });
        }
    }

    fn report_unavailable_account(&self, error: &EngineError) {
        tracing::warn!(
            chart_id = %self.config.chart_id,
            account_id = %self.config.account_id,
            %error,
            "Account unavailable, holding previous decision"
        );
        if let EngineError::LockContention {
            account_id,
            waited_ms,
        } = error
        {
            observability::record_lock_contention(account_id.as_str());
            self.ctx
                .publish(EngineEvent::SystemWarning(SystemWarning::LockContention {
                    account_id: account_id.clone(),
                    waited_ms: *waited_ms,
                }));
        }
    }

    /// Force STOP now, outside the normal cycle.
    pub fn force_stop(&self, reason: &str, now: Timestamp) -> Decision {
        self.store(Decision::stop(self.config.chart_id, reason, now))
    }

    /// Publish a decision as the chart's latest. The emergency flag is checked
    /// once more so a cycle that began before a stop cannot publish past it.
    fn store(&self, decision: Decision) -> Decision {
        let decision = if self.ctx.emergency.is_active() && !decision.is_stop() {
            Decision::stop(
                self.config.chart_id,
                "emergency stop active",
                decision.decided_at,
            )
        } else {
            decision
        };

        let previous = {
            let mut last = self.last_decision.write();
            std::mem::replace(&mut *last, decision.clone())
        };

        if previous.state == decision.state {
            tracing::debug!(
                chart_id = %decision.chart_id,
                state = decision.state.as_str(),
                contracts = decision.recommended_contracts,
                reason = %decision.reason,
                "Decision"
            );
        } else {
            tracing::info!(
                chart_id = %decision.chart_id,
                account_id = %self.config.account_id,
                from = previous.state.as_str(),
                to = decision.state.as_str(),
                contracts = decision.recommended_contracts,
                reason = %decision.reason,
                "Decision changed"
            );
        }

        observability::record_decision(decision.chart_id.value(), decision.state.as_str());
        self.ctx.publish(EngineEvent::Decision {
            account_id: self.config.account_id.clone(),
            decision: decision.clone(),
        });
        decision
    }

    /// Run cycles on the configured interval until cancelled.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.timing.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            chart_id = %self.config.chart_id,
            account_id = %self.config.account_id,
            interval_ms = self.timing.poll_interval.as_millis() as u64,
            "Chart worker started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.run_cycle(Timestamp::now()).await;
                }
                () = shutdown.cancelled() => {
                    tracing::info!(chart_id = %self.config.chart_id, "Chart worker shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{LedgerUpdate, NoopExecutionFeed};
    use crate::application::services::registry::AccountRegistry;
    use crate::application::services::settings::SettingsCell;
    use crate::domain::account::{AccountLedger, AccountPhase};
    use crate::domain::compliance::{AccountTier, PropFirm, RuleSet};
    use crate::domain::decision::DecisionState;
    use crate::domain::lockout::LockReason;
    use crate::domain::signal::RawSignal;
    use crate::infrastructure::{ScriptedRead, ScriptedSignalSource};

    const CHART: ChartId = ChartId::new(1);

    fn account() -> AccountId {
        AccountId::new("apex-1")
    }

    fn at(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    // Wednesday 10:00 New York, inside every preset's session.
    fn wednesday() -> Timestamp {
        at("2026-01-14T15:00:00Z")
    }

    fn strong() -> RawSignal {
        RawSignal::new(100, "L4", "GREEN")
    }

    fn context() -> Arc<EngineContext> {
        let mut registry = AccountRegistry::new(Duration::from_millis(20));
        let ledger = AccountLedger::new(account(), Money::dollars(50_000), AccountPhase::Evaluation);
        registry
            .insert(AccountState::new(ledger, "apex-50k"))
            .unwrap();
        let settings = RuntimeSettings::new([RuleSet::preset(PropFirm::Apex, AccountTier::K50)]);
        Arc::new(EngineContext::new(
            registry,
            SettingsCell::new(settings),
            Arc::new(NoopExecutionFeed),
            64,
        ))
    }

    fn monitor(ctx: &Arc<EngineContext>, source: &Arc<ScriptedSignalSource>) -> ChartMonitor {
        let timing = MonitorTiming {
            sensor_timeout: Duration::from_millis(50),
            ..MonitorTiming::default()
        };
        ChartMonitor::new(
            ChartConfig::new(CHART, account(), "MES"),
            timing,
            Arc::clone(source) as Arc<dyn SignalSourcePort>,
            Arc::clone(ctx),
        )
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn valid_signal_yields_sized_go() {
        let ctx = context();
        let source = Arc::new(ScriptedSignalSource::new());
        source.set(CHART, strong());
        let chart = monitor(&ctx, &source);

        let decision = chart.run_cycle(wednesday()).await;

        // 1250 room / 250 per contract, halved by safety, times 82%.
        assert_eq!(decision.state, DecisionState::Go);
        assert_eq!(decision.recommended_contracts, 2);
        assert_eq!(chart.last_decision(), decision);
        assert!(chart.last_signal().is_some());
    }

    #[tokio::test]
    async fn initial_decision_awaits_signal() {
        let ctx = context();
        let source = Arc::new(ScriptedSignalSource::new());
        let chart = monitor(&ctx, &source);
        assert_eq!(chart.last_decision().state, DecisionState::Caution);
        assert_eq!(chart.last_decision().reason, "awaiting signal");
    }

    #[tokio::test]
    async fn invalid_read_holds_previous_decision() {
        let ctx = context();
        let source = Arc::new(ScriptedSignalSource::new());
        source.push_signal(CHART, strong());
        source.push_signal(CHART, RawSignal::invalid());
        let chart = monitor(&ctx, &source);

        let first = chart.run_cycle(wednesday()).await;
        let second = chart.run_cycle(wednesday().plus(chrono::Duration::seconds(1))).await;

        assert_eq!(second.state, first.state);
        assert_eq!(second.recommended_contracts, first.recommended_contracts);
        assert_eq!(chart.consecutive_failures(), 1);
    }

    #[tokio::test]
    async fn invalid_read_after_loss_drops_to_caution() {
        let ctx = context();
        let source = Arc::new(ScriptedSignalSource::new());
        source.push_signal(CHART, strong());
        source.push_signal(CHART, RawSignal::invalid());
        let chart = monitor(&ctx, &source);

        let first = chart.run_cycle(wednesday()).await;
        ctx.registry
            .apply_update(&account(), LedgerUpdate::pnl(Money::dollars(-1000)))
            .unwrap();
        let second = chart.run_cycle(wednesday().plus(chrono::Duration::seconds(1))).await;

        assert_eq!(first.state, DecisionState::Go);
        assert_eq!(second.state, DecisionState::Caution);
        assert_eq!(second.recommended_contracts, 0);
        assert!(second.reason.contains("$250.00"), "{second}");
    }

    #[tokio::test]
    async fn invalid_read_after_expired_lock_does_not_repeat_it() {
        let ctx = context();
        let source = Arc::new(ScriptedSignalSource::new());
        source.push_signal(CHART, strong());
        source.push_signal(CHART, RawSignal::invalid());
        let chart = monitor(&ctx, &source);

        ctx.registry
            .apply_update(&account(), LedgerUpdate::pnl(Money::dollars(-1300)))
            .unwrap();
        let locked = chart.run_cycle(wednesday()).await;
        assert!(locked.reason.starts_with("locked out until"), "{locked}");

        // Thursday 10:00 New York, after the lock expired at Wednesday's close.
        let next_day = chart.run_cycle(at("2026-01-15T15:00:00Z")).await;

        assert_eq!(ctx.registry.lockout(&account()).unwrap().status, LockoutStatus::Active);
        assert_eq!(next_day.state, DecisionState::Caution);
        assert_eq!(next_day.reason, "awaiting signal");
    }

    #[tokio::test]
    async fn three_failures_raise_one_warning() {
        let ctx = context();
        let mut rx = ctx.subscribe();
        let source = Arc::new(ScriptedSignalSource::new());
        for _ in 0..4 {
            source.push_error(
                CHART,
                SignalSourceError::Unavailable {
                    message: "window minimized".to_string(),
                },
            );
        }
        let chart = monitor(&ctx, &source);

        for _ in 0..4 {
            chart.run_cycle(wednesday()).await;
        }

        let warnings = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, EngineEvent::SystemWarning(SystemWarning::SensorFailures { .. })))
            .count();
        assert_eq!(warnings, 1);
        assert_eq!(chart.consecutive_failures(), 4);

        source.set(CHART, strong());
        chart.run_cycle(wednesday()).await;
        assert_eq!(chart.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn slow_sensor_counts_as_failure() {
        let ctx = context();
        let source = Arc::new(ScriptedSignalSource::new());
        source.push(
            CHART,
            ScriptedRead::Delayed(Duration::from_millis(500), strong()),
        );
        let chart = monitor(&ctx, &source);

        let signal = chart.poll(wednesday()).await;

        assert!(!signal.is_valid());
        assert_eq!(chart.consecutive_failures(), 1);
    }

    #[tokio::test]
    async fn disabled_chart_stops_without_polling() {
        let ctx = context();
        let source = Arc::new(ScriptedSignalSource::new());
        source.push_signal(CHART, strong());
        let chart = monitor(&ctx, &source);

        assert!(chart.set_enabled(false));
        let decision = chart.run_cycle(wednesday()).await;

        assert!(decision.is_stop());
        assert_eq!(decision.reason, "disabled");
        assert_eq!(source.pending(CHART), 1);

        chart.set_enabled(true);
        assert_eq!(chart.run_cycle(wednesday()).await.state, DecisionState::Go);
    }

    #[tokio::test]
    async fn disabled_chart_keeps_account_current() {
        let ctx = context();
        let source = Arc::new(ScriptedSignalSource::new());
        source.set(CHART, strong());
        let chart = monitor(&ctx, &source);
        chart.set_enabled(false);

        ctx.registry
            .apply_update(&account(), LedgerUpdate::pnl(Money::dollars(-400)))
            .unwrap();
        ctx.emergency.engage(wednesday());
        chart.run_cycle(wednesday()).await;
        assert_eq!(
            ctx.registry.lockout(&account()).unwrap().reason,
            Some(LockReason::EmergencyStop)
        );

        assert!(ctx.emergency.clear());
        let thursday = at("2026-01-15T15:00:00Z");
        let decision = chart.run_cycle(thursday).await;

        assert_eq!(decision.reason, "disabled");
        assert_eq!(ctx.registry.lockout(&account()).unwrap().status, LockoutStatus::Active);
        assert!(ctx.registry.snapshot(&account()).unwrap().daily_pnl.is_zero());
    }

    #[tokio::test]
    async fn emergency_skips_poll_and_locks_account() {
        let ctx = context();
        let source = Arc::new(ScriptedSignalSource::new());
        source.push_signal(CHART, strong());
        let chart = monitor(&ctx, &source);

        ctx.emergency.engage(wednesday());
        let decision = chart.run_cycle(wednesday()).await;

        assert!(decision.is_stop());
        assert_eq!(source.pending(CHART), 1);
        let lockout = ctx.registry.lockout(&account()).unwrap();
        assert!(lockout.is_locked());
        assert_eq!(lockout.reason, Some(LockReason::EmergencyStop));
    }

    #[tokio::test]
    async fn breach_publishes_violation_once_and_locks_out() {
        let ctx = context();
        let mut rx = ctx.subscribe();
        let source = Arc::new(ScriptedSignalSource::new());
        source.set(CHART, strong());
        let chart = monitor(&ctx, &source);

        ctx.registry
            .apply_update(&account(), LedgerUpdate::pnl(Money::dollars(-1300)))
            .unwrap();
        let first = chart.run_cycle(wednesday()).await;
        let second = chart.run_cycle(wednesday().plus(chrono::Duration::seconds(1))).await;

        assert!(first.is_stop());
        assert!(second.is_stop());
        let events = drain(&mut rx);
        let violations = events
            .iter()
            .filter(|e| matches!(e, EngineEvent::Violation { .. }))
            .count();
        let lockouts = events
            .iter()
            .filter(|e| matches!(e, EngineEvent::LockoutChanged { .. }))
            .count();
        assert_eq!(violations, 1);
        assert_eq!(lockouts, 1);
        assert!(ctx.registry.lockout(&account()).unwrap().is_breach_locked());
    }

    #[tokio::test]
    async fn lock_contention_holds_decision_and_warns() {
        let ctx = context();
        let mut rx = ctx.subscribe();
        let source = Arc::new(ScriptedSignalSource::new());
        source.set(CHART, strong());
        let chart = monitor(&ctx, &source);
        let before = chart.last_decision();

        let decision = {
            let _guard = ctx.registry.lock(&account()).unwrap();
            chart.run_cycle(wednesday()).await
        };

        assert_eq!(decision.state, before.state);
        assert!(drain(&mut rx).iter().any(|e| matches!(
            e,
            EngineEvent::SystemWarning(SystemWarning::LockContention { .. })
        )));
    }

    #[tokio::test]
    async fn worker_stops_on_cancel() {
        let ctx = context();
        let source = Arc::new(ScriptedSignalSource::new());
        source.set(CHART, strong());
        let chart = Arc::new(ChartMonitor::new(
            ChartConfig::new(CHART, account(), "MES"),
            MonitorTiming {
                poll_interval: Duration::from_millis(10),
                ..MonitorTiming::default()
            },
            source,
            Arc::clone(&ctx),
        ));
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(&chart).run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert!(chart.last_signal().is_some());
    }
}

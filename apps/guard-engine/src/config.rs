//! Configuration loading for the guard engine.
//!
//! YAML with `${VAR}`, `${VAR:-default}` and `${VAR:?}` (required)
//! environment interpolation, per-field serde defaults and a validation pass
//! that rejects anything that would let the engine run with wrong limits.
//!
//! # Usage
//!
//! ```rust,ignore
//! use guard_engine::config::load_config;
//!
//! let config = load_config(Some("config.yaml"))?;
//! let setup = config.engine_setup()?;
//! ```

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveTime, Weekday};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::services::{
    AccountSetup, ChartConfig, EngineSetup, EngineTiming, RuntimeSettings,
};
use crate::domain::account::AccountPhase;
use crate::domain::compliance::{
    AccountTier, ComplianceEngine, NewsEvent, PropFirm, RuleSet, Severity,
};
use crate::domain::decision::{ConfluenceProbabilityModel, DecisionEngine, DecisionThresholds};
use crate::domain::shared::{AccountId, ChartId, Money, TradingCalendar, TradingHours};
use crate::domain::system::HealthBands;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),

    /// A `${VAR:?}` reference names an unset variable.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Cycle cadence and bounds.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Exchange calendar and scheduled news.
    #[serde(default)]
    pub calendar: CalendarConfig,
    /// Decision thresholds.
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
    /// Probability model table.
    #[serde(default)]
    pub probability: ProbabilityConfig,
    /// Status health bands.
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    /// Named firm rule sets.
    pub rule_sets: Vec<RuleSetConfig>,
    /// Funded accounts.
    pub accounts: Vec<AccountConfig>,
    /// Charts, one sensor each.
    pub charts: Vec<ChartEntry>,
    /// Sensor file drop.
    #[serde(default)]
    pub signal_source: SignalSourceConfig,
    /// Audit log and lockout store.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Operator kill switch.
    #[serde(default)]
    pub safety: SafetyConfig,
    /// Logging and metrics.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Engine cadence and bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Interval between chart cycles.
    #[serde(default = "default_interval_ms")]
    pub chart_interval_ms: u64,
    /// Interval between aggregator passes.
    #[serde(default = "default_interval_ms")]
    pub aggregator_interval_ms: u64,
    /// Bound on one sensor read.
    #[serde(default = "default_sensor_timeout_ms")]
    pub sensor_timeout_ms: u64,
    /// Consecutive failed polls before a system warning.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Bounded wait for an account lock.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    /// Engine event channel capacity.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chart_interval_ms: default_interval_ms(),
            aggregator_interval_ms: default_interval_ms(),
            sensor_timeout_ms: default_sensor_timeout_ms(),
            failure_threshold: default_failure_threshold(),
            lock_timeout_ms: default_lock_timeout_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl EngineConfig {
    /// Convert to engine timing.
    #[must_use]
    pub const fn timing(&self) -> EngineTiming {
        EngineTiming {
            chart_interval: Duration::from_millis(self.chart_interval_ms),
            aggregator_interval: Duration::from_millis(self.aggregator_interval_ms),
            sensor_timeout: Duration::from_millis(self.sensor_timeout_ms),
            failure_threshold: self.failure_threshold,
            lock_timeout: Duration::from_millis(self.lock_timeout_ms),
            event_capacity: self.event_capacity,
        }
    }
}

const fn default_interval_ms() -> u64 {
    1000
}
const fn default_sensor_timeout_ms() -> u64 {
    3000
}
const fn default_failure_threshold() -> u32 {
    3
}
const fn default_lock_timeout_ms() -> u64 {
    250
}
const fn default_event_capacity() -> usize {
    1024
}

/// Exchange calendar configuration. Times are exchange-local `HH:MM`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Exchange offset from UTC in minutes.
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
    /// Session open.
    #[serde(default = "default_session_open")]
    pub session_open: String,
    /// Session close.
    #[serde(default = "default_session_close")]
    pub session_close: String,
    /// Weekdays with a session (`Mon`, `Tuesday`, ...).
    #[serde(default = "default_trading_days")]
    pub trading_days: Vec<String>,
    /// Scheduled news releases for the blackout rule.
    #[serde(default)]
    pub news: Vec<NewsEvent>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: default_utc_offset_minutes(),
            session_open: default_session_open(),
            session_close: default_session_close(),
            trading_days: default_trading_days(),
            news: Vec::new(),
        }
    }
}

impl CalendarConfig {
    /// Build the trading calendar.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unparseable times or weekdays, or an
    /// inconsistent calendar.
    pub fn calendar(&self) -> Result<TradingCalendar, ConfigError> {
        let session = TradingHours::new(
            parse_time("calendar.session_open", &self.session_open)?,
            parse_time("calendar.session_close", &self.session_close)?,
        );
        let days = self
            .trading_days
            .iter()
            .map(|d| {
                d.parse::<Weekday>()
                    .map_err(|_| invalid(format!("calendar.trading_days: unknown weekday '{d}'")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        TradingCalendar::new(self.utc_offset_minutes, session, &days)
            .map_err(|e| invalid(format!("calendar: {e}")))
    }
}

const fn default_utc_offset_minutes() -> i32 {
    -300
}
fn default_session_open() -> String {
    "18:00".to_string()
}
fn default_session_close() -> String {
    "17:00".to_string()
}
fn default_trading_days() -> Vec<String> {
    ["Mon", "Tue", "Wed", "Thu", "Fri"]
        .iter()
        .map(|d| (*d).to_string())
        .collect()
}

fn parse_time(field: &str, value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|e| invalid(format!("{field}: '{value}' is not HH:MM ({e})")))
}

/// Decision thresholds. Dollar amounts are whole or fractional dollars.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    /// Below this remaining drawdown the decision is CAUTION.
    #[serde(default = "default_low_drawdown")]
    pub low_drawdown_threshold: Decimal,
    /// GO requires more remaining drawdown than this.
    #[serde(default = "default_safe_drawdown")]
    pub safe_drawdown_threshold: Decimal,
    /// Below this success probability the decision is CAUTION.
    #[serde(default = "default_probability_floor")]
    pub probability_floor: Decimal,
    /// GO requires at least this success probability.
    #[serde(default = "default_probability_ceiling")]
    pub probability_ceiling: Decimal,
    /// Share of the theoretical size recommended, in (0, 100].
    #[serde(default = "default_safety_ratio_pct")]
    pub safety_ratio_pct: Decimal,
    /// Dollars risked per contract.
    #[serde(default = "default_dollar_risk_per_contract")]
    pub dollar_risk_per_contract: Decimal,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            low_drawdown_threshold: default_low_drawdown(),
            safe_drawdown_threshold: default_safe_drawdown(),
            probability_floor: default_probability_floor(),
            probability_ceiling: default_probability_ceiling(),
            safety_ratio_pct: default_safety_ratio_pct(),
            dollar_risk_per_contract: default_dollar_risk_per_contract(),
        }
    }
}

impl ThresholdsConfig {
    /// Convert to domain thresholds.
    #[must_use]
    pub fn thresholds(&self) -> DecisionThresholds {
        DecisionThresholds {
            low_drawdown_threshold: Money::new(self.low_drawdown_threshold),
            safe_drawdown_threshold: Money::new(self.safe_drawdown_threshold),
            probability_floor: self.probability_floor,
            probability_ceiling: self.probability_ceiling,
            safety_ratio_pct: self.safety_ratio_pct,
            dollar_risk_per_contract: Money::new(self.dollar_risk_per_contract),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.low_drawdown_threshold.is_sign_negative() {
            return Err(invalid("thresholds.low_drawdown_threshold must not be negative"));
        }
        if self.low_drawdown_threshold > self.safe_drawdown_threshold {
            return Err(invalid(
                "thresholds.low_drawdown_threshold must not exceed safe_drawdown_threshold",
            ));
        }
        for (field, value) in [
            ("probability_floor", self.probability_floor),
            ("probability_ceiling", self.probability_ceiling),
        ] {
            if !is_percent(value) {
                return Err(invalid(format!(
                    "thresholds.{field} must be between 0 and 100, got {value}"
                )));
            }
        }
        if self.probability_floor > self.probability_ceiling {
            return Err(invalid(
                "thresholds.probability_floor must not exceed probability_ceiling",
            ));
        }
        if self.safety_ratio_pct <= Decimal::ZERO || self.safety_ratio_pct > Decimal::ONE_HUNDRED {
            return Err(invalid(format!(
                "thresholds.safety_ratio_pct must be in (0, 100], got {}",
                self.safety_ratio_pct
            )));
        }
        if self.dollar_risk_per_contract <= Decimal::ZERO {
            return Err(invalid("thresholds.dollar_risk_per_contract must be positive"));
        }
        Ok(())
    }
}

fn default_low_drawdown() -> Decimal {
    dec!(300)
}
fn default_safe_drawdown() -> Decimal {
    dec!(500)
}
fn default_probability_floor() -> Decimal {
    dec!(60)
}
fn default_probability_ceiling() -> Decimal {
    dec!(70)
}
fn default_safety_ratio_pct() -> Decimal {
    dec!(50)
}
fn default_dollar_risk_per_contract() -> Decimal {
    dec!(250)
}

fn is_percent(value: Decimal) -> bool {
    (Decimal::ZERO..=Decimal::ONE_HUNDRED).contains(&value)
}

/// Base success probability per confluence level plus the power-score weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbabilityConfig {
    /// Level with no confluence.
    #[serde(default)]
    pub none: Decimal,
    /// Level 1.
    #[serde(default = "default_l1")]
    pub l1: Decimal,
    /// Level 2.
    #[serde(default = "default_l2")]
    pub l2: Decimal,
    /// Level 3.
    #[serde(default = "default_l3")]
    pub l3: Decimal,
    /// Level 4.
    #[serde(default = "default_l4")]
    pub l4: Decimal,
    /// How much of the base depends on power score, 0-100.
    #[serde(default = "default_power_weight_pct")]
    pub power_weight_pct: Decimal,
}

impl Default for ProbabilityConfig {
    fn default() -> Self {
        Self {
            none: Decimal::ZERO,
            l1: default_l1(),
            l2: default_l2(),
            l3: default_l3(),
            l4: default_l4(),
            power_weight_pct: default_power_weight_pct(),
        }
    }
}

impl ProbabilityConfig {
    /// Build the table model.
    #[must_use]
    pub fn model(&self) -> ConfluenceProbabilityModel {
        ConfluenceProbabilityModel::new(self.table(), self.power_weight_pct)
    }

    const fn table(&self) -> [Decimal; 5] {
        [self.none, self.l1, self.l2, self.l3, self.l4]
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(value) = self.table().into_iter().find(|v| !is_percent(*v)) {
            return Err(invalid(format!(
                "probability levels must be between 0 and 100, got {value}"
            )));
        }
        if !is_percent(self.power_weight_pct) {
            return Err(invalid("probability.power_weight_pct must be between 0 and 100"));
        }
        Ok(())
    }
}

fn default_l1() -> Decimal {
    dec!(45)
}
fn default_l2() -> Decimal {
    dec!(60)
}
fn default_l3() -> Decimal {
    dec!(72)
}
fn default_l4() -> Decimal {
    dec!(82)
}
fn default_power_weight_pct() -> Decimal {
    dec!(50)
}

/// Aggregator health bands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Below this margin percentage health is at least WARNING.
    #[serde(default = "default_warning_margin_pct")]
    pub warning_margin_pct: Decimal,
    /// Below this margin percentage health is DANGER.
    #[serde(default = "default_danger_margin_pct")]
    pub danger_margin_pct: Decimal,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            warning_margin_pct: default_warning_margin_pct(),
            danger_margin_pct: default_danger_margin_pct(),
        }
    }
}

impl AggregatorConfig {
    /// Convert to health bands.
    #[must_use]
    pub const fn health_bands(&self) -> HealthBands {
        HealthBands {
            warning_margin_pct: self.warning_margin_pct,
            danger_margin_pct: self.danger_margin_pct,
        }
    }
}

fn default_warning_margin_pct() -> Decimal {
    dec!(1.5)
}
fn default_danger_margin_pct() -> Decimal {
    dec!(0.75)
}

/// Session window override for a rule set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoursConfig {
    /// Open, `HH:MM`.
    pub open: String,
    /// Close, `HH:MM`.
    pub close: String,
}

/// A named rule set: a firm preset for an account tier with optional
/// overrides. `firm: custom` with overrides describes any other firm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSetConfig {
    /// Name accounts refer to. Defaults to the preset name, e.g. `topstep-50k`.
    #[serde(default)]
    pub name: Option<String>,
    /// Firm preset.
    pub firm: PropFirm,
    /// Account size tier.
    #[serde(default = "default_tier")]
    pub tier: AccountTier,
    /// Daily loss limit, percent of account size.
    #[serde(default)]
    pub daily_loss_limit_pct: Option<Decimal>,
    /// Trailing drawdown, percent of account size.
    #[serde(default)]
    pub trailing_drawdown_pct: Option<Decimal>,
    /// Max share of total profit from one day.
    #[serde(default)]
    pub consistency_limit_pct: Option<Decimal>,
    /// Severity of a consistency violation.
    #[serde(default)]
    pub consistency_severity: Option<Severity>,
    /// Per-trade contract cap.
    #[serde(default)]
    pub max_contracts_per_trade: Option<u32>,
    /// Open contract cap.
    #[serde(default)]
    pub max_total_contracts: Option<u32>,
    /// Instruments the firm does not allow.
    #[serde(default)]
    pub forbidden_instruments: Vec<String>,
    /// Allowed trading window.
    #[serde(default)]
    pub trading_hours: Option<HoursConfig>,
    /// Whether positions may be held over the weekend.
    #[serde(default)]
    pub weekend_holding_allowed: Option<bool>,
    /// Minutes around scheduled news during which trading is blocked.
    #[serde(default)]
    pub news_blackout_minutes: Option<u32>,
}

const fn default_tier() -> AccountTier {
    AccountTier::K50
}

impl RuleSetConfig {
    /// Resolve the preset and apply overrides.
    ///
    /// # Errors
    ///
    /// Returns a validation error for out-of-range values.
    pub fn rule_set(&self) -> Result<RuleSet, ConfigError> {
        let mut rules = RuleSet::preset(self.firm, self.tier)
            .with_forbidden_instruments(self.forbidden_instruments.iter().cloned());
        if let Some(name) = &self.name {
            rules = rules.with_name(name.clone());
        }
        let label = rules.name.clone();

        if let Some(pct) = self.daily_loss_limit_pct {
            rules.daily_loss_limit_pct = pct;
        }
        if let Some(pct) = self.trailing_drawdown_pct {
            rules.trailing_drawdown_pct = pct;
        }
        if let Some(pct) = self.consistency_limit_pct {
            rules.consistency_limit_pct = pct;
        }
        if let Some(severity) = self.consistency_severity {
            rules.consistency_severity = severity;
        }
        if let Some(n) = self.max_contracts_per_trade {
            rules.max_contracts_per_trade = n;
        }
        if let Some(n) = self.max_total_contracts {
            rules.max_total_contracts = n;
        }
        if let Some(hours) = &self.trading_hours {
            rules.trading_hours = TradingHours::new(
                parse_time(&format!("rule_sets[{label}].trading_hours.open"), &hours.open)?,
                parse_time(&format!("rule_sets[{label}].trading_hours.close"), &hours.close)?,
            );
        }
        if let Some(allowed) = self.weekend_holding_allowed {
            rules.weekend_holding_allowed = allowed;
        }
        if let Some(minutes) = self.news_blackout_minutes {
            rules.news_blackout_minutes = minutes;
        }

        for (field, value) in [
            ("daily_loss_limit_pct", rules.daily_loss_limit_pct),
            ("trailing_drawdown_pct", rules.trailing_drawdown_pct),
            ("consistency_limit_pct", rules.consistency_limit_pct),
        ] {
            if value <= Decimal::ZERO || value > Decimal::ONE_HUNDRED {
                return Err(invalid(format!(
                    "rule_sets[{label}].{field} must be in (0, 100], got {value}"
                )));
            }
        }
        if rules.max_contracts_per_trade == 0 || rules.max_total_contracts == 0 {
            return Err(invalid(format!(
                "rule_sets[{label}]: contract limits must be positive"
            )));
        }
        if rules.max_contracts_per_trade > rules.max_total_contracts {
            return Err(invalid(format!(
                "rule_sets[{label}]: max_contracts_per_trade exceeds max_total_contracts"
            )));
        }
        if rules.trading_hours.open() == rules.trading_hours.close() {
            return Err(invalid(format!(
                "rule_sets[{label}]: trading hours open and close must differ"
            )));
        }
        Ok(rules)
    }
}

/// A funded account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Account identifier.
    pub id: String,
    /// Name of the rule set that governs it.
    pub rule_set: String,
    /// Account size. Defaults to the rule set tier's size.
    #[serde(default)]
    pub starting_balance: Option<Decimal>,
    /// Evaluation / funded / live.
    #[serde(default)]
    pub phase: AccountPhase,
}

/// A chart and the trade it would place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartEntry {
    /// Chart identifier.
    pub id: u32,
    /// Owning account.
    pub account: String,
    /// Instrument traded on this chart.
    pub instrument: String,
    /// Standard order size.
    #[serde(default = "default_order_contracts")]
    pub order_contracts: u32,
    /// Whether the chart starts enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

const fn default_order_contracts() -> u32 {
    1
}
const fn default_true() -> bool {
    true
}

/// Sensor file drop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalSourceConfig {
    /// Directory the sensor writes `chart_<id>.json` into.
    #[serde(default = "default_signal_dir")]
    pub dir: PathBuf,
    /// Files older than this are treated as invalid reads.
    #[serde(default = "default_max_age_ms")]
    pub max_age_ms: u64,
}

impl Default for SignalSourceConfig {
    fn default() -> Self {
        Self {
            dir: default_signal_dir(),
            max_age_ms: default_max_age_ms(),
        }
    }
}

impl SignalSourceConfig {
    /// Staleness bound.
    #[must_use]
    pub const fn max_age(&self) -> Duration {
        Duration::from_millis(self.max_age_ms)
    }
}

fn default_signal_dir() -> PathBuf {
    PathBuf::from("signals")
}
const fn default_max_age_ms() -> u64 {
    5000
}

/// Audit persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// JSON-lines violation log.
    #[serde(default = "default_violation_log")]
    pub violation_log: PathBuf,
    /// Lockout state file.
    #[serde(default = "default_lockout_store")]
    pub lockout_store: PathBuf,
    /// Resume persisted lockouts at startup.
    #[serde(default = "default_true")]
    pub restore_lockouts: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            violation_log: default_violation_log(),
            lockout_store: default_lockout_store(),
            restore_lockouts: true,
        }
    }
}

fn default_violation_log() -> PathBuf {
    PathBuf::from("data/violations.jsonl")
}
fn default_lockout_store() -> PathBuf {
    PathBuf::from("data/lockouts.json")
}

/// Safety configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// If this file exists the engine engages the emergency stop.
    #[serde(default)]
    pub kill_file: Option<PathBuf>,
}

/// Observability configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Prometheus exporter configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable.
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Level for this crate when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Prometheus exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether to start the exporter.
    #[serde(default)]
    pub enabled: bool,
    /// Scrape endpoint address.
    #[serde(default = "default_metrics_addr")]
    pub listen_addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: default_metrics_addr(),
        }
    }
}

impl MetricsConfig {
    /// Parsed listen address.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the address does not parse.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen_addr.parse().map_err(|e| {
            invalid(format!(
                "observability.metrics.listen_addr '{}': {e}",
                self.listen_addr
            ))
        })
    }
}

fn default_metrics_addr() -> String {
    "127.0.0.1:9464".to_string()
}

impl Config {
    /// Validate every section and cross-reference.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let engine = &self.engine;
        for (field, value) in [
            ("chart_interval_ms", engine.chart_interval_ms),
            ("aggregator_interval_ms", engine.aggregator_interval_ms),
            ("sensor_timeout_ms", engine.sensor_timeout_ms),
            ("lock_timeout_ms", engine.lock_timeout_ms),
        ] {
            if value == 0 {
                return Err(invalid(format!("engine.{field} must be positive")));
            }
        }
        if engine.failure_threshold == 0 {
            return Err(invalid("engine.failure_threshold must be positive"));
        }
        if engine.event_capacity == 0 {
            return Err(invalid("engine.event_capacity must be positive"));
        }
        if self.signal_source.max_age_ms == 0 {
            return Err(invalid("signal_source.max_age_ms must be positive"));
        }

        self.calendar.calendar()?;
        self.thresholds.validate()?;
        self.probability.validate()?;

        let bands = &self.aggregator;
        if !is_percent(bands.warning_margin_pct) || !is_percent(bands.danger_margin_pct) {
            return Err(invalid("aggregator margin bands must be between 0 and 100"));
        }
        if bands.danger_margin_pct > bands.warning_margin_pct {
            return Err(invalid(
                "aggregator.danger_margin_pct must not exceed warning_margin_pct",
            ));
        }

        let rule_sets = self.rule_sets()?;
        if rule_sets.is_empty() {
            return Err(invalid("at least one rule set is required"));
        }
        let mut names = HashSet::new();
        for rules in &rule_sets {
            if !names.insert(rules.name.as_str()) {
                return Err(invalid(format!("duplicate rule set '{}'", rules.name)));
            }
        }

        if self.accounts.is_empty() {
            return Err(invalid("at least one account is required"));
        }
        let mut account_ids = HashSet::new();
        for account in &self.accounts {
            if account.id.trim().is_empty() {
                return Err(invalid("account id must not be empty"));
            }
            if !account_ids.insert(account.id.as_str()) {
                return Err(invalid(format!("duplicate account '{}'", account.id)));
            }
            if !names.contains(account.rule_set.as_str()) {
                return Err(invalid(format!(
                    "account '{}' references unknown rule set '{}'",
                    account.id, account.rule_set
                )));
            }
            if account.starting_balance.is_some_and(|b| b <= Decimal::ZERO) {
                return Err(invalid(format!(
                    "account '{}': starting_balance must be positive",
                    account.id
                )));
            }
        }

        let mut chart_ids = HashSet::new();
        for chart in &self.charts {
            if !chart_ids.insert(chart.id) {
                return Err(invalid(format!("duplicate chart {}", chart.id)));
            }
            if !account_ids.contains(chart.account.as_str()) {
                return Err(invalid(format!(
                    "chart {} references unknown account '{}'",
                    chart.id, chart.account
                )));
            }
            if chart.order_contracts == 0 {
                return Err(invalid(format!(
                    "chart {}: order_contracts must be positive",
                    chart.id
                )));
            }
            if chart.instrument.trim().is_empty() {
                return Err(invalid(format!("chart {}: instrument is required", chart.id)));
            }
        }

        if self.observability.metrics.enabled {
            self.observability.metrics.socket_addr()?;
        }
        Ok(())
    }

    /// Resolve every configured rule set.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid rule set.
    pub fn rule_sets(&self) -> Result<Vec<RuleSet>, ConfigError> {
        self.rule_sets.iter().map(RuleSetConfig::rule_set).collect()
    }

    /// Rule sets, thresholds, probability model and health bands.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid calendar or rule set.
    pub fn runtime_settings(&self) -> Result<RuntimeSettings, ConfigError> {
        let compliance =
            ComplianceEngine::new(self.calendar.calendar()?).with_news(self.calendar.news.clone());
        Ok(RuntimeSettings::new(self.rule_sets()?)
            .with_compliance(compliance)
            .with_decisions(DecisionEngine::new(self.thresholds.thresholds()))
            .with_probability(Arc::new(self.probability.model()))
            .with_health_bands(self.aggregator.health_bands()))
    }

    /// Everything needed to build a [`GuardEngine`](crate::application::GuardEngine).
    ///
    /// # Errors
    ///
    /// Returns a validation error if the configuration is inconsistent.
    pub fn engine_setup(&self) -> Result<EngineSetup, ConfigError> {
        self.validate()?;
        let settings = self.runtime_settings()?;

        let accounts = self
            .accounts
            .iter()
            .map(|account| {
                let starting_balance = match account.starting_balance {
                    Some(balance) => Money::new(balance),
                    None => self.tier_of(&account.rule_set)?.starting_balance(),
                };
                Ok::<_, ConfigError>(AccountSetup {
                    account_id: AccountId::new(account.id.clone()),
                    starting_balance,
                    phase: account.phase,
                    rule_set: account.rule_set.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let charts = self
            .charts
            .iter()
            .map(|chart| {
                let mut config = ChartConfig::new(
                    ChartId::new(chart.id),
                    AccountId::new(chart.account.clone()),
                    chart.instrument.clone(),
                )
                .with_order_contracts(chart.order_contracts);
                config.enabled = chart.enabled;
                config
            })
            .collect();

        Ok(EngineSetup {
            accounts,
            charts,
            settings,
            timing: self.engine.timing(),
        })
    }

    fn tier_of(&self, rule_set: &str) -> Result<AccountTier, ConfigError> {
        self.rule_sets
            .iter()
            .find(|r| {
                r.name.as_deref().map_or_else(
                    || RuleSet::preset(r.firm, r.tier).name == rule_set,
                    |name| name == rule_set,
                )
            })
            .map(|r| r.tier)
            .ok_or_else(|| invalid(format!("unknown rule set '{rule_set}'")))
    }
}

/// Load configuration from a YAML file (default `config.yaml`).
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or("config.yaml");
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_string(),
        source: e,
    })?;
    load_config_from_string(&contents)
}

/// Load configuration from a YAML string.
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml)?;
    let config: Config = serde_yaml_bw::from_str(&interpolated)?;
    config.validate()?;
    Ok(config)
}

/// Replace `${VAR}`, `${VAR:-default}` and `${VAR:?}` references.
///
/// An unset or empty `${VAR}` becomes the empty string; `${VAR:?}` fails.
#[allow(clippy::expect_used)] // Regex is compile-time constant; expect() is safe here
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?:(:-|:\?)([^}]*))?\}")
            .expect("env var regex is valid")
    });

    let mut missing = None;
    let result = re.replace_all(input, |caps: &regex::Captures<'_>| {
        let name = caps.get(1).map_or("", |m| m.as_str());
        match std::env::var(name) {
            Ok(value) if !value.is_empty() => value,
            _ => match caps.get(2).map(|m| m.as_str()) {
                Some(":?") => {
                    missing.get_or_insert_with(|| name.to_string());
                    String::new()
                }
                _ => caps.get(3).map_or_else(String::new, |m| m.as_str().to_string()),
            },
        }
    });

    match missing {
        Some(name) => Err(ConfigError::MissingEnvVar(name)),
        None => Ok(result.into_owned()),
    }
}

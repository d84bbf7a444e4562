// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::option_if_let_else
    )
)]

//! Guard Engine - Rust Core Library
//!
//! Training-wheels layer for prop-firm futures accounts. Each chart has a
//! screen sensor reporting a power score, confluence level and direction
//! color; the engine turns those readings, the account's P&L and the firm's
//! rules into a STOP / CAUTION / GO decision with a contract size.
//!
//! # Architecture
//!
//! - **Domain**: pure business logic, no I/O
//!   - `signal`: sensor reading normalization
//!   - `account`: per-account ledger, drawdown arithmetic
//!   - `compliance`: firm rule sets and the compliance engine
//!   - `lockout`: ACTIVE / LOCKED_OUT state machine
//!   - `decision`: decision precedence, sizing, probability models
//!   - `system`: aggregated status and health
//!
//! - **Application**: ports and services
//!   - `ports`: `SignalSourcePort`, `ExecutionFeedPort`, audit stores
//!   - `services`: `ChartMonitor`, `Aggregator`, `GuardEngine`, `AuditRecorder`
//!
//! - **Infrastructure**: sensor file drop, scripted source, JSON persistence
//!
//! # Concurrency
//!
//! One worker task per chart plus one aggregator task. Account state sits
//! behind a per-account mutex acquired with a bounded wait; status is
//! published through a `watch` channel and events through `broadcast`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// Domain layer - Core business logic with no external dependencies.
pub mod domain;

/// Application layer - Services and port definitions.
pub mod application;

/// Infrastructure layer - Adapters for the application ports.
pub mod infrastructure;

/// YAML configuration.
pub mod config;

/// Crate-level errors.
pub mod error;

/// Tracing and Prometheus metrics.
pub mod observability;

pub use application::{
    EngineEvent, EngineSetup, EngineTiming, GuardEngine, GuardEngineBuilder, RuntimeSettings,
    SystemWarning,
};
pub use config::{Config, ConfigError, load_config, load_config_from_string};
pub use domain::decision::{Decision, DecisionState};
pub use domain::system::{SystemHealth, SystemStatus};
pub use error::EngineError;

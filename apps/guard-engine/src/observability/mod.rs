//! Observability module for metrics and logging.
//!
//! This module provides instrumentation for the guard engine:
//! a `tracing` subscriber and an optional Prometheus exporter.

mod metrics;
mod tracing;

pub use self::metrics::{
    MetricsError, init_metrics, record_decision, record_emergency_stop, record_lock_contention,
    record_lockout, record_sensor_failure, record_violation, update_active_charts,
    update_overall_margin,
};
pub use self::tracing::{TracingError, init_tracing};

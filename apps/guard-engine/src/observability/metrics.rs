//! Prometheus metrics for the guard engine.
//!
//! Recording functions are no-ops until [`init_metrics`] installs a recorder,
//! so the engine can call them unconditionally.
//!
//! # Example
//!
//! ```ignore
//! use guard_engine::observability::{init_metrics, record_decision};
//!
//! init_metrics("0.0.0.0:9464".parse()?)?;
//! record_decision(7, "GO");
//! ```

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize the Prometheus metrics exporter.
///
/// This starts an HTTP server that exposes metrics at `/metrics`.
///
/// # Errors
///
/// Returns an error if the exporter fails to start (e.g., port already in use).
pub fn init_metrics(listen_addr: SocketAddr) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(listen_addr)
        .install()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    tracing::info!(addr = %listen_addr, "Prometheus metrics exporter started");

    Ok(())
}

/// Error type for metrics operations.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Invalid exporter configuration.
    #[error("metrics configuration error: {0}")]
    Configuration(String),
    /// Failed to install metrics exporter.
    #[error("metrics installation error: {0}")]
    Installation(String),
}

// ============================================================================
// Decision Metrics
// ============================================================================

/// Record a chart decision.
///
/// # Arguments
///
/// * `chart_id` - Chart number
/// * `state` - Decision state (`STOP`, `CAUTION`, `GO`)
pub fn record_decision(chart_id: u32, state: &str) {
    counter!(
        "guard_decisions_total",
        "chart" => chart_id.to_string(),
        "state" => state.to_string()
    )
    .increment(1);
}

// ============================================================================
// Compliance Metrics
// ============================================================================

/// Record a newly raised compliance violation.
///
/// # Arguments
///
/// * `kind` - Violation kind (e.g., `DAILY_LOSS`)
/// * `severity` - Severity (`WARNING`, `STOP`, `BREACH`)
pub fn record_violation(kind: &str, severity: &str) {
    counter!(
        "guard_violations_total",
        "kind" => kind.to_string(),
        "severity" => severity.to_string()
    )
    .increment(1);
}

/// Record an account lockout transition.
///
/// # Arguments
///
/// * `account_id` - Account identifier
/// * `to` - Status entered (`ACTIVE`, `LOCKED_OUT`)
pub fn record_lockout(account_id: &str, to: &str) {
    counter!(
        "guard_lockout_transitions_total",
        "account" => account_id.to_string(),
        "to" => to.to_string()
    )
    .increment(1);
}

/// Record an emergency stop activation.
pub fn record_emergency_stop() {
    counter!("guard_emergency_stops_total").increment(1);
}

// ============================================================================
// Health Metrics
// ============================================================================

/// Record a failed sensor poll.
pub fn record_sensor_failure(chart_id: u32, reason: &str) {
    counter!(
        "guard_sensor_failures_total",
        "chart" => chart_id.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record an account lock wait that timed out.
pub fn record_lock_contention(account_id: &str) {
    counter!(
        "guard_lock_contention_total",
        "account" => account_id.to_string()
    )
    .increment(1);
}

/// Update the overall margin remaining gauge (percent).
pub fn update_overall_margin(pct: f64) {
    gauge!("guard_overall_margin_remaining_pct").set(pct);
}

/// Update the active chart gauge.
pub fn update_active_charts(count: usize) {
    gauge!("guard_active_charts").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_exporter_is_noop() {
        record_decision(1, "GO");
        record_violation("DAILY_LOSS", "BREACH");
        record_lockout("acct-1", "LOCKED_OUT");
        record_emergency_stop();
        record_sensor_failure(1, "timeout");
        record_lock_contention("acct-1");
        update_overall_margin(42.5);
        update_active_charts(3);
    }

    #[test]
    fn error_display() {
        let err = MetricsError::Installation("address in use".to_string());
        assert_eq!(err.to_string(), "metrics installation error: address in use");
    }
}

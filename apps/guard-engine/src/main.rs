//! Guard Engine Binary
//!
//! Runs one worker per configured chart plus the aggregator and the audit
//! recorder until Ctrl+C or SIGTERM.
//!
//! # Usage
//!
//! ```bash
//! guard-engine [config.yaml]
//! ```
//!
//! # Environment Variables
//!
//! - `GUARD_CONFIG`: config path when no argument is given (default: config.yaml)
//! - `RUST_LOG`: overrides the configured log level
//!
//! Any `${VAR}` referenced from the config file may also be set in `.env`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use guard_engine::application::AuditRecorder;
use guard_engine::config::{Config, load_config};
use guard_engine::domain::system::{SystemHealth, SystemStatus};
use guard_engine::infrastructure::{FileSignalSource, JsonLockoutStore, JsonlViolationLog};
use guard_engine::observability::{init_metrics, init_tracing};
use guard_engine::GuardEngine;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("GUARD_CONFIG").ok())
        .unwrap_or_else(|| "config.yaml".to_string());
    let config = load_config(Some(path.as_str()))?;

    init_tracing(&config.observability.logging)?;
    if config.observability.metrics.enabled {
        let addr = config.observability.metrics.socket_addr()?;
        init_metrics(addr)?;
        tracing::info!(%addr, "Prometheus exporter listening");
    }

    tracing::info!(
        config = %path,
        accounts = config.accounts.len(),
        charts = config.charts.len(),
        "Starting guard engine"
    );

    let engine = build_engine(&config).await?;
    let shutdown = CancellationToken::new();

    let audit = AuditRecorder::new(
        Arc::new(JsonlViolationLog::new(&config.persistence.violation_log)),
        Arc::new(JsonLockoutStore::new(&config.persistence.lockout_store)),
    );
    let mut handles = vec![tokio::spawn(audit.run(engine.audit_feed(), shutdown.clone()))];
    handles.push(tokio::spawn(report_status(
        engine.subscribe_status(),
        shutdown.clone(),
    )));
    handles.extend(engine.start(&shutdown));

    tracing::info!("Guard engine ready");

    shutdown_signal().await;
    shutdown.cancel();
    await_tasks(handles).await;

    tracing::info!("Guard engine stopped");
    Ok(())
}

/// Build the engine from config, resuming persisted lockouts.
async fn build_engine(config: &Config) -> anyhow::Result<GuardEngine> {
    let setup = config.engine_setup()?;

    let lockouts = if config.persistence.restore_lockouts {
        let store = Arc::new(JsonLockoutStore::new(&config.persistence.lockout_store));
        let violations = Arc::new(JsonlViolationLog::new(&config.persistence.violation_log));
        AuditRecorder::new(violations, store)
            .restore()
            .await
            .context("restoring persisted lockouts")?
    } else {
        Vec::new()
    };

    let source = Arc::new(FileSignalSource::new(
        &config.signal_source.dir,
        config.signal_source.max_age(),
    ));
    tracing::info!(dir = %config.signal_source.dir.display(), "Reading sensor files");

    let mut builder = GuardEngine::builder(setup, source).with_restored_lockouts(lockouts);
    if let Some(kill_file) = &config.safety.kill_file {
        tracing::info!(path = %kill_file.display(), "Watching kill file");
        builder = builder.with_kill_file(kill_file);
    }
    Ok(builder.build()?)
}

/// Log a summary line whenever health or the active chart count changes.
async fn report_status(mut status: watch::Receiver<Arc<SystemStatus>>, shutdown: CancellationToken) {
    let mut last: Option<(SystemHealth, usize)> = None;
    loop {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = status.borrow_and_update().clone();
                let key = (current.health, current.active_chart_count);
                if last != Some(key) {
                    tracing::info!(
                        health = %current.health,
                        margin_pct = %current.overall_margin_remaining_pct,
                        margin = %current.overall_margin_remaining_amount,
                        active_charts = current.active_chart_count,
                        emergency = current.emergency_stop_active,
                        "System status"
                    );
                    last = Some(key);
                }
            }
            () = shutdown.cancelled() => break,
        }
    }
}

/// Wait for background tasks, bounded by the shutdown timeout.
async fn await_tasks(handles: Vec<JoinHandle<()>>) {
    let count = handles.len();
    let joined = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Background task ended abnormally");
            }
        }
    })
    .await;

    if joined.is_err() {
        tracing::warn!(
            tasks = count,
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Shutdown timed out waiting for tasks"
        );
    }
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        for dir in cwd.ancestors().skip(1) {
            let env_path = dir.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}

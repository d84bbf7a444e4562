//! Signal Source Port (Driven Port)
//!
//! Interface to the screen-reading sensor. How the reading is produced is
//! not the engine's concern.

use async_trait::async_trait;

use crate::domain::shared::ChartId;
use crate::domain::signal::RawSignal;

/// Signal source error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignalSourceError {
    /// The read did not return within the configured bound.
    #[error("sensor read timed out after {timeout_ms}ms")]
    Timeout {
        /// Bound that elapsed.
        timeout_ms: u64,
    },

    /// The sensor could not be reached or had nothing for this chart.
    #[error("signal source unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },

    /// The sensor produced output that could not be decoded.
    #[error("malformed sensor output: {message}")]
    Malformed {
        /// Error details.
        message: String,
    },
}

impl SignalSourceError {
    /// Short label for metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Unavailable { .. } => "unavailable",
            Self::Malformed { .. } => "malformed",
        }
    }
}

/// Port for reading one chart's raw signal.
#[async_trait]
pub trait SignalSourcePort: Send + Sync {
    /// Read the current raw signal for a chart.
    async fn read(&self, chart_id: ChartId) -> Result<RawSignal, SignalSourceError>;
}

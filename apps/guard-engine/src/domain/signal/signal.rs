//! Raw sensor readings and the normalized signal derived from them.

use serde::{Deserialize, Serialize};

use super::errors::SignalError;
use super::value_objects::{ConfluenceLevel, DirectionColor, PowerScore};
use crate::domain::shared::{ChartId, Timestamp};

/// Reading produced by the screen sensor for one chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSignal {
    /// Power score as read (may be out of range).
    pub power_score: i64,
    /// Confluence tag as read.
    pub confluence_level: String,
    /// Color name as read.
    pub color: String,
    /// False when the sensor could not read the region unambiguously.
    #[serde(default = "default_valid")]
    pub valid: bool,
}

const fn default_valid() -> bool {
    true
}

impl RawSignal {
    /// Create a reading the sensor considers valid.
    #[must_use]
    pub fn new(power_score: i64, confluence_level: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            power_score,
            confluence_level: confluence_level.into(),
            color: color.into(),
            valid: true,
        }
    }

    /// A missing or ambiguous read.
    #[must_use]
    pub fn invalid() -> Self {
        Self {
            power_score: 0,
            confluence_level: String::new(),
            color: String::new(),
            valid: false,
        }
    }
}

/// One normalized observation from a chart's sensor.
///
/// Immutable once created; the next cycle's signal supersedes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    chart_id: ChartId,
    power_score: PowerScore,
    confluence_level: ConfluenceLevel,
    direction_color: DirectionColor,
    observed_at: Timestamp,
    is_valid: bool,
}

impl Signal {
    /// Validate every component of a raw reading.
    ///
    /// # Errors
    ///
    /// Returns the first component that fails normalization.
    pub fn try_normalize(
        chart_id: ChartId,
        raw: &RawSignal,
        observed_at: Timestamp,
    ) -> Result<Self, SignalError> {
        if !raw.valid {
            return Err(SignalError::SensorReportedInvalid);
        }
        Ok(Self {
            chart_id,
            power_score: PowerScore::new(raw.power_score)?,
            confluence_level: ConfluenceLevel::parse(&raw.confluence_level)?,
            direction_color: DirectionColor::parse(&raw.color)?,
            observed_at,
            is_valid: true,
        })
    }

    /// Normalize a raw reading, producing an invalid signal if any component fails.
    #[must_use]
    pub fn normalize(chart_id: ChartId, raw: &RawSignal, observed_at: Timestamp) -> Self {
        match Self::try_normalize(chart_id, raw, observed_at) {
            Ok(signal) => signal,
            Err(error) => {
                tracing::debug!(chart_id = %chart_id, %error, "Signal failed normalization");
                Self::invalid(chart_id, observed_at)
            }
        }
    }

    /// A signal carrying no information.
    #[must_use]
    pub const fn invalid(chart_id: ChartId, observed_at: Timestamp) -> Self {
        Self {
            chart_id,
            power_score: PowerScore::zero(),
            confluence_level: ConfluenceLevel::L0,
            direction_color: DirectionColor::None,
            observed_at,
            is_valid: false,
        }
    }

    /// Chart the signal was read from.
    #[must_use]
    pub const fn chart_id(&self) -> ChartId {
        self.chart_id
    }

    /// Power score.
    #[must_use]
    pub const fn power_score(&self) -> PowerScore {
        self.power_score
    }

    /// Confluence level.
    #[must_use]
    pub const fn confluence_level(&self) -> ConfluenceLevel {
        self.confluence_level
    }

    /// Direction color.
    #[must_use]
    pub const fn direction_color(&self) -> DirectionColor {
        self.direction_color
    }

    /// When the reading was taken.
    #[must_use]
    pub const fn observed_at(&self) -> Timestamp {
        self.observed_at
    }

    /// False if any component failed normalization.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.is_valid
    }
}

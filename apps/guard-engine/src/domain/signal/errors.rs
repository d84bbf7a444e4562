//! Signal normalization errors.

use std::fmt;

/// Reasons a raw sensor reading cannot be turned into a valid signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalError {
    /// The sensor itself flagged the read as missing or ambiguous.
    SensorReportedInvalid,

    /// Power score outside 0-100.
    PowerScoreOutOfRange {
        /// Value read by the sensor.
        value: i64,
    },

    /// Confluence tag not in L0-L4.
    UnknownConfluence {
        /// Raw tag.
        value: String,
    },

    /// Direction color not recognised.
    UnknownColor {
        /// Raw color name.
        value: String,
    },
}

impl fmt::Display for SignalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SensorReportedInvalid => write!(f, "sensor reported an invalid read"),
            Self::PowerScoreOutOfRange { value } => {
                write!(f, "power score {value} is outside 0-100")
            }
            Self::UnknownConfluence { value } => write!(f, "unknown confluence level '{value}'"),
            Self::UnknownColor { value } => write!(f, "unknown direction color '{value}'"),
        }
    }
}

impl std::error::Error for SignalError {}

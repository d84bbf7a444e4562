//! Signal value objects.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::SignalError;

/// How many independent conditions align behind a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConfluenceLevel {
    /// No confluence.
    L0,
    /// One aligned condition.
    L1,
    /// Two aligned conditions.
    L2,
    /// Three aligned conditions.
    L3,
    /// Four aligned conditions.
    L4,
}

impl ConfluenceLevel {
    /// All levels in ascending order.
    pub const ALL: [Self; 5] = [Self::L0, Self::L1, Self::L2, Self::L3, Self::L4];

    /// Parse a sensor tag. Accepts `L3`, `l3` and `3`.
    ///
    /// # Errors
    ///
    /// Returns `SignalError::UnknownConfluence` for anything else.
    pub fn parse(raw: &str) -> Result<Self, SignalError> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix('L')
            .or_else(|| trimmed.strip_prefix('l'))
            .unwrap_or(trimmed);
        match digits {
            "0" => Ok(Self::L0),
            "1" => Ok(Self::L1),
            "2" => Ok(Self::L2),
            "3" => Ok(Self::L3),
            "4" => Ok(Self::L4),
            _ => Err(SignalError::UnknownConfluence {
                value: raw.to_string(),
            }),
        }
    }

    /// Ordinal rank 0-4.
    #[must_use]
    pub const fn rank(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for ConfluenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.rank())
    }
}

/// Directional color painted by the indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DirectionColor {
    /// No direction shown.
    None,
    /// Long bias.
    Green,
    /// Short bias.
    Red,
    /// Transitional.
    Yellow,
    /// Neutral.
    Blue,
}

impl DirectionColor {
    /// Parse a sensor color name, case-insensitively. Empty input means `None`.
    ///
    /// # Errors
    ///
    /// Returns `SignalError::UnknownColor` for unrecognised names.
    pub fn parse(raw: &str) -> Result<Self, SignalError> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "" | "NONE" => Ok(Self::None),
            "GREEN" => Ok(Self::Green),
            "RED" => Ok(Self::Red),
            "YELLOW" => Ok(Self::Yellow),
            "BLUE" => Ok(Self::Blue),
            _ => Err(SignalError::UnknownColor {
                value: raw.to_string(),
            }),
        }
    }

    /// Returns true if the indicator shows any direction.
    #[must_use]
    pub const fn has_direction(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for DirectionColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "NONE",
            Self::Green => "GREEN",
            Self::Red => "RED",
            Self::Yellow => "YELLOW",
            Self::Blue => "BLUE",
        };
        write!(f, "{name}")
    }
}

/// Power score in 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PowerScore(u8);

impl PowerScore {
    /// Maximum score.
    pub const MAX: u8 = 100;

    /// Validate a raw score.
    ///
    /// # Errors
    ///
    /// Returns `SignalError::PowerScoreOutOfRange` outside 0-100.
    pub fn new(value: i64) -> Result<Self, SignalError> {
        u8::try_from(value)
            .ok()
            .filter(|v| *v <= Self::MAX)
            .map(Self)
            .ok_or(SignalError::PowerScoreOutOfRange { value })
    }

    /// Zero score.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Inner value.
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.0
    }
}

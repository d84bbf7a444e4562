//! Compliance violations and the evaluation report.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::shared::Timestamp;

/// Which prop-firm rule was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationKind {
    /// Daily loss limit reached.
    DailyLoss,
    /// Trailing drawdown from the high-water mark reached.
    TrailingDrawdown,
    /// Too much of total profit made in one day.
    Consistency,
    /// Contract count limits exceeded.
    PositionSize,
    /// Instrument not allowed by the firm.
    ForbiddenInstrument,
    /// Outside allowed trading hours or inside a news blackout.
    TimeRestriction,
    /// Contracts held into the weekend closure.
    WeekendHolding,
}

impl ViolationKind {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DailyLoss => "DAILY_LOSS",
            Self::TrailingDrawdown => "TRAILING_DRAWDOWN",
            Self::Consistency => "CONSISTENCY",
            Self::PositionSize => "POSITION_SIZE",
            Self::ForbiddenInstrument => "FORBIDDEN_INSTRUMENT",
            Self::TimeRestriction => "TIME_RESTRICTION",
            Self::WeekendHolding => "WEEKEND_HOLDING",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Violation severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Advisory; no state change.
    Warning,
    /// Forces STOP for the current cycle only.
    Stop,
    /// Locks the account out until the next trading-day open.
    Breach,
}

impl Severity {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "WARNING",
            Self::Stop => "STOP",
            Self::Breach => "BREACH",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single rule violation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Rule violated.
    pub kind: ViolationKind,
    /// Severity.
    pub severity: Severity,
    /// Human-readable message.
    pub message: String,
    /// Observed value.
    pub current_value: Decimal,
    /// Configured limit.
    pub limit_value: Decimal,
    /// Evaluation instant.
    pub occurred_at: Timestamp,
}

impl Violation {
    /// Create a violation.
    #[must_use]
    pub fn new(
        kind: ViolationKind,
        severity: Severity,
        message: impl Into<String>,
        current_value: Decimal,
        limit_value: Decimal,
        occurred_at: Timestamp,
    ) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            current_value,
            limit_value,
            occurred_at,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} (current {}, limit {})",
            self.severity, self.kind, self.message, self.current_value, self.limit_value
        )
    }
}

/// Ordered list of violations from one compliance evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceReport {
    violations: Vec<Violation>,
}

impl ComplianceReport {
    /// Wrap violations in evaluation order.
    #[must_use]
    pub const fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    /// Violations in evaluation order.
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Consume into the violation list.
    #[must_use]
    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }

    /// Returns true if no rule was violated.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// Returns true if any violation is BREACH-level.
    #[must_use]
    pub fn has_breach(&self) -> bool {
        self.has_severity(Severity::Breach)
    }

    /// Returns true if any violation is STOP-level.
    #[must_use]
    pub fn has_stop(&self) -> bool {
        self.has_severity(Severity::Stop)
    }

    /// Most severe level present.
    #[must_use]
    pub fn worst_severity(&self) -> Option<Severity> {
        self.violations.iter().map(|v| v.severity).max()
    }

    /// First violation at the given severity.
    #[must_use]
    pub fn first_at(&self, severity: Severity) -> Option<&Violation> {
        self.violations.iter().find(|v| v.severity == severity)
    }

    fn has_severity(&self, severity: Severity) -> bool {
        self.violations.iter().any(|v| v.severity == severity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn violation(kind: ViolationKind, severity: Severity) -> Violation {
        Violation::new(
            kind,
            severity,
            "test",
            dec!(1),
            dec!(1),
            Timestamp::parse("2026-01-14T15:00:00Z").unwrap(),
        )
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Breach > Severity::Stop);
        assert!(Severity::Stop > Severity::Warning);
    }

    #[test]
    fn report_queries() {
        let report = ComplianceReport::new(vec![
            violation(ViolationKind::Consistency, Severity::Warning),
            violation(ViolationKind::PositionSize, Severity::Stop),
        ]);
        assert!(!report.is_clean());
        assert!(report.has_stop());
        assert!(!report.has_breach());
        assert_eq!(report.worst_severity(), Some(Severity::Stop));
        assert_eq!(
            report.first_at(Severity::Stop).map(|v| v.kind),
            Some(ViolationKind::PositionSize)
        );
    }

    #[test]
    fn empty_report_is_clean() {
        let report = ComplianceReport::default();
        assert!(report.is_clean());
        assert_eq!(report.worst_severity(), None);
    }

    #[test]
    fn violation_serializes_screaming_case() {
        let json = serde_json::to_string(&violation(ViolationKind::DailyLoss, Severity::Breach))
            .unwrap();
        assert!(json.contains("\"DAILY_LOSS\""));
        assert!(json.contains("\"BREACH\""));
    }

    #[test]
    fn violation_display() {
        let v = violation(ViolationKind::WeekendHolding, Severity::Stop);
        assert_eq!(v.to_string(), "[STOP] WEEKEND_HOLDING: test (current 1, limit 1)");
    }
}

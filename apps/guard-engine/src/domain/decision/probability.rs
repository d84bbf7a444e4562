//! Success probability models.
//!
//! The engine only needs "how likely is this class of signal to pay off";
//! where that number comes from is pluggable.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::signal::{ConfluenceLevel, Signal};

/// Estimates the probability (0-100) that a signal is profitable.
pub trait ProbabilityModel: Send + Sync {
    /// Success probability in percent, 0-100.
    fn success_probability(&self, signal: &Signal) -> Decimal;
}

/// Table-driven model: a base probability per confluence level, blended with
/// the power score. Signals without a direction score zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfluenceProbabilityModel {
    level_probability: [Decimal; 5],
    power_weight_pct: Decimal,
}

impl ConfluenceProbabilityModel {
    /// Create a model.
    ///
    /// `power_weight_pct` is how much of the base probability depends on the
    /// power score: 0 ignores it, 100 scales the base linearly by it.
    #[must_use]
    pub fn new(level_probability: [Decimal; 5], power_weight_pct: Decimal) -> Self {
        Self {
            level_probability,
            power_weight_pct: power_weight_pct.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED),
        }
    }

    /// Base probability configured for a level.
    #[must_use]
    pub fn base_probability(&self, level: ConfluenceLevel) -> Decimal {
        self.level_probability[level.rank()]
    }
}

impl Default for ConfluenceProbabilityModel {
    fn default() -> Self {
        Self::new([dec!(0), dec!(45), dec!(60), dec!(72), dec!(82)], dec!(50))
    }
}

impl ProbabilityModel for ConfluenceProbabilityModel {
    fn success_probability(&self, signal: &Signal) -> Decimal {
        if !signal.is_valid() || !signal.direction_color().has_direction() {
            return Decimal::ZERO;
        }
        let base = self.base_probability(signal.confluence_level());
        let power = Decimal::from(signal.power_score().value());
        let blend = (Decimal::ONE_HUNDRED - self.power_weight_pct)
            + self.power_weight_pct * power / Decimal::ONE_HUNDRED;

        (base * blend / Decimal::ONE_HUNDRED).clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shared::{ChartId, Timestamp};
    use crate::domain::signal::RawSignal;

    fn signal(power: i64, level: &str, color: &str) -> Signal {
        Signal::normalize(
            ChartId::new(1),
            &RawSignal::new(power, level, color),
            Timestamp::parse("2026-01-14T15:00:00Z").unwrap(),
        )
    }

    #[test]
    fn full_power_yields_base_probability() {
        let model = ConfluenceProbabilityModel::default();
        assert_eq!(model.success_probability(&signal(100, "L4", "GREEN")), dec!(82));
        assert_eq!(model.success_probability(&signal(100, "L3", "RED")), dec!(72));
    }

    #[test]
    fn power_score_blends_in() {
        let model = ConfluenceProbabilityModel::default();
        // 72 * (50 + 50 * 0.8) / 100 = 64.8
        assert_eq!(model.success_probability(&signal(80, "L3", "GREEN")), dec!(64.8));
    }

    #[test]
    fn no_direction_or_invalid_scores_zero() {
        let model = ConfluenceProbabilityModel::default();
        assert_eq!(model.success_probability(&signal(100, "L4", "NONE")), Decimal::ZERO);
        assert_eq!(model.success_probability(&signal(500, "L4", "GREEN")), Decimal::ZERO);
    }

    #[test]
    fn zero_weight_ignores_power() {
        let model = ConfluenceProbabilityModel::new(
            [dec!(0), dec!(40), dec!(55), dec!(70), dec!(80)],
            Decimal::ZERO,
        );
        assert_eq!(model.success_probability(&signal(10, "L3", "BLUE")), dec!(70));
    }
}

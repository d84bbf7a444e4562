//! Position sizing.
//!
//! Fractional-Kelly flavoured sizing: the dollars that can still be lost,
//! divided by the dollars risked per contract, shrunk by the safety ratio
//! and by the signal's success probability.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::domain::shared::Money;

/// Contracts to recommend, clamped to `[1, cap]` (zero only when `cap` is zero).
///
/// `safety_ratio_pct` and `success_probability` are percentages (0-100).
#[must_use]
pub fn risk_scaled_contracts(
    remaining_drawdown: Money,
    dollar_risk_per_contract: Money,
    safety_ratio_pct: Decimal,
    success_probability: Decimal,
    cap: u32,
) -> u32 {
    if cap == 0 {
        return 0;
    }
    if !dollar_risk_per_contract.is_positive() || !remaining_drawdown.is_positive() {
        return 1;
    }

    let affordable = remaining_drawdown.amount() / dollar_risk_per_contract.amount();
    let scaled = affordable * safety_ratio_pct / Decimal::ONE_HUNDRED * success_probability
        / Decimal::ONE_HUNDRED;
    let floored = scaled.floor().to_u32().unwrap_or(u32::MAX);

    floored.clamp(1, cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    #[test_case(2000, dec!(50), dec!(75), 5, 3 ; "scenario sizing")]
    #[test_case(2000, dec!(100), dec!(100), 5, 5 ; "capped by per trade limit")]
    #[test_case(400, dec!(25), dec!(70), 5, 1 ; "floored to one contract")]
    #[test_case(2000, dec!(50), dec!(75), 0, 0 ; "no capacity")]
    #[test_case(100_000, dec!(90), dec!(95), 15, 15 ; "large account capped")]
    fn sizing(remaining: i64, safety: Decimal, probability: Decimal, cap: u32, expected: u32) {
        assert_eq!(
            risk_scaled_contracts(
                Money::dollars(remaining),
                Money::dollars(250),
                safety,
                probability,
                cap
            ),
            expected
        );
    }

    #[test]
    fn sizing_is_monotone_in_drawdown() {
        let mut previous = u32::MAX;
        for remaining in (500..=5000).rev().step_by(250) {
            let contracts = risk_scaled_contracts(
                Money::dollars(remaining),
                Money::dollars(250),
                dec!(60),
                dec!(80),
                10,
            );
            assert!(contracts <= previous);
            previous = contracts;
        }
    }
}

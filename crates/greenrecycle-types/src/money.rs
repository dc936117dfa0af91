//! Fixed-point money helpers.
//!
//! All currency is `rust_decimal::Decimal` stored at two decimal places.
//! Rounding is banker's rounding (midpoint to even) so repeated settlements
//! never drift from what the database column holds.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::constants::MONEY_SCALE;

/// Round a monetary amount to [`MONEY_SCALE`] places.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// Whether `amount` is representable at [`MONEY_SCALE`] without rounding.
#[must_use]
pub fn has_money_scale(amount: Decimal) -> bool {
    fits_scale(amount, MONEY_SCALE)
}

/// Whether `value` has at most `scale` significant decimal places.
#[must_use]
pub fn fits_scale(value: Decimal, scale: u32) -> bool {
    value.normalize().scale() <= scale
}

/// `numerator / 100`, for percentages expressed as `0..=100`.
#[must_use]
pub fn percent(value: Decimal) -> Decimal {
    value / Decimal::ONE_HUNDRED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_two_places() {
        assert_eq!(round_money(Decimal::new(12_345, 3)), Decimal::new(1234, 2));
        assert_eq!(round_money(Decimal::new(12_346, 3)), Decimal::new(1235, 2));
    }

    #[test]
    fn midpoint_rounds_to_even() {
        // 0.125 -> 0.12, 0.135 -> 0.14
        assert_eq!(round_money(Decimal::new(125, 3)), Decimal::new(12, 2));
        assert_eq!(round_money(Decimal::new(135, 3)), Decimal::new(14, 2));
    }

    #[test]
    fn money_scale_detection() {
        assert!(has_money_scale(Decimal::new(1050, 2)));
        assert!(has_money_scale(Decimal::new(10_500, 3))); // 10.500 normalizes to 10.5
        assert!(!has_money_scale(Decimal::new(10_501, 3)));
    }

    #[test]
    fn scale_detection_ignores_trailing_zeros() {
        assert!(fits_scale(Decimal::new(10_000, 3), 0));
        assert!(fits_scale(Decimal::new(100_005, 4), 4));
        assert!(!fits_scale(Decimal::new(100_005, 4), 3));
    }

    #[test]
    fn percent_divides_by_hundred() {
        assert_eq!(percent(Decimal::new(5, 0)), Decimal::new(5, 2));
    }
}

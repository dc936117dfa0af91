//! Settlement quote computation.
//!
//! ```text
//! base        = round(weight × unit_price)
//! deduction   = round(base × impurity / 100)
//! after       = base − deduction
//! bonus       = round(after × rule.bonus_percent / 100)   (0 without a rule)
//! final       = round(after + bonus)
//! ```
//!
//! Every `round` is to two places, midpoint to even. Products are checked;
//! an overflow is reported as invalid input rather than a panic.

use greenrecycle_types::constants::{IMPURITY_SCALE, MAX_MEASURED_WEIGHT_KG, WEIGHT_SCALE};
use greenrecycle_types::{
    PricingRule, PricingRuleId, RecycleError, Result, fits_scale, percent, round_money,
};
use rust_decimal::Decimal;
use tracing::debug;

use crate::select_bonus_rule;

/// Outcome of pricing one measured pickup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceQuote {
    pub base_amount: Decimal,
    pub deduction_amount: Decimal,
    pub bonus_amount: Decimal,
    pub final_amount: Decimal,
    /// The bonus rule that matched, if any.
    pub applied_rule: Option<PricingRuleId>,
}

/// Validate a measurement before it is priced.
///
/// # Errors
/// Returns [`RecycleError::InvalidInput`] if `weight` is not positive, above
/// [`MAX_MEASURED_WEIGHT_KG`] or finer than grams, or if `impurity_percent`
/// lies outside `0..=100` or has more than two decimal places.
pub fn check_measurement(weight: Decimal, impurity_percent: Decimal) -> Result<()> {
    if weight <= Decimal::ZERO {
        return Err(RecycleError::invalid_input(format!(
            "weight must be positive, got {weight}"
        )));
    }
    if weight > Decimal::from(MAX_MEASURED_WEIGHT_KG) {
        return Err(RecycleError::invalid_input(format!(
            "weight {weight} exceeds the {MAX_MEASURED_WEIGHT_KG} kg limit"
        )));
    }
    if !fits_scale(weight, WEIGHT_SCALE) {
        return Err(RecycleError::invalid_input(format!(
            "weight {weight} has more than {WEIGHT_SCALE} decimal places"
        )));
    }
    if impurity_percent < Decimal::ZERO || impurity_percent > Decimal::ONE_HUNDRED {
        return Err(RecycleError::invalid_input(format!(
            "impurity percent must be within 0..=100, got {impurity_percent}"
        )));
    }
    if !fits_scale(impurity_percent, IMPURITY_SCALE) {
        return Err(RecycleError::invalid_input(format!(
            "impurity percent {impurity_percent} has more than {IMPURITY_SCALE} decimal places"
        )));
    }
    Ok(())
}

fn checked(value: Option<Decimal>, what: &str) -> Result<Decimal> {
    value.ok_or_else(|| RecycleError::invalid_input(format!("{what} overflows")))
}

/// Price a measurement against a snapshot unit price and the material's
/// bonus rules.
///
/// Inputs are expected to have passed [`check_measurement`].
///
/// # Errors
/// Returns [`RecycleError::InvalidInput`] if any intermediate figure
/// overflows the decimal range.
pub fn compute(
    unit_price: Decimal,
    weight: Decimal,
    impurity_percent: Decimal,
    rules: &[PricingRule],
) -> Result<PriceQuote> {
    let base_amount = round_money(checked(weight.checked_mul(unit_price), "base amount")?);
    let deduction_amount = round_money(checked(
        base_amount.checked_mul(percent(impurity_percent)),
        "impurity deduction",
    )?);
    let after_deduction = base_amount - deduction_amount;

    let rule = select_bonus_rule(rules, weight);
    let bonus_amount = match rule {
        Some(r) => round_money(checked(
            after_deduction.checked_mul(percent(r.bonus_percent)),
            "bonus",
        )?),
        None => Decimal::ZERO,
    };
    let final_amount = round_money(checked(
        after_deduction.checked_add(bonus_amount),
        "final amount",
    )?);

    debug!(
        %unit_price,
        %weight,
        %impurity_percent,
        %base_amount,
        %deduction_amount,
        %bonus_amount,
        %final_amount,
        rule = ?rule.map(|r| r.id),
        "Priced measurement"
    );

    Ok(PriceQuote {
        base_amount,
        deduction_amount,
        bonus_amount,
        final_amount,
        applied_rule: rule.map(|r| r.id),
    })
}

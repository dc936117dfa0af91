//! Tiered bonus rule selection.

use greenrecycle_types::PricingRule;
use rust_decimal::Decimal;

/// Pick the bonus rule that applies to `weight`.
///
/// Candidates are the rules whose `min_weight` is met. The highest
/// `priority` wins; among equal priorities the lowest rule id (the oldest
/// rule) wins. The input order never matters.
#[must_use]
pub fn select_bonus_rule(rules: &[PricingRule], weight: Decimal) -> Option<&PricingRule> {
    rules
        .iter()
        .filter(|rule| rule.applies_to(weight))
        .min_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)))
}

#[cfg(test)]
mod tests {
    use greenrecycle_types::MaterialId;

    use super::*;

    fn rule(material: MaterialId, min_kg: i64, bonus: i64, priority: i32) -> PricingRule {
        PricingRule::new(
            material,
            format!("{min_kg}kg+"),
            Decimal::from(min_kg),
            Decimal::from(bonus),
            priority,
        )
    }

    #[test]
    fn no_rules_no_bonus() {
        assert!(select_bonus_rule(&[], Decimal::TEN).is_none());
    }

    #[test]
    fn threshold_not_met() {
        let m = MaterialId::new();
        let rules = [rule(m, 20, 5, 1)];
        assert!(select_bonus_rule(&rules, Decimal::new(1999, 2)).is_none());
        assert!(select_bonus_rule(&rules, Decimal::from(20)).is_some());
    }

    #[test]
    fn highest_priority_wins_regardless_of_order() {
        let m = MaterialId::new();
        let low = rule(m, 5, 3, 1);
        let high = rule(m, 5, 8, 9);

        let forward = [low.clone(), high.clone()];
        let backward = [high.clone(), low];
        assert_eq!(select_bonus_rule(&forward, Decimal::TEN).unwrap().id, high.id);
        assert_eq!(select_bonus_rule(&backward, Decimal::TEN).unwrap().id, high.id);
    }

    #[test]
    fn priority_beats_larger_threshold() {
        let m = MaterialId::new();
        let big_threshold = rule(m, 10, 20, 1);
        let small_threshold = rule(m, 1, 2, 5);
        let rules = [big_threshold, small_threshold.clone()];
        assert_eq!(
            select_bonus_rule(&rules, Decimal::from(50)).unwrap().id,
            small_threshold.id
        );
    }

    #[test]
    fn priority_tie_picks_lowest_id() {
        let m = MaterialId::new();
        let older = rule(m, 5, 3, 4);
        let newer = rule(m, 5, 7, 4);
        assert!(older.id < newer.id);

        let rules = [newer, older.clone()];
        assert_eq!(select_bonus_rule(&rules, Decimal::TEN).unwrap().id, older.id);
    }
}

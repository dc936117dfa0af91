//! Randomized checks over the pricing engine.

use greenrecycle_pricing::{check_measurement, compute, select_bonus_rule};
use greenrecycle_types::{MaterialId, PricingRule, round_money};
use rand::Rng;
use rust_decimal::Decimal;

const ROUNDS: usize = 2_000;

fn random_measurement(rng: &mut impl Rng) -> (Decimal, Decimal, Decimal) {
    let price = Decimal::new(rng.gen_range(0..100_000), 2);
    let weight = Decimal::new(rng.gen_range(1..500_000), 3);
    let impurity = Decimal::new(rng.gen_range(0..=10_000), 2);
    (price, weight, impurity)
}

fn random_rules(rng: &mut impl Rng, material: MaterialId) -> Vec<PricingRule> {
    (0..rng.gen_range(0..6))
        .map(|i| {
            PricingRule::new(
                material,
                format!("tier {i}"),
                Decimal::new(rng.gen_range(0..300_000), 3),
                Decimal::new(rng.gen_range(0..2_000), 2),
                rng.gen_range(0..4),
            )
        })
        .collect()
}

#[test]
fn final_amount_is_never_negative() {
    let mut rng = rand::thread_rng();
    let material = MaterialId::new();
    for _ in 0..ROUNDS {
        let (price, weight, impurity) = random_measurement(&mut rng);
        check_measurement(weight, impurity).unwrap();
        let rules = random_rules(&mut rng, material);
        let q = compute(price, weight, impurity, &rules).unwrap();
        assert!(q.final_amount >= Decimal::ZERO, "{price} {weight} {impurity}: {q:?}");
        assert!(q.deduction_amount <= q.base_amount);
    }
}

#[test]
fn amounts_are_stored_precision_and_consistent() {
    let mut rng = rand::thread_rng();
    let material = MaterialId::new();
    for _ in 0..ROUNDS {
        let (price, weight, impurity) = random_measurement(&mut rng);
        let rules = random_rules(&mut rng, material);
        let q = compute(price, weight, impurity, &rules).unwrap();

        for amount in [q.base_amount, q.deduction_amount, q.bonus_amount, q.final_amount] {
            assert_eq!(round_money(amount), amount);
        }
        assert_eq!(q.base_amount, round_money(weight * price));
        assert_eq!(
            q.final_amount,
            q.base_amount - q.deduction_amount + q.bonus_amount
        );
    }
}

#[test]
fn selected_rule_dominates_every_qualifying_rule() {
    let mut rng = rand::thread_rng();
    let material = MaterialId::new();
    for _ in 0..ROUNDS {
        let weight = Decimal::new(rng.gen_range(1..300_000), 3);
        let mut rules = random_rules(&mut rng, material);
        let Some(chosen) = select_bonus_rule(&rules, weight).cloned() else {
            assert!(rules.iter().all(|r| r.min_weight > weight));
            continue;
        };
        for rule in rules.iter().filter(|r| r.min_weight <= weight) {
            assert!(
                rule.priority < chosen.priority
                    || (rule.priority == chosen.priority && rule.id >= chosen.id)
            );
        }

        rules.reverse();
        assert_eq!(select_bonus_rule(&rules, weight).unwrap().id, chosen.id);
    }
}

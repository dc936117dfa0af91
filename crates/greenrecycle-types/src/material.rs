//! Catalog types: materials, tiered bonus rules and per-material inventory.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{MaterialId, PricingRuleId};

/// A recyclable material with an admin-set price per kilogram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    pub id: MaterialId,
    pub name: String,
    pub category: String,
    /// Current price per kg. Orders snapshot this at creation.
    pub current_price: Decimal,
}

impl Material {
    #[must_use]
    pub fn new(name: impl Into<String>, category: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: MaterialId::new(),
            name: name.into(),
            category: category.into(),
            current_price: price,
        }
    }
}

/// Weight-threshold bonus. Among rules whose `min_weight` is met, the
/// highest `priority` wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingRule {
    pub id: PricingRuleId,
    pub material_id: MaterialId,
    pub name: String,
    pub min_weight: Decimal,
    pub bonus_percent: Decimal,
    pub priority: i32,
}

impl PricingRule {
    #[must_use]
    pub fn new(
        material_id: MaterialId,
        name: impl Into<String>,
        min_weight: Decimal,
        bonus_percent: Decimal,
        priority: i32,
    ) -> Self {
        Self {
            id: PricingRuleId::new(),
            material_id,
            name: name.into(),
            min_weight,
            bonus_percent,
            priority,
        }
    }

    #[must_use]
    pub fn applies_to(&self, weight: Decimal) -> bool {
        self.min_weight <= weight
    }
}

/// Stock on hand for one material. Grows with every settlement; shrinks only
/// through an explicit outbound action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub material_id: MaterialId,
    pub weight: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl InventoryEntry {
    #[must_use]
    pub fn empty(material_id: MaterialId) -> Self {
        Self {
            material_id,
            weight: Decimal::ZERO,
            updated_at: Utc::now(),
        }
    }

    pub fn add(&mut self, weight: Decimal) {
        self.weight += weight;
        self.updated_at = Utc::now();
    }
}

//! Material stock: read and admin outbound.
//!
//! Settlement is the only thing that adds stock; [`InventoryDesk::outbound`]
//! is the only thing that removes it.

use std::sync::Arc;

use greenrecycle_types::constants::WEIGHT_SCALE;
use greenrecycle_types::{
    AuditAction, AuditRecord, InventoryEntry, MaterialId, RecycleError, Result, fits_scale,
};
use rust_decimal::Decimal;
use tracing::info;

use crate::store::LedgerStore;

pub struct InventoryDesk {
    store: Arc<dyn LedgerStore>,
}

impl InventoryDesk {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Current stock; zero if the material has never been settled.
    pub async fn stock(&self, material_id: MaterialId) -> Result<Decimal> {
        let mut tx = self.store.begin().await?;
        Ok(tx
            .inventory_for_update(material_id)
            .await?
            .map_or(Decimal::ZERO, |entry| entry.weight))
    }

    /// Remove `weight` kilograms from stock.
    ///
    /// # Errors
    /// - `InvalidInput` if `weight` is not positive or finer than grams
    /// - `InsufficientInventory` if less than `weight` is on hand
    pub async fn outbound(
        &self,
        material_id: MaterialId,
        weight: Decimal,
        notes: Option<&str>,
    ) -> Result<InventoryEntry> {
        if weight <= Decimal::ZERO {
            return Err(RecycleError::invalid_input(format!(
                "outbound weight must be positive, got {weight}"
            )));
        }
        if !fits_scale(weight, WEIGHT_SCALE) {
            return Err(RecycleError::invalid_input(format!(
                "outbound weight {weight} has more than {WEIGHT_SCALE} decimal places"
            )));
        }

        let mut tx = self.store.begin().await?;
        let mut entry = tx
            .inventory_for_update(material_id)
            .await?
            .unwrap_or_else(|| InventoryEntry::empty(material_id));
        if entry.weight < weight {
            return Err(RecycleError::InsufficientInventory {
                material_id,
                needed: weight,
                available: entry.weight,
            });
        }

        let before = entry.weight;
        entry.add(-weight);
        tx.upsert_inventory(&entry).await?;

        let remaining = match notes {
            Some(notes) => format!("{} ({notes})", entry.weight),
            None => entry.weight.to_string(),
        };
        tx.append_audit(
            AuditRecord::inventory(material_id, AuditAction::Outbound)
                .old_value(before.to_string())
                .new_value(remaining),
        )
        .await?;
        tx.commit().await?;

        info!(%material_id, %weight, remaining = %entry.weight, "Inventory outbound");
        Ok(entry)
    }
}

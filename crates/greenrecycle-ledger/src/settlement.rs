//! Order settlement.
//!
//! Settling a scheduled order, in one transaction:
//! 1. Lock the order and re-check `scheduled → completed`
//! 2. Backfill a missing price snapshot from the material
//! 3. Price the measurement
//! 4. Complete the order with the settled figures
//! 5. Credit the owner's balance and points
//! 6. Credit the collector's commission
//! 7. Add the weight to the material's inventory
//! 8. Append the `completed` audit entry
//!
//! If any step fails the transaction is dropped and nothing is written.
//! The owner is notified after commit.

use std::sync::Arc;

use greenrecycle_pricing::{check_measurement, compute};
use greenrecycle_types::{
    AuditAction, AuditRecord, InventoryEntry, LedgerConfig, Notification, OperatorType, Order,
    OrderId, OrderStatus, RecycleError, Result, SettledFigures, round_money,
};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::{info, warn};

use crate::notify::{NotificationSender, deliver};
use crate::store::LedgerStore;

/// Drives scheduled orders through completion.
pub struct SettlementOrchestrator {
    store: Arc<dyn LedgerStore>,
    notifier: Arc<dyn NotificationSender>,
    config: LedgerConfig,
}

impl SettlementOrchestrator {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        notifier: Arc<dyn NotificationSender>,
        config: LedgerConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    /// Settle `order_id` with the measured weight and impurity.
    ///
    /// # Errors
    /// - `InvalidInput` if the measurement is out of range
    /// - `OrderNotFound` if the order does not exist
    /// - `InvalidOrderTransition` unless the order is `scheduled`
    /// - `UserNotFound` / `CollectorNotFound` / `MaterialNotFound` if a row
    ///   the settlement must touch is missing (nothing is written)
    pub async fn settle(
        &self,
        order_id: OrderId,
        weight: Decimal,
        impurity_percent: Decimal,
    ) -> Result<Order> {
        check_measurement(weight, impurity_percent)?;

        let mut tx = self.store.begin().await?;

        // 1. Lock and re-validate
        let mut order = tx
            .order_for_update(order_id)
            .await?
            .ok_or(RecycleError::OrderNotFound(order_id))?;
        order.ensure_transition(OrderStatus::Completed)?;

        // 2. Price snapshot
        let unit_price = if let Some(price) = order.unit_price_snapshot {
            price
        } else {
            let material = tx
                .material(order.material_id)
                .await?
                .ok_or(RecycleError::MaterialNotFound(order.material_id))?;
            warn!(
                %order_id,
                price = %material.current_price,
                "Order has no price snapshot; using current material price"
            );
            order.unit_price_snapshot = Some(material.current_price);
            material.current_price
        };

        // 3. Price
        let rules = tx.pricing_rules(order.material_id).await?;
        let quote = compute(unit_price, weight, impurity_percent, &rules)?;

        // 4. Order
        order.complete(SettledFigures {
            weight,
            impurity_percent,
            bonus_amount: quote.bonus_amount,
            final_amount: quote.final_amount,
        })?;
        tx.update_order(&order).await?;

        // 5. Owner
        let points = self.points_for(weight)?;
        let mut user = tx
            .user_for_update(order.user_id)
            .await?
            .ok_or(RecycleError::UserNotFound(order.user_id))?;
        user.credit(quote.final_amount);
        user.points += points;
        tx.update_user(&user).await?;

        // 6. Collector commission
        let commission = match order.collector_id {
            Some(collector_id) => {
                let mut collector = tx
                    .collector_for_update(collector_id)
                    .await?
                    .ok_or(RecycleError::CollectorNotFound(collector_id))?;
                let commission = quote
                    .final_amount
                    .checked_mul(self.config.commission_rate)
                    .map(round_money)
                    .ok_or_else(|| RecycleError::invalid_input("commission overflows"))?;
                collector.credit(commission);
                tx.update_collector(&collector).await?;
                commission
            }
            None => Decimal::ZERO,
        };

        // 7. Inventory
        let mut stock = tx
            .inventory_for_update(order.material_id)
            .await?
            .unwrap_or_else(|| InventoryEntry::empty(order.material_id));
        stock.add(weight);
        tx.upsert_inventory(&stock).await?;

        // 8. Audit
        let settled = serde_json::json!({
            "weight": weight.to_string(),
            "impurity_percent": impurity_percent.to_string(),
            "bonus": quote.bonus_amount.to_string(),
            "amount": quote.final_amount.to_string(),
        });
        tx.append_audit(
            AuditRecord::order(order_id, AuditAction::Completed, OperatorType::Collector)
                .by_collector(order.collector_id)
                .old_value(OrderStatus::Scheduled.as_str())
                .new_value(settled.to_string()),
        )
        .await?;

        tx.commit().await?;

        info!(
            %order_id,
            user_id = %order.user_id,
            %weight,
            final_amount = %quote.final_amount,
            %commission,
            points,
            "Order settled"
        );

        deliver(
            self.notifier.as_ref(),
            vec![Notification::order(
                order.user_id,
                order_id,
                "Order completed",
                format!(
                    "Your recycling order is complete: {weight} kg settled for {}, {points} points earned.",
                    quote.final_amount
                ),
            )],
        )
        .await;

        Ok(order)
    }

    /// Whole loyalty points for `weight`, fractions truncated.
    fn points_for(&self, weight: Decimal) -> Result<i64> {
        weight
            .checked_mul(self.config.points_per_kg)
            .and_then(|points| points.trunc().to_i64())
            .ok_or_else(|| {
                RecycleError::invalid_input(format!("points overflow for weight {weight}"))
            })
    }
}

//! Order lifecycle before settlement: creation, claim/assign, cancellation.
//!
//! Every method locks the order row first, re-checks the transition table
//! on the locked copy, and commits the status change together with its
//! audit entry. Two concurrent claims therefore serialize on the row lock;
//! the second sees `scheduled` and fails with an invalid-state error.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use greenrecycle_types::{
    AuditAction, AuditRecord, CollectorId, MaterialId, Notification, OperatorType, Order, OrderId,
    OrderStatus, RecycleError, Result, UserId,
};
use tracing::info;

use crate::notify::{NotificationSender, deliver};
use crate::store::LedgerStore;

/// Who moved a pending order to `scheduled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScheduledBy {
    Collector,
    Admin,
}

pub struct OrderDesk {
    store: Arc<dyn LedgerStore>,
    notifier: Arc<dyn NotificationSender>,
}

impl OrderDesk {
    pub fn new(store: Arc<dyn LedgerStore>, notifier: Arc<dyn NotificationSender>) -> Self {
        Self { store, notifier }
    }

    /// Create a pending order, snapshotting the material's current price.
    pub async fn create_order(
        &self,
        user_id: UserId,
        material_id: MaterialId,
        address: &str,
        appointment_time: Option<DateTime<Utc>>,
    ) -> Result<Order> {
        if address.trim().is_empty() {
            return Err(RecycleError::invalid_input("address must not be empty"));
        }

        let mut tx = self.store.begin().await?;
        if tx.user(user_id).await?.is_none() {
            return Err(RecycleError::UserNotFound(user_id));
        }
        let material = tx
            .material(material_id)
            .await?
            .ok_or(RecycleError::MaterialNotFound(material_id))?;

        let order = Order::new_pending(
            user_id,
            material_id,
            material.current_price,
            address,
            appointment_time,
        );
        tx.insert_order(&order).await?;
        tx.append_audit(
            AuditRecord::order(order.id, AuditAction::Created, OperatorType::User)
                .new_value(OrderStatus::Pending.as_str())
                .by_user(user_id),
        )
        .await?;
        tx.commit().await?;

        info!(
            order_id = %order.id,
            %user_id,
            unit_price = %material.current_price,
            "Order created"
        );
        Ok(order)
    }

    /// A collector takes a pending order. The owner is notified.
    pub async fn claim_order(&self, order_id: OrderId, collector_id: CollectorId) -> Result<Order> {
        self.schedule(order_id, collector_id, ScheduledBy::Collector)
            .await
    }

    /// An admin assigns a pending order to a collector.
    pub async fn assign_order(
        &self,
        order_id: OrderId,
        collector_id: CollectorId,
    ) -> Result<Order> {
        self.schedule(order_id, collector_id, ScheduledBy::Admin).await
    }

    async fn schedule(
        &self,
        order_id: OrderId,
        collector_id: CollectorId,
        by: ScheduledBy,
    ) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        let mut order = tx
            .order_for_update(order_id)
            .await?
            .ok_or(RecycleError::OrderNotFound(order_id))?;
        order.ensure_transition(OrderStatus::Scheduled)?;
        if tx.collector_for_update(collector_id).await?.is_none() {
            return Err(RecycleError::CollectorNotFound(collector_id));
        }

        let old = order.status;
        order.schedule(collector_id)?;
        tx.update_order(&order).await?;

        let record = match by {
            ScheduledBy::Collector => {
                AuditRecord::order(order_id, AuditAction::Claimed, OperatorType::Collector)
                    .by_collector(Some(collector_id))
            }
            ScheduledBy::Admin => {
                AuditRecord::order(order_id, AuditAction::Assigned, OperatorType::Admin)
            }
        };
        tx.append_audit(
            record
                .old_value(old.as_str())
                .new_value(order.status.as_str()),
        )
        .await?;
        tx.commit().await?;

        info!(%order_id, %collector_id, by = ?by, "Order scheduled");

        if by == ScheduledBy::Collector {
            deliver(
                self.notifier.as_ref(),
                vec![Notification::order(
                    order.user_id,
                    order_id,
                    "Order accepted",
                    "A collector has accepted your recycling order and will arrive at the appointed time.",
                )],
            )
            .await;
        }
        Ok(order)
    }

    /// The owner cancels a pending order.
    pub async fn cancel_order(&self, order_id: OrderId, user_id: UserId) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        let mut order = tx
            .order_for_update(order_id)
            .await?
            .ok_or(RecycleError::OrderNotFound(order_id))?;
        if order.user_id != user_id {
            return Err(RecycleError::NotOwner {
                entity: order_id.to_string(),
                user_id,
            });
        }

        let old = order.status;
        order.cancel()?;
        tx.update_order(&order).await?;
        tx.append_audit(
            AuditRecord::order(order_id, AuditAction::Cancelled, OperatorType::User)
                .old_value(old.as_str())
                .new_value(order.status.as_str())
                .by_user(user_id),
        )
        .await?;
        tx.commit().await?;

        info!(%order_id, %user_id, "Order cancelled by owner");
        Ok(order)
    }
}

//! Expiry sweeps for stale orders and stale withdrawals.
//!
//! A sweep reads the candidate ids in one short transaction, then handles
//! each record in its own transaction:
//!
//! ```text
//! scan ids ──▶ for id:  lock ─▶ still stale? ─▶ mutate + audit ─▶ commit ─▶ notify
//!                          │           │ no
//!                          │           └──▶ skip (someone got there first)
//!                          └── error ──▶ log, continue with next id
//! ```
//!
//! Re-checking staleness on the locked row is what keeps a sweep from
//! cancelling an order a collector claimed after the scan.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use greenrecycle_types::{
    AuditAction, AuditRecord, LedgerConfig, Notification, OperatorType, OrderId, OrderStatus,
    RecycleError, Result, WithdrawalId, WithdrawalStatus,
};
use tracing::{debug, info, warn};

use crate::notify::{NotificationSender, deliver};
use crate::scheduler::Shutdown;
use crate::store::LedgerStore;
use crate::withdrawal::{lock_withdrawal, refund_pending};

pub struct ExpirySweeper {
    store: Arc<dyn LedgerStore>,
    notifier: Arc<dyn NotificationSender>,
    config: LedgerConfig,
}

impl ExpirySweeper {
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

    /// Cancel every order pending for longer than the configured age.
    /// Returns how many were cancelled.
    pub async fn sweep_expired_orders(&self) -> Result<usize> {
        self.sweep_expired_orders_at(Utc::now(), &Shutdown::never())
            .await
    }

    /// Refund every withdrawal pending for longer than the configured age.
    /// Returns how many were refunded.
    pub async fn sweep_expired_withdrawals(&self) -> Result<usize> {
        self.sweep_expired_withdrawals_at(Utc::now(), &Shutdown::never())
            .await
    }

    pub async fn sweep_expired_orders_until(&self, shutdown: &Shutdown) -> Result<usize> {
        self.sweep_expired_orders_at(Utc::now(), shutdown).await
    }

    pub async fn sweep_expired_withdrawals_until(&self, shutdown: &Shutdown) -> Result<usize> {
        self.sweep_expired_withdrawals_at(Utc::now(), shutdown).await
    }

    /// Order sweep against an explicit clock. Stops between records once
    /// `shutdown` is signalled.
    pub async fn sweep_expired_orders_at(
        &self,
        now: DateTime<Utc>,
        shutdown: &Shutdown,
    ) -> Result<usize> {
        let cutoff = now - self.config.order_sweep.max_age();
        let ids = {
            let mut tx = self.store.begin().await?;
            tx.stale_order_ids(cutoff).await?
        };

        let mut cancelled = 0;
        for order_id in ids {
            if shutdown.is_signalled() {
                debug!("Order sweep interrupted by shutdown");
                break;
            }
            match self.expire_order(order_id, now).await {
                Ok(true) => cancelled += 1,
                Ok(false) => {}
                Err(e) => warn!(%order_id, error = %e, "Failed to expire order"),
            }
        }

        if cancelled > 0 {
            info!(count = cancelled, %cutoff, "Expired stale orders");
        }
        Ok(cancelled)
    }

    /// Withdrawal sweep against an explicit clock.
    pub async fn sweep_expired_withdrawals_at(
        &self,
        now: DateTime<Utc>,
        shutdown: &Shutdown,
    ) -> Result<usize> {
        let cutoff = now - self.config.withdrawal_sweep.max_age();
        let ids = {
            let mut tx = self.store.begin().await?;
            tx.stale_withdrawal_ids(cutoff).await?
        };

        let mut refunded = 0;
        for withdrawal_id in ids {
            if shutdown.is_signalled() {
                debug!("Withdrawal sweep interrupted by shutdown");
                break;
            }
            match self.expire_withdrawal(withdrawal_id, now).await {
                Ok(true) => refunded += 1,
                Ok(false) => {}
                Err(e) => warn!(%withdrawal_id, error = %e, "Failed to expire withdrawal"),
            }
        }

        if refunded > 0 {
            info!(count = refunded, %cutoff, "Expired stale withdrawals");
        }
        Ok(refunded)
    }

    async fn expire_order(&self, order_id: OrderId, now: DateTime<Utc>) -> Result<bool> {
        let cutoff = now - self.config.order_sweep.max_age();
        let mut tx = self.store.begin().await?;
        let mut order = tx
            .order_for_update(order_id)
            .await?
            .ok_or(RecycleError::OrderNotFound(order_id))?;
        if !order.is_stale(cutoff) {
            debug!(%order_id, status = %order.status, "Order no longer stale");
            return Ok(false);
        }

        order.cancel()?;
        tx.update_order(&order).await?;
        tx.append_audit(
            AuditRecord::order(order_id, AuditAction::Expired, OperatorType::System)
                .old_value(OrderStatus::Pending.as_str())
                .new_value(OrderStatus::Cancelled.as_str()),
        )
        .await?;
        tx.commit().await?;

        deliver(
            self.notifier.as_ref(),
            vec![Notification::order(
                order.user_id,
                order_id,
                "Order cancelled automatically",
                format!(
                    "No collector accepted your order within {} hours, so it has been cancelled.",
                    self.config.order_sweep.max_age_hours
                ),
            )],
        )
        .await;
        Ok(true)
    }

    async fn expire_withdrawal(
        &self,
        withdrawal_id: WithdrawalId,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let cutoff = now - self.config.withdrawal_sweep.max_age();
        let mut tx = self.store.begin().await?;
        let withdrawal = lock_withdrawal(tx.as_mut(), withdrawal_id).await?;
        if !withdrawal.is_stale(cutoff) {
            debug!(%withdrawal_id, status = %withdrawal.status, "Withdrawal no longer stale");
            return Ok(false);
        }

        let withdrawal = refund_pending(
            tx.as_mut(),
            withdrawal,
            AuditRecord::withdrawal(withdrawal_id, AuditAction::Expired, OperatorType::System)
                .old_value(WithdrawalStatus::Pending.as_str())
                .new_value(WithdrawalStatus::Rejected.as_str()),
        )
        .await?;
        tx.commit().await?;

        deliver(
            self.notifier.as_ref(),
            vec![Notification::withdrawal(
                withdrawal.user_id,
                withdrawal_id,
                "Withdrawal expired",
                format!(
                    "Your withdrawal of {} was not processed within {} hours. \
                     The amount has been returned to your balance.",
                    withdrawal.amount, self.config.withdrawal_sweep.max_age_hours
                ),
            )],
        )
        .await;
        Ok(true)
    }
}

//! Withdrawal ledger.
//!
//! Funds leave the spendable balance when a withdrawal is requested
//! (reservation). Approval consumes the reservation without touching any
//! balance; rejection refunds it to the owning user. For every user
//!
//! ```text
//! balance + Σ pending withdrawal amounts
//! ```
//!
//! is therefore unchanged by request, approve and reject (see
//! [`crate::conservation`]).

use std::sync::Arc;

use greenrecycle_types::{
    AuditAction, AuditRecord, CollectorId, LedgerConfig, Notification, OperatorType, OrderId,
    OrderStatus, RecycleError, Result, UserId, Withdrawal, WithdrawalId, WithdrawalStatus,
    has_money_scale,
};
use rust_decimal::Decimal;
use tracing::info;

use crate::conservation::FundsPosition;
use crate::notify::{NotificationSender, deliver};
use crate::store::{LedgerStore, LedgerTx};

pub struct WithdrawalLedger {
    store: Arc<dyn LedgerStore>,
    notifier: Arc<dyn NotificationSender>,
    config: LedgerConfig,
}

impl WithdrawalLedger {
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

    fn check_amount(&self, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(RecycleError::invalid_input(format!(
                "withdrawal amount must be positive, got {amount}"
            )));
        }
        if !has_money_scale(amount) {
            return Err(RecycleError::invalid_input(format!(
                "withdrawal amount {amount} has more than two decimal places"
            )));
        }
        if amount > self.config.max_withdrawal_amount {
            return Err(RecycleError::WithdrawalLimitExceeded {
                amount,
                limit: self.config.max_withdrawal_amount,
            });
        }
        Ok(())
    }

    /// Reserve `amount` from a user's balance, optionally linked to one of
    /// their completed orders.
    ///
    /// # Errors
    /// - `WithdrawalLimitExceeded` above the configured ceiling
    /// - `InsufficientBalance` if the balance is below `amount`, reported
    ///   ahead of any problem with the order link
    /// - `OrderNotFound` / `NotOwner` / `OrderNotCompleted` / `OrderAlreadyWithdrawn`
    ///   for a bad order link
    pub async fn request_user_withdrawal(
        &self,
        user_id: UserId,
        amount: Decimal,
        channel: &str,
        order_id: Option<OrderId>,
    ) -> Result<Withdrawal> {
        self.check_amount(amount)?;

        let mut tx = self.store.begin().await?;

        // Lock order before user; the link is judged after the balance.
        let linked = match order_id {
            Some(order_id) => Some((order_id, tx.order_for_update(order_id).await?)),
            None => None,
        };

        let mut user = tx
            .user_for_update(user_id)
            .await?
            .ok_or(RecycleError::UserNotFound(user_id))?;
        user.debit(amount)?;

        if let Some((order_id, order)) = linked {
            let order = order.ok_or(RecycleError::OrderNotFound(order_id))?;
            if order.user_id != user_id {
                return Err(RecycleError::NotOwner {
                    entity: order_id.to_string(),
                    user_id,
                });
            }
            if order.status != OrderStatus::Completed {
                return Err(RecycleError::OrderNotCompleted {
                    order_id,
                    status: order.status,
                });
            }
            if tx.withdrawal_for_order(order_id).await?.is_some() {
                return Err(RecycleError::OrderAlreadyWithdrawn(order_id));
            }
        }
        tx.update_user(&user).await?;

        let withdrawal = Withdrawal::new_pending(user_id, None, order_id, amount, channel);
        tx.insert_withdrawal(&withdrawal).await?;
        tx.append_audit(
            AuditRecord::withdrawal(withdrawal.id, AuditAction::Created, OperatorType::User)
                .new_value(amount.to_string())
                .by_user(user_id),
        )
        .await?;
        tx.commit().await?;

        info!(
            withdrawal_id = %withdrawal.id,
            %user_id,
            %amount,
            order_id = ?order_id,
            "User withdrawal requested"
        );
        Ok(withdrawal)
    }

    /// Reserve `amount` from a collector's commission wallet. The withdrawal
    /// is owned by the collector's linked user account.
    ///
    /// # Errors
    /// - `CollectorWithoutUser` if no user account is linked
    /// - `InsufficientBalance` if the wallet is below `amount`
    pub async fn request_collector_withdrawal(
        &self,
        collector_id: CollectorId,
        amount: Decimal,
        channel: &str,
    ) -> Result<Withdrawal> {
        self.check_amount(amount)?;

        let mut tx = self.store.begin().await?;
        let mut collector = tx
            .collector_for_update(collector_id)
            .await?
            .ok_or(RecycleError::CollectorNotFound(collector_id))?;
        collector.debit(amount)?;
        let user_id = collector
            .user_id
            .ok_or(RecycleError::CollectorWithoutUser(collector_id))?;
        if tx.user(user_id).await?.is_none() {
            return Err(RecycleError::UserNotFound(user_id));
        }
        tx.update_collector(&collector).await?;

        let withdrawal =
            Withdrawal::new_pending(user_id, Some(collector_id), None, amount, channel);
        tx.insert_withdrawal(&withdrawal).await?;
        tx.append_audit(
            AuditRecord::withdrawal(withdrawal.id, AuditAction::Created, OperatorType::Collector)
                .new_value(format!("collector commission withdrawal {amount}"))
                .by_collector(Some(collector_id)),
        )
        .await?;
        tx.commit().await?;

        info!(
            withdrawal_id = %withdrawal.id,
            %collector_id,
            %user_id,
            %amount,
            "Collector withdrawal requested"
        );
        Ok(withdrawal)
    }

    /// Approve a pending withdrawal. Balances are unchanged.
    pub async fn approve_withdrawal(&self, withdrawal_id: WithdrawalId) -> Result<Withdrawal> {
        let mut tx = self.store.begin().await?;
        let mut withdrawal = lock_withdrawal(tx.as_mut(), withdrawal_id).await?;
        withdrawal.transition(WithdrawalStatus::Approved)?;
        tx.update_withdrawal(&withdrawal).await?;
        tx.append_audit(
            AuditRecord::withdrawal(withdrawal_id, AuditAction::Approved, OperatorType::Admin)
                .old_value(WithdrawalStatus::Pending.as_str())
                .new_value(WithdrawalStatus::Approved.as_str()),
        )
        .await?;
        tx.commit().await?;

        info!(%withdrawal_id, amount = %withdrawal.amount, "Withdrawal approved");
        deliver(
            self.notifier.as_ref(),
            vec![Notification::withdrawal(
                withdrawal.user_id,
                withdrawal_id,
                "Withdrawal approved",
                format!(
                    "Your withdrawal of {} has been approved and is on its way.",
                    withdrawal.amount
                ),
            )],
        )
        .await;
        Ok(withdrawal)
    }

    /// Reject a pending withdrawal and refund the owning user.
    pub async fn reject_withdrawal(
        &self,
        withdrawal_id: WithdrawalId,
        reason: &str,
    ) -> Result<Withdrawal> {
        let mut tx = self.store.begin().await?;
        let withdrawal = lock_withdrawal(tx.as_mut(), withdrawal_id).await?;
        let withdrawal = refund_pending(
            tx.as_mut(),
            withdrawal,
            AuditRecord::withdrawal(withdrawal_id, AuditAction::Rejected, OperatorType::Admin)
                .old_value(WithdrawalStatus::Pending.as_str())
                .new_value(reason),
        )
        .await?;
        tx.commit().await?;

        info!(%withdrawal_id, amount = %withdrawal.amount, reason, "Withdrawal rejected");
        deliver(
            self.notifier.as_ref(),
            vec![Notification::withdrawal(
                withdrawal.user_id,
                withdrawal_id,
                "Withdrawal rejected",
                format!(
                    "Your withdrawal of {} was rejected: {reason}. The amount has been returned to your balance.",
                    withdrawal.amount
                ),
            )],
        )
        .await;
        Ok(withdrawal)
    }

    /// The user's balance plus their pending reservations.
    pub async fn funds_position(&self, user_id: UserId) -> Result<FundsPosition> {
        let mut tx = self.store.begin().await?;
        let user = tx
            .user(user_id)
            .await?
            .ok_or(RecycleError::UserNotFound(user_id))?;
        let reserved = tx.pending_withdrawal_total(user_id).await?;
        Ok(FundsPosition {
            user_id,
            balance: user.balance,
            reserved,
        })
    }
}

pub(crate) async fn lock_withdrawal(
    tx: &mut dyn LedgerTx,
    withdrawal_id: WithdrawalId,
) -> Result<Withdrawal> {
    tx.withdrawal_for_update(withdrawal_id)
        .await?
        .ok_or(RecycleError::WithdrawalNotFound(withdrawal_id))
}

/// Move a locked pending withdrawal to `rejected`, refund the owning user
/// and append `audit`. Shared by admin rejection and the expiry sweep.
pub(crate) async fn refund_pending(
    tx: &mut dyn LedgerTx,
    mut withdrawal: Withdrawal,
    audit: AuditRecord,
) -> Result<Withdrawal> {
    withdrawal.transition(WithdrawalStatus::Rejected)?;

    let mut user = tx
        .user_for_update(withdrawal.user_id)
        .await?
        .ok_or(RecycleError::UserNotFound(withdrawal.user_id))?;
    user.credit(withdrawal.amount);

    tx.update_withdrawal(&withdrawal).await?;
    tx.update_user(&user).await?;
    tx.append_audit(audit).await?;
    Ok(withdrawal)
}

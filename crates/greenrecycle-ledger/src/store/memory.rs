//! In-process ledger store.
//!
//! One async mutex guards the whole state. A transaction holds the lock for
//! its lifetime and mutates a private copy, which replaces the shared state
//! on commit. Transactions are therefore fully serialized, and dropping one
//! discards every change it made.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use greenrecycle_types::{
    AuditEntry, AuditRecord, Collector, CollectorId, EntityType, GENESIS_HASH, InventoryEntry,
    Material, MaterialId, Order, OrderId, OrderStatus, PricingRule, PricingRuleId, RecycleError,
    Result, User, UserId, Withdrawal, WithdrawalId, WithdrawalStatus,
};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{LedgerStore, LedgerTx};

#[derive(Debug, Clone, Default)]
struct State {
    users: HashMap<UserId, User>,
    collectors: HashMap<CollectorId, Collector>,
    materials: HashMap<MaterialId, Material>,
    rules: HashMap<PricingRuleId, PricingRule>,
    inventory: HashMap<MaterialId, InventoryEntry>,
    orders: HashMap<OrderId, Order>,
    withdrawals: HashMap<WithdrawalId, Withdrawal>,
    audit: Vec<AuditEntry>,
}

/// Serializable in-memory [`LedgerStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    state: Arc<Mutex<State>>,
}

impl MemoryLedgerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of audit entries committed so far.
    pub async fn audit_len(&self) -> usize {
        self.state.lock().await.audit.len()
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl MemoryLedgerStore {
    /// Overwrite a committed audit entry in place, bypassing the chain.
    pub async fn tamper_audit(&self, seq: u64, new_value: &str) {
        let mut state = self.state.lock().await;
        if let Some(entry) = state.audit.iter_mut().find(|e| e.seq == seq) {
            entry.record.new_value = Some(new_value.to_string());
        }
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryLedgerTx { guard, work }))
    }
}

/// Open transaction over a [`MemoryLedgerStore`].
pub struct MemoryLedgerTx {
    guard: OwnedMutexGuard<State>,
    work: State,
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.work.orders.get(&id).cloned())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        if self.work.orders.contains_key(&order.id) {
            return Err(RecycleError::Storage(format!("duplicate order {}", order.id)));
        }
        self.work.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        let slot = self
            .work
            .orders
            .get_mut(&order.id)
            .ok_or(RecycleError::OrderNotFound(order.id))?;
        *slot = order.clone();
        Ok(())
    }

    async fn stale_order_ids(&mut self, cutoff: DateTime<Utc>) -> Result<Vec<OrderId>> {
        let mut stale: Vec<&Order> = self
            .work
            .orders
            .values()
            .filter(|o| o.status == OrderStatus::Pending && o.created_at < cutoff)
            .collect();
        stale.sort_by_key(|o| (o.created_at, o.id));
        Ok(stale.into_iter().map(|o| o.id).collect())
    }

    async fn user(&mut self, id: UserId) -> Result<Option<User>> {
        Ok(self.work.users.get(&id).cloned())
    }

    async fn user_for_update(&mut self, id: UserId) -> Result<Option<User>> {
        Ok(self.work.users.get(&id).cloned())
    }

    async fn insert_user(&mut self, user: &User) -> Result<()> {
        self.work.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user(&mut self, user: &User) -> Result<()> {
        let slot = self
            .work
            .users
            .get_mut(&user.id)
            .ok_or(RecycleError::UserNotFound(user.id))?;
        *slot = user.clone();
        Ok(())
    }

    async fn collector_for_update(&mut self, id: CollectorId) -> Result<Option<Collector>> {
        Ok(self.work.collectors.get(&id).cloned())
    }

    async fn insert_collector(&mut self, collector: &Collector) -> Result<()> {
        self.work.collectors.insert(collector.id, collector.clone());
        Ok(())
    }

    async fn update_collector(&mut self, collector: &Collector) -> Result<()> {
        let slot = self
            .work
            .collectors
            .get_mut(&collector.id)
            .ok_or(RecycleError::CollectorNotFound(collector.id))?;
        *slot = collector.clone();
        Ok(())
    }

    async fn material(&mut self, id: MaterialId) -> Result<Option<Material>> {
        Ok(self.work.materials.get(&id).cloned())
    }

    async fn upsert_material(&mut self, material: &Material) -> Result<()> {
        self.work.materials.insert(material.id, material.clone());
        Ok(())
    }

    async fn pricing_rules(&mut self, material_id: MaterialId) -> Result<Vec<PricingRule>> {
        let mut rules: Vec<PricingRule> = self
            .work
            .rules
            .values()
            .filter(|r| r.material_id == material_id)
            .cloned()
            .collect();
        rules.sort_by_key(|r| r.id);
        Ok(rules)
    }

    async fn insert_pricing_rule(&mut self, rule: &PricingRule) -> Result<()> {
        if !self.work.materials.contains_key(&rule.material_id) {
            return Err(RecycleError::MaterialNotFound(rule.material_id));
        }
        self.work.rules.insert(rule.id, rule.clone());
        Ok(())
    }

    async fn inventory_for_update(
        &mut self,
        material_id: MaterialId,
    ) -> Result<Option<InventoryEntry>> {
        Ok(self.work.inventory.get(&material_id).cloned())
    }

    async fn upsert_inventory(&mut self, entry: &InventoryEntry) -> Result<()> {
        self.work.inventory.insert(entry.material_id, entry.clone());
        Ok(())
    }

    async fn withdrawal_for_update(&mut self, id: WithdrawalId) -> Result<Option<Withdrawal>> {
        Ok(self.work.withdrawals.get(&id).cloned())
    }

    async fn withdrawal_for_order(&mut self, order_id: OrderId) -> Result<Option<Withdrawal>> {
        Ok(self
            .work
            .withdrawals
            .values()
            .find(|w| w.order_id == Some(order_id))
            .cloned())
    }

    async fn insert_withdrawal(&mut self, withdrawal: &Withdrawal) -> Result<()> {
        if let Some(order_id) = withdrawal.order_id {
            if self.withdrawal_for_order(order_id).await?.is_some() {
                return Err(RecycleError::OrderAlreadyWithdrawn(order_id));
            }
        }
        self.work.withdrawals.insert(withdrawal.id, withdrawal.clone());
        Ok(())
    }

    async fn update_withdrawal(&mut self, withdrawal: &Withdrawal) -> Result<()> {
        let slot = self
            .work
            .withdrawals
            .get_mut(&withdrawal.id)
            .ok_or(RecycleError::WithdrawalNotFound(withdrawal.id))?;
        *slot = withdrawal.clone();
        Ok(())
    }

    async fn stale_withdrawal_ids(&mut self, cutoff: DateTime<Utc>) -> Result<Vec<WithdrawalId>> {
        let mut stale: Vec<&Withdrawal> = self
            .work
            .withdrawals
            .values()
            .filter(|w| w.is_stale(cutoff))
            .collect();
        stale.sort_by_key(|w| (w.requested_at, w.id));
        Ok(stale.into_iter().map(|w| w.id).collect())
    }

    async fn pending_withdrawal_total(&mut self, user_id: UserId) -> Result<Decimal> {
        Ok(self
            .work
            .withdrawals
            .values()
            .filter(|w| w.user_id == user_id && w.status == WithdrawalStatus::Pending)
            .map(|w| w.amount)
            .sum())
    }

    async fn append_audit(&mut self, record: AuditRecord) -> Result<AuditEntry> {
        let (seq, prev_hash) = self
            .work
            .audit
            .last()
            .map_or((1, GENESIS_HASH), |last| (last.seq + 1, last.entry_hash));
        let entry = AuditEntry::seal(record, seq, prev_hash, Utc::now());
        self.work.audit.push(entry.clone());
        Ok(entry)
    }

    async fn audit_for_entity(
        &mut self,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> Result<Vec<AuditEntry>> {
        Ok(self
            .work
            .audit
            .iter()
            .filter(|e| e.record.entity_type == entity_type && e.record.entity_id == entity_id)
            .cloned()
            .collect())
    }

    async fn audit_log(&mut self) -> Result<Vec<AuditEntry>> {
        Ok(self.work.audit.clone())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let Self { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use greenrecycle_types::{AuditAction, OperatorType, verify_chain};

    use super::*;

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let store = MemoryLedgerStore::new();
        let user = User::new("alice");

        let mut tx = store.begin().await.unwrap();
        tx.insert_user(&user).await.unwrap();
        drop(tx);

        let mut tx = store.begin().await.unwrap();
        assert!(tx.user(user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn committed_transaction_is_visible() {
        let store = MemoryLedgerStore::new();
        let user = User::new("alice");

        let mut tx = store.begin().await.unwrap();
        tx.insert_user(&user).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.user(user.id).await.unwrap(), Some(user));
    }

    #[tokio::test]
    async fn duplicate_order_link_rejected() {
        let store = MemoryLedgerStore::new();
        let order_id = OrderId::new();
        let user = UserId::new();

        let mut tx = store.begin().await.unwrap();
        let first = Withdrawal::new_pending(user, None, Some(order_id), Decimal::ONE, "wechat");
        tx.insert_withdrawal(&first).await.unwrap();
        let second = Withdrawal::new_pending(user, None, Some(order_id), Decimal::ONE, "wechat");
        let err = tx.insert_withdrawal(&second).await.unwrap_err();
        assert!(matches!(err, RecycleError::OrderAlreadyWithdrawn(id) if id == order_id));
    }

    #[tokio::test]
    async fn audit_appends_form_a_chain() {
        let store = MemoryLedgerStore::new();
        for _ in 0..3 {
            let mut tx = store.begin().await.unwrap();
            tx.append_audit(AuditRecord::order(
                OrderId::new(),
                AuditAction::Created,
                OperatorType::User,
            ))
            .await
            .unwrap();
            tx.commit().await.unwrap();
        }

        let mut tx = store.begin().await.unwrap();
        let log = tx.audit_log().await.unwrap();
        assert_eq!(log.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![1, 2, 3]);
        verify_chain(&log).unwrap();
    }

    #[tokio::test]
    async fn stale_scan_only_returns_old_pending_orders() {
        let store = MemoryLedgerStore::new();
        let now = Utc::now();
        let mut old = Order::dummy_pending(UserId::new(), MaterialId::new(), Decimal::ONE);
        old.created_at = now - chrono::Duration::hours(30);
        let mut old_scheduled = old.clone();
        old_scheduled.id = OrderId::new();
        old_scheduled.status = OrderStatus::Scheduled;
        let fresh = Order::dummy_pending(UserId::new(), MaterialId::new(), Decimal::ONE);

        let mut tx = store.begin().await.unwrap();
        for order in [&old, &old_scheduled, &fresh] {
            tx.insert_order(order).await.unwrap();
        }
        let cutoff = now - chrono::Duration::hours(24);
        assert_eq!(tx.stale_order_ids(cutoff).await.unwrap(), vec![old.id]);
    }
}

//! Shared fixtures for the ledger integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use greenrecycle_ledger::{Ledger, LedgerStore, LedgerTx, MemoryLedgerStore, NotificationSender};
use greenrecycle_types::{
    Collector, CollectorId, LedgerConfig, Material, MaterialId, Notification, Order, OrderId,
    PricingRule, RecycleError, Result, User, UserId, Withdrawal,
};
use rust_decimal::Decimal;

/// Records every notification it is given.
#[derive(Debug, Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingSender {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.sent().into_iter().map(|n| n.title).collect()
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(&self, notification: Notification) -> Result<()> {
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

/// Fails every delivery.
pub struct FailingSender;

#[async_trait]
impl NotificationSender for FailingSender {
    async fn send(&self, _notification: Notification) -> Result<()> {
        Err(RecycleError::Storage("notification backend down".into()))
    }
}

/// Money from cents.
pub fn money(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// A whole number of kilograms (or percent).
pub fn whole(n: i64) -> Decimal {
    Decimal::new(n, 0)
}

/// Every ledger service over one in-memory store.
pub struct Harness {
    pub store: MemoryLedgerStore,
    pub recorder: Arc<RecordingSender>,
    pub ledger: Ledger,
    pub config: LedgerConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        let store = MemoryLedgerStore::new();
        let recorder = Arc::new(RecordingSender::default());
        let ledger = Ledger::new(Arc::new(store.clone()), recorder.clone(), &config);
        Self {
            store,
            recorder,
            ledger,
            config,
        }
    }

    /// Same store, notifications dropped on the floor.
    pub fn with_failing_notifier(&self) -> Ledger {
        Ledger::new(Arc::new(self.store.clone()), Arc::new(FailingSender), &self.config)
    }

    pub async fn user(&self, balance: Decimal) -> UserId {
        let mut user = User::new("resident");
        user.balance = balance;
        let mut tx = self.store.begin().await.unwrap();
        tx.insert_user(&user).await.unwrap();
        tx.commit().await.unwrap();
        user.id
    }

    pub async fn collector(&self, linked_user: Option<UserId>, balance: Decimal) -> CollectorId {
        let mut collector = Collector::new("collector", linked_user);
        collector.balance = balance;
        let mut tx = self.store.begin().await.unwrap();
        tx.insert_collector(&collector).await.unwrap();
        tx.commit().await.unwrap();
        collector.id
    }

    pub async fn material(&self, price: Decimal) -> MaterialId {
        let material = Material::new("cardboard", "paper", price);
        let mut tx = self.store.begin().await.unwrap();
        tx.upsert_material(&material).await.unwrap();
        tx.commit().await.unwrap();
        material.id
    }

    pub async fn set_price(&self, material_id: MaterialId, price: Decimal) {
        let mut tx = self.store.begin().await.unwrap();
        let mut material = tx.material(material_id).await.unwrap().unwrap();
        material.current_price = price;
        tx.upsert_material(&material).await.unwrap();
        tx.commit().await.unwrap();
    }

    pub async fn rule(&self, material_id: MaterialId, min_weight: Decimal, bonus: Decimal, priority: i32) {
        let rule = PricingRule::new(material_id, "bulk bonus", min_weight, bonus, priority);
        let mut tx = self.store.begin().await.unwrap();
        tx.insert_pricing_rule(&rule).await.unwrap();
        tx.commit().await.unwrap();
    }

    /// A scheduled order for `user`, picked up by `collector`.
    pub async fn scheduled_order(
        &self,
        user_id: UserId,
        material_id: MaterialId,
        collector_id: CollectorId,
    ) -> OrderId {
        let order = self
            .ledger
            .orders
            .create_order(user_id, material_id, "12 Green Street", None)
            .await
            .unwrap();
        self.ledger
            .orders
            .claim_order(order.id, collector_id)
            .await
            .unwrap();
        order.id
    }

    pub async fn insert_order(&self, order: &Order) {
        let mut tx = self.store.begin().await.unwrap();
        tx.insert_order(order).await.unwrap();
        tx.commit().await.unwrap();
    }

    pub async fn insert_withdrawal(&self, withdrawal: &Withdrawal) {
        let mut tx = self.store.begin().await.unwrap();
        tx.insert_withdrawal(withdrawal).await.unwrap();
        tx.commit().await.unwrap();
    }

    pub async fn order(&self, order_id: OrderId) -> Order {
        let mut tx = self.store.begin().await.unwrap();
        tx.order_for_update(order_id).await.unwrap().unwrap()
    }

    pub async fn get_user(&self, user_id: UserId) -> User {
        let mut tx = self.store.begin().await.unwrap();
        tx.user(user_id).await.unwrap().unwrap()
    }

    pub async fn get_collector(&self, collector_id: CollectorId) -> Collector {
        let mut tx = self.store.begin().await.unwrap();
        tx.collector_for_update(collector_id).await.unwrap().unwrap()
    }

    pub async fn get_withdrawal(&self, withdrawal: &Withdrawal) -> Withdrawal {
        let mut tx = self.store.begin().await.unwrap();
        tx.withdrawal_for_update(withdrawal.id)
            .await
            .unwrap()
            .unwrap()
    }
}

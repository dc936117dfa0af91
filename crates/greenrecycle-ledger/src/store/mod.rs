//! Storage seam for the ledger.
//!
//! Every ledger operation runs inside one [`LedgerTx`]. A transaction that
//! is dropped without [`LedgerTx::commit`] is rolled back, so an early `?`
//! return never leaves a partial mutation behind.
//!
//! ## Lock order
//!
//! Rows are locked (`*_for_update`) in this order inside every transaction:
//!
//! ```text
//! order / withdrawal → user → collector → inventory → audit chain head
//! ```
//!
//! Two transactions touching the same rows therefore queue instead of
//! deadlocking, and the second one observes the first one's committed state.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use greenrecycle_types::{
    AuditEntry, AuditRecord, Collector, CollectorId, EntityType, InventoryEntry, Material,
    MaterialId, Order, OrderId, PricingRule, Result, User, UserId, Withdrawal, WithdrawalId,
};
use rust_decimal::Decimal;
use uuid::Uuid;

pub use memory::MemoryLedgerStore;
#[cfg(feature = "postgres")]
pub use postgres::{PgConnectOptions, PgLedgerStore};

/// Opens ledger transactions.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>>;
}

/// One open transaction over the ledger tables.
#[async_trait]
pub trait LedgerTx: Send {
    // --- Orders ---------------------------------------------------------
    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>>;
    async fn insert_order(&mut self, order: &Order) -> Result<()>;
    async fn update_order(&mut self, order: &Order) -> Result<()>;
    /// Pending orders created before `cutoff`, oldest first.
    async fn stale_order_ids(&mut self, cutoff: DateTime<Utc>) -> Result<Vec<OrderId>>;

    // --- Accounts -------------------------------------------------------
    async fn user(&mut self, id: UserId) -> Result<Option<User>>;
    async fn user_for_update(&mut self, id: UserId) -> Result<Option<User>>;
    async fn insert_user(&mut self, user: &User) -> Result<()>;
    async fn update_user(&mut self, user: &User) -> Result<()>;
    async fn collector_for_update(&mut self, id: CollectorId) -> Result<Option<Collector>>;
    async fn insert_collector(&mut self, collector: &Collector) -> Result<()>;
    async fn update_collector(&mut self, collector: &Collector) -> Result<()>;

    // --- Catalog and stock ----------------------------------------------
    async fn material(&mut self, id: MaterialId) -> Result<Option<Material>>;
    async fn upsert_material(&mut self, material: &Material) -> Result<()>;
    async fn pricing_rules(&mut self, material_id: MaterialId) -> Result<Vec<PricingRule>>;
    async fn insert_pricing_rule(&mut self, rule: &PricingRule) -> Result<()>;
    async fn inventory_for_update(
        &mut self,
        material_id: MaterialId,
    ) -> Result<Option<InventoryEntry>>;
    async fn upsert_inventory(&mut self, entry: &InventoryEntry) -> Result<()>;

    // --- Withdrawals ----------------------------------------------------
    async fn withdrawal_for_update(&mut self, id: WithdrawalId) -> Result<Option<Withdrawal>>;
    async fn withdrawal_for_order(&mut self, order_id: OrderId) -> Result<Option<Withdrawal>>;
    /// Fails with `OrderAlreadyWithdrawn` if the linked order already has one.
    async fn insert_withdrawal(&mut self, withdrawal: &Withdrawal) -> Result<()>;
    async fn update_withdrawal(&mut self, withdrawal: &Withdrawal) -> Result<()>;
    /// Pending withdrawals requested before `cutoff`, oldest first.
    async fn stale_withdrawal_ids(&mut self, cutoff: DateTime<Utc>) -> Result<Vec<WithdrawalId>>;
    /// Sum of the user's pending withdrawal amounts.
    async fn pending_withdrawal_total(&mut self, user_id: UserId) -> Result<Decimal>;

    // --- Audit ----------------------------------------------------------
    /// Seal `record` onto the end of the chain.
    async fn append_audit(&mut self, record: AuditRecord) -> Result<AuditEntry>;
    async fn audit_for_entity(
        &mut self,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> Result<Vec<AuditEntry>>;
    /// The whole log in sequence order.
    async fn audit_log(&mut self) -> Result<Vec<AuditEntry>>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

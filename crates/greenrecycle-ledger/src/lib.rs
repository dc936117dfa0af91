//! # greenrecycle-ledger
//!
//! The money-moving side of GreenRecycle: settlement, withdrawals, stock,
//! the audit trail and the expiry sweeps.
//!
//! ## Architecture
//!
//! ```text
//!   OrderDesk ──┐
//!   Settlement ─┤                      ┌─▶ MemoryLedgerStore
//!   Withdrawals ├──▶ dyn LedgerStore ──┤
//!   Inventory ──┤     (one tx per op)  └─▶ PgLedgerStore
//!   Sweeper ────┘
//!        │
//!        └──(after commit)──▶ dyn NotificationSender ──▶ outbox / table
//! ```
//!
//! Every mutating operation runs in a single store transaction that also
//! appends its audit entry, so a state change and its audit record commit
//! or vanish together. Notifications go out only after commit and never
//! fail the operation.

pub mod audit;
pub mod conservation;
pub mod inventory;
pub mod notify;
pub mod orders;
pub mod scheduler;
pub mod settlement;
pub mod store;
pub mod sweeper;
pub mod withdrawal;

use std::sync::Arc;

use greenrecycle_types::LedgerConfig;

pub use audit::AuditTrail;
pub use conservation::FundsPosition;
pub use inventory::InventoryDesk;
pub use notify::{NotificationOutbox, NotificationSender, TracingNotificationSender};
pub use orders::OrderDesk;
pub use scheduler::{Scheduler, Shutdown, ShutdownTrigger};
pub use settlement::SettlementOrchestrator;
pub use store::{LedgerStore, LedgerTx, MemoryLedgerStore};
pub use sweeper::ExpirySweeper;
pub use withdrawal::WithdrawalLedger;

#[cfg(feature = "postgres")]
pub use notify::PgNotificationSender;
#[cfg(feature = "postgres")]
pub use store::{PgConnectOptions, PgLedgerStore};

/// All ledger services wired to one store and one notifier.
pub struct Ledger {
    pub orders: OrderDesk,
    pub settlement: SettlementOrchestrator,
    pub withdrawals: WithdrawalLedger,
    pub inventory: InventoryDesk,
    pub audit: AuditTrail,
    pub sweeper: Arc<ExpirySweeper>,
}

impl Ledger {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        notifier: Arc<dyn NotificationSender>,
        config: &LedgerConfig,
    ) -> Self {
        Self {
            orders: OrderDesk::new(Arc::clone(&store), Arc::clone(&notifier)),
            settlement: SettlementOrchestrator::new(
                Arc::clone(&store),
                Arc::clone(&notifier),
                config.clone(),
            ),
            withdrawals: WithdrawalLedger::new(
                Arc::clone(&store),
                Arc::clone(&notifier),
                config.clone(),
            ),
            inventory: InventoryDesk::new(Arc::clone(&store)),
            audit: AuditTrail::new(Arc::clone(&store)),
            sweeper: Arc::new(ExpirySweeper::new(store, notifier, config.clone())),
        }
    }
}

//! Read side of the audit log: entity history, order timelines, chain
//! verification. Writes happen inside the mutating services' transactions.

use std::sync::Arc;

use greenrecycle_types::{
    AuditEntry, EntityType, OrderId, RecycleError, Result, TimelineStep, order_timeline,
    verify_chain,
};
use tracing::{error, info};
use uuid::Uuid;

use crate::store::LedgerStore;

pub struct AuditTrail {
    store: Arc<dyn LedgerStore>,
}

impl AuditTrail {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Every entry about one entity, oldest first.
    pub async fn history(&self, entity_type: EntityType, entity_id: Uuid) -> Result<Vec<AuditEntry>> {
        let mut tx = self.store.begin().await?;
        tx.audit_for_entity(entity_type, entity_id).await
    }

    /// The order's milestones rebuilt from its audit entries.
    pub async fn order_timeline(&self, order_id: OrderId) -> Result<Vec<TimelineStep>> {
        let mut tx = self.store.begin().await?;
        let order = tx
            .order_for_update(order_id)
            .await?
            .ok_or(RecycleError::OrderNotFound(order_id))?;
        let entries = tx.audit_for_entity(EntityType::Order, order_id.0).await?;
        Ok(order_timeline(&order, &entries))
    }

    /// Recompute the whole hash chain. Returns the number of entries checked.
    pub async fn verify(&self) -> Result<usize> {
        let mut tx = self.store.begin().await?;
        let log = tx.audit_log().await?;
        drop(tx);

        match verify_chain(&log) {
            Ok(()) => {
                info!(entries = log.len(), "Audit chain verified");
                Ok(log.len())
            }
            Err(e) => {
                error!(error = %e, "Audit chain verification failed");
                Err(e)
            }
        }
    }
}

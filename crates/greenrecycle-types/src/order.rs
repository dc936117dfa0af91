//! Order types for the GreenRecycle ledger.
//!
//! ## State Machine
//!
//! ```text
//!   ┌─────────┐  claim/assign  ┌───────────┐  settle   ┌───────────┐
//!   │ PENDING ├───────────────▶│ SCHEDULED ├──────────▶│ COMPLETED │
//!   └────┬────┘                └───────────┘           └───────────┘
//!        │ cancel/expire
//!        ▼
//!   ┌───────────┐
//!   │ CANCELLED │
//!   └───────────┘
//! ```
//!
//! `unit_price_snapshot` is captured at creation and never follows later
//! material price changes. `amount_final` stays `None` until the order is
//! completed and is never recomputed afterwards.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{CollectorId, MaterialId, OrderId, RecycleError, Result, UserId};

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Scheduled,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// The transition table. Anything not listed here is rejected.
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Scheduled | Self::Cancelled) | (Self::Scheduled, Self::Completed)
        )
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Scheduled => "scheduled",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = RecycleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "scheduled" => Ok(Self::Scheduled),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(RecycleError::Serialization(format!(
                "unknown order status {other:?}"
            ))),
        }
    }
}

/// Settlement figures written onto an order when it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettledFigures {
    pub weight: Decimal,
    pub impurity_percent: Decimal,
    pub bonus_amount: Decimal,
    pub final_amount: Decimal,
}

/// A recycling pickup order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub material_id: MaterialId,
    pub collector_id: Option<CollectorId>,
    pub status: OrderStatus,
    pub address: String,
    /// Material price at creation time. `None` only for legacy rows.
    pub unit_price_snapshot: Option<Decimal>,
    pub weight_actual: Option<Decimal>,
    pub impurity_percent: Decimal,
    pub applied_bonus_amount: Decimal,
    pub amount_final: Option<Decimal>,
    pub appointment_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// A fresh pending order with the material price snapshotted.
    #[must_use]
    pub fn new_pending(
        user_id: UserId,
        material_id: MaterialId,
        unit_price: Decimal,
        address: impl Into<String>,
        appointment_time: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: OrderId::new(),
            user_id,
            material_id,
            collector_id: None,
            status: OrderStatus::Pending,
            address: address.into(),
            unit_price_snapshot: Some(unit_price),
            weight_actual: None,
            impurity_percent: Decimal::ZERO,
            applied_bonus_amount: Decimal::ZERO,
            amount_final: None,
            appointment_time,
            created_at: Utc::now(),
        }
    }

    /// Check the transition table without mutating.
    ///
    /// # Errors
    /// Returns [`RecycleError::InvalidOrderTransition`] for any pair not in the table.
    pub fn ensure_transition(&self, target: OrderStatus) -> Result<()> {
        if self.status.can_transition_to(target) {
            Ok(())
        } else {
            Err(RecycleError::InvalidOrderTransition {
                order_id: self.id,
                from: self.status,
                to: target,
            })
        }
    }

    /// pending → scheduled, attaching the collector.
    pub fn schedule(&mut self, collector_id: CollectorId) -> Result<()> {
        self.ensure_transition(OrderStatus::Scheduled)?;
        self.collector_id = Some(collector_id);
        self.status = OrderStatus::Scheduled;
        Ok(())
    }

    /// pending → cancelled.
    pub fn cancel(&mut self) -> Result<()> {
        self.ensure_transition(OrderStatus::Cancelled)?;
        self.status = OrderStatus::Cancelled;
        Ok(())
    }

    /// scheduled → completed, recording the settlement figures once.
    pub fn complete(&mut self, figures: SettledFigures) -> Result<()> {
        self.ensure_transition(OrderStatus::Completed)?;
        if self.amount_final.is_some() {
            return Err(RecycleError::Internal(format!(
                "order {} already carries a final amount",
                self.id
            )));
        }
        self.weight_actual = Some(figures.weight);
        self.impurity_percent = figures.impurity_percent;
        self.applied_bonus_amount = figures.bonus_amount;
        self.amount_final = Some(figures.final_amount);
        self.status = OrderStatus::Completed;
        Ok(())
    }

    /// Whether the order has sat in `pending` since before `cutoff`.
    #[must_use]
    pub fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        self.status == OrderStatus::Pending && self.created_at < cutoff
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Order {
    pub fn dummy_pending(user_id: UserId, material_id: MaterialId, unit_price: Decimal) -> Self {
        Self::new_pending(user_id, material_id, unit_price, "1 Test Road", None)
    }

    pub fn dummy_scheduled(
        user_id: UserId,
        material_id: MaterialId,
        collector_id: CollectorId,
        unit_price: Decimal,
    ) -> Self {
        let mut order = Self::dummy_pending(user_id, material_id, unit_price);
        order.collector_id = Some(collector_id);
        order.status = OrderStatus::Scheduled;
        order
    }
}

//! Withdrawal types.
//!
//! Funds leave the spendable balance when the request is made (reservation).
//! Approval consumes the reservation; rejection returns it.
//!
//! ```text
//!   ┌─────────┐  approve  ┌──────────┐
//!   │ PENDING ├──────────▶│ APPROVED │
//!   └────┬────┘           └──────────┘
//!        │ reject/expire (refund)
//!        ▼
//!   ┌──────────┐
//!   │ REJECTED │
//!   └──────────┘
//! ```

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{CollectorId, OrderId, RecycleError, Result, UserId, WithdrawalId};

/// Lifecycle status of a withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
}

impl WithdrawalStatus {
    /// Transitions are monotonic: only `Pending` may move, and only once.
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!((self, target), (Self::Pending, Self::Approved | Self::Rejected))
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WithdrawalStatus {
    type Err = RecycleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(RecycleError::Serialization(format!(
                "unknown withdrawal status {other:?}"
            ))),
        }
    }
}

/// A withdrawal request. Always owned by a user; `collector_id` is set when
/// the funds came out of a collector's commission wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: WithdrawalId,
    pub user_id: UserId,
    pub collector_id: Option<CollectorId>,
    /// At most one withdrawal may reference a given order.
    pub order_id: Option<OrderId>,
    pub amount: Decimal,
    pub status: WithdrawalStatus,
    /// Payout channel, e.g. `"wechat"` or `"alipay"`.
    pub channel: String,
    pub requested_at: DateTime<Utc>,
}

impl Withdrawal {
    #[must_use]
    pub fn new_pending(
        user_id: UserId,
        collector_id: Option<CollectorId>,
        order_id: Option<OrderId>,
        amount: Decimal,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            id: WithdrawalId::new(),
            user_id,
            collector_id,
            order_id,
            amount,
            status: WithdrawalStatus::Pending,
            channel: channel.into(),
            requested_at: Utc::now(),
        }
    }

    /// Move to `target` if the transition table allows it.
    ///
    /// # Errors
    /// Returns [`RecycleError::InvalidWithdrawalTransition`] otherwise.
    pub fn transition(&mut self, target: WithdrawalStatus) -> Result<()> {
        if !self.status.can_transition_to(target) {
            return Err(RecycleError::InvalidWithdrawalTransition {
                withdrawal_id: self.id,
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        Ok(())
    }

    #[must_use]
    pub fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        self.status == WithdrawalStatus::Pending && self.requested_at < cutoff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> Withdrawal {
        Withdrawal::new_pending(UserId::new(), None, None, Decimal::new(5000, 2), "wechat")
    }

    #[test]
    fn state_transitions_valid() {
        assert!(WithdrawalStatus::Pending.can_transition_to(WithdrawalStatus::Approved));
        assert!(WithdrawalStatus::Pending.can_transition_to(WithdrawalStatus::Rejected));
    }

    #[test]
    fn state_transitions_invalid() {
        use WithdrawalStatus::*;
        assert!(!Approved.can_transition_to(Rejected));
        assert!(!Approved.can_transition_to(Pending));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn double_approve_blocked() {
        let mut w = pending();
        w.transition(WithdrawalStatus::Approved).unwrap();
        let err = w.transition(WithdrawalStatus::Approved).unwrap_err();
        assert!(matches!(
            err,
            RecycleError::InvalidWithdrawalTransition {
                from: WithdrawalStatus::Approved,
                ..
            }
        ));
    }

    #[test]
    fn rejected_cannot_be_approved() {
        let mut w = pending();
        w.transition(WithdrawalStatus::Rejected).unwrap();
        assert!(w.transition(WithdrawalStatus::Approved).is_err());
        assert_eq!(w.status, WithdrawalStatus::Rejected);
    }

    #[test]
    fn serde_uses_lowercase_status() {
        let w = pending();
        let json = serde_json::to_string(&w).unwrap();
        assert!(json.contains("\"status\":\"pending\""), "{json}");
        let back: Withdrawal = serde_json::from_str(&json).unwrap();
        assert_eq!(back, w);
    }
}

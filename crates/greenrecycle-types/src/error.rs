//! Error types for the GreenRecycle ledger.
//!
//! All errors use the `GR_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by kind:
//! - 1xx: Not found
//! - 2xx: Invalid lifecycle state
//! - 3xx: Insufficient funds / stock
//! - 4xx: Limits
//! - 5xx: Unique link violations
//! - 6xx: Configuration
//! - 7xx: Invalid input
//! - 8xx: Audit integrity
//! - 9xx: Storage / internal

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    CollectorId, MaterialId, OrderId, OrderStatus, UserId, WithdrawalId, WithdrawalStatus,
};

/// Central error enum for all GreenRecycle operations.
#[derive(Debug, Error)]
pub enum RecycleError {
    // =================================================================
    // Not Found (1xx)
    // =================================================================
    #[error("GR_ERR_100: Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("GR_ERR_101: User not found: {0}")]
    UserNotFound(UserId),

    #[error("GR_ERR_102: Collector not found: {0}")]
    CollectorNotFound(CollectorId),

    #[error("GR_ERR_103: Material not found: {0}")]
    MaterialNotFound(MaterialId),

    #[error("GR_ERR_104: Withdrawal not found: {0}")]
    WithdrawalNotFound(WithdrawalId),

    // =================================================================
    // Invalid State (2xx)
    // =================================================================
    /// The order's lifecycle table does not allow this transition.
    #[error("GR_ERR_200: Order {order_id} cannot move from {from} to {to}")]
    InvalidOrderTransition {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// The withdrawal's lifecycle table does not allow this transition.
    #[error("GR_ERR_201: Withdrawal {withdrawal_id} cannot move from {from} to {to}")]
    InvalidWithdrawalTransition {
        withdrawal_id: WithdrawalId,
        from: WithdrawalStatus,
        to: WithdrawalStatus,
    },

    /// A withdrawal tried to link an order that is not completed yet.
    #[error("GR_ERR_202: Order {order_id} is {status}, not completed")]
    OrderNotCompleted {
        order_id: OrderId,
        status: OrderStatus,
    },

    // =================================================================
    // Insufficient Funds (3xx)
    // =================================================================
    #[error("GR_ERR_300: Insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Decimal, available: Decimal },

    #[error("GR_ERR_301: Insufficient inventory for {material_id}: need {needed}, have {available}")]
    InsufficientInventory {
        material_id: MaterialId,
        needed: Decimal,
        available: Decimal,
    },

    // =================================================================
    // Limits (4xx)
    // =================================================================
    #[error("GR_ERR_400: Withdrawal amount {amount} exceeds the per-request limit {limit}")]
    WithdrawalLimitExceeded { amount: Decimal, limit: Decimal },

    // =================================================================
    // Unique Link (5xx)
    // =================================================================
    #[error("GR_ERR_500: Order {0} already has a withdrawal")]
    OrderAlreadyWithdrawn(OrderId),

    // =================================================================
    // Configuration (6xx)
    // =================================================================
    #[error("GR_ERR_600: Collector {0} has no linked user account")]
    CollectorWithoutUser(CollectorId),

    #[error("GR_ERR_601: Configuration error: {0}")]
    Configuration(String),

    // =================================================================
    // Invalid Input (7xx)
    // =================================================================
    #[error("GR_ERR_700: Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// The caller is not the party the record belongs to.
    #[error("GR_ERR_701: {entity} does not belong to {user_id}")]
    NotOwner { entity: String, user_id: UserId },

    // =================================================================
    // Audit Integrity (8xx)
    // =================================================================
    #[error("GR_ERR_800: Audit chain broken at sequence {seq}: {reason}")]
    AuditChainBroken { seq: u64, reason: String },

    // =================================================================
    // Storage / Internal (9xx)
    // =================================================================
    #[error("GR_ERR_900: Storage error: {0}")]
    Storage(String),

    #[error("GR_ERR_901: Internal error: {0}")]
    Internal(String),

    #[error("GR_ERR_902: Serialization error: {0}")]
    Serialization(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, RecycleError>;

/// Caller-facing error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    InsufficientFunds,
    LimitExceeded,
    UniqueLinkViolation,
    Configuration,
    InvalidInput,
    Internal,
}

impl ErrorKind {
    /// HTTP-style status the request layer reports for this kind.
    #[must_use]
    pub fn status_code(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::InvalidState | Self::UniqueLinkViolation => 409,
            Self::InsufficientFunds | Self::LimitExceeded => 422,
            Self::InvalidInput => 400,
            Self::Configuration => 412,
            Self::Internal => 500,
        }
    }
}

impl RecycleError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OrderNotFound(_)
            | Self::UserNotFound(_)
            | Self::CollectorNotFound(_)
            | Self::MaterialNotFound(_)
            | Self::WithdrawalNotFound(_) => ErrorKind::NotFound,
            Self::InvalidOrderTransition { .. }
            | Self::InvalidWithdrawalTransition { .. }
            | Self::OrderNotCompleted { .. } => ErrorKind::InvalidState,
            Self::InsufficientBalance { .. } | Self::InsufficientInventory { .. } => {
                ErrorKind::InsufficientFunds
            }
            Self::WithdrawalLimitExceeded { .. } => ErrorKind::LimitExceeded,
            Self::OrderAlreadyWithdrawn(_) => ErrorKind::UniqueLinkViolation,
            Self::CollectorWithoutUser(_) | Self::Configuration(_) => ErrorKind::Configuration,
            Self::InvalidInput { .. } | Self::NotOwner { .. } => ErrorKind::InvalidInput,
            Self::AuditChainBroken { .. }
            | Self::Storage(_)
            | Self::Internal(_)
            | Self::Serialization(_) => ErrorKind::Internal,
        }
    }

    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Message safe to show a client. Internal failures are reported
    /// generically; everything else carries its own description.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "internal error".to_string(),
            _ => self.to_string(),
        }
    }

    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for RecycleError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = RecycleError::OrderNotFound(OrderId::new());
        let msg = format!("{err}");
        assert!(msg.starts_with("GR_ERR_100"), "Got: {msg}");
    }

    #[test]
    fn insufficient_balance_display() {
        let err = RecycleError::InsufficientBalance {
            needed: Decimal::new(100, 0),
            available: Decimal::new(50, 0),
        };
        let msg = format!("{err}");
        assert!(msg.contains("GR_ERR_300"));
        assert!(msg.contains("100"));
        assert!(msg.contains("50"));
    }

    #[test]
    fn transition_display_names_both_states() {
        let err = RecycleError::InvalidOrderTransition {
            order_id: OrderId::new(),
            from: OrderStatus::Completed,
            to: OrderStatus::Completed,
        };
        let msg = format!("{err}");
        assert!(msg.contains("GR_ERR_200"));
        assert!(msg.contains("completed"));
    }

    #[test]
    fn each_kind_has_distinct_mapping() {
        let cases = [
            (RecycleError::UserNotFound(UserId::new()), ErrorKind::NotFound),
            (
                RecycleError::InvalidWithdrawalTransition {
                    withdrawal_id: WithdrawalId::new(),
                    from: WithdrawalStatus::Approved,
                    to: WithdrawalStatus::Rejected,
                },
                ErrorKind::InvalidState,
            ),
            (
                RecycleError::InsufficientBalance {
                    needed: Decimal::ONE,
                    available: Decimal::ZERO,
                },
                ErrorKind::InsufficientFunds,
            ),
            (
                RecycleError::WithdrawalLimitExceeded {
                    amount: Decimal::new(6000, 0),
                    limit: Decimal::new(5000, 0),
                },
                ErrorKind::LimitExceeded,
            ),
            (
                RecycleError::OrderAlreadyWithdrawn(OrderId::new()),
                ErrorKind::UniqueLinkViolation,
            ),
            (
                RecycleError::CollectorWithoutUser(CollectorId::new()),
                ErrorKind::Configuration,
            ),
        ];
        for (err, kind) in cases {
            assert_eq!(err.kind(), kind, "{err}");
        }
    }

    #[test]
    fn internal_errors_do_not_leak() {
        let err = RecycleError::Storage("connection refused at 10.0.0.3:5432".into());
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.public_message(), "internal error");

        let err = RecycleError::WithdrawalNotFound(WithdrawalId::new());
        assert_eq!(err.status_code(), 404);
        assert!(err.public_message().starts_with("GR_ERR_104"));
    }

    #[test]
    fn all_errors_have_gr_err_prefix() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(RecycleError::Internal("test".into())),
            Box::new(RecycleError::invalid_input("weight must be positive")),
            Box::new(RecycleError::AuditChainBroken {
                seq: 3,
                reason: "hash mismatch".into(),
            }),
            Box::new(RecycleError::Configuration("missing".into())),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with("GR_ERR_"),
                "Error missing GR_ERR_ prefix: {msg}"
            );
        }
    }
}

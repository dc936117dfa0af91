//! Funds conservation across the withdrawal lifecycle.
//!
//! ```text
//! ∀ user: balance + Σ(pending withdrawal amounts)
//! ```
//!
//! is invariant under request, approve and reject. Approval moves money out
//! of the system, so it shrinks `reserved` and the total together; the
//! invariant is therefore stated between request/reject pairs and checked
//! as `before == after` around them.

use greenrecycle_types::{RecycleError, Result, UserId};
use rust_decimal::Decimal;

/// A user's spendable balance and the amount reserved by pending withdrawals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundsPosition {
    pub user_id: UserId,
    pub balance: Decimal,
    pub reserved: Decimal,
}

impl FundsPosition {
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.balance + self.reserved
    }

    /// Verify that `after` holds the same total as `self`.
    ///
    /// # Errors
    /// Returns [`RecycleError::Internal`] describing both positions otherwise.
    pub fn ensure_conserved(&self, after: &FundsPosition) -> Result<()> {
        if self.user_id != after.user_id {
            return Err(RecycleError::Internal(format!(
                "compared funds of {} against {}",
                self.user_id, after.user_id
            )));
        }
        if self.total() != after.total() {
            return Err(RecycleError::Internal(format!(
                "funds not conserved for {}: {} (balance {} + reserved {}) became {} \
                 (balance {} + reserved {})",
                self.user_id,
                self.total(),
                self.balance,
                self.reserved,
                after.total(),
                after.balance,
                after.reserved,
            )));
        }
        Ok(())
    }
}

//! Account types: end users and collectors.
//!
//! A user's `balance` is spendable money; pending withdrawals have already
//! been taken out of it. A collector's `balance` is the commission wallet.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{CollectorId, RecycleError, Result, UserId};

/// End-user account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub balance: Decimal,
    pub points: i64,
}

impl User {
    /// Create a user with zero balance and points.
    #[must_use]
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            display_name: display_name.into(),
            balance: Decimal::ZERO,
            points: 0,
        }
    }

    pub fn credit(&mut self, amount: Decimal) {
        self.balance += amount;
    }

    /// Take `amount` out of the balance. Checked before the debit so the
    /// balance never goes negative.
    ///
    /// # Errors
    /// Returns `InsufficientBalance` if balance < amount.
    pub fn debit(&mut self, amount: Decimal) -> Result<()> {
        if self.balance < amount {
            return Err(RecycleError::InsufficientBalance {
                needed: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        Ok(())
    }
}

/// Collector account with a commission wallet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Collector {
    pub id: CollectorId,
    /// The user account commission withdrawals are paid to.
    pub user_id: Option<UserId>,
    pub name: String,
    pub balance: Decimal,
}

impl Collector {
    #[must_use]
    pub fn new(name: impl Into<String>, user_id: Option<UserId>) -> Self {
        Self {
            id: CollectorId::new(),
            user_id,
            name: name.into(),
            balance: Decimal::ZERO,
        }
    }

    pub fn credit(&mut self, amount: Decimal) {
        self.balance += amount;
    }

    /// # Errors
    /// Returns `InsufficientBalance` if balance < amount.
    pub fn debit(&mut self, amount: Decimal) -> Result<()> {
        if self.balance < amount {
            return Err(RecycleError::InsufficientBalance {
                needed: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        Ok(())
    }
}

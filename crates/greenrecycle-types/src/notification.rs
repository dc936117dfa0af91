//! User-facing notifications.
//!
//! Notifications are produced by ledger operations and handed to a sender
//! only after the producing transaction has committed.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EntityType, OrderId, UserId, WithdrawalId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationCategory {
    Order,
    Withdrawal,
    System,
}

impl NotificationCategory {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::Withdrawal => "withdrawal",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: UserId,
    pub title: String,
    pub content: String,
    pub category: NotificationCategory,
    pub related_entity_type: Option<EntityType>,
    pub related_entity_id: Option<Uuid>,
}

impl Notification {
    #[must_use]
    pub fn order(
        user_id: UserId,
        order_id: OrderId,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            title: title.into(),
            content: content.into(),
            category: NotificationCategory::Order,
            related_entity_type: Some(EntityType::Order),
            related_entity_id: Some(order_id.0),
        }
    }

    #[must_use]
    pub fn withdrawal(
        user_id: UserId,
        withdrawal_id: WithdrawalId,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            title: title.into(),
            content: content.into(),
            category: NotificationCategory::Withdrawal,
            related_entity_type: Some(EntityType::Withdrawal),
            related_entity_id: Some(withdrawal_id.0),
        }
    }

    #[must_use]
    pub fn system(user_id: UserId, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            user_id,
            title: title.into(),
            content: content.into(),
            category: NotificationCategory::System,
            related_entity_type: None,
            related_entity_id: None,
        }
    }
}

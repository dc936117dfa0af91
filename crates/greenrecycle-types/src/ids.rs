//! Globally unique identifiers used throughout GreenRecycle.
//!
//! Every entity ID is a UUIDv7 newtype, so IDs sort by creation time and
//! "lowest id" is a stable, documented tie-break wherever one is needed.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a UUIDv7-backed identifier newtype.
macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            #[must_use]
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            #[must_use]
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

entity_id!(
    /// Identifier of a recycling pickup order.
    OrderId,
    "order"
);
entity_id!(
    /// Identifier of an end-user account (holds balance and points).
    UserId,
    "user"
);
entity_id!(
    /// Identifier of a collector (holds the commission wallet).
    CollectorId,
    "collector"
);
entity_id!(
    /// Identifier of a recyclable material.
    MaterialId,
    "material"
);
entity_id!(
    /// Identifier of a tiered bonus rule.
    PricingRuleId,
    "rule"
);
entity_id!(
    /// Identifier of a withdrawal request.
    WithdrawalId,
    "withdrawal"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(OrderId::new(), OrderId::new());
        assert_ne!(WithdrawalId::new(), WithdrawalId::new());
    }

    #[test]
    fn ids_sort_by_creation() {
        let a = PricingRuleId::new();
        let b = PricingRuleId::new();
        assert!(a < b);
    }

    #[test]
    fn display_carries_entity_prefix() {
        let id = CollectorId::from_uuid(Uuid::nil());
        assert_eq!(
            id.to_string(),
            "collector:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn serde_is_transparent() {
        let id = UserId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.0));
        let back: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}

//! Append-only audit trail types.
//!
//! Every state transition appends an [`AuditRecord`] inside the same
//! transaction as the mutation it documents. The store seals each record
//! into an [`AuditEntry`] carrying a sequence number and a SHA-256 link to
//! its predecessor:
//!
//! ```text
//! entry_hash = SHA256("greenrecycle:audit:v1:" || prev_hash || seq || fields...)
//! ```
//!
//! Entries are never updated or deleted; [`verify_chain`] detects either.

use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    CollectorId, MaterialId, Order, OrderId, OrderStatus, RecycleError, Result, UserId,
    WithdrawalId, constants,
};

/// `prev_hash` of the first entry.
pub const GENESIS_HASH: [u8; 32] = [0u8; 32];

/// Implements `as_str`, `Display` and `FromStr` for a lowercase string enum.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            #[must_use]
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = RecycleError;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(RecycleError::Serialization(format!(
                        concat!("unknown ", stringify!($name), " {:?}"),
                        other
                    ))),
                }
            }
        }
    };
}

/// Which kind of record an audit entry documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Order,
    Withdrawal,
    /// Keyed by material id (one inventory row per material).
    Inventory,
}

string_enum!(EntityType {
    Order => "order",
    Withdrawal => "withdrawal",
    Inventory => "inventory",
});

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Created,
    Claimed,
    Assigned,
    Completed,
    Cancelled,
    /// Forced transition by the expiry sweeper.
    Expired,
    Approved,
    Rejected,
    Outbound,
}

string_enum!(AuditAction {
    Created => "created",
    Claimed => "claimed",
    Assigned => "assigned",
    Completed => "completed",
    Cancelled => "cancelled",
    Expired => "expired",
    Approved => "approved",
    Rejected => "rejected",
    Outbound => "outbound",
});

/// Who did it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatorType {
    User,
    Collector,
    Admin,
    System,
}

string_enum!(OperatorType {
    User => "user",
    Collector => "collector",
    Admin => "admin",
    System => "system",
});

/// An audit fact as written by a service, before the store seals it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub action: AuditAction,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub operator_type: OperatorType,
    pub operator_id: Option<Uuid>,
}

impl AuditRecord {
    fn new(
        entity_type: EntityType,
        entity_id: Uuid,
        action: AuditAction,
        operator_type: OperatorType,
    ) -> Self {
        Self {
            entity_type,
            entity_id,
            action,
            old_value: None,
            new_value: None,
            operator_type,
            operator_id: None,
        }
    }

    #[must_use]
    pub fn order(id: OrderId, action: AuditAction, operator_type: OperatorType) -> Self {
        Self::new(EntityType::Order, id.0, action, operator_type)
    }

    #[must_use]
    pub fn withdrawal(id: WithdrawalId, action: AuditAction, operator_type: OperatorType) -> Self {
        Self::new(EntityType::Withdrawal, id.0, action, operator_type)
    }

    #[must_use]
    pub fn inventory(material_id: MaterialId, action: AuditAction) -> Self {
        Self::new(EntityType::Inventory, material_id.0, action, OperatorType::Admin)
    }

    #[must_use]
    pub fn old_value(mut self, value: impl Into<String>) -> Self {
        self.old_value = Some(value.into());
        self
    }

    #[must_use]
    pub fn new_value(mut self, value: impl Into<String>) -> Self {
        self.new_value = Some(value.into());
        self
    }

    #[must_use]
    pub fn by_user(mut self, id: UserId) -> Self {
        self.operator_id = Some(id.0);
        self
    }

    #[must_use]
    pub fn by_collector(mut self, id: Option<CollectorId>) -> Self {
        self.operator_id = id.map(|c| c.0);
        self
    }
}

/// A sealed, immutable audit log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// 1-based, gap-free position in the log.
    pub seq: u64,
    #[serde(flatten)]
    pub record: AuditRecord,
    pub recorded_at: DateTime<Utc>,
    pub prev_hash: [u8; 32],
    pub entry_hash: [u8; 32],
}

impl AuditEntry {
    /// Seal `record` as entry number `seq` following `prev_hash`.
    ///
    /// The timestamp is truncated to microseconds, the precision storage
    /// keeps, so the hash survives a round trip through the database.
    #[must_use]
    pub fn seal(
        record: AuditRecord,
        seq: u64,
        prev_hash: [u8; 32],
        recorded_at: DateTime<Utc>,
    ) -> Self {
        let mut entry = Self {
            seq,
            record,
            recorded_at: recorded_at.trunc_subsecs(6),
            prev_hash,
            entry_hash: [0u8; 32],
        };
        entry.entry_hash = entry.compute_hash();
        entry
    }

    /// Recompute the hash from the entry's contents.
    #[must_use]
    pub fn compute_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(constants::AUDIT_HASH_DOMAIN);
        hasher.update(self.prev_hash);
        hasher.update(self.seq.to_le_bytes());
        put_str(&mut hasher, self.record.entity_type.as_str());
        hasher.update(self.record.entity_id.as_bytes());
        put_str(&mut hasher, self.record.action.as_str());
        put_opt(&mut hasher, self.record.old_value.as_deref());
        put_opt(&mut hasher, self.record.new_value.as_deref());
        put_str(&mut hasher, self.record.operator_type.as_str());
        match self.record.operator_id {
            Some(id) => {
                hasher.update([1u8]);
                hasher.update(id.as_bytes());
            }
            None => hasher.update([0u8]),
        }
        hasher.update(self.recorded_at.timestamp_micros().to_le_bytes());
        hasher.finalize().into()
    }

    #[must_use]
    pub fn hash_hex(&self) -> String {
        hex::encode(self.entry_hash)
    }
}

fn put_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

fn put_opt(hasher: &mut Sha256, s: Option<&str>) {
    match s {
        Some(s) => {
            hasher.update([1u8]);
            put_str(hasher, s);
        }
        None => hasher.update([0u8]),
    }
}

/// Verify a full log in sequence order: contiguous numbering from 1, each
/// `prev_hash` equal to the previous `entry_hash`, every hash recomputable.
///
/// # Errors
/// Returns [`RecycleError::AuditChainBroken`] at the first bad entry.
pub fn verify_chain(entries: &[AuditEntry]) -> Result<()> {
    let mut prev = GENESIS_HASH;
    for (idx, entry) in entries.iter().enumerate() {
        let expected_seq = idx as u64 + 1;
        if entry.seq != expected_seq {
            return Err(RecycleError::AuditChainBroken {
                seq: entry.seq,
                reason: format!("expected sequence {expected_seq}"),
            });
        }
        if entry.prev_hash != prev {
            return Err(RecycleError::AuditChainBroken {
                seq: entry.seq,
                reason: "prev_hash does not match predecessor".into(),
            });
        }
        if entry.compute_hash() != entry.entry_hash {
            return Err(RecycleError::AuditChainBroken {
                seq: entry.seq,
                reason: format!("content does not match hash {}", entry.hash_hex()),
            });
        }
        prev = entry.entry_hash;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Order timeline
// ---------------------------------------------------------------------------

/// Milestones shown on an order's timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineStage {
    Created,
    Assigned,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineStep {
    pub stage: TimelineStage,
    pub time: Option<DateTime<Utc>>,
    pub done: bool,
}

/// Rebuild an order's timeline from its audit entries (any order; they are
/// sorted by sequence here).
#[must_use]
pub fn order_timeline(order: &Order, entries: &[AuditEntry]) -> Vec<TimelineStep> {
    let mut entries: Vec<&AuditEntry> = entries
        .iter()
        .filter(|e| e.record.entity_type == EntityType::Order && e.record.entity_id == order.id.0)
        .collect();
    entries.sort_by_key(|e| e.seq);

    let first = |actions: &[AuditAction]| {
        entries
            .iter()
            .find(|e| actions.contains(&e.record.action))
            .map(|e| e.recorded_at)
    };

    let mut steps = vec![
        TimelineStep {
            stage: TimelineStage::Created,
            time: Some(order.created_at),
            done: true,
        },
        TimelineStep {
            stage: TimelineStage::Assigned,
            time: first(&[AuditAction::Assigned, AuditAction::Claimed]),
            done: matches!(order.status, OrderStatus::Scheduled | OrderStatus::Completed),
        },
        TimelineStep {
            stage: TimelineStage::Completed,
            time: first(&[AuditAction::Completed]),
            done: order.status == OrderStatus::Completed,
        },
    ];

    if order.status == OrderStatus::Cancelled {
        steps.push(TimelineStep {
            stage: TimelineStage::Cancelled,
            time: first(&[AuditAction::Cancelled, AuditAction::Expired]),
            done: true,
        });
    }
    steps
}

//! # greenrecycle-types
//!
//! Shared types, errors, and configuration for the **GreenRecycle** ledger.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`OrderId`], [`UserId`], [`CollectorId`], [`MaterialId`], [`PricingRuleId`], [`WithdrawalId`]
//! - **Money helpers**: [`round_money`], [`has_money_scale`], [`fits_scale`]
//! - **Order model**: [`Order`], [`OrderStatus`]
//! - **Withdrawal model**: [`Withdrawal`], [`WithdrawalStatus`]
//! - **Accounts**: [`User`], [`Collector`]
//! - **Catalog**: [`Material`], [`PricingRule`], [`InventoryEntry`]
//! - **Audit model**: [`AuditRecord`], [`AuditEntry`], [`AuditAction`], [`verify_chain`], [`order_timeline`]
//! - **Notifications**: [`Notification`], [`NotificationCategory`]
//! - **Configuration**: [`LedgerConfig`], [`SweepConfig`]
//! - **Errors**: [`RecycleError`] with `GR_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod account;
pub mod audit;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod material;
pub mod money;
pub mod notification;
pub mod order;
pub mod withdrawal;

// Re-export all primary types at crate root for ergonomic imports:
//   use greenrecycle_types::{Order, OrderStatus, Withdrawal, ...};

pub use account::*;
pub use audit::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use material::*;
pub use money::*;
pub use notification::*;
pub use order::*;
pub use withdrawal::*;

// Constants are accessed via `greenrecycle_types::constants::FOO`
// (not re-exported to avoid name collisions).

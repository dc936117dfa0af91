//! System-wide constants for the GreenRecycle ledger.

/// Decimal places for every stored monetary amount.
pub const MONEY_SCALE: u32 = 2;

/// Decimal places kept for a measured weight in kilograms.
pub const WEIGHT_SCALE: u32 = 3;

/// Decimal places kept for an impurity percentage.
pub const IMPURITY_SCALE: u32 = 2;

/// Heaviest single measurement accepted for settlement, in kilograms.
pub const MAX_MEASURED_WEIGHT_KG: i64 = 100_000;

/// Default ceiling for a single withdrawal request, in cents (5000.00).
pub const DEFAULT_MAX_WITHDRAWAL_CENTS: i64 = 500_000;

/// Default collector commission, in percent of the settled amount.
pub const DEFAULT_COMMISSION_PERCENT: i64 = 10;

/// Default loyalty points awarded per settled kilogram.
pub const DEFAULT_POINTS_PER_KG: i64 = 10;

/// How often the order expiry sweep runs (5 minutes).
pub const DEFAULT_ORDER_SWEEP_INTERVAL_SECS: u64 = 300;

/// Pending orders older than this are cancelled by the sweeper.
pub const DEFAULT_ORDER_EXPIRY_HOURS: i64 = 24;

/// Longest expiry age a sweep may be configured with (one year).
pub const MAX_SWEEP_AGE_HOURS: i64 = 24 * 365;

/// How often the withdrawal expiry sweep runs (10 minutes).
pub const DEFAULT_WITHDRAWAL_SWEEP_INTERVAL_SECS: u64 = 600;

/// Pending withdrawals older than this are rejected and refunded.
pub const DEFAULT_WITHDRAWAL_EXPIRY_HOURS: i64 = 72;

/// Delay between process start and the first sweep.
pub const DEFAULT_SCHEDULER_WARMUP_SECS: u64 = 10;

/// Capacity of the notification outbox queue.
pub const NOTIFICATION_QUEUE_CAPACITY: usize = 1024;

/// Domain tag mixed into every audit hash.
pub const AUDIT_HASH_DOMAIN: &[u8] = b"greenrecycle:audit:v1:";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Service name.
pub const SERVICE_NAME: &str = "GreenRecycle";

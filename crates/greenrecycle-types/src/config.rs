//! Configuration types for the GreenRecycle ledger and its sweepers.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{RecycleError, Result, constants};

/// Business parameters for settlement, withdrawals and expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Ceiling for a single withdrawal request.
    pub max_withdrawal_amount: Decimal,
    /// Collector commission as a fraction of the settled amount (0.10 = 10%).
    pub commission_rate: Decimal,
    /// Loyalty points per kilogram; fractional points are truncated.
    pub points_per_kg: Decimal,
    /// Pending orders.
    pub order_sweep: SweepConfig,
    /// Pending withdrawals.
    pub withdrawal_sweep: SweepConfig,
    /// Delay before the scheduler's first sweep.
    pub warmup_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_withdrawal_amount: Decimal::new(constants::DEFAULT_MAX_WITHDRAWAL_CENTS, 2),
            commission_rate: Decimal::new(constants::DEFAULT_COMMISSION_PERCENT, 2),
            points_per_kg: Decimal::from(constants::DEFAULT_POINTS_PER_KG),
            order_sweep: SweepConfig {
                interval_secs: constants::DEFAULT_ORDER_SWEEP_INTERVAL_SECS,
                max_age_hours: constants::DEFAULT_ORDER_EXPIRY_HOURS,
            },
            withdrawal_sweep: SweepConfig {
                interval_secs: constants::DEFAULT_WITHDRAWAL_SWEEP_INTERVAL_SECS,
                max_age_hours: constants::DEFAULT_WITHDRAWAL_EXPIRY_HOURS,
            },
            warmup_secs: constants::DEFAULT_SCHEDULER_WARMUP_SECS,
        }
    }
}

impl LedgerConfig {
    /// Reject values the ledger cannot operate with.
    ///
    /// # Errors
    /// Returns [`RecycleError::Configuration`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.max_withdrawal_amount <= Decimal::ZERO {
            return Err(RecycleError::Configuration(
                "max_withdrawal_amount must be positive".into(),
            ));
        }
        if self.commission_rate < Decimal::ZERO || self.commission_rate > Decimal::ONE {
            return Err(RecycleError::Configuration(
                "commission_rate must be within 0..=1".into(),
            ));
        }
        if self.points_per_kg < Decimal::ZERO {
            return Err(RecycleError::Configuration(
                "points_per_kg must not be negative".into(),
            ));
        }
        self.order_sweep.validate("order_sweep")?;
        self.withdrawal_sweep.validate("withdrawal_sweep")
    }

    #[must_use]
    pub fn warmup(&self) -> Duration {
        Duration::from_secs(self.warmup_secs)
    }
}

/// One periodic expiry sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Pause between the end of one run and the start of the next.
    pub interval_secs: u64,
    /// Records pending for longer than this are expired.
    pub max_age_hours: i64,
}

impl SweepConfig {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Clamped to `0..=MAX_SWEEP_AGE_HOURS` so an unvalidated value cannot
    /// overflow the duration.
    #[must_use]
    pub fn max_age(&self) -> chrono::Duration {
        chrono::Duration::hours(self.max_age_hours.clamp(0, constants::MAX_SWEEP_AGE_HOURS))
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(RecycleError::Configuration(format!(
                "{name}.interval_secs must be positive"
            )));
        }
        if self.max_age_hours <= 0 {
            return Err(RecycleError::Configuration(format!(
                "{name}.max_age_hours must be positive"
            )));
        }
        if self.max_age_hours > constants::MAX_SWEEP_AGE_HOURS {
            return Err(RecycleError::Configuration(format!(
                "{name}.max_age_hours must be at most {}",
                constants::MAX_SWEEP_AGE_HOURS
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let cfg = LedgerConfig::default();
        assert_eq!(cfg.max_withdrawal_amount, Decimal::new(5000, 0));
        assert_eq!(cfg.commission_rate, Decimal::new(1, 1));
        assert_eq!(cfg.points_per_kg, Decimal::TEN);
        assert_eq!(cfg.order_sweep.interval(), Duration::from_secs(300));
        assert_eq!(cfg.order_sweep.max_age(), chrono::Duration::hours(24));
        assert_eq!(cfg.withdrawal_sweep.interval(), Duration::from_secs(600));
        assert_eq!(cfg.withdrawal_sweep.max_age(), chrono::Duration::hours(72));
        assert_eq!(cfg.warmup(), Duration::from_secs(10));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_document_fills_defaults() {
        let cfg: LedgerConfig =
            serde_json::from_str(r#"{"max_withdrawal_amount":"200.00"}"#).unwrap();
        assert_eq!(cfg.max_withdrawal_amount, Decimal::new(20_000, 2));
        assert_eq!(cfg.order_sweep, LedgerConfig::default().order_sweep);
    }

    #[test]
    fn invalid_values_rejected() {
        let mut cfg = LedgerConfig {
            commission_rate: Decimal::new(15, 1),
            ..LedgerConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(RecycleError::Configuration(_))));

        cfg = LedgerConfig::default();
        cfg.withdrawal_sweep.interval_secs = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("withdrawal_sweep.interval_secs"));
    }

    #[test]
    fn sweep_age_is_bounded() {
        let mut cfg = LedgerConfig::default();
        cfg.order_sweep.max_age_hours = constants::MAX_SWEEP_AGE_HOURS;
        cfg.validate().unwrap();

        cfg.order_sweep.max_age_hours = i64::MAX;
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, RecycleError::Configuration(_)));
        assert!(err.to_string().contains("order_sweep.max_age_hours"));
        assert_eq!(
            cfg.order_sweep.max_age(),
            chrono::Duration::hours(constants::MAX_SWEEP_AGE_HOURS)
        );
    }

    #[test]
    fn ledger_config_serde_roundtrip() {
        let cfg = LedgerConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: LedgerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}

//! # greenrecycle-pricing
//!
//! **Pure pricing engine for GreenRecycle settlements.**
//!
//! Turns a measured weight and impurity into a payout. It has:
//!
//! - **Zero side effects**: no storage, no async, no clock
//! - **Exact decimal arithmetic**: every intermediate amount is rounded to
//!   two places before it is used again, matching stored currency precision
//! - **Explicit rule selection**: highest priority wins, lowest rule id on ties

pub mod quote;
pub mod rules;

pub use quote::{PriceQuote, check_measurement, compute};
pub use rules::select_bonus_rule;

//! # Bondwise Analytics
//!
//! The pure middle stage of the client's pipeline: raw on-chain
//! integers in, normalized decimal metrics out.
//!
//! - [`valuation`]: per-bond pricing, discount, quote, and purchased
//!   amounts
//! - [`treasury`]: protocol-level solvency aggregation (risk-free
//!   value, runway, staking rebase)
//!
//! Nothing here performs I/O or touches shared state; both modules are
//! deterministic functions of their inputs, which is what makes the
//! formulas directly testable without chain mocking.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod treasury;
pub mod valuation;

pub use error::AnalyticsError;
pub use treasury::{aggregate, TreasuryInputs, TreasuryMetrics};
pub use valuation::{
    bond_price, discount, discount_percent, lp_purchased, lp_quote, lp_treasury_balance,
    market_price, quote_exceeds_max, stable_purchased, stable_quote, stable_treasury_balance,
    Quote,
};

/// Result alias for analytics computations.
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

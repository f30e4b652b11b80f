//! Protocol-level solvency aggregation.
//!
//! Combines per-bond treasury valuations with protocol supply figures
//! into the derived treasury metrics. Inputs arrive fully normalized;
//! the engine performs the fail-closed dependency gate before building
//! [`TreasuryInputs`], so every field here is a plain `Decimal`.

use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use bondwise_core::constants::{LP_RFV_SHARE, REBASES_PER_DAY};

use crate::error::AnalyticsError;
use crate::AnalyticsResult;

/// Normalized inputs to treasury aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryInputs {
    /// Total native token supply.
    pub total_supply: Decimal,
    /// Circulating supply.
    pub circulating_supply: Decimal,
    /// Raw circulating supply, denominator of the rebase fraction.
    pub raw_circulating_supply: Decimal,
    /// Treasury market reserves, native units.
    pub market_reserves: Decimal,
    /// Native-unit distribution of the current epoch.
    pub epoch_distribute: Decimal,
    /// Reference asset price in settlement-asset terms.
    pub reference_price: Decimal,
    /// Summed treasury valuation of LP-backed bonds.
    pub lp_treasury_sum: Decimal,
    /// Summed treasury valuation of stable-backed bonds.
    pub stable_treasury_sum: Decimal,
    /// Native tokens sitting in bond pools across all bonds.
    pub outstanding_principal: Decimal,
    /// DAO and redemption allocations excluded from backing.
    pub reserved_allocations: Decimal,
}

/// Derived protocol solvency metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryMetrics {
    /// Risk-free treasury backing, settlement-asset terms.
    pub risk_free_value_treasury: Decimal,
    /// Backing per outstanding native token.
    pub risk_free_value: Decimal,
    /// Fractional size of the current rebase.
    pub staking_rebase: Decimal,
    /// Days the treasury sustains the current emission rate.
    pub runway_days: Decimal,
    /// Native token market price, settlement-asset terms.
    pub market_price: Decimal,
    /// `(rfv − market price) / rfv × 100`.
    pub market_price_to_rfv_delta: Decimal,
}

/// Aggregate per-bond valuations into protocol metrics.
///
/// LP-backed balances contribute [`LP_RFV_SHARE`] of their valuation:
/// only the settlement-asset half of a pool backs the native token.
/// Stable balances count at full value.
pub fn aggregate(inputs: TreasuryInputs) -> AnalyticsResult<TreasuryMetrics> {
    let rfv_treasury = inputs.lp_treasury_sum * LP_RFV_SHARE + inputs.stable_treasury_sum;

    let adjusted_supply =
        inputs.total_supply - inputs.outstanding_principal - inputs.reserved_allocations;
    if adjusted_supply <= Decimal::ZERO {
        return Err(AnalyticsError::NonPositive {
            what: "adjusted circulating supply",
        });
    }
    let risk_free_value = rfv_treasury / adjusted_supply;
    if risk_free_value <= Decimal::ZERO {
        return Err(AnalyticsError::NonPositive {
            what: "risk-free value",
        });
    }

    if inputs.raw_circulating_supply <= Decimal::ZERO {
        return Err(AnalyticsError::NonPositive {
            what: "raw circulating supply",
        });
    }
    let staking_rebase = inputs.epoch_distribute / inputs.raw_circulating_supply;

    let runway_days = runway(rfv_treasury, inputs.circulating_supply, staking_rebase)?;

    if inputs.market_reserves.is_zero() {
        return Err(AnalyticsError::InsufficientState {
            what: "treasury reserves",
        });
    }
    let market_price = inputs.market_reserves * inputs.reference_price;

    let market_price_to_rfv_delta = (risk_free_value - market_price) / risk_free_value * dec!(100);

    Ok(TreasuryMetrics {
        risk_free_value_treasury: rfv_treasury,
        risk_free_value,
        staking_rebase,
        runway_days,
        market_price,
        market_price_to_rfv_delta,
    })
}

/// Runway in days: `ln(rfv_treasury / circulating) / ln(1 + rebase)`
/// rebase periods, divided by [`REBASES_PER_DAY`].
pub fn runway(
    rfv_treasury: Decimal,
    circulating_supply: Decimal,
    staking_rebase: Decimal,
) -> AnalyticsResult<Decimal> {
    if circulating_supply <= Decimal::ZERO {
        return Err(AnalyticsError::NonPositive {
            what: "circulating supply",
        });
    }
    let coverage = rfv_treasury / circulating_supply;
    let coverage_log = coverage.checked_ln().ok_or(AnalyticsError::NonPositive {
        what: "treasury coverage",
    })?;
    let growth_log = (Decimal::ONE + staking_rebase)
        .checked_ln()
        .filter(|v| !v.is_zero())
        .ok_or(AnalyticsError::NonPositive {
            what: "staking rebase",
        })?;
    Ok(coverage_log / growth_log / REBASES_PER_DAY)
}

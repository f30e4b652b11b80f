//! Per-bond valuation math.
//!
//! Every function takes raw integers the chain layer already fetched
//! and produces normalized decimal quantities. The LP/stable split
//! mirrors the two payout paths of the depository:
//!
//! - liquidity-pool bonds route deposits through the external bonding
//!   calculator's valuation before asking the depository for a payout;
//! - stable-asset bonds feed the deposit to the depository directly,
//!   since the backing asset already equals the settlement asset 1:1.
//!
//! Callers resolve which path applies once, at the bond model boundary,
//! and call the matching function here.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use bondwise_core::{RawAmount, TokenScale};

use crate::error::AnalyticsError;
use crate::AnalyticsResult;

/// A computed bond quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    /// Expected payout for the deposited amount, normalized.
    pub payout: Decimal,
    /// Maximum payout per deposit, native units.
    pub max_payout: Decimal,
    /// The payout cap expressed in the bond's own input token: the
    /// largest deposit the depository will accept in full.
    pub max_price_in_token: Decimal,
}

/// Market price of the native token in settlement-asset terms.
///
/// `reserves` is the treasury's market reserve figure in native units.
pub fn market_price(reserves: RawAmount, reference_price: Decimal) -> AnalyticsResult<Decimal> {
    if reserves.is_zero() {
        return Err(AnalyticsError::InsufficientState {
            what: "treasury reserves",
        });
    }
    Ok(reserves.to_decimal(TokenScale::Native)? * reference_price)
}

/// Bond price in settlement-asset terms.
///
/// `raw_price` is the depository's price-in-reference-asset figure
/// (18 decimals). Custom-priced bonds quote in the reference asset and
/// are converted by the current reference price.
pub fn bond_price(
    raw_price: RawAmount,
    custom_pricing: bool,
    reference_price: Decimal,
) -> AnalyticsResult<Decimal> {
    let base = raw_price.to_decimal(TokenScale::Wei)?;
    Ok(if custom_pricing {
        base * reference_price
    } else {
        base
    })
}

/// Bond discount: `(reserves − price) / price` with both sides in
/// settlement-asset terms.
///
/// Price is always quoted in native units regardless of the bond's
/// backing-asset scale, so reserves normalize at the native scale.
/// Refuses to compute when either input is absent or zero.
pub fn discount(treasury_reserves: RawAmount, bond_price: Decimal) -> AnalyticsResult<Decimal> {
    if treasury_reserves.is_zero() {
        return Err(AnalyticsError::InsufficientState {
            what: "treasury reserves",
        });
    }
    if bond_price.is_zero() {
        return Err(AnalyticsError::InsufficientState { what: "bond price" });
    }
    let reserves = treasury_reserves.to_decimal(TokenScale::Native)?;
    Ok((reserves - bond_price) / bond_price)
}

/// Quote for a liquidity-pool-backed deposit.
///
/// `payout` and `unit_payout` are the depository's `payout_for` results
/// for the deposit's calculator valuation and for the valuation of a
/// canonical one-token deposit; both are native-unit figures.
pub fn lp_quote(
    payout: RawAmount,
    unit_payout: RawAmount,
    max_payout: RawAmount,
) -> AnalyticsResult<Quote> {
    let unit_quote = unit_payout.to_decimal(TokenScale::Native)?;
    if unit_quote.is_zero() {
        return Err(AnalyticsError::NonPositive {
            what: "unit payout",
        });
    }
    let max = max_payout.to_decimal(TokenScale::Native)?;
    Ok(Quote {
        payout: payout.to_decimal(TokenScale::Native)?,
        max_payout: max,
        max_price_in_token: max / unit_quote,
    })
}

/// Quote for a stable-asset-backed deposit.
///
/// No valuation step: the depository prices the raw deposit directly,
/// reporting at the backing asset's own scale.
pub fn stable_quote(
    payout: RawAmount,
    unit_payout: RawAmount,
    max_payout: RawAmount,
) -> AnalyticsResult<Quote> {
    let unit_quote = unit_payout.to_decimal(TokenScale::Wei)?;
    if unit_quote.is_zero() {
        return Err(AnalyticsError::NonPositive {
            what: "unit payout",
        });
    }
    let max = max_payout.to_decimal(TokenScale::Native)?;
    Ok(Quote {
        payout: payout.to_decimal(TokenScale::Wei)?,
        max_payout: max,
        max_price_in_token: max / unit_quote,
    })
}

/// Whether a computed quote exceeds the depository's payout cap.
///
/// The quote is still returned to the caller either way; capping the
/// display is the UI's concern. The engine emits a warning when this
/// holds.
pub fn quote_exceeds_max(quote: &Quote) -> bool {
    quote.payout > quote.max_payout
}

/// Settlement-asset value of the treasury's holding of an LP reserve:
/// the calculator valuation marked down by the impermanent-loss factor.
pub fn lp_treasury_balance(valuation: RawAmount, markdown: RawAmount) -> AnalyticsResult<Decimal> {
    let valuation = valuation.to_decimal(TokenScale::Native)?;
    let markdown = markdown.to_decimal(TokenScale::Wei)?;
    Ok(valuation * markdown)
}

/// Settlement-asset value of the treasury's holding of a stable
/// reserve: the balance itself, at par.
pub fn stable_treasury_balance(balance: RawAmount) -> AnalyticsResult<Decimal> {
    Ok(balance.to_decimal(TokenScale::Wei)?)
}

/// Purchased (treasury-held) amount for an LP bond, in settlement-asset
/// terms.
pub fn lp_purchased(
    valuation: RawAmount,
    markdown: RawAmount,
    custom_pricing: bool,
    reference_price: Decimal,
) -> AnalyticsResult<Decimal> {
    let purchased = lp_treasury_balance(valuation, markdown)?;
    Ok(apply_custom_pricing(purchased, custom_pricing, reference_price))
}

/// Purchased amount for a stable bond: the held balance at par.
pub fn stable_purchased(
    balance: RawAmount,
    custom_pricing: bool,
    reference_price: Decimal,
) -> AnalyticsResult<Decimal> {
    let purchased = stable_treasury_balance(balance)?;
    Ok(apply_custom_pricing(purchased, custom_pricing, reference_price))
}

fn apply_custom_pricing(value: Decimal, custom_pricing: bool, reference_price: Decimal) -> Decimal {
    if custom_pricing {
        value * reference_price
    } else {
        value
    }
}

/// Percentage form of a fractional discount, for display.
pub fn discount_percent(discount: Decimal) -> Decimal {
    discount * dec!(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GWEI: u128 = 1_000_000_000;
    const WEI: u128 = 1_000_000_000_000_000_000;

    #[test]
    fn market_price_scales_reserves_by_native_decimals() {
        // 80 native units of reserves at a 1.0 reference price.
        let price = market_price(RawAmount::new(80 * GWEI), dec!(1.0)).unwrap();
        assert_eq!(price, dec!(80));
    }

    #[test]
    fn discount_matches_direct_formula() {
        // reserves 80 native, price 72 settlement units.
        let d = discount(RawAmount::new(80 * GWEI), dec!(72)).unwrap();
        assert_eq!(d, (dec!(80) - dec!(72)) / dec!(72));
    }

    #[test]
    fn discount_refuses_zero_price() {
        let err = discount(RawAmount::new(80 * GWEI), Decimal::ZERO).unwrap_err();
        assert_eq!(err, AnalyticsError::InsufficientState { what: "bond price" });
    }

    #[test]
    fn discount_refuses_zero_reserves() {
        let err = discount(RawAmount::ZERO, dec!(72)).unwrap_err();
        assert_eq!(
            err,
            AnalyticsError::InsufficientState {
                what: "treasury reserves"
            }
        );
    }

    #[test]
    fn bond_price_applies_custom_pricing() {
        let raw = RawAmount::new(72 * WEI);
        assert_eq!(bond_price(raw, false, dec!(1.02)).unwrap(), dec!(72));
        assert_eq!(bond_price(raw, true, dec!(1.02)).unwrap(), dec!(73.44));
    }

    #[test]
    fn lp_quote_cross_divides_max_by_unit_payout() {
        // 2 native payout for the deposit, 4 native per unit token,
        // 500 native cap => cap reached at 125 input tokens.
        let quote = lp_quote(
            RawAmount::new(2 * GWEI),
            RawAmount::new(4 * GWEI),
            RawAmount::new(500 * GWEI),
        )
        .unwrap();
        assert_eq!(quote.payout, dec!(2));
        assert_eq!(quote.max_payout, dec!(500));
        assert_eq!(quote.max_price_in_token, dec!(125));
    }

    #[test]
    fn stable_quote_reports_at_backing_scale() {
        let quote = stable_quote(
            RawAmount::new(3 * WEI),
            RawAmount::new(WEI),
            RawAmount::new(500 * GWEI),
        )
        .unwrap();
        assert_eq!(quote.payout, dec!(3));
        assert_eq!(quote.max_price_in_token, dec!(500));
    }

    #[test]
    fn quote_exceeding_max_is_flagged_but_still_returned() {
        let quote = lp_quote(
            RawAmount::new(600 * GWEI),
            RawAmount::new(GWEI),
            RawAmount::new(500 * GWEI),
        )
        .unwrap();
        assert!(quote_exceeds_max(&quote));
        assert_eq!(quote.payout, dec!(600));
    }

    #[test]
    fn lp_treasury_balance_applies_markdown() {
        // valuation 1000 native, markdown 0.8
        let value = lp_treasury_balance(
            RawAmount::new(1000 * GWEI),
            RawAmount::new(8 * WEI / 10),
        )
        .unwrap();
        assert_eq!(value, dec!(800));
    }

    #[test]
    fn stable_purchased_is_par_until_custom_priced() {
        let balance = RawAmount::new(500 * WEI);
        assert_eq!(stable_purchased(balance, false, dec!(1.1)).unwrap(), dec!(500));
        assert_eq!(stable_purchased(balance, true, dec!(1.1)).unwrap(), dec!(550));
    }

    #[test]
    fn recomputation_is_idempotent() {
        let reserves = RawAmount::new(80 * GWEI);
        let first = discount(reserves, dec!(72)).unwrap();
        let second = discount(reserves, dec!(72)).unwrap();
        assert_eq!(first, second);
    }
}

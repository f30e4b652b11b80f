//! Raw on-chain integers and their decimal normalization.
//!
//! Contract calls return uninterpreted fixed-point integers. Nothing
//! downstream of the chain layer works in raw units: the valuation and
//! aggregation formulas all operate on [`rust_decimal::Decimal`] values
//! produced here.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::NATIVE_DECIMALS;
use crate::error::CoreError;

/// Fixed-point scale of a token amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenScale {
    /// Protocol native unit, 9 decimals.
    Native,
    /// Reserve/settlement assets and LP shares, 18 decimals.
    Wei,
}

impl TokenScale {
    /// Number of decimal places for this scale.
    pub fn decimals(self) -> u32 {
        match self {
            TokenScale::Native => NATIVE_DECIMALS,
            TokenScale::Wei => 18,
        }
    }

    /// `10^decimals` as a decimal divisor.
    pub fn factor(self) -> Decimal {
        Decimal::from(10u64.pow(self.decimals()))
    }
}

/// Uninterpreted on-chain integer amount.
///
/// Wraps the full `u128` range so 18-decimal balances survive untouched.
/// Interpretation happens only through [`RawAmount::to_decimal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct RawAmount(pub u128);

impl RawAmount {
    /// Zero amount.
    pub const ZERO: RawAmount = RawAmount(0);

    /// Create a raw amount.
    pub fn new(value: u128) -> Self {
        Self(value)
    }

    /// Whether the amount is zero.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Normalize to a decimal quantity at the given scale.
    ///
    /// Fails with [`CoreError::AmountOverflow`] when the raw value
    /// exceeds what a 96-bit decimal mantissa can carry.
    pub fn to_decimal(self, scale: TokenScale) -> Result<Decimal, CoreError> {
        let value = i128::try_from(self.0)
            .ok()
            .and_then(|v| Decimal::try_from_i128_with_scale(v, scale.decimals()).ok())
            .ok_or(CoreError::AmountOverflow { raw: self.0 })?;
        Ok(value)
    }

    /// Like [`RawAmount::to_decimal`], but clamps to `Decimal::MAX` on
    /// overflow. Used for effectively-unlimited figures such as max
    /// allowances, where saturation is the right answer.
    pub fn to_decimal_saturating(self, scale: TokenScale) -> Decimal {
        self.to_decimal(scale).unwrap_or(Decimal::MAX)
    }

    /// Build a raw amount from a decimal quantity at the given scale.
    ///
    /// Used for deposit arguments: a user-entered token amount becomes a
    /// wei-scaled integer. Fractional dust below the scale is truncated.
    pub fn from_decimal(value: Decimal, scale: TokenScale) -> Result<Self, CoreError> {
        if value.is_sign_negative() {
            return Err(CoreError::AmountOverflow { raw: 0 });
        }
        let scaled = value
            .checked_mul(scale.factor())
            .ok_or(CoreError::AmountOverflow { raw: 0 })?
            .trunc();
        let raw = scaled
            .to_u128()
            .ok_or(CoreError::AmountOverflow { raw: 0 })?;
        Ok(Self(raw))
    }
}

impl fmt::Display for RawAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn native_scale_normalizes_to_nine_decimals() {
        let raw = RawAmount::new(80_000_000_000); // 80 native units
        assert_eq!(raw.to_decimal(TokenScale::Native).unwrap(), dec!(80));
    }

    #[test]
    fn wei_scale_normalizes_to_eighteen_decimals() {
        let raw = RawAmount::new(1_500_000_000_000_000_000); // 1.5 tokens
        assert_eq!(raw.to_decimal(TokenScale::Wei).unwrap(), dec!(1.5));
    }

    #[test]
    fn from_decimal_builds_wei_deposit_argument() {
        let raw = RawAmount::from_decimal(dec!(2.5), TokenScale::Wei).unwrap();
        assert_eq!(raw, RawAmount::new(2_500_000_000_000_000_000));
    }

    #[test]
    fn from_decimal_rejects_negative() {
        assert!(RawAmount::from_decimal(dec!(-1), TokenScale::Wei).is_err());
    }

    #[test]
    fn unlimited_allowance_saturates() {
        let raw = RawAmount::new(u128::MAX);
        assert!(raw.to_decimal(TokenScale::Wei).is_err());
        assert_eq!(raw.to_decimal_saturating(TokenScale::Wei), Decimal::MAX);
    }

    #[test]
    fn round_trip_preserves_value() {
        let amount = dec!(123.456789);
        let raw = RawAmount::from_decimal(amount, TokenScale::Native).unwrap();
        assert_eq!(raw.to_decimal(TokenScale::Native).unwrap(), amount);
    }
}

//! Named protocol economics constants.
//!
//! These encode assumptions of the protocol being modeled. They are
//! deliberately named rather than inlined so a protocol parameter change
//! does not require re-deriving the formulas that use them.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Decimal places of the protocol's native token.
pub const NATIVE_DECIMALS: u32 = 9;

/// Rebase periods per day. Divisor in the runway formula: the protocol
/// rebases every eight hours.
pub const REBASES_PER_DAY: Decimal = dec!(3);

/// Share of a liquidity pool's valuation that counts as risk-free
/// backing. Only the settlement-asset half of a pool backs the native
/// token; the other half is the native token itself.
pub const LP_RFV_SHARE: Decimal = dec!(0.5);

/// Default deposit slippage tolerance (0.5%).
pub const DEFAULT_SLIPPAGE: Decimal = dec!(0.005);

/// Canonical one-token deposit (1e18 wei) used to derive the max bond
/// price expressed in the bond's own input token.
pub const UNIT_DEPOSIT_WEI: u128 = 1_000_000_000_000_000_000;

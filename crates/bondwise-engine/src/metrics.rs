//! Snapshot data types.
//!
//! All monetary fields are `Option`: null until their dependency chain
//! has been satisfied by a completed fetch/compute cycle. Metrics are
//! created all-null at registry creation and only ever superseded,
//! never deleted, for the life of the session.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bondwise_core::{Epoch, RawAmount};

/// Protocol-wide snapshot, normalized at fetch time.
///
/// Every field must be present before any bond-level or treasury-level
/// derived metric is computed: one missing field blocks the whole
/// downstream computation rather than producing a partial result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreMetrics {
    /// Total native token supply.
    pub total_supply: Decimal,
    /// Circulating supply.
    pub circulating_supply: Decimal,
    /// Raw circulating supply (rebase denominator).
    pub raw_circulating_supply: Decimal,
    /// Treasury market reserves, raw native units. Kept raw because the
    /// discount formula consumes the integer figure.
    pub reserves: RawAmount,
    /// Current staking epoch.
    pub epoch: Epoch,
}

/// Reference-asset market data. Same fail-closed rule as
/// [`CoreMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketData {
    /// Reference asset price in settlement-asset terms.
    pub reference_price: Decimal,
}

/// Per-bond metrics, one per registered bond.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondMetrics {
    /// Settlement-asset value of the treasury's holding of this bond's
    /// backing asset.
    pub treasury_balance: Option<Decimal>,
    /// Fractional discount to market price.
    pub bond_discount: Option<Decimal>,
    /// Expected payout for the last quoted deposit, normalized.
    pub bond_quote: Option<Decimal>,
    /// Purchased amount in settlement-asset terms.
    pub purchased: Option<Decimal>,
    /// Vesting term in seconds.
    pub vesting_term: Option<u64>,
    /// Maximum payout per deposit, native units.
    pub max_bond_price: Option<Decimal>,
    /// Bond price in settlement-asset terms.
    pub bond_price: Option<Decimal>,
    /// Native token market price at computation time.
    pub market_price: Option<Decimal>,
    /// Payout cap expressed in the bond's own input token.
    pub max_bond_price_token: Option<Decimal>,
    /// Signer's allowance toward the depository, backing-asset units.
    pub allowance: Option<Decimal>,
    /// Signer's backing-asset balance.
    pub balance: Option<Decimal>,
    /// Payout still vesting for the signer, native units.
    pub interest_due: Option<Decimal>,
    /// Unix time the signer's position fully vests.
    pub maturation_time: Option<u64>,
    /// Payout claimable right now, native units.
    pub pending_payout: Option<Decimal>,
    /// A fetch/compute cycle is in flight. While set, further
    /// recompute requests for this bond are dropped.
    pub loading: bool,
}

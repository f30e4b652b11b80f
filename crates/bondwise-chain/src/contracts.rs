//! Contract call traits.
//!
//! One trait per contract the client talks to:
//!
//! - [`BondContract`]: the bond depository (terms, pricing, payout,
//!   deposit, redeem)
//! - [`ReserveContract`]: the backing asset token (balances, allowance,
//!   approve, pool reserves)
//! - [`BondingCalculator`]: the external LP valuation contract
//! - [`ProtocolReader`]: protocol-wide supply, reserves, and epoch reads
//!
//! Implementations are injected into the engine; the in-memory backend
//! in [`crate::memory`] implements all four. Methods return raw
//! integers without interpretation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use bondwise_core::{Address, Epoch, RawAmount};

use crate::error::ChainError;
use crate::tx::TxHandle;

/// Bond terms as stored on the depository contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondTerms {
    /// Vesting term in seconds.
    pub vesting_term_secs: u64,
    /// Minimum price the depository accepts, in native units.
    pub minimum_price: RawAmount,
}

/// Per-holder bond position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondInfo {
    /// Total payout still owed, native units.
    pub payout: RawAmount,
    /// Seconds of vesting remaining at `last_time`.
    pub vesting: u64,
    /// Unix time of the last interaction.
    pub last_time: u64,
}

/// Raw pool reserve snapshot.
///
/// Token addresses are included so callers select the correct slot by
/// address comparison. Pools order their reserves in either
/// orientation; position is meaningless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolReserves {
    /// Reserve amount of `token0`.
    pub reserve0: RawAmount,
    /// Reserve amount of `token1`.
    pub reserve1: RawAmount,
    /// First token address.
    pub token0: Address,
    /// Second token address.
    pub token1: Address,
}

impl PoolReserves {
    /// Reserve slot of the given token, by address comparison.
    pub fn reserve_of(&self, token: &Address) -> Option<RawAmount> {
        if &self.token0 == token {
            Some(self.reserve0)
        } else if &self.token1 == token {
            Some(self.reserve1)
        } else {
            None
        }
    }

    /// Reserve slot of the token paired with the given one.
    pub fn reserve_opposite(&self, token: &Address) -> Option<RawAmount> {
        if &self.token0 == token {
            Some(self.reserve1)
        } else if &self.token1 == token {
            Some(self.reserve0)
        } else {
            None
        }
    }
}

/// The bond depository contract.
#[async_trait]
pub trait BondContract: Send + Sync {
    /// Current bond terms.
    async fn terms(&self) -> Result<BondTerms, ChainError>;

    /// Maximum payout per deposit, native units.
    async fn max_payout(&self) -> Result<RawAmount, ChainError>;

    /// Current debt-ratio premium, native units. The slippage bound for
    /// deposits is derived from this figure.
    async fn bond_price(&self) -> Result<RawAmount, ChainError>;

    /// Price expressed in the reference asset, 18 decimals.
    async fn bond_price_in_reference(&self) -> Result<RawAmount, ChainError>;

    /// Payout for a deposit value. LP bonds pass a calculator valuation,
    /// stable bonds pass the deposit amount itself.
    async fn payout_for(&self, value: RawAmount) -> Result<RawAmount, ChainError>;

    /// Position of a holder.
    async fn bond_info(&self, recipient: &Address) -> Result<BondInfo, ChainError>;

    /// Payout already claimable by a holder.
    async fn pending_payout_for(&self, recipient: &Address) -> Result<RawAmount, ChainError>;

    /// Submit a deposit.
    async fn deposit(
        &self,
        amount: RawAmount,
        max_price: RawAmount,
        recipient: &Address,
    ) -> Result<TxHandle, ChainError>;

    /// Submit a redeem.
    async fn redeem(&self, recipient: &Address, auto_stake: bool) -> Result<TxHandle, ChainError>;
}

/// The backing asset token contract.
#[async_trait]
pub trait ReserveContract: Send + Sync {
    /// Token balance of an account.
    async fn balance_of(&self, owner: &Address) -> Result<RawAmount, ChainError>;

    /// Spending allowance granted by `owner` to `spender`.
    async fn allowance(&self, owner: &Address, spender: &Address) -> Result<RawAmount, ChainError>;

    /// Submit an approval.
    async fn approve(&self, spender: &Address, amount: RawAmount) -> Result<TxHandle, ChainError>;

    /// Pool reserve snapshot. Errors on non-pool reserves.
    async fn pool_reserves(&self) -> Result<PoolReserves, ChainError>;
}

/// The external bonding calculator contract.
#[async_trait]
pub trait BondingCalculator: Send + Sync {
    /// Settlement-asset valuation of an amount of a pool token, 9
    /// decimals.
    async fn valuation(&self, reserve: &Address, amount: RawAmount)
        -> Result<RawAmount, ChainError>;

    /// Markdown factor for a pool token, 18 decimals.
    async fn markdown(&self, reserve: &Address) -> Result<RawAmount, ChainError>;
}

/// Protocol-wide state in raw units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolState {
    /// Total native token supply.
    pub total_supply: RawAmount,
    /// Circulating supply (staked-token view).
    pub circulating_supply: RawAmount,
    /// Raw circulating supply used for the rebase fraction.
    pub raw_circulating_supply: RawAmount,
    /// Treasury market reserves, native units.
    pub market_reserves: RawAmount,
    /// Current staking epoch.
    pub epoch: Epoch,
}

/// Protocol-level reads that belong to no single bond.
#[async_trait]
pub trait ProtocolReader: Send + Sync {
    /// Full protocol snapshot.
    async fn protocol_state(&self) -> Result<ProtocolState, ChainError>;

    /// Native token balance of an arbitrary holder.
    async fn native_balance_of(&self, holder: &Address) -> Result<RawAmount, ChainError>;

    /// Reference asset price in the settlement asset (≈ 1.0 for a
    /// stablecoin reference).
    async fn reference_price(&self) -> Result<rust_decimal::Decimal, ChainError>;

    /// Latest block timestamp.
    async fn block_timestamp(&self) -> Result<u64, ChainError>;
}

/// Factory seam the engine uses to bind contract handles.
///
/// A backend turns addresses into live call handles once, at session
/// initialization. Handles stay bound for the life of the session.
pub trait ChainClient: Send + Sync {
    /// Handle on a bond depository contract.
    fn bond_contract(&self, address: &Address) -> std::sync::Arc<dyn BondContract>;

    /// Handle on a reserve token contract.
    fn reserve_contract(&self, address: &Address) -> std::sync::Arc<dyn ReserveContract>;

    /// Handle on the bonding calculator contract.
    fn bonding_calculator(&self, address: &Address) -> std::sync::Arc<dyn BondingCalculator>;

    /// Protocol-level reader.
    fn protocol_reader(&self) -> std::sync::Arc<dyn ProtocolReader>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_slot_selected_by_address_not_position() {
        let native = Address::new("0xNATIVE");
        let paired = Address::new("0xDAI");

        let forward = PoolReserves {
            reserve0: RawAmount::new(100),
            reserve1: RawAmount::new(200),
            token0: native.clone(),
            token1: paired.clone(),
        };
        let reversed = PoolReserves {
            reserve0: RawAmount::new(200),
            reserve1: RawAmount::new(100),
            token0: paired.clone(),
            token1: native.clone(),
        };

        assert_eq!(forward.reserve_of(&native), Some(RawAmount::new(100)));
        assert_eq!(reversed.reserve_of(&native), Some(RawAmount::new(100)));
        assert_eq!(forward.reserve_opposite(&native), Some(RawAmount::new(200)));
        assert_eq!(reversed.reserve_opposite(&native), Some(RawAmount::new(200)));
    }

    #[test]
    fn unknown_token_selects_nothing() {
        let reserves = PoolReserves {
            reserve0: RawAmount::new(1),
            reserve1: RawAmount::new(2),
            token0: Address::new("0x1"),
            token1: Address::new("0x2"),
        };
        assert_eq!(reserves.reserve_of(&Address::new("0x3")), None);
    }
}

//! The polymorphic bond instrument model.
//!
//! A bond accepts a backing asset and vests a payout of the protocol's
//! native token. Backing assets differ structurally: liquidity-pool
//! shares need valuation translation through the external bonding
//! calculator, stable assets trade at par with the settlement asset.
//!
//! [`BondKind`] is the one place that distinction lives. Downstream code
//! asks the capability queries on [`Bond`] and never re-branches on the
//! variant elsewhere.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::amount::{RawAmount, TokenScale};
use crate::error::CoreError;
use crate::ids::{Address, BondId};
use crate::network::Network;

/// Backing-asset classification of a bond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BondKind {
    /// Backing asset is a pool share token; valuations go through the
    /// external bonding calculator.
    LiquidityPool,
    /// Backing asset is directly comparable to the settlement asset 1:1.
    StableAsset,
}

/// Contract addresses of one bond instrument on one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondAddresses {
    /// The bond (depository) contract.
    pub bond: Address,
    /// The reserve/backing asset contract.
    pub reserve: Address,
}

/// Static configuration of a bond instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BondConfig {
    /// Registry identifier.
    pub id: BondId,
    /// Human-readable display name.
    pub display_name: String,
    /// Backing-asset classification.
    pub kind: BondKind,
    /// Price is denominated in the reference asset rather than the
    /// protocol's native unit; valuations multiply by the reference
    /// asset price.
    pub custom_pricing: bool,
    /// Whether the instrument currently accepts deposits.
    pub active: bool,
    /// Per-network contract addresses.
    pub addresses: HashMap<Network, BondAddresses>,
}

impl BondConfig {
    /// Convenience constructor with addresses added separately.
    pub fn new(id: impl Into<BondId>, display_name: impl Into<String>, kind: BondKind) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            kind,
            custom_pricing: false,
            active: true,
            addresses: HashMap::new(),
        }
    }

    /// Mark the bond as custom-priced.
    pub fn with_custom_pricing(mut self) -> Self {
        self.custom_pricing = true;
        self
    }

    /// Mark the bond inactive.
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Register addresses for a network.
    pub fn with_addresses(mut self, network: Network, addresses: BondAddresses) -> Self {
        self.addresses.insert(network, addresses);
        self
    }
}

/// A bond instrument resolved against the active network.
///
/// Addresses are immutable after resolution; contract handles are bound
/// by the engine once a reader or signer is available.
#[derive(Debug, Clone)]
pub struct Bond {
    config: BondConfig,
    addresses: BondAddresses,
}

impl Bond {
    /// Resolve a configured bond against a network.
    ///
    /// Fails when the network has no address entry for this bond.
    pub fn resolve(config: BondConfig, network: Network) -> Result<Self, CoreError> {
        let addresses = config
            .addresses
            .get(&network)
            .cloned()
            .ok_or_else(|| CoreError::AddressResolution {
                subject: config.id.to_string(),
                network: network.to_string(),
            })?;
        Ok(Self { config, addresses })
    }

    /// Registry identifier.
    pub fn id(&self) -> &BondId {
        &self.config.id
    }

    /// Display name.
    pub fn display_name(&self) -> &str {
        &self.config.display_name
    }

    /// Backing-asset classification.
    pub fn kind(&self) -> BondKind {
        self.config.kind
    }

    /// Capability query: backing asset is a liquidity pool share.
    pub fn is_liquidity_pool(&self) -> bool {
        matches!(self.config.kind, BondKind::LiquidityPool)
    }

    /// Capability query: backing asset is a stable asset at par.
    pub fn is_stable_asset(&self) -> bool {
        matches!(self.config.kind, BondKind::StableAsset)
    }

    /// Whether the price is quoted in the reference asset.
    pub fn custom_pricing(&self) -> bool {
        self.config.custom_pricing
    }

    /// Whether the instrument accepts deposits.
    pub fn is_active(&self) -> bool {
        self.config.active
    }

    /// Resolved contract addresses.
    pub fn addresses(&self) -> &BondAddresses {
        &self.addresses
    }

    /// Scale of the backing asset. LP shares and stable reserves are
    /// both 18-decimal tokens.
    pub fn reserve_scale(&self) -> TokenScale {
        TokenScale::Wei
    }
}

/// Staking epoch snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Epoch {
    /// Epoch sequence number.
    pub number: u64,
    /// Native-unit amount distributed this epoch.
    pub distribute: RawAmount,
    /// Unix time the epoch ends.
    pub end_time: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BondConfig {
        BondConfig::new("dai_bond", "DAI", BondKind::StableAsset).with_addresses(
            Network::Local,
            BondAddresses {
                bond: Address::new("0xb0nd"),
                reserve: Address::new("0xr35e"),
            },
        )
    }

    #[test]
    fn resolve_binds_network_addresses() {
        let bond = Bond::resolve(config(), Network::Local).unwrap();
        assert_eq!(bond.addresses().bond, Address::new("0xB0ND"));
        assert!(bond.is_stable_asset());
        assert!(!bond.is_liquidity_pool());
    }

    #[test]
    fn resolve_fails_on_unconfigured_network() {
        let err = Bond::resolve(config(), Network::Mainnet).unwrap_err();
        assert!(matches!(err, CoreError::AddressResolution { .. }));
    }

    #[test]
    fn config_round_trips_through_json() {
        let original = config().with_custom_pricing().inactive();
        let json = serde_json::to_string(&original).unwrap();
        let parsed: BondConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, original.id);
        assert_eq!(parsed.kind, original.kind);
        assert!(parsed.custom_pricing);
        assert!(!parsed.active);
        assert_eq!(parsed.addresses, original.addresses);
    }

    #[test]
    fn capability_queries_are_exclusive() {
        let lp = BondConfig::new("lp_bond", "NATIVE-DAI LP", BondKind::LiquidityPool)
            .with_addresses(
                Network::Local,
                BondAddresses {
                    bond: Address::new("0x1"),
                    reserve: Address::new("0x2"),
                },
            );
        let bond = Bond::resolve(lp, Network::Local).unwrap();
        assert!(bond.is_liquidity_pool());
        assert!(!bond.is_stable_asset());
    }
}

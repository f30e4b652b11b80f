//! Per-network protocol address tables.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::CoreError;
use crate::ids::Address;

/// Supported networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Network {
    /// Production chain.
    Mainnet,
    /// Public test chain.
    Testnet,
    /// Local development node.
    Local,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Local => "local",
        };
        write!(f, "{name}")
    }
}

/// Protocol-level contract addresses for one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAddresses {
    /// Native token contract.
    pub native_token: Address,
    /// Treasury holding the backing reserves.
    pub treasury: Address,
    /// DAO allocation account (excluded from adjusted supply).
    pub dao: Address,
    /// Presale redemption account (excluded from adjusted supply).
    pub presale_redemption: Address,
    /// External bonding calculator contract.
    pub bonding_calculator: Address,
    /// Staking contract (epoch source).
    pub staking: Address,
}

static ADDRESSES: Lazy<HashMap<Network, NetworkAddresses>> = Lazy::new(|| {
    let mut map = HashMap::new();
    map.insert(
        Network::Mainnet,
        NetworkAddresses {
            native_token: Address::new("0x8b8d40f98a2f14e2dd972b3f2e2a2cc227d1e3be"),
            treasury: Address::new("0xa8b310e9c5e1f5b65e63d8a1e0b235d0a9b8a453"),
            dao: Address::new("0x2d7a09907157d3e9d28be0cb0fd46bcd3a150e70"),
            presale_redemption: Address::new("0x3a6b2b9b37a1fd5e5a1c5e58a89c5a4c2ccf0a11"),
            bonding_calculator: Address::new("0x5f2c8e4f3c1ccafc0a2c71b1b6c0ce5bb3da2e72"),
            staking: Address::new("0x6f7e8c9d0a1b2c3d4e5f60718293a4b5c6d7e8f9"),
        },
    );
    map.insert(
        Network::Testnet,
        NetworkAddresses {
            native_token: Address::new("0x1111111111111111111111111111111111111111"),
            treasury: Address::new("0x2222222222222222222222222222222222222222"),
            dao: Address::new("0x3333333333333333333333333333333333333333"),
            presale_redemption: Address::new("0x4444444444444444444444444444444444444444"),
            bonding_calculator: Address::new("0x5555555555555555555555555555555555555555"),
            staking: Address::new("0x6666666666666666666666666666666666666666"),
        },
    );
    map.insert(
        Network::Local,
        NetworkAddresses {
            native_token: Address::new("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1"),
            treasury: Address::new("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa2"),
            dao: Address::new("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa3"),
            presale_redemption: Address::new("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa4"),
            bonding_calculator: Address::new("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa5"),
            staking: Address::new("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa6"),
        },
    );
    map
});

impl Network {
    /// Protocol addresses for this network.
    pub fn addresses(self) -> Result<&'static NetworkAddresses, CoreError> {
        ADDRESSES
            .get(&self)
            .ok_or_else(|| CoreError::UnknownNetwork(self.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_network_has_addresses() {
        for network in [Network::Mainnet, Network::Testnet, Network::Local] {
            assert!(network.addresses().is_ok(), "{network} missing addresses");
        }
    }
}

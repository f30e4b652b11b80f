//! Identifier types used across the client.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Bond instrument identifier (registry key, e.g. `"dai_bond"`).
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct BondId(pub String);

impl BondId {
    /// Create a new bond ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BondId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for BondId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for BondId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Contract or account address.
///
/// Hex addresses checksummed by wallets differ only in letter case, so
/// equality and hashing are case-insensitive. Pool reserve slots are
/// selected by comparing token addresses, which makes caseless equality
/// load-bearing rather than cosmetic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    /// Create a new address.
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    /// Get the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.0.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn address_equality_ignores_case() {
        let a = Address::new("0xAd28CB10AC6FC37F0fA46c520962ef667756d166");
        let b = Address::new("0xad28cb10ac6fc37f0fa46c520962ef667756d166");
        assert_eq!(a, b);
    }

    #[test]
    fn address_hash_matches_equality() {
        let mut set = HashSet::new();
        set.insert(Address::new("0xABCDEF"));
        assert!(set.contains(&Address::new("0xabcdef")));
    }

    #[test]
    fn bond_id_display_round_trip() {
        let id = BondId::from("dai_bond");
        assert_eq!(id.to_string(), "dai_bond");
        assert_eq!(id.as_str(), "dai_bond");
    }
}

//! # Bondwise Core
//!
//! Foundation types for the Bondwise client: identifiers, contract
//! addresses, raw/decimal token amounts, the bond instrument model, and
//! the protocol constants the valuation formulas depend on.
//!
//! This crate carries no I/O and no async machinery. Everything here is
//! plain data shared by the chain, analytics, and engine layers.
//!
//! ## Module Structure
//!
//! - [`ids`]: Bond and contract address identifiers
//! - [`amount`]: Raw on-chain integers and their decimal normalization
//! - [`bond`]: The polymorphic bond instrument model
//! - [`network`]: Per-network protocol address tables
//! - [`constants`]: Named protocol economics constants

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod amount;
pub mod bond;
pub mod constants;
pub mod error;
pub mod ids;
pub mod network;

pub use amount::{RawAmount, TokenScale};
pub use bond::{Bond, BondAddresses, BondConfig, BondKind, Epoch};
pub use error::CoreError;
pub use ids::{Address, BondId};
pub use network::{Network, NetworkAddresses};

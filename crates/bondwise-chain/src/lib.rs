//! # Bondwise Chain
//!
//! Remote-call seam between the engine and the blockchain node.
//!
//! This crate defines the contract traits the engine is injected with
//! and one concrete backend:
//!
//! - [`contracts`]: async traits for the bond depository, reserve token,
//!   bonding calculator, and protocol-level reads
//! - [`tx`]: transaction handles and outcomes
//! - [`memory`]: a deterministic in-memory chain for tests and local
//!   development
//!
//! Trait methods return raw integers exactly as the contracts report
//! them. Interpretation (decimal normalization, valuation rules) lives
//! in `bondwise-analytics`; this layer has no business logic.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod contracts;
pub mod error;
pub mod memory;
pub mod tx;

pub use contracts::{
    BondContract, BondInfo, BondTerms, BondingCalculator, ChainClient, PoolReserves,
    ProtocolReader, ProtocolState, ReserveContract,
};
pub use error::ChainError;
pub use memory::MemoryChain;
pub use tx::{RevertReason, TxHandle, TxOutcome};

/// Result alias for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

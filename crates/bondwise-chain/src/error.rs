//! Chain error types.

use bondwise_core::BondId;
use thiserror::Error;

use crate::tx::RevertReason;

/// Errors surfaced by the chain layer.
#[derive(Debug, Error)]
pub enum ChainError {
    /// A read-only remote call failed. Retryable by the caller; never
    /// auto-retried here.
    #[error("read failure on {call}: {reason}")]
    ReadFailure {
        /// Bond the read belonged to, when known
        bond: Option<BondId>,
        /// Contract call that failed
        call: &'static str,
        /// Provider-supplied reason
        reason: String,
    },

    /// User declined to sign the transaction
    #[error("transaction rejected: {0}")]
    Rejected(String),

    /// Contract-level revert
    #[error("transaction reverted: {}", .0.message)]
    Reverted(RevertReason),

    /// Anything the provider reported that fits no other bucket
    #[error("unknown remote error: {0}")]
    Unknown(String),
}

impl ChainError {
    /// Convenience constructor for read failures.
    pub fn read(bond: Option<BondId>, call: &'static str, reason: impl Into<String>) -> Self {
        ChainError::ReadFailure {
            bond,
            call,
            reason: reason.into(),
        }
    }
}

//! Core error types.

use thiserror::Error;

/// Errors from core type construction and conversion.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No configured address for an instrument on the active network
    #[error("no address configured for {subject} on network {network}")]
    AddressResolution {
        /// Bond id or protocol contract name
        subject: String,
        /// Network the lookup ran against
        network: String,
    },

    /// Raw integer does not fit the decimal representation
    #[error("raw amount {raw} overflows decimal range")]
    AmountOverflow {
        /// The offending raw value
        raw: u128,
    },

    /// Network identifier not recognized
    #[error("unknown network: {0}")]
    UnknownNetwork(String),
}

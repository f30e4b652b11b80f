//! Analytics error types.

use thiserror::Error;

/// Errors from pure metric computation.
///
/// These never reach the user: the engine logs them and skips the
/// cycle, since every case is recoverable by waiting for more state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnalyticsError {
    /// A dependency of the computation is absent or zero
    #[error("insufficient state: {what}")]
    InsufficientState {
        /// The missing quantity
        what: &'static str,
    },

    /// A quantity the formula needs strictly positive was not
    #[error("non-positive quantity: {what}")]
    NonPositive {
        /// The offending quantity
        what: &'static str,
    },

    /// Raw amount failed decimal normalization
    #[error("amount conversion: {0}")]
    Amount(String),
}

impl From<bondwise_core::CoreError> for AnalyticsError {
    fn from(e: bondwise_core::CoreError) -> Self {
        AnalyticsError::Amount(e.to_string())
    }
}

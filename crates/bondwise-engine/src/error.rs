//! Engine error types.

use bondwise_core::BondId;
use thiserror::Error;

/// Engine error type.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Core type construction failed
    #[error(transparent)]
    Core(#[from] bondwise_core::CoreError),

    /// Remote call failed
    #[error(transparent)]
    Chain(#[from] bondwise_chain::ChainError),

    /// Metric computation failed
    #[error(transparent)]
    Analytics(#[from] bondwise_analytics::AnalyticsError),

    /// No bond registered under this id
    #[error("bond not found: {0}")]
    BondNotFound(BondId),

    /// A recomputation for this bond is already in flight; the request
    /// was dropped, not queued
    #[error("bond busy: {0}")]
    Busy(BondId),

    /// Dependency gate failed before a computation
    #[error("missing state: {0}")]
    MissingState(&'static str),

    /// A precondition changed across a suspension point; the result was
    /// discarded
    #[error("computation superseded")]
    Superseded,

    /// Bond does not accept deposits
    #[error("bond inactive: {0}")]
    Inactive(BondId),

    /// No signer bound to the session
    #[error("no signer available")]
    NoSigner,
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

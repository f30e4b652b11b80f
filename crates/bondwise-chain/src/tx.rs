//! Transaction handles and outcomes.

use serde::{Deserialize, Serialize};

use crate::error::ChainError;

/// Provider-supplied revert information.
///
/// An uninterpreted blob: code and message text vary across chain
/// clients and client versions. Classification into the user-facing
/// taxonomy happens in exactly one place in the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevertReason {
    /// Provider error code (`-32603` internal, `4001` user rejection).
    pub code: Option<i64>,
    /// Top-level message text.
    pub message: String,
    /// Nested data message, when the provider wraps the VM error.
    pub data: Option<String>,
}

impl RevertReason {
    /// Build a reason with just a message.
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            code: None,
            message: text.into(),
            data: None,
        }
    }
}

/// Terminal state of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome {
    /// Mined and succeeded.
    Confirmed,
    /// Mined and reverted, or dropped with a provider error.
    Reverted(RevertReason),
}

/// Handle to a submitted transaction.
///
/// Submission and confirmation are separate suspension points: the
/// pending-transaction bookkeeping in the engine happens between them.
#[derive(Debug)]
pub struct TxHandle {
    /// Transaction hash as reported at submission.
    pub hash: String,
    outcome: tokio::sync::oneshot::Receiver<TxOutcome>,
}

impl TxHandle {
    /// Create a handle whose outcome arrives on the given channel.
    pub fn new(hash: impl Into<String>, outcome: tokio::sync::oneshot::Receiver<TxOutcome>) -> Self {
        Self {
            hash: hash.into(),
            outcome,
        }
    }

    /// Create an already-resolved handle.
    pub fn resolved(hash: impl Into<String>, outcome: TxOutcome) -> Self {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let _ = tx.send(outcome);
        Self::new(hash, rx)
    }

    /// Wait for the transaction to reach a terminal state.
    pub async fn wait(self) -> Result<TxOutcome, ChainError> {
        self.outcome
            .await
            .map_err(|_| ChainError::Unknown("transaction outcome channel dropped".into()))
    }
}

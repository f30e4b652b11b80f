//! Pending-transaction bookkeeping and revert classification.

use serde::{Deserialize, Serialize};

use bondwise_chain::RevertReason;

use crate::notify::{Notification, Severity};

/// Operation type a pending transaction belongs to. The UI keys its
/// in-progress indicators on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PendingKind {
    /// Reserve-token approval toward a depository.
    Approval,
    /// Bond deposit.
    Bonding,
    /// Redeem without staking.
    Redeeming,
    /// Redeem with auto-stake.
    RedeemStaking,
}

/// A recorded in-flight transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Transaction hash as submitted.
    pub hash: String,
    /// Operation type.
    pub kind: PendingKind,
}

/// User-facing classification of a revert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevertClass {
    /// Deposit larger than the signer's backing-asset balance
    /// (arithmetic underflow inside the backing contract).
    BackingUnderflow,
    /// Not enough funds to cover the call.
    InsufficientBalance,
    /// Deposit below the depository's minimum.
    BelowMinimum,
    /// User declined signing.
    UserRejected,
    /// Anything unrecognized.
    Unknown,
}

impl RevertClass {
    /// Display text for this classification.
    pub fn description(self) -> &'static str {
        match self {
            RevertClass::BackingUnderflow => "You are trying to bond more than your balance",
            RevertClass::InsufficientBalance => "Insufficient balance for this transaction",
            RevertClass::BelowMinimum => "Bond amount is below the minimum",
            RevertClass::UserRejected => "Transaction signature was denied",
            RevertClass::Unknown => "Something went wrong",
        }
    }
}

// Provider error codes, as emitted by common wallet RPC providers.
const CODE_INTERNAL: i64 = -32603;
const CODE_USER_REJECTED: i64 = 4001;

/// Classify a provider revert reason.
///
/// Substring matching against provider message text is inherently
/// fragile and version-dependent, so every matching rule lives here and
/// nowhere else. Call sites consume the classification, never the
/// message text.
pub fn classify_revert(reason: &RevertReason) -> RevertClass {
    let data = reason.data.as_deref().unwrap_or("");

    match reason.code {
        Some(CODE_USER_REJECTED) if reason.message.contains("User denied transaction signature") => {
            RevertClass::UserRejected
        }
        Some(CODE_INTERNAL) => {
            if reason.message.contains("ds-math-sub-underflow")
                || data.contains("ds-math-sub-underflow")
            {
                RevertClass::BackingUnderflow
            } else if data.contains("gas required exceeds allowance") {
                RevertClass::InsufficientBalance
            } else if data.contains("Bond too small") || reason.message.contains("Bond too small") {
                RevertClass::BelowMinimum
            } else {
                RevertClass::Unknown
            }
        }
        _ => {
            // Some providers omit codes entirely; fall back to text.
            if reason.message.contains("Bond too small") {
                RevertClass::BelowMinimum
            } else if reason.message.contains("ds-math-sub-underflow") {
                RevertClass::BackingUnderflow
            } else {
                RevertClass::Unknown
            }
        }
    }
}

/// Translate a revert into the user-facing notification, preserving
/// the raw reason for diagnostics.
pub fn translate_revert(reason: &RevertReason) -> Notification {
    let class = classify_revert(reason);
    let detail = match (&reason.data, reason.code) {
        (Some(data), Some(code)) => format!("code {code}: {data}"),
        (Some(data), None) => data.clone(),
        (None, Some(code)) => format!("code {code}: {}", reason.message),
        (None, None) => reason.message.clone(),
    };
    Notification {
        severity: Severity::Error,
        description: class.description().to_string(),
        detailed: Some(detail),
    }
}

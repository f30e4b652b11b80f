//! # Bondwise Engine
//!
//! Session orchestration for the Bondwise client. The engine owns the
//! in-memory snapshot rebuilt from chain reads on each load and drives
//! the three-stage pipeline: read raw state, compute metrics, commit
//! the snapshot. Commit is the only mutation point.
//!
//! ## Module Structure
//!
//! - [`metrics`]: snapshot data types (per-bond and protocol metrics)
//! - [`snapshot`]: the single-writer snapshot store
//! - [`notify`]: fan-out notification publisher for the UI collaborator
//! - [`transactions`]: pending-transaction bookkeeping and revert
//!   classification
//! - [`engine`]: the [`Engine`] itself: refresh triggers and the
//!   approve/deposit/redeem lifecycle
//!
//! Ordering contract: protocol metrics must be fetched before any
//! bond-level computation; bond metrics before treasury aggregation.
//! Bond refreshes for different bonds are independent and fanned out;
//! each bond enforces at-most-one-in-flight recomputation through its
//! loading flag (a refresh arriving while one is in flight is dropped,
//! not queued).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod snapshot;
pub mod transactions;

pub use engine::{Engine, EngineConfig};
pub use error::{EngineError, EngineResult};
pub use metrics::{BondMetrics, CoreMetrics, MarketData};
pub use notify::{Notification, Notifier, Severity};
pub use snapshot::Snapshot;
pub use transactions::{PendingKind, RevertClass, TransactionRecord};

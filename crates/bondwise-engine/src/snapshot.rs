//! The single-writer snapshot store.
//!
//! All session state lives here: protocol metrics, market data,
//! per-bond metrics, derived treasury metrics, and pending
//! transactions. Readers receive clones; the commit methods are the
//! only writers, which keeps the read→compute→commit pipeline honest —
//! a computation that loses its precondition simply never commits.

use std::collections::HashMap;

use rust_decimal::Decimal;
use tokio::sync::RwLock;

use bondwise_analytics::TreasuryMetrics;
use bondwise_core::BondId;

use crate::metrics::{BondMetrics, CoreMetrics, MarketData};
use crate::transactions::{PendingKind, TransactionRecord};

#[derive(Default)]
struct State {
    core: Option<CoreMetrics>,
    market: Option<MarketData>,
    bonds: HashMap<BondId, BondMetrics>,
    treasury: Option<TreasuryMetrics>,
    pending: HashMap<PendingKind, TransactionRecord>,
}

/// In-memory session snapshot.
#[derive(Default)]
pub struct Snapshot {
    state: RwLock<State>,
}

impl Snapshot {
    /// Create an empty snapshot with all-null metrics for the given
    /// bonds.
    pub fn new(bond_ids: impl IntoIterator<Item = BondId>) -> Self {
        let bonds = bond_ids
            .into_iter()
            .map(|id| (id, BondMetrics::default()))
            .collect();
        Self {
            state: RwLock::new(State {
                bonds,
                ..State::default()
            }),
        }
    }

    // =========================================================================
    // READ ACCESSORS
    // =========================================================================

    /// Protocol metrics, when fetched.
    pub async fn core_metrics(&self) -> Option<CoreMetrics> {
        self.state.read().await.core
    }

    /// Market data, when fetched.
    pub async fn market_data(&self) -> Option<MarketData> {
        self.state.read().await.market
    }

    /// Metrics for one bond.
    pub async fn bond_metrics(&self, id: &BondId) -> Option<BondMetrics> {
        self.state.read().await.bonds.get(id).cloned()
    }

    /// Derived treasury metrics, when computed.
    pub async fn treasury_metrics(&self) -> Option<TreasuryMetrics> {
        self.state.read().await.treasury
    }

    /// Pending transaction of the given kind, if any.
    pub async fn pending(&self, kind: PendingKind) -> Option<TransactionRecord> {
        self.state.read().await.pending.get(&kind).cloned()
    }

    // =========================================================================
    // COMMITS
    // =========================================================================

    /// Commit the protocol snapshot and market data together. Both
    /// arrive from one fetch cycle; committing them atomically keeps
    /// the fail-closed gate simple.
    pub async fn commit_protocol(&self, core: CoreMetrics, market: MarketData) {
        let mut state = self.state.write().await;
        state.core = Some(core);
        state.market = Some(market);
    }

    /// Supersede one bond's metrics with the given mutation.
    ///
    /// The closure runs under the write lock; keep it to plain field
    /// assignment.
    pub async fn commit_bond(&self, id: &BondId, apply: impl FnOnce(&mut BondMetrics)) {
        let mut state = self.state.write().await;
        if let Some(metrics) = state.bonds.get_mut(id) {
            apply(metrics);
        }
    }

    /// Commit the derived treasury metrics.
    pub async fn commit_treasury(&self, metrics: TreasuryMetrics) {
        self.state.write().await.treasury = Some(metrics);
    }

    // =========================================================================
    // LOADING FLAG
    // =========================================================================

    /// Try to start a fetch/compute cycle for a bond. Returns `false`
    /// when one is already in flight (the caller drops the request) or
    /// the bond is unknown.
    pub async fn try_begin_loading(&self, id: &BondId) -> bool {
        let mut state = self.state.write().await;
        match state.bonds.get_mut(id) {
            Some(metrics) if !metrics.loading => {
                metrics.loading = true;
                true
            }
            _ => false,
        }
    }

    /// End a bond's fetch/compute cycle.
    pub async fn end_loading(&self, id: &BondId) {
        let mut state = self.state.write().await;
        if let Some(metrics) = state.bonds.get_mut(id) {
            metrics.loading = false;
        }
    }

    // =========================================================================
    // PENDING TRANSACTIONS
    // =========================================================================

    /// Record a pending transaction.
    pub async fn add_pending(&self, record: TransactionRecord) {
        self.state.write().await.pending.insert(record.kind, record);
    }

    /// Clear the pending transaction of a kind. Returns the cleared
    /// record, if one was present.
    pub async fn clear_pending(&self, kind: PendingKind) -> Option<TransactionRecord> {
        self.state.write().await.pending.remove(&kind)
    }

    /// Treasury balances of all bonds partitioned into (LP, stable)
    /// sums, using the given classifier. Bonds with no committed
    /// balance contribute zero.
    pub async fn treasury_sums(
        &self,
        is_lp: impl Fn(&BondId) -> bool,
    ) -> (Decimal, Decimal) {
        let state = self.state.read().await;
        let mut lp_sum = Decimal::ZERO;
        let mut stable_sum = Decimal::ZERO;
        for (id, metrics) in &state.bonds {
            let balance = metrics.treasury_balance.unwrap_or(Decimal::ZERO);
            if is_lp(id) {
                lp_sum += balance;
            } else {
                stable_sum += balance;
            }
        }
        (lp_sum, stable_sum)
    }
}

//! Deterministic in-memory chain backend.
//!
//! Implements every contract trait over shared in-process state. Used
//! by the engine's integration tests and as the local-development
//! backend. Supports per-call failure injection and scripted revert
//! reasons so transaction-lifecycle paths can be exercised without a
//! node.
//!
//! Simulation fidelity is intentionally shallow: payouts and valuations
//! are linear factors configured per contract, not reimplementations of
//! the depository math.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;
use rust_decimal::Decimal;

use async_trait::async_trait;
use bondwise_core::{Address, Epoch, RawAmount};

use crate::contracts::{
    BondContract, BondInfo, BondTerms, BondingCalculator, ChainClient, PoolReserves,
    ProtocolReader, ProtocolState, ReserveContract,
};
use crate::error::ChainError;
use crate::tx::{RevertReason, TxHandle, TxOutcome};

/// Linear factor `amount × numerator / denominator` over raw integers.
#[derive(Debug, Clone, Copy)]
pub struct LinearFactor {
    /// Multiplier.
    pub numerator: u128,
    /// Divisor. Must be non-zero.
    pub denominator: u128,
}

impl LinearFactor {
    /// Identity factor.
    pub const ONE: LinearFactor = LinearFactor {
        numerator: 1,
        denominator: 1,
    };

    fn apply(&self, amount: RawAmount) -> RawAmount {
        RawAmount::new(amount.0 * self.numerator / self.denominator)
    }
}

#[derive(Debug, Clone, Default)]
struct DepositoryState {
    terms: Option<BondTerms>,
    max_payout: RawAmount,
    bond_price: RawAmount,
    bond_price_in_reference: RawAmount,
    payout_factor: Option<LinearFactor>,
    positions: HashMap<Address, BondInfo>,
    pending_payouts: HashMap<Address, RawAmount>,
}

#[derive(Debug, Clone, Default)]
struct TokenState {
    balances: HashMap<Address, RawAmount>,
    allowances: HashMap<(Address, Address), RawAmount>,
    pool: Option<PoolReserves>,
}

#[derive(Debug, Clone, Default)]
struct CalculatorState {
    valuation_factors: HashMap<Address, LinearFactor>,
    markdowns: HashMap<Address, RawAmount>,
}

#[derive(Default)]
struct Inner {
    depositories: HashMap<Address, DepositoryState>,
    tokens: HashMap<Address, TokenState>,
    calculator: CalculatorState,
    protocol: Option<ProtocolState>,
    native_balances: HashMap<Address, RawAmount>,
    reference_price: Decimal,
    timestamp: u64,
    // Failure injection: call names that fail on every invocation.
    failing_calls: HashSet<&'static str>,
    // Scripted outcomes consumed by successive transaction submissions.
    scripted_reverts: VecDeque<RevertReason>,
    tx_counter: u64,
}

impl Inner {
    fn check(&self, call: &'static str) -> Result<(), ChainError> {
        if self.failing_calls.contains(call) {
            Err(ChainError::read(None, call, "injected failure"))
        } else {
            Ok(())
        }
    }

    fn next_tx(&mut self) -> (String, TxOutcome) {
        self.tx_counter += 1;
        let hash = format!("0xmem{:08x}", self.tx_counter);
        let outcome = match self.scripted_reverts.pop_front() {
            Some(reason) => TxOutcome::Reverted(reason),
            None => TxOutcome::Confirmed,
        };
        (hash, outcome)
    }
}

/// Shared in-memory chain state.
///
/// Cloning is cheap; all clones and all handles bound through
/// [`ChainClient`] observe the same state.
#[derive(Clone, Default)]
pub struct MemoryChain {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // STATE SETUP
    // =========================================================================

    /// Set the protocol snapshot.
    pub fn set_protocol_state(&self, state: ProtocolState) {
        self.inner.write().protocol = Some(state);
    }

    /// Set the reference asset price.
    pub fn set_reference_price(&self, price: Decimal) {
        self.inner.write().reference_price = price;
    }

    /// Set the block timestamp.
    pub fn set_timestamp(&self, timestamp: u64) {
        self.inner.write().timestamp = timestamp;
    }

    /// Configure a depository contract.
    pub fn set_depository(
        &self,
        bond: &Address,
        terms: BondTerms,
        max_payout: RawAmount,
        bond_price: RawAmount,
        bond_price_in_reference: RawAmount,
        payout_factor: LinearFactor,
    ) {
        let mut inner = self.inner.write();
        let state = inner.depositories.entry(bond.clone()).or_default();
        state.terms = Some(terms);
        state.max_payout = max_payout;
        state.bond_price = bond_price;
        state.bond_price_in_reference = bond_price_in_reference;
        state.payout_factor = Some(payout_factor);
    }

    /// Set a holder's position on a depository.
    pub fn set_position(&self, bond: &Address, holder: &Address, info: BondInfo, pending: RawAmount) {
        let mut inner = self.inner.write();
        let state = inner.depositories.entry(bond.clone()).or_default();
        state.positions.insert(holder.clone(), info);
        state.pending_payouts.insert(holder.clone(), pending);
    }

    /// Set a holder's native token balance.
    pub fn set_native_balance(&self, holder: &Address, amount: RawAmount) {
        self.inner
            .write()
            .native_balances
            .insert(holder.clone(), amount);
    }

    /// Set a token balance.
    pub fn set_balance(&self, token: &Address, owner: &Address, amount: RawAmount) {
        let mut inner = self.inner.write();
        inner
            .tokens
            .entry(token.clone())
            .or_default()
            .balances
            .insert(owner.clone(), amount);
    }

    /// Set pool reserves on a token.
    pub fn set_pool_reserves(&self, token: &Address, reserves: PoolReserves) {
        self.inner.write().tokens.entry(token.clone()).or_default().pool = Some(reserves);
    }

    /// Configure the bonding calculator for a reserve token.
    pub fn set_calculator(&self, reserve: &Address, valuation: LinearFactor, markdown: RawAmount) {
        let mut inner = self.inner.write();
        inner
            .calculator
            .valuation_factors
            .insert(reserve.clone(), valuation);
        inner.calculator.markdowns.insert(reserve.clone(), markdown);
    }

    // =========================================================================
    // FAULT INJECTION
    // =========================================================================

    /// Make every invocation of the named call fail.
    pub fn fail_call(&self, call: &'static str) {
        self.inner.write().failing_calls.insert(call);
    }

    /// Restore a failing call.
    pub fn restore_call(&self, call: &'static str) {
        self.inner.write().failing_calls.remove(call);
    }

    /// Queue a revert reason for the next submitted transaction.
    pub fn script_revert(&self, reason: RevertReason) {
        self.inner.write().scripted_reverts.push_back(reason);
    }
}

impl ChainClient for MemoryChain {
    fn bond_contract(&self, address: &Address) -> Arc<dyn BondContract> {
        Arc::new(MemoryBond {
            chain: self.inner.clone(),
            address: address.clone(),
        })
    }

    fn reserve_contract(&self, address: &Address) -> Arc<dyn ReserveContract> {
        Arc::new(MemoryReserve {
            chain: self.inner.clone(),
            address: address.clone(),
        })
    }

    fn bonding_calculator(&self, _address: &Address) -> Arc<dyn BondingCalculator> {
        Arc::new(MemoryCalculator {
            chain: self.inner.clone(),
        })
    }

    fn protocol_reader(&self) -> Arc<dyn ProtocolReader> {
        Arc::new(MemoryProtocol {
            chain: self.inner.clone(),
        })
    }
}

// =============================================================================
// BOND DEPOSITORY HANDLE
// =============================================================================

struct MemoryBond {
    chain: Arc<RwLock<Inner>>,
    address: Address,
}

impl MemoryBond {
    fn with_state<T>(
        &self,
        call: &'static str,
        f: impl FnOnce(&DepositoryState) -> T,
    ) -> Result<T, ChainError> {
        let inner = self.chain.read();
        inner.check(call)?;
        inner
            .depositories
            .get(&self.address)
            .map(f)
            .ok_or_else(|| ChainError::read(None, call, "no depository at address"))
    }
}

#[async_trait]
impl BondContract for MemoryBond {
    async fn terms(&self) -> Result<BondTerms, ChainError> {
        self.with_state("terms", |s| s.terms)?
            .ok_or_else(|| ChainError::read(None, "terms", "terms not configured"))
    }

    async fn max_payout(&self) -> Result<RawAmount, ChainError> {
        self.with_state("max_payout", |s| s.max_payout)
    }

    async fn bond_price(&self) -> Result<RawAmount, ChainError> {
        self.with_state("bond_price", |s| s.bond_price)
    }

    async fn bond_price_in_reference(&self) -> Result<RawAmount, ChainError> {
        self.with_state("bond_price_in_reference", |s| s.bond_price_in_reference)
    }

    async fn payout_for(&self, value: RawAmount) -> Result<RawAmount, ChainError> {
        let factor = self
            .with_state("payout_for", |s| s.payout_factor)?
            .ok_or_else(|| ChainError::read(None, "payout_for", "payout factor not configured"))?;
        Ok(factor.apply(value))
    }

    async fn bond_info(&self, recipient: &Address) -> Result<BondInfo, ChainError> {
        self.with_state("bond_info", |s| {
            s.positions.get(recipient).copied().unwrap_or(BondInfo {
                payout: RawAmount::ZERO,
                vesting: 0,
                last_time: 0,
            })
        })
    }

    async fn pending_payout_for(&self, recipient: &Address) -> Result<RawAmount, ChainError> {
        self.with_state("pending_payout_for", |s| {
            s.pending_payouts
                .get(recipient)
                .copied()
                .unwrap_or(RawAmount::ZERO)
        })
    }

    async fn deposit(
        &self,
        amount: RawAmount,
        _max_price: RawAmount,
        recipient: &Address,
    ) -> Result<TxHandle, ChainError> {
        let mut inner = self.chain.write();
        inner.check("deposit")?;
        let (hash, outcome) = inner.next_tx();

        if outcome == TxOutcome::Confirmed {
            let payout = inner
                .depositories
                .get(&self.address)
                .and_then(|s| s.payout_factor)
                .map(|f| f.apply(amount))
                .unwrap_or(RawAmount::ZERO);
            let timestamp = inner.timestamp;
            if let Some(state) = inner.depositories.get_mut(&self.address) {
                let position = state.positions.entry(recipient.clone()).or_insert(BondInfo {
                    payout: RawAmount::ZERO,
                    vesting: 0,
                    last_time: timestamp,
                });
                position.payout = RawAmount::new(position.payout.0 + payout.0);
                position.last_time = timestamp;
                if let Some(terms) = state.terms {
                    position.vesting = terms.vesting_term_secs;
                }
            }
        }

        Ok(TxHandle::resolved(hash, outcome))
    }

    async fn redeem(&self, recipient: &Address, _auto_stake: bool) -> Result<TxHandle, ChainError> {
        let mut inner = self.chain.write();
        inner.check("redeem")?;
        let (hash, outcome) = inner.next_tx();

        if outcome == TxOutcome::Confirmed {
            if let Some(state) = inner.depositories.get_mut(&self.address) {
                state.pending_payouts.insert(recipient.clone(), RawAmount::ZERO);
            }
        }

        Ok(TxHandle::resolved(hash, outcome))
    }
}

// =============================================================================
// RESERVE TOKEN HANDLE
// =============================================================================

struct MemoryReserve {
    chain: Arc<RwLock<Inner>>,
    address: Address,
}

#[async_trait]
impl ReserveContract for MemoryReserve {
    async fn balance_of(&self, owner: &Address) -> Result<RawAmount, ChainError> {
        let inner = self.chain.read();
        inner.check("balance_of")?;
        Ok(inner
            .tokens
            .get(&self.address)
            .and_then(|t| t.balances.get(owner))
            .copied()
            .unwrap_or(RawAmount::ZERO))
    }

    async fn allowance(&self, owner: &Address, spender: &Address) -> Result<RawAmount, ChainError> {
        let inner = self.chain.read();
        inner.check("allowance")?;
        Ok(inner
            .tokens
            .get(&self.address)
            .and_then(|t| t.allowances.get(&(owner.clone(), spender.clone())))
            .copied()
            .unwrap_or(RawAmount::ZERO))
    }

    async fn approve(&self, spender: &Address, amount: RawAmount) -> Result<TxHandle, ChainError> {
        let mut inner = self.chain.write();
        inner.check("approve")?;
        let (hash, outcome) = inner.next_tx();

        if outcome == TxOutcome::Confirmed {
            // The engine re-reads allowance after confirmation; the
            // grantor is whichever owner the engine queries, so grant to
            // every known owner of this token.
            let owners: Vec<Address> = inner
                .tokens
                .get(&self.address)
                .map(|t| t.balances.keys().cloned().collect())
                .unwrap_or_default();
            if let Some(token) = inner.tokens.get_mut(&self.address) {
                for owner in owners {
                    token.allowances.insert((owner, spender.clone()), amount);
                }
            }
        }

        Ok(TxHandle::resolved(hash, outcome))
    }

    async fn pool_reserves(&self) -> Result<PoolReserves, ChainError> {
        let inner = self.chain.read();
        inner.check("pool_reserves")?;
        inner
            .tokens
            .get(&self.address)
            .and_then(|t| t.pool.clone())
            .ok_or_else(|| ChainError::read(None, "pool_reserves", "token is not a pool"))
    }
}

// =============================================================================
// BONDING CALCULATOR HANDLE
// =============================================================================

struct MemoryCalculator {
    chain: Arc<RwLock<Inner>>,
}

#[async_trait]
impl BondingCalculator for MemoryCalculator {
    async fn valuation(
        &self,
        reserve: &Address,
        amount: RawAmount,
    ) -> Result<RawAmount, ChainError> {
        let inner = self.chain.read();
        inner.check("valuation")?;
        inner
            .calculator
            .valuation_factors
            .get(reserve)
            .map(|f| f.apply(amount))
            .ok_or_else(|| ChainError::read(None, "valuation", "no valuation factor for reserve"))
    }

    async fn markdown(&self, reserve: &Address) -> Result<RawAmount, ChainError> {
        let inner = self.chain.read();
        inner.check("markdown")?;
        inner
            .calculator
            .markdowns
            .get(reserve)
            .copied()
            .ok_or_else(|| ChainError::read(None, "markdown", "no markdown for reserve"))
    }
}

// =============================================================================
// PROTOCOL READER HANDLE
// =============================================================================

struct MemoryProtocol {
    chain: Arc<RwLock<Inner>>,
}

#[async_trait]
impl ProtocolReader for MemoryProtocol {
    async fn protocol_state(&self) -> Result<ProtocolState, ChainError> {
        let inner = self.chain.read();
        inner.check("protocol_state")?;
        inner
            .protocol
            .ok_or_else(|| ChainError::read(None, "protocol_state", "protocol state not set"))
    }

    async fn native_balance_of(&self, holder: &Address) -> Result<RawAmount, ChainError> {
        let inner = self.chain.read();
        inner.check("native_balance_of")?;
        Ok(inner
            .native_balances
            .get(holder)
            .copied()
            .unwrap_or(RawAmount::ZERO))
    }

    async fn reference_price(&self) -> Result<Decimal, ChainError> {
        let inner = self.chain.read();
        inner.check("reference_price")?;
        Ok(inner.reference_price)
    }

    async fn block_timestamp(&self) -> Result<u64, ChainError> {
        let inner = self.chain.read();
        inner.check("block_timestamp")?;
        Ok(inner.timestamp)
    }
}

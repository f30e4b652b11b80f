//! The session engine.
//!
//! Owns the bond registry, the bound contract handles, and the
//! snapshot, and exposes the trigger API the UI collaborator drives:
//! `refresh_protocol`, `refresh_bond`, `refresh_treasury`,
//! `refresh_account`, and the approve/deposit/redeem lifecycle.
//!
//! Every refresh is a read→compute→commit pipeline. Reads suspend at
//! each remote call; preconditions (the bound signer) are re-checked
//! after the compute stage and a superseded result is dropped rather
//! than committed.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::RwLock;

use bondwise_analytics as analytics;
use bondwise_analytics::TreasuryInputs;
use bondwise_chain::{
    BondContract, BondingCalculator, ChainClient, ChainError, ProtocolReader, ReserveContract,
    TxHandle, TxOutcome,
};
use bondwise_core::constants::{DEFAULT_SLIPPAGE, UNIT_DEPOSIT_WEI};
use bondwise_core::{
    Address, Bond, BondConfig, BondId, Network, NetworkAddresses, RawAmount, TokenScale,
};

use crate::error::{EngineError, EngineResult};
use crate::metrics::{CoreMetrics, MarketData};
use crate::notify::Notifier;
use crate::snapshot::Snapshot;
use crate::transactions::{translate_revert, PendingKind, RevertClass, TransactionRecord};

// User-facing message text. The notification collaborator renders
// these verbatim.
const MSG_TX_SENT: &str = "Transaction submitted successfully";
const MSG_BALANCE_SOON: &str = "Your balance will update soon";
const MSG_BALANCE_UPDATED: &str = "Your balance has been updated";

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Active network.
    pub network: Network,
    /// Bond instruments to register.
    pub bonds: Vec<BondConfig>,
}

/// A bond with its contract handles bound.
struct BoundBond {
    bond: Bond,
    depository: Arc<dyn BondContract>,
    reserve: Arc<dyn ReserveContract>,
}

/// The session engine.
pub struct Engine {
    network: Network,
    protocol_addresses: &'static NetworkAddresses,
    reader: Arc<dyn ProtocolReader>,
    calculator: Arc<dyn BondingCalculator>,
    bonds: HashMap<BondId, BoundBond>,
    snapshot: Snapshot,
    notifier: Notifier,
    signer: RwLock<Option<Address>>,
}

impl Engine {
    /// Initialize a session: resolve every configured bond against the
    /// network and bind contract handles through the chain client.
    ///
    /// Fails with an address-resolution error when any configured bond
    /// has no addresses on the active network.
    pub fn initialize(config: EngineConfig, chain: Arc<dyn ChainClient>) -> EngineResult<Self> {
        let protocol_addresses = config.network.addresses()?;

        let mut bonds = HashMap::new();
        for bond_config in config.bonds {
            let bond = Bond::resolve(bond_config, config.network)?;
            let addresses = bond.addresses().clone();
            let bound = BoundBond {
                depository: chain.bond_contract(&addresses.bond),
                reserve: chain.reserve_contract(&addresses.reserve),
                bond,
            };
            bonds.insert(bound.bond.id().clone(), bound);
        }

        let snapshot = Snapshot::new(bonds.keys().cloned());
        tracing::info!(
            network = %config.network,
            bonds = bonds.len(),
            "session initialized"
        );

        Ok(Self {
            network: config.network,
            protocol_addresses,
            reader: chain.protocol_reader(),
            calculator: chain.bonding_calculator(&protocol_addresses.bonding_calculator),
            bonds,
            snapshot,
            notifier: Notifier::default(),
            signer: RwLock::new(None),
        })
    }

    /// Active network.
    pub fn network(&self) -> Network {
        self.network
    }

    /// The session snapshot (read accessors for the UI).
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// The notification publisher.
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Registered bonds.
    pub fn bonds(&self) -> impl Iterator<Item = &Bond> {
        self.bonds.values().map(|b| &b.bond)
    }

    /// Bind or clear the signer address. Computations in flight when
    /// the signer changes will observe the change at their commit gate
    /// and drop their results.
    pub async fn set_signer(&self, signer: Option<Address>) {
        *self.signer.write().await = signer;
    }

    fn bound(&self, id: &BondId) -> EngineResult<&BoundBond> {
        self.bonds
            .get(id)
            .ok_or_else(|| EngineError::BondNotFound(id.clone()))
    }

    async fn require_signer(&self) -> EngineResult<Address> {
        self.signer
            .read()
            .await
            .clone()
            .ok_or(EngineError::NoSigner)
    }

    async fn require_protocol(&self) -> EngineResult<(CoreMetrics, MarketData)> {
        let core = self
            .snapshot
            .core_metrics()
            .await
            .ok_or(EngineError::MissingState("protocol metrics"))?;
        let market = self
            .snapshot
            .market_data()
            .await
            .ok_or(EngineError::MissingState("market data"))?;
        Ok((core, market))
    }

    // =========================================================================
    // REFRESH: PROTOCOL
    // =========================================================================

    /// Fetch and commit the protocol snapshot and market data.
    ///
    /// Fail-closed: any read failure leaves the previous snapshot
    /// untouched, so downstream gates keep blocking.
    pub async fn refresh_protocol(&self) -> EngineResult<()> {
        let state = self.reader.protocol_state().await?;
        let reference_price = self.reader.reference_price().await?;

        let core = CoreMetrics {
            total_supply: state.total_supply.to_decimal(TokenScale::Native)?,
            circulating_supply: state.circulating_supply.to_decimal(TokenScale::Native)?,
            raw_circulating_supply: state.raw_circulating_supply.to_decimal(TokenScale::Native)?,
            reserves: state.market_reserves,
            epoch: state.epoch,
        };
        self.snapshot
            .commit_protocol(core, MarketData { reference_price })
            .await;

        tracing::info!(epoch = state.epoch.number, "protocol metrics refreshed");
        Ok(())
    }

    // =========================================================================
    // REFRESH: PER-BOND METRICS
    // =========================================================================

    /// Recompute one bond's metrics, quoting `deposit_amount` of the
    /// backing asset (zero for a pure display refresh).
    ///
    /// Dropped (not queued) when a cycle for this bond is already in
    /// flight. Computation-layer gaps — protocol metrics not yet
    /// fetched, a zero price — skip the cycle silently; read failures
    /// propagate.
    pub async fn refresh_bond(&self, id: &BondId, deposit_amount: Decimal) -> EngineResult<()> {
        let bound = self.bound(id)?;
        if !self.snapshot.try_begin_loading(id).await {
            tracing::debug!(bond = %id, "refresh dropped, computation in flight");
            return Err(EngineError::Busy(id.clone()));
        }

        let result = self.compute_bond_metrics(bound, deposit_amount).await;
        self.snapshot.end_loading(id).await;

        match result {
            Ok(()) => Ok(()),
            Err(EngineError::MissingState(what)) => {
                tracing::debug!(bond = %id, what, "bond refresh skipped");
                Ok(())
            }
            Err(EngineError::Analytics(e)) => {
                tracing::debug!(bond = %id, error = %e, "bond refresh skipped");
                Ok(())
            }
            Err(EngineError::Superseded) => {
                tracing::debug!(bond = %id, "bond refresh superseded");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(bond = %id, error = %e, "bond refresh failed");
                Err(e)
            }
        }
    }

    async fn compute_bond_metrics(
        &self,
        bound: &BoundBond,
        deposit_amount: Decimal,
    ) -> EngineResult<()> {
        let (core, market) = self.require_protocol().await?;
        let signer_at_start = self.signer.read().await.clone();

        let bond = &bound.bond;
        let id = bond.id();
        let reserve_address = &bond.addresses().reserve;

        // Raw reads.
        let terms = bound.depository.terms().await?;
        let max_payout = bound.depository.max_payout().await?;
        let raw_price = bound.depository.bond_price_in_reference().await?;
        let held = bound
            .reserve
            .balance_of(&self.protocol_addresses.treasury)
            .await?;

        // Pure computation.
        let market_price = analytics::market_price(core.reserves, market.reference_price)?;
        let bond_price =
            analytics::bond_price(raw_price, bond.custom_pricing(), market.reference_price)?;
        let bond_discount = analytics::discount(core.reserves, bond_price)?;

        let deposit_wei = RawAmount::from_decimal(deposit_amount, bond.reserve_scale())?;
        let unit_wei = RawAmount::new(UNIT_DEPOSIT_WEI);

        let (quote, purchased) = if bond.is_liquidity_pool() {
            let valuation = self.calculator.valuation(reserve_address, deposit_wei).await?;
            let unit_valuation = self.calculator.valuation(reserve_address, unit_wei).await?;
            let payout = bound.depository.payout_for(valuation).await?;
            let unit_payout = bound.depository.payout_for(unit_valuation).await?;
            let quote = analytics::lp_quote(payout, unit_payout, max_payout)?;

            let held_valuation = self.calculator.valuation(reserve_address, held).await?;
            let markdown = self.calculator.markdown(reserve_address).await?;
            let purchased = analytics::lp_purchased(
                held_valuation,
                markdown,
                bond.custom_pricing(),
                market.reference_price,
            )?;
            (quote, purchased)
        } else {
            let payout = bound.depository.payout_for(deposit_wei).await?;
            let unit_payout = bound.depository.payout_for(unit_wei).await?;
            let quote = analytics::stable_quote(payout, unit_payout, max_payout)?;

            let purchased = analytics::stable_purchased(
                held,
                bond.custom_pricing(),
                market.reference_price,
            )?;
            (quote, purchased)
        };

        if !deposit_amount.is_zero() && analytics::quote_exceeds_max(&quote) {
            self.notifier.warning(format!(
                "Payout exceeds the maximum of {:.2}; split the deposit across smaller bonds",
                quote.max_payout
            ));
        }

        // The triggering precondition may have changed across the
        // suspension points above; a superseded result is not applied.
        if *self.signer.read().await != signer_at_start {
            return Err(EngineError::Superseded);
        }

        self.snapshot
            .commit_bond(id, |m| {
                m.bond_discount = Some(bond_discount);
                m.bond_quote = Some(quote.payout);
                m.purchased = Some(purchased);
                m.vesting_term = Some(terms.vesting_term_secs);
                m.max_bond_price = Some(quote.max_payout);
                m.bond_price = Some(bond_price);
                m.market_price = Some(market_price);
                m.max_bond_price_token = Some(quote.max_price_in_token);
            })
            .await;
        Ok(())
    }

    // =========================================================================
    // REFRESH: TREASURY
    // =========================================================================

    /// Recompute treasury metrics: fan out per-bond treasury balance
    /// reads, join, commit per-bond balances, then aggregate.
    ///
    /// The join is a synchronization barrier: aggregation never runs on
    /// a partial fan-out. A failed read aborts the whole cycle.
    pub async fn refresh_treasury(&self) -> EngineResult<()> {
        let balance_reads = self.bonds.values().map(|bound| async move {
            let balance = self.treasury_balance_of(bound).await?;
            Ok::<_, EngineError>((bound.bond.id().clone(), balance))
        });
        let balances = futures::future::try_join_all(balance_reads).await?;

        for (id, balance) in &balances {
            self.snapshot
                .commit_bond(id, |m| m.treasury_balance = Some(*balance))
                .await;
        }

        let (core, market) = match self.require_protocol().await {
            Ok(pair) => pair,
            Err(EngineError::MissingState(what)) => {
                tracing::debug!(what, "treasury aggregation skipped");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let outstanding_principal = self.outstanding_principal().await?;
        let reserved_allocations = self.reserved_allocations().await?;
        let (lp_sum, stable_sum) = self
            .snapshot
            .treasury_sums(|id| {
                self.bonds
                    .get(id)
                    .map(|b| b.bond.is_liquidity_pool())
                    .unwrap_or(false)
            })
            .await;

        let inputs = TreasuryInputs {
            total_supply: core.total_supply,
            circulating_supply: core.circulating_supply,
            raw_circulating_supply: core.raw_circulating_supply,
            market_reserves: core.reserves.to_decimal(TokenScale::Native)?,
            epoch_distribute: core.epoch.distribute.to_decimal(TokenScale::Native)?,
            reference_price: market.reference_price,
            lp_treasury_sum: lp_sum,
            stable_treasury_sum: stable_sum,
            outstanding_principal,
            reserved_allocations,
        };

        match analytics::aggregate(inputs) {
            Ok(metrics) => {
                self.snapshot.commit_treasury(metrics).await;
                tracing::info!(
                    rfv = %metrics.risk_free_value,
                    runway_days = %metrics.runway_days,
                    "treasury metrics refreshed"
                );
                Ok(())
            }
            Err(e) => {
                tracing::debug!(error = %e, "treasury aggregation skipped");
                Ok(())
            }
        }
    }

    /// Settlement-asset value of the treasury's holding of one bond's
    /// backing asset.
    async fn treasury_balance_of(&self, bound: &BoundBond) -> EngineResult<Decimal> {
        let treasury = &self.protocol_addresses.treasury;
        let held = bound.reserve.balance_of(treasury).await?;

        let balance = if bound.bond.is_liquidity_pool() {
            let reserve_address = &bound.bond.addresses().reserve;
            let valuation = self.calculator.valuation(reserve_address, held).await?;
            let markdown = self.calculator.markdown(reserve_address).await?;
            analytics::lp_treasury_balance(valuation, markdown)?
        } else {
            analytics::stable_treasury_balance(held)?
        };
        Ok(balance)
    }

    /// Native tokens sitting in bond pools: for each LP bond, the
    /// native-side reserve slot, selected by token address.
    async fn outstanding_principal(&self) -> EngineResult<Decimal> {
        let native = &self.protocol_addresses.native_token;
        let mut total = Decimal::ZERO;
        for bound in self.bonds.values() {
            if !bound.bond.is_liquidity_pool() {
                continue;
            }
            let reserves = bound.reserve.pool_reserves().await?;
            let slot = reserves.reserve_of(native).ok_or_else(|| {
                ChainError::read(
                    Some(bound.bond.id().clone()),
                    "pool_reserves",
                    "native token absent from pool",
                )
            })?;
            total += slot.to_decimal(TokenScale::Native)?;
        }
        Ok(total)
    }

    /// DAO and presale-redemption holdings excluded from the adjusted
    /// supply.
    async fn reserved_allocations(&self) -> EngineResult<Decimal> {
        let dao = self
            .reader
            .native_balance_of(&self.protocol_addresses.dao)
            .await?
            .to_decimal(TokenScale::Native)?;
        let redeemable = self
            .reader
            .native_balance_of(&self.protocol_addresses.presale_redemption)
            .await?
            .to_decimal(TokenScale::Native)?;
        Ok(dao + redeemable)
    }

    // =========================================================================
    // REFRESH: ACCOUNT
    // =========================================================================

    /// Fetch one signer's position on a bond: balance, allowance,
    /// vesting position, claimable payout.
    pub async fn refresh_account(&self, id: &BondId, address: &Address) -> EngineResult<()> {
        let bound = self.bound(id)?;
        let depository_address = &bound.bond.addresses().bond;

        let balance = bound.reserve.balance_of(address).await?;
        let allowance = bound.reserve.allowance(address, depository_address).await?;
        let info = bound.depository.bond_info(address).await?;
        let pending = bound.depository.pending_payout_for(address).await?;

        let reserve_scale = bound.bond.reserve_scale();
        self.snapshot
            .commit_bond(id, |m| {
                m.balance = Some(balance.to_decimal_saturating(reserve_scale));
                m.allowance = Some(allowance.to_decimal_saturating(reserve_scale));
                m.interest_due = Some(info.payout.to_decimal_saturating(TokenScale::Native));
                m.maturation_time = Some(info.vesting + info.last_time);
                m.pending_payout = Some(pending.to_decimal_saturating(TokenScale::Native));
            })
            .await;
        Ok(())
    }

    // =========================================================================
    // TRANSACTIONS
    // =========================================================================

    /// Approve the depository to spend the signer's backing asset.
    pub async fn approve(&self, id: &BondId) -> EngineResult<()> {
        let bound = self.bound(id)?;
        let signer = self.require_signer().await?;
        let depository_address = bound.bond.addresses().bond.clone();

        let handle = match bound
            .reserve
            .approve(&depository_address, RawAmount::new(u128::MAX))
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                self.surface_submission_error(&e);
                return Err(e.into());
            }
        };

        self.record_pending(PendingKind::Approval, &handle).await;
        let result = async {
            match handle.wait().await? {
                TxOutcome::Confirmed => {
                    self.notifier.success(MSG_TX_SENT);
                    let allowance = bound
                        .reserve
                        .allowance(&signer, &depository_address)
                        .await?;
                    let scale = bound.bond.reserve_scale();
                    self.snapshot
                        .commit_bond(id, |m| {
                            m.allowance = Some(allowance.to_decimal_saturating(scale));
                        })
                        .await;
                    Ok(())
                }
                TxOutcome::Reverted(reason) => {
                    self.notifier.publish(translate_revert(&reason));
                    Err(ChainError::Reverted(reason).into())
                }
            }
        }
        .await;
        // Guaranteed path: the pending handle clears exactly once
        // whether confirmation, revert, or the re-read failed.
        self.snapshot.clear_pending(PendingKind::Approval).await;
        result
    }

    /// Deposit into a bond with a slippage-bounded max price.
    ///
    /// The bound is `current price × (1 + slippage)`; the depository
    /// itself rejects the deposit if price moves beyond it between
    /// quote and confirmation. It is not re-validated client-side.
    pub async fn deposit(
        &self,
        id: &BondId,
        amount: Decimal,
        slippage: Option<Decimal>,
        recipient: Option<Address>,
    ) -> EngineResult<()> {
        let bound = self.bound(id)?;
        if !bound.bond.is_active() {
            return Err(EngineError::Inactive(id.clone()));
        }
        let signer = self.require_signer().await?;
        let recipient = recipient.unwrap_or_else(|| signer.clone());

        let premium = bound.depository.bond_price().await?;
        let max_price = slippage_bound(premium, slippage.unwrap_or(DEFAULT_SLIPPAGE))?;
        let amount_wei = RawAmount::from_decimal(amount, bound.bond.reserve_scale())?;

        let handle = match bound
            .depository
            .deposit(amount_wei, max_price, &recipient)
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                self.surface_submission_error(&e);
                return Err(e.into());
            }
        };

        self.record_pending(PendingKind::Bonding, &handle).await;
        let result = self
            .finish_position_tx(id, &signer, handle)
            .await;
        self.snapshot.clear_pending(PendingKind::Bonding).await;
        result
    }

    /// Redeem a bond's vested payout, optionally auto-staking it.
    pub async fn redeem(
        &self,
        id: &BondId,
        recipient: &Address,
        auto_stake: bool,
    ) -> EngineResult<()> {
        let bound = self.bound(id)?;
        let signer = self.require_signer().await?;
        let kind = if auto_stake {
            PendingKind::RedeemStaking
        } else {
            PendingKind::Redeeming
        };

        let handle = match bound.depository.redeem(recipient, auto_stake).await {
            Ok(handle) => handle,
            Err(e) => {
                self.surface_submission_error(&e);
                return Err(e.into());
            }
        };

        self.record_pending(kind, &handle).await;
        let result = self.finish_position_tx(id, &signer, handle).await;
        self.snapshot.clear_pending(kind).await;
        result
    }

    /// Shared confirm path for deposits and redeems: success
    /// notifications plus a targeted re-read of the signer's position.
    /// A failed re-read is reported but never un-confirms the
    /// transaction.
    async fn finish_position_tx(
        &self,
        id: &BondId,
        signer: &Address,
        handle: TxHandle,
    ) -> EngineResult<()> {
        let hash = handle.hash.clone();
        match handle.wait().await? {
            TxOutcome::Confirmed => {
                tracing::info!(bond = %id, %hash, "transaction confirmed");
                self.notifier.success(MSG_TX_SENT);
                self.notifier.info(MSG_BALANCE_SOON);
                match self.refresh_account(id, signer).await {
                    Ok(()) => self.notifier.info(MSG_BALANCE_UPDATED),
                    Err(e) => {
                        tracing::warn!(bond = %id, error = %e, "post-confirm re-read failed")
                    }
                }
                Ok(())
            }
            TxOutcome::Reverted(reason) => {
                tracing::warn!(bond = %id, %hash, reason = %reason.message, "transaction reverted");
                self.notifier.publish(translate_revert(&reason));
                Err(ChainError::Reverted(reason).into())
            }
        }
    }

    async fn record_pending(&self, kind: PendingKind, handle: &TxHandle) {
        self.snapshot
            .add_pending(TransactionRecord {
                hash: handle.hash.clone(),
                kind,
            })
            .await;
    }

    /// Surface an error raised at submission time, before any pending
    /// handle exists.
    fn surface_submission_error(&self, error: &ChainError) {
        match error {
            ChainError::Rejected(reason) => self
                .notifier
                .error(RevertClass::UserRejected.description(), Some(reason.clone())),
            ChainError::Reverted(reason) => self.notifier.publish(translate_revert(reason)),
            other => self
                .notifier
                .error(RevertClass::Unknown.description(), Some(other.to_string())),
        }
    }
}

/// Max acceptable price for a deposit: `premium × (1 + slippage)`,
/// rounded to the nearest raw unit.
fn slippage_bound(premium: RawAmount, slippage: Decimal) -> EngineResult<RawAmount> {
    let premium_dec = Decimal::try_from_i128_with_scale(
        i128::try_from(premium.0).map_err(|_| {
            EngineError::Core(bondwise_core::CoreError::AmountOverflow { raw: premium.0 })
        })?,
        0,
    )
    .map_err(|_| EngineError::Core(bondwise_core::CoreError::AmountOverflow { raw: premium.0 }))?;

    let bounded = (premium_dec * (Decimal::ONE + slippage)).round();
    let raw = rust_decimal::prelude::ToPrimitive::to_u128(&bounded).ok_or(EngineError::Core(
        bondwise_core::CoreError::AmountOverflow { raw: premium.0 },
    ))?;
    Ok(RawAmount::new(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn slippage_bound_rounds_to_nearest_unit() {
        // 8e9 premium at 0.5% -> 8.04e9
        let bound = slippage_bound(RawAmount::new(8_000_000_000), dec!(0.005)).unwrap();
        assert_eq!(bound, RawAmount::new(8_040_000_000));
    }

    #[test]
    fn zero_slippage_passes_premium_through() {
        let bound = slippage_bound(RawAmount::new(123), Decimal::ZERO).unwrap();
        assert_eq!(bound, RawAmount::new(123));
    }

    #[test]
    fn default_slippage_is_half_percent() {
        assert_eq!(DEFAULT_SLIPPAGE, dec!(0.005));
    }
}

//! Engine lifecycle tests over the in-memory chain backend.
//!
//! Exercises the refresh pipeline ordering, the transaction paths, and
//! the failure handling the engine promises: fail-closed gates, dropped
//! (not queued) refreshes, and pending handles that clear exactly once.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use bondwise_chain::memory::LinearFactor;
use bondwise_chain::{
    BondContract, BondInfo, BondTerms, BondingCalculator, ChainClient, ChainError, MemoryChain,
    PoolReserves, ProtocolReader, ProtocolState, ReserveContract, RevertReason, TxHandle,
};
use bondwise_core::{
    Address, BondAddresses, BondConfig, BondId, BondKind, Epoch, Network, RawAmount,
};
use bondwise_engine::{Engine, EngineConfig, EngineError, Severity};

const GWEI: u128 = 1_000_000_000;
const WEI: u128 = 1_000_000_000_000_000_000;
const NOW: u64 = 1_700_000_000;
const VESTING: u64 = 432_000;

fn dai_bond_id() -> BondId {
    BondId::from("dai")
}

fn lp_bond_id() -> BondId {
    BondId::from("native_dai_lp")
}

fn dai_addresses() -> BondAddresses {
    BondAddresses {
        bond: Address::new("0xd41b0nd"),
        reserve: Address::new("0xd41"),
    }
}

fn lp_addresses() -> BondAddresses {
    BondAddresses {
        bond: Address::new("0x1pb0nd"),
        reserve: Address::new("0x1pr"),
    }
}

fn user() -> Address {
    Address::new("0xu5er")
}

/// A chain populated with the reference numbers: 10 000 native total
/// supply, 5 000 circulating, 4 000 raw circulating, 80 native of
/// market reserves at a 1.0 reference price. The stable bond prices at
/// 50, the LP bond at 76.
fn populated_chain() -> MemoryChain {
    let chain = MemoryChain::new();
    let protocol = Network::Local.addresses().unwrap();

    chain.set_reference_price(dec!(1.0));
    chain.set_timestamp(NOW);
    chain.set_protocol_state(ProtocolState {
        total_supply: RawAmount::new(10_000 * GWEI),
        circulating_supply: RawAmount::new(5_000 * GWEI),
        raw_circulating_supply: RawAmount::new(4_000 * GWEI),
        market_reserves: RawAmount::new(80 * GWEI),
        epoch: Epoch {
            number: 1,
            distribute: RawAmount::new(20 * GWEI),
            end_time: NOW + 28_800,
        },
    });

    let dai = dai_addresses();
    chain.set_depository(
        &dai.bond,
        BondTerms {
            vesting_term_secs: VESTING,
            minimum_price: RawAmount::ZERO,
        },
        RawAmount::new(500 * GWEI),
        RawAmount::new(8 * GWEI),
        RawAmount::new(50 * WEI),
        // Stable payout: wei in, wei out, priced at 50.
        LinearFactor {
            numerator: 1,
            denominator: 50,
        },
    );
    chain.set_balance(&dai.reserve, &protocol.treasury, RawAmount::new(1_000 * WEI));

    let lp = lp_addresses();
    chain.set_depository(
        &lp.bond,
        BondTerms {
            vesting_term_secs: VESTING,
            minimum_price: RawAmount::ZERO,
        },
        RawAmount::new(500 * GWEI),
        RawAmount::new(8 * GWEI),
        RawAmount::new(76 * WEI),
        // LP payout: calculator valuation in (native scale), native out.
        LinearFactor {
            numerator: 1,
            denominator: 8,
        },
    );
    // One LP wei-token values at one settlement unit.
    chain.set_calculator(
        &lp.reserve,
        LinearFactor {
            numerator: 1,
            denominator: GWEI,
        },
        RawAmount::new(8 * WEI / 10),
    );
    chain.set_balance(&lp.reserve, &protocol.treasury, RawAmount::new(500 * WEI));
    chain.set_pool_reserves(
        &lp.reserve,
        PoolReserves {
            reserve0: RawAmount::new(300 * GWEI),
            reserve1: RawAmount::new(24_000 * WEI),
            token0: protocol.native_token.clone(),
            token1: dai.reserve.clone(),
        },
    );

    chain.set_native_balance(&protocol.dao, RawAmount::new(100 * GWEI));
    chain.set_native_balance(&protocol.presale_redemption, RawAmount::new(50 * GWEI));
    chain
}

fn engine_config() -> EngineConfig {
    EngineConfig {
        network: Network::Local,
        bonds: vec![
            BondConfig::new(dai_bond_id(), "DAI", BondKind::StableAsset)
                .with_addresses(Network::Local, dai_addresses()),
            BondConfig::new(lp_bond_id(), "NATIVE-DAI LP", BondKind::LiquidityPool)
                .with_addresses(Network::Local, lp_addresses()),
        ],
    }
}

fn fixture() -> (MemoryChain, Engine) {
    let chain = populated_chain();
    let engine = Engine::initialize(engine_config(), Arc::new(chain.clone())).unwrap();
    (chain, engine)
}

// =============================================================================
// REFRESH PIPELINE
// =============================================================================

#[tokio::test]
async fn protocol_refresh_commits_core_and_market() {
    let (_chain, engine) = fixture();
    engine.refresh_protocol().await.unwrap();

    let core = engine.snapshot().core_metrics().await.unwrap();
    assert_eq!(core.total_supply, dec!(10000));
    assert_eq!(core.circulating_supply, dec!(5000));
    assert_eq!(core.raw_circulating_supply, dec!(4000));
    assert_eq!(core.epoch.number, 1);

    let market = engine.snapshot().market_data().await.unwrap();
    assert_eq!(market.reference_price, dec!(1.0));
}

#[tokio::test]
async fn bond_refresh_is_gated_on_protocol_metrics() {
    let (_chain, engine) = fixture();

    // Skipped silently, nothing committed.
    engine.refresh_bond(&dai_bond_id(), Decimal::ZERO).await.unwrap();
    let metrics = engine.snapshot().bond_metrics(&dai_bond_id()).await.unwrap();
    assert_eq!(metrics.bond_price, None);
    assert_eq!(metrics.bond_discount, None);
}

#[tokio::test]
async fn stable_bond_metrics_match_reference_numbers() {
    let (_chain, engine) = fixture();
    engine.refresh_protocol().await.unwrap();
    engine.refresh_bond(&dai_bond_id(), dec!(100)).await.unwrap();

    let metrics = engine.snapshot().bond_metrics(&dai_bond_id()).await.unwrap();
    assert_eq!(metrics.market_price, Some(dec!(80)));
    assert_eq!(metrics.bond_price, Some(dec!(50)));
    // (80 - 50) / 50
    assert_eq!(metrics.bond_discount, Some(dec!(0.6)));
    // 100 DAI at 50 per native.
    assert_eq!(metrics.bond_quote, Some(dec!(2)));
    assert_eq!(metrics.max_bond_price, Some(dec!(500)));
    // 500 native cap reached at 25 000 DAI.
    assert_eq!(metrics.max_bond_price_token, Some(dec!(25000)));
    assert_eq!(metrics.purchased, Some(dec!(1000)));
    assert_eq!(metrics.vesting_term, Some(VESTING));
    assert!(!metrics.loading);
}

#[tokio::test]
async fn lp_bond_metrics_route_through_calculator() {
    let (_chain, engine) = fixture();
    engine.refresh_protocol().await.unwrap();
    engine.refresh_bond(&lp_bond_id(), dec!(100)).await.unwrap();

    let metrics = engine.snapshot().bond_metrics(&lp_bond_id()).await.unwrap();
    assert_eq!(metrics.bond_price, Some(dec!(76)));
    assert_eq!(metrics.bond_discount, Some((dec!(80) - dec!(76)) / dec!(76)));
    // 100 LP tokens value at 100, payout 100 / 8.
    assert_eq!(metrics.bond_quote, Some(dec!(12.5)));
    // Unit payout 0.125 native, cap 500 => 4 000 LP tokens.
    assert_eq!(metrics.max_bond_price_token, Some(dec!(4000)));
    // 500 valuation marked down by 0.8.
    assert_eq!(metrics.purchased, Some(dec!(400)));
}

#[tokio::test]
async fn concurrent_bond_refresh_is_dropped_not_queued() {
    let (_chain, engine) = fixture();
    engine.refresh_protocol().await.unwrap();

    assert!(engine.snapshot().try_begin_loading(&dai_bond_id()).await);
    let err = engine
        .refresh_bond(&dai_bond_id(), Decimal::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Busy(id) if id == dai_bond_id()));

    engine.snapshot().end_loading(&dai_bond_id()).await;
    engine.refresh_bond(&dai_bond_id(), Decimal::ZERO).await.unwrap();
}

#[tokio::test]
async fn quote_beyond_max_payout_warns_but_still_commits() {
    let (chain, engine) = fixture();
    // Shrink the payout cap below the quote of a 100 DAI deposit.
    chain.set_depository(
        &dai_addresses().bond,
        BondTerms {
            vesting_term_secs: VESTING,
            minimum_price: RawAmount::ZERO,
        },
        RawAmount::new(GWEI),
        RawAmount::new(8 * GWEI),
        RawAmount::new(50 * WEI),
        LinearFactor {
            numerator: 1,
            denominator: 50,
        },
    );
    engine.refresh_protocol().await.unwrap();

    let mut rx = engine.notifier().subscribe();
    engine.refresh_bond(&dai_bond_id(), dec!(100)).await.unwrap();

    let note = rx.try_recv().unwrap();
    assert_eq!(note.severity, Severity::Warning);

    // The uncapped quote is committed; capping the display is the
    // UI's concern.
    let metrics = engine.snapshot().bond_metrics(&dai_bond_id()).await.unwrap();
    assert_eq!(metrics.bond_quote, Some(dec!(2)));
    assert_eq!(metrics.max_bond_price, Some(dec!(1)));
}

/// Chain client that clears the engine's signer from inside the first
/// depository read of a refresh, emulating a wallet switch racing a
/// computation in flight.
struct SignerClearingClient {
    inner: MemoryChain,
    engine: Arc<Mutex<Option<Arc<Engine>>>>,
}

impl ChainClient for SignerClearingClient {
    fn bond_contract(&self, address: &Address) -> Arc<dyn BondContract> {
        Arc::new(SignerClearingBond {
            inner: self.inner.bond_contract(address),
            engine: self.engine.clone(),
        })
    }

    fn reserve_contract(&self, address: &Address) -> Arc<dyn ReserveContract> {
        self.inner.reserve_contract(address)
    }

    fn bonding_calculator(&self, address: &Address) -> Arc<dyn BondingCalculator> {
        self.inner.bonding_calculator(address)
    }

    fn protocol_reader(&self) -> Arc<dyn ProtocolReader> {
        self.inner.protocol_reader()
    }
}

struct SignerClearingBond {
    inner: Arc<dyn BondContract>,
    engine: Arc<Mutex<Option<Arc<Engine>>>>,
}

#[async_trait]
impl BondContract for SignerClearingBond {
    async fn terms(&self) -> Result<BondTerms, ChainError> {
        let engine = self.engine.lock().unwrap().clone();
        if let Some(engine) = engine {
            engine.set_signer(None).await;
        }
        self.inner.terms().await
    }

    async fn max_payout(&self) -> Result<RawAmount, ChainError> {
        self.inner.max_payout().await
    }

    async fn bond_price(&self) -> Result<RawAmount, ChainError> {
        self.inner.bond_price().await
    }

    async fn bond_price_in_reference(&self) -> Result<RawAmount, ChainError> {
        self.inner.bond_price_in_reference().await
    }

    async fn payout_for(&self, value: RawAmount) -> Result<RawAmount, ChainError> {
        self.inner.payout_for(value).await
    }

    async fn bond_info(&self, recipient: &Address) -> Result<BondInfo, ChainError> {
        self.inner.bond_info(recipient).await
    }

    async fn pending_payout_for(&self, recipient: &Address) -> Result<RawAmount, ChainError> {
        self.inner.pending_payout_for(recipient).await
    }

    async fn deposit(
        &self,
        amount: RawAmount,
        max_price: RawAmount,
        recipient: &Address,
    ) -> Result<TxHandle, ChainError> {
        self.inner.deposit(amount, max_price, recipient).await
    }

    async fn redeem(&self, recipient: &Address, auto_stake: bool) -> Result<TxHandle, ChainError> {
        self.inner.redeem(recipient, auto_stake).await
    }
}

#[tokio::test]
async fn signer_change_mid_refresh_discards_the_result() {
    let chain = populated_chain();
    let slot: Arc<Mutex<Option<Arc<Engine>>>> = Arc::new(Mutex::new(None));
    let client = SignerClearingClient {
        inner: chain.clone(),
        engine: slot.clone(),
    };
    let engine = Arc::new(Engine::initialize(engine_config(), Arc::new(client)).unwrap());
    *slot.lock().unwrap() = Some(engine.clone());

    engine.set_signer(Some(user())).await;
    engine.refresh_protocol().await.unwrap();

    // The signer captured at the start of the cycle no longer matches
    // at commit time; the cycle is dropped like any skipped one.
    engine.refresh_bond(&dai_bond_id(), dec!(100)).await.unwrap();

    let metrics = engine.snapshot().bond_metrics(&dai_bond_id()).await.unwrap();
    assert_eq!(metrics.bond_price, None);
    assert_eq!(metrics.bond_quote, None);
    assert!(!metrics.loading);
}

#[tokio::test]
async fn treasury_aggregation_matches_reference_numbers() {
    let (_chain, engine) = fixture();
    engine.refresh_protocol().await.unwrap();
    engine.refresh_treasury().await.unwrap();

    let dai = engine.snapshot().bond_metrics(&dai_bond_id()).await.unwrap();
    assert_eq!(dai.treasury_balance, Some(dec!(1000)));
    let lp = engine.snapshot().bond_metrics(&lp_bond_id()).await.unwrap();
    assert_eq!(lp.treasury_balance, Some(dec!(400)));

    let metrics = engine.snapshot().treasury_metrics().await.unwrap();
    // 400 LP halved + 1 000 stable.
    assert_eq!(metrics.risk_free_value_treasury, dec!(1200));
    // 20 distributed over 4 000 raw circulating.
    assert_eq!(metrics.staking_rebase, dec!(0.005));
    assert_eq!(metrics.market_price, dec!(80));
    // Adjusted supply 10 000 - 300 pooled - 150 reserved.
    assert_eq!(metrics.risk_free_value, dec!(1200) / dec!(9550));
}

#[tokio::test]
async fn treasury_read_failure_aborts_without_commit() {
    let (chain, engine) = fixture();
    engine.refresh_protocol().await.unwrap();

    chain.fail_call("balance_of");
    assert!(engine.refresh_treasury().await.is_err());
    assert!(engine.snapshot().treasury_metrics().await.is_none());

    chain.restore_call("balance_of");
    engine.refresh_treasury().await.unwrap();
    assert!(engine.snapshot().treasury_metrics().await.is_some());
}

#[tokio::test]
async fn account_refresh_commits_position_fields() {
    let (chain, engine) = fixture();
    chain.set_balance(&dai_addresses().reserve, &user(), RawAmount::new(250 * WEI));
    chain.set_position(
        &dai_addresses().bond,
        &user(),
        BondInfo {
            payout: RawAmount::new(5 * GWEI),
            vesting: 100_000,
            last_time: NOW,
        },
        RawAmount::new(2 * GWEI),
    );

    engine.refresh_account(&dai_bond_id(), &user()).await.unwrap();

    let metrics = engine.snapshot().bond_metrics(&dai_bond_id()).await.unwrap();
    assert_eq!(metrics.balance, Some(dec!(250)));
    assert_eq!(metrics.allowance, Some(Decimal::ZERO));
    assert_eq!(metrics.interest_due, Some(dec!(5)));
    assert_eq!(metrics.maturation_time, Some(NOW + 100_000));
    assert_eq!(metrics.pending_payout, Some(dec!(2)));
}

// =============================================================================
// TRANSACTIONS
// =============================================================================

#[tokio::test]
async fn approve_commits_allowance_and_clears_pending() {
    let (chain, engine) = fixture();
    chain.set_balance(&dai_addresses().reserve, &user(), RawAmount::new(250 * WEI));
    engine.set_signer(Some(user())).await;

    let mut rx = engine.notifier().subscribe();
    engine.approve(&dai_bond_id()).await.unwrap();

    // Unlimited allowance saturates rather than failing the commit.
    let metrics = engine.snapshot().bond_metrics(&dai_bond_id()).await.unwrap();
    assert_eq!(metrics.allowance, Some(Decimal::MAX));
    assert!(engine
        .snapshot()
        .pending(bondwise_engine::PendingKind::Approval)
        .await
        .is_none());

    let note = rx.try_recv().unwrap();
    assert_eq!(note.severity, Severity::Success);
}

#[tokio::test]
async fn deposit_requires_a_signer() {
    let (_chain, engine) = fixture();
    let err = engine
        .deposit(&dai_bond_id(), dec!(100), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoSigner));
}

#[tokio::test]
async fn deposit_rejects_inactive_bonds() {
    let chain = MemoryChain::new();
    let config = EngineConfig {
        network: Network::Local,
        bonds: vec![BondConfig::new("retired", "Retired", BondKind::StableAsset)
            .inactive()
            .with_addresses(Network::Local, dai_addresses())],
    };
    let engine = Engine::initialize(config, Arc::new(chain)).unwrap();
    engine.set_signer(Some(user())).await;

    let err = engine
        .deposit(&BondId::from("retired"), dec!(100), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Inactive(_)));
}

#[tokio::test]
async fn confirmed_deposit_notifies_and_refreshes_the_account() {
    let (chain, engine) = fixture();
    chain.set_balance(&dai_addresses().reserve, &user(), RawAmount::new(250 * WEI));
    engine.set_signer(Some(user())).await;

    let mut rx = engine.notifier().subscribe();
    engine
        .deposit(&dai_bond_id(), dec!(100), None, None)
        .await
        .unwrap();

    assert_eq!(rx.try_recv().unwrap().severity, Severity::Success);
    assert_eq!(rx.try_recv().unwrap().description, "Your balance will update soon");
    assert_eq!(rx.try_recv().unwrap().description, "Your balance has been updated");

    // Position re-read landed in the snapshot.
    let metrics = engine.snapshot().bond_metrics(&dai_bond_id()).await.unwrap();
    assert_eq!(metrics.maturation_time, Some(NOW + VESTING));
    assert!(metrics.interest_due.unwrap_or_default() > Decimal::ZERO);
    assert!(engine
        .snapshot()
        .pending(bondwise_engine::PendingKind::Bonding)
        .await
        .is_none());
}

#[tokio::test]
async fn pending_clears_even_when_the_post_confirm_read_fails() {
    let (chain, engine) = fixture();
    chain.set_balance(&dai_addresses().reserve, &user(), RawAmount::new(250 * WEI));
    engine.set_signer(Some(user())).await;
    chain.fail_call("bond_info");

    let mut rx = engine.notifier().subscribe();
    // The deposit itself confirmed; the failed re-read never un-confirms it.
    engine
        .deposit(&dai_bond_id(), dec!(100), None, None)
        .await
        .unwrap();

    assert!(engine
        .snapshot()
        .pending(bondwise_engine::PendingKind::Bonding)
        .await
        .is_none());
    assert_eq!(rx.try_recv().unwrap().severity, Severity::Success);
    assert_eq!(rx.try_recv().unwrap().description, "Your balance will update soon");
    // No "updated" message followed.
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn reverted_deposit_is_classified_for_the_user() {
    let (chain, engine) = fixture();
    engine.set_signer(Some(user())).await;
    chain.script_revert(RevertReason {
        code: Some(-32603),
        message: "execution reverted".into(),
        data: Some("VM Exception: ds-math-sub-underflow".into()),
    });

    let mut rx = engine.notifier().subscribe();
    let err = engine
        .deposit(&dai_bond_id(), dec!(100), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Chain(_)));

    let note = rx.try_recv().unwrap();
    assert_eq!(note.severity, Severity::Error);
    assert_eq!(note.description, "You are trying to bond more than your balance");
    // Raw provider text survives for diagnostics.
    assert!(note.detailed.unwrap().contains("ds-math-sub-underflow"));

    assert!(engine
        .snapshot()
        .pending(bondwise_engine::PendingKind::Bonding)
        .await
        .is_none());
}

#[tokio::test]
async fn user_rejection_is_reported_as_such() {
    let (chain, engine) = fixture();
    engine.set_signer(Some(user())).await;
    chain.script_revert(RevertReason {
        code: Some(4001),
        message: "User denied transaction signature".into(),
        data: None,
    });

    let mut rx = engine.notifier().subscribe();
    assert!(engine
        .deposit(&dai_bond_id(), dec!(100), None, None)
        .await
        .is_err());

    let note = rx.try_recv().unwrap();
    assert_eq!(note.description, "Transaction signature was denied");
}

#[tokio::test]
async fn redeem_clears_the_claimable_payout() {
    let (chain, engine) = fixture();
    chain.set_position(
        &dai_addresses().bond,
        &user(),
        BondInfo {
            payout: RawAmount::new(5 * GWEI),
            vesting: 100_000,
            last_time: NOW,
        },
        RawAmount::new(2 * GWEI),
    );
    engine.set_signer(Some(user())).await;

    engine.redeem(&dai_bond_id(), &user(), false).await.unwrap();

    let metrics = engine.snapshot().bond_metrics(&dai_bond_id()).await.unwrap();
    assert_eq!(metrics.pending_payout, Some(Decimal::ZERO));
    for kind in [
        bondwise_engine::PendingKind::Redeeming,
        bondwise_engine::PendingKind::RedeemStaking,
    ] {
        assert!(engine.snapshot().pending(kind).await.is_none());
    }
}

#[tokio::test]
async fn unresolvable_bond_fails_initialization() {
    let config = EngineConfig {
        network: Network::Mainnet,
        bonds: vec![
            // Addresses only registered for the local network.
            BondConfig::new("dai", "DAI", BondKind::StableAsset)
                .with_addresses(Network::Local, dai_addresses()),
        ],
    };
    let result = Engine::initialize(config, Arc::new(MemoryChain::new()));
    assert!(matches!(result, Err(EngineError::Core(_))));
}

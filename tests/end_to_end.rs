use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{address, Address, U256};
use arb_exec_core::breaker::{BreakerConfig, BreakerState, CircuitBreaker};
use arb_exec_core::commit_reveal::store::CommitmentStore;
use arb_exec_core::commit_reveal::{CommitRevealChain, CommitRevealService};
use arb_exec_core::cross_chain::{BridgeClient, BridgeQuote, BridgeStatus, CrossChainConfig, CrossChainExecutor, DestinationExecutor};
use arb_exec_core::dex::DexRegistry;
use arb_exec_core::gas::GasPolicy;
use arb_exec_core::model::commitment::RevealParams;
use arb_exec_core::model::errors::ErrorCode;
use arb_exec_core::model::opportunity::{Opportunity, OpportunityKind};
use arb_exec_core::model::stats::ExecutionStats;
use arb_exec_core::nonce::NonceManager;
use arb_exec_core::orchestrator::context::StrategyContext;
use arb_exec_core::orchestrator::{ExecutionOrchestrator, OrchestratorConfig};
use arb_exec_core::provider::wallet::EvmWallet;
use arb_exec_core::provider::{ChainProvider, ProviderConnector, ProviderManager};
use arb_exec_core::simulation::pending::PendingStateSimulator;
use arb_exec_core::simulation::SimulationService;
use arb_exec_core::strategies::{Strategy, StrategyOutcome, StrategyRegistry, StrategySlot};
use arb_exec_core::swap_step::SwapStepBuilder;
use async_trait::async_trait;
use tokio::sync::watch;

const WALLET: Address = address!("1111111111111111111111111111111111111111");

struct DummyProvider;
#[async_trait]
impl ChainProvider for DummyProvider {
    async fn block_number(&self) -> anyhow::Result<u64> {
        Ok(1)
    }
    async fn transaction_count(&self, _a: Address) -> anyhow::Result<u64> {
        Ok(0)
    }
    async fn gas_price_gwei(&self) -> anyhow::Result<f64> {
        Ok(1.0)
    }
}

struct DummyConnector;
#[async_trait]
impl ProviderConnector for DummyConnector {
    async fn connect(&self, _rpc_url: &str) -> anyhow::Result<Arc<dyn ChainProvider>> {
        Ok(Arc::new(DummyProvider))
    }
}

struct DummyBridge;
#[async_trait]
impl BridgeClient for DummyBridge {
    async fn quote(&self, _s: &str, _d: &str, _asset: Address, _amount: U256) -> anyhow::Result<BridgeQuote> {
        Ok(BridgeQuote { fee_usd: 0.0, native_price_usd: 2000.0, expiry: i64::MAX })
    }
    async fn submit(&self, _s: &str, _d: &str, _asset: Address, _amount: U256, _nonce: u64) -> anyhow::Result<String> {
        Ok("0xsource".into())
    }
    async fn poll_status(&self, _tx: &str) -> anyhow::Result<BridgeStatus> {
        Ok(BridgeStatus::Completed)
    }
}

struct DummyDestination;
#[async_trait]
impl DestinationExecutor for DummyDestination {
    async fn ensure_allowance(&self, _c: &str, _t: Address, _o: Address, _s: Address, _a: U256) -> anyhow::Result<()> {
        Ok(())
    }
    async fn submit_sell(&self, _c: &str, _w: Address, _n: u64, _ti: Address, _to: Address, _a: U256) -> anyhow::Result<String> {
        Ok("0xdest".into())
    }
}

struct DummyCommitRevealChain;
#[async_trait]
impl CommitRevealChain for DummyCommitRevealChain {
    async fn current_block(&self, _chain: &str) -> anyhow::Result<u64> {
        Ok(1)
    }
    async fn submit_commit(&self, _chain: &str, _hash: alloy::primitives::B256) -> anyhow::Result<u64> {
        Ok(1)
    }
    async fn submit_reveal(&self, _chain: &str, _reveal: &RevealParams) -> anyhow::Result<String> {
        Ok("0xreveal".into())
    }
}

fn strategy_context() -> StrategyContext {
    let nonce_manager = Arc::new(NonceManager::new());
    nonce_manager.seed("arbitrum", WALLET, 0);
    let gas_policy = Arc::new(GasPolicy::new(3.0));
    let stats = Arc::new(ExecutionStats::default());
    let simulation = Arc::new(SimulationService::new(vec![], 0.0, Duration::from_secs(0), true, Arc::clone(&stats)));
    let commitment_store = Arc::new(CommitmentStore::new(None));
    let commit_reveal = Arc::new(CommitRevealService::new(Arc::new(DummyCommitRevealChain), Arc::clone(&commitment_store)));
    let cross_chain = Arc::new(CrossChainExecutor::new(
        CrossChainConfig::default(),
        Arc::clone(&gas_policy),
        Arc::clone(&nonce_manager),
        Arc::clone(&simulation),
        Arc::new(DummyBridge),
        Arc::new(DummyDestination),
    ));
    let dex_registry = Arc::new(DexRegistry::build(&Default::default()));
    let swap_step_builder = Arc::new(SwapStepBuilder::new(DexRegistry::build(&Default::default()), 16));
    let pending_simulator = Arc::new(PendingStateSimulator::new(HashMap::new()));
    let providers = Arc::new(ProviderManager::new(Arc::new(DummyConnector), Arc::clone(&gas_policy), Arc::clone(&nonce_manager), WALLET, 3, Arc::clone(&stats)));
    let (_tx, shutdown) = watch::channel(false);

    StrategyContext {
        providers,
        evm_wallet: Arc::new(EvmWallet::from_private_key("0x0000000000000000000000000000000000000000000000000000000000000001").unwrap()),
        solana_wallet: None,
        nonce_manager,
        gas_policy,
        simulation,
        commitment_store,
        commit_reveal,
        cross_chain,
        dex_registry,
        swap_step_builder,
        pending_simulator,
        stats,
        shutdown,
    }
}

fn opportunity(id: &str) -> Opportunity {
    Opportunity {
        id: id.into(),
        kind: OpportunityKind::SingleChain,
        buy_chain: "arbitrum".into(),
        sell_chain: "arbitrum".into(),
        buy_venue: "uniswap".into(),
        sell_venue: "sushiswap".into(),
        token_in: "USDC".into(),
        token_out: "WETH".into(),
        amount_in: U256::from(1_000_000_000_000_000_000u128),
        expected_profit: 0.02,
        confidence: 0.9,
        expiry: None,
        intent_payload: None,
        path_hints: None,
    }
}

/// A strategy whose outcome is controlled by a shared flag, standing in
/// for the real single-chain submitter.
struct Scripted(Arc<AtomicBool>);
#[async_trait]
impl Strategy for Scripted {
    fn name(&self) -> &'static str {
        "scripted"
    }
    async fn execute(&self, opportunity: &Opportunity, _ctx: &StrategyContext) -> Result<StrategyOutcome, ErrorCode> {
        if self.0.load(Ordering::SeqCst) {
            Ok(StrategyOutcome {
                chain: opportunity.buy_chain.clone(),
                tx_hash: "0xsettled".into(),
                realized_profit_usd: opportunity.expected_profit,
            })
        } else {
            Err(ErrorCode::ErrUnexpected("submission reverted".into()))
        }
    }
}

fn orchestrator_with(succeeds: Arc<AtomicBool>, breaker: Arc<CircuitBreaker>) -> ExecutionOrchestrator {
    let mut registry = StrategyRegistry::new(false);
    registry.register(StrategySlot::SingleChain, Box::new(Scripted(succeeds)));
    let stats = Arc::new(ExecutionStats::default());
    ExecutionOrchestrator::new(OrchestratorConfig::default(), breaker, registry, strategy_context(), stats)
}

/// Scenario 1: happy single-chain. A valid opportunity settles with a
/// non-empty tx hash and the breaker stays closed.
#[tokio::test]
async fn happy_path_single_chain_execution() {
    let breaker = Arc::new(CircuitBreaker::new(BreakerConfig::default()).unwrap());
    let orch = orchestrator_with(Arc::new(AtomicBool::new(true)), Arc::clone(&breaker));

    let outcome = orch.execute(&opportunity("a"), 0).await.unwrap();
    assert!(!outcome.tx_hash.is_empty());
    assert_eq!(breaker.state(), BreakerState::Closed);
}

/// Scenario 2: breaker trip. Three consecutive failures with
/// `failureThreshold = 3` trip the breaker open; the fourth opportunity
/// is rejected with `ERR_CIRCUIT_OPEN` without ever reaching the
/// strategy.
#[tokio::test]
async fn breaker_trips_after_three_failures_and_blocks_fourth() {
    let breaker = Arc::new(
        CircuitBreaker::new(BreakerConfig {
            failure_threshold: 3,
            cooldown_period: Duration::from_secs(300),
            half_open_max_attempts: 1,
        })
        .unwrap(),
    );
    let orch = orchestrator_with(Arc::new(AtomicBool::new(false)), Arc::clone(&breaker));

    for i in 0..3 {
        let err = orch.execute(&opportunity(&format!("f{i}")), i as i64).await.unwrap_err();
        assert_eq!(err.tag(), "ERR_UNEXPECTED");
    }
    assert_eq!(breaker.state(), BreakerState::Open);

    let err = orch.execute(&opportunity("blocked"), 3).await.unwrap_err();
    assert_eq!(err.tag(), "ERR_CIRCUIT_OPEN");
}

/// Scenario 3: half-open probe and recovery. Once the cooldown elapses
/// the next execution is allowed through as a probe; success closes the
/// breaker and the following call is allowed unconditionally.
#[tokio::test]
async fn half_open_probe_recovers_after_cooldown() {
    let breaker = Arc::new(
        CircuitBreaker::new(BreakerConfig {
            failure_threshold: 1,
            cooldown_period: Duration::from_secs(1),
            half_open_max_attempts: 1,
        })
        .unwrap(),
    );
    let succeeds = Arc::new(AtomicBool::new(false));
    let orch = orchestrator_with(Arc::clone(&succeeds), Arc::clone(&breaker));

    orch.execute(&opportunity("trip"), 0).await.unwrap_err();
    assert_eq!(breaker.state(), BreakerState::Open);

    succeeds.store(true, Ordering::SeqCst);
    let outcome = orch.execute(&opportunity("probe"), 2).await.unwrap();
    assert!(!outcome.tx_hash.is_empty());
    assert_eq!(breaker.state(), BreakerState::Closed);

    let outcome = orch.execute(&opportunity("after-recovery"), 3).await.unwrap();
    assert!(!outcome.tx_hash.is_empty());
}

//! Shared test fixtures for building a full [`StrategyContext`] without
//! repeating the wiring in every strategy's `#[cfg(test)]` module.
#![cfg(test)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{address, Address, B256};
use async_trait::async_trait;
use tokio::sync::watch;

use crate::commit_reveal::store::CommitmentStore;
use crate::commit_reveal::{CommitRevealChain, CommitRevealService};
use crate::cross_chain::{BridgeClient, BridgeQuote, BridgeStatus, CrossChainConfig, CrossChainExecutor, DestinationExecutor};
use crate::dex::DexRegistry;
use crate::gas::GasPolicy;
use crate::model::commitment::RevealParams;
use crate::model::stats::ExecutionStats;
use crate::nonce::NonceManager;
use crate::orchestrator::context::StrategyContext;
use crate::provider::wallet::EvmWallet;
use crate::provider::ProviderManager;
use crate::provider::{ChainProvider, ProviderConnector};
use crate::simulation::pending::PendingStateSimulator;
use crate::simulation::SimulationService;
use crate::swap_step::SwapStepBuilder;

pub const TEST_WALLET: Address = address!("1111111111111111111111111111111111111111");

struct NoopProvider;
#[async_trait]
impl ChainProvider for NoopProvider {
    async fn block_number(&self) -> anyhow::Result<u64> {
        Ok(100)
    }
    async fn transaction_count(&self, _address: Address) -> anyhow::Result<u64> {
        Ok(0)
    }
    async fn gas_price_gwei(&self) -> anyhow::Result<f64> {
        Ok(10.0)
    }
}

struct NoopConnector;
#[async_trait]
impl ProviderConnector for NoopConnector {
    async fn connect(&self, _rpc_url: &str) -> anyhow::Result<Arc<dyn ChainProvider>> {
        Ok(Arc::new(NoopProvider))
    }
}

struct NoopBridge;
#[async_trait]
impl BridgeClient for NoopBridge {
    async fn quote(&self, _s: &str, _d: &str, _asset: Address, _amount: alloy::primitives::U256) -> anyhow::Result<BridgeQuote> {
        Ok(BridgeQuote { fee_usd: 0.0, native_price_usd: 2000.0, expiry: i64::MAX })
    }
    async fn submit(&self, _s: &str, _d: &str, _asset: Address, _amount: alloy::primitives::U256, _nonce: u64) -> anyhow::Result<String> {
        Ok("0xsource".into())
    }
    async fn poll_status(&self, _tx: &str) -> anyhow::Result<BridgeStatus> {
        Ok(BridgeStatus::Completed)
    }
}

struct NoopDestination;
#[async_trait]
impl DestinationExecutor for NoopDestination {
    async fn ensure_allowance(&self, _c: &str, _t: Address, _o: Address, _s: Address, _a: alloy::primitives::U256) -> anyhow::Result<()> {
        Ok(())
    }
    async fn submit_sell(&self, _c: &str, _w: Address, _n: u64, _ti: Address, _to: Address, _a: alloy::primitives::U256) -> anyhow::Result<String> {
        Ok("0xdest".into())
    }
}

struct NoopCommitRevealChain;
#[async_trait]
impl CommitRevealChain for NoopCommitRevealChain {
    async fn current_block(&self, _chain: &str) -> anyhow::Result<u64> {
        Ok(100)
    }
    async fn submit_commit(&self, _chain: &str, _commitment_hash: B256) -> anyhow::Result<u64> {
        Ok(100)
    }
    async fn submit_reveal(&self, _chain: &str, _reveal: &RevealParams) -> anyhow::Result<String> {
        Ok("0xreveal".into())
    }
}

/// Builds a fully-wired [`StrategyContext`] backed entirely by no-op
/// fakes — enough for a strategy's own branch logic to run end to end
/// without a live chain.
pub fn build_context() -> StrategyContext {
    let nonce_manager = Arc::new(NonceManager::new());
    nonce_manager.seed("arbitrum", TEST_WALLET, 0);
    nonce_manager.seed("base", TEST_WALLET, 0);

    let gas_policy = Arc::new(GasPolicy::new(3.0));
    let stats = Arc::new(ExecutionStats::default());
    let simulation = Arc::new(SimulationService::new(vec![], 0.0, Duration::from_secs(0), true, Arc::clone(&stats)));
    let commitment_store = Arc::new(CommitmentStore::new(None));
    let commit_reveal = Arc::new(CommitRevealService::new(Arc::new(NoopCommitRevealChain), Arc::clone(&commitment_store)));
    let cross_chain = Arc::new(CrossChainExecutor::new(
        CrossChainConfig::default(),
        Arc::clone(&gas_policy),
        Arc::clone(&nonce_manager),
        Arc::clone(&simulation),
        Arc::new(NoopBridge),
        Arc::new(NoopDestination),
    ));
    let dex_registry = Arc::new(DexRegistry::build(&Default::default()));
    let swap_step_builder = Arc::new(SwapStepBuilder::new(DexRegistry::build(&Default::default()), 16));
    let pending_simulator = Arc::new(PendingStateSimulator::new(HashMap::new()));
    let providers = Arc::new(ProviderManager::new(
        Arc::new(NoopConnector),
        Arc::clone(&gas_policy),
        Arc::clone(&nonce_manager),
        TEST_WALLET,
        3,
        Arc::clone(&stats),
    ));
    providers.register_for_test("arbitrum", Arc::new(NoopProvider));
    providers.register_for_test("base", Arc::new(NoopProvider));
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

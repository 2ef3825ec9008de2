use std::sync::Arc;

use alloy::primitives::Address;
use tokio::sync::watch;

use crate::commit_reveal::store::CommitmentStore;
use crate::commit_reveal::CommitRevealService;
use crate::cross_chain::CrossChainExecutor;
use crate::dex::DexRegistry;
use crate::gas::GasPolicy;
use crate::model::stats::ExecutionStats;
use crate::nonce::NonceManager;
use crate::provider::wallet::{EvmWallet, SolanaWallet};
use crate::provider::ProviderManager;
use crate::simulation::pending::PendingStateSimulator;
use crate::simulation::SimulationService;
use crate::swap_step::SwapStepBuilder;

/// Everything a [`Strategy`](super::super::strategies::Strategy) needs to
/// turn an opportunity into a submission, held as non-owning shared
/// references so one context can be cloned per dispatch without
/// duplicating provider connections or caches (§4.2 item 5).
#[derive(Clone)]
pub struct StrategyContext {
    pub providers: Arc<ProviderManager>,
    pub evm_wallet: Arc<EvmWallet>,
    pub solana_wallet: Option<Arc<SolanaWallet>>,
    pub nonce_manager: Arc<NonceManager>,
    pub gas_policy: Arc<GasPolicy>,
    pub simulation: Arc<SimulationService>,
    pub commitment_store: Arc<CommitmentStore>,
    pub commit_reveal: Arc<CommitRevealService>,
    pub cross_chain: Arc<CrossChainExecutor>,
    pub dex_registry: Arc<DexRegistry>,
    pub swap_step_builder: Arc<SwapStepBuilder>,
    pub pending_simulator: Arc<PendingStateSimulator>,
    pub stats: Arc<ExecutionStats>,
    pub shutdown: watch::Receiver<bool>,
}

impl StrategyContext {
    pub fn wallet_address(&self) -> Address {
        self.evm_wallet.address
    }
}

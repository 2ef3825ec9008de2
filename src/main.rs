mod cli;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256, U256};
use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use arb_exec_core::breaker::CircuitBreaker;
use arb_exec_core::commit_reveal::store::CommitmentStore;
use arb_exec_core::commit_reveal::{CommitRevealChain, CommitRevealService};
use arb_exec_core::config::AppConfig;
use arb_exec_core::cross_chain::{BridgeClient, BridgeQuote, BridgeStatus, CrossChainConfig, CrossChainExecutor, DestinationExecutor};
use arb_exec_core::dex::DexRegistry;
use arb_exec_core::gas::GasPolicy;
use arb_exec_core::metrics::Metrics;
use arb_exec_core::model::commitment::RevealParams;
use arb_exec_core::model::opportunity::Opportunity;
use arb_exec_core::model::stats::ExecutionStats;
use arb_exec_core::nonce::NonceManager;
use arb_exec_core::orchestrator::context::StrategyContext;
use arb_exec_core::orchestrator::ExecutionOrchestrator;
use arb_exec_core::provider::wallet::EvmWallet;
use arb_exec_core::provider::{AlloyProviderConnector, ChainProvider, ProviderConnector, ProviderManager};
use arb_exec_core::simulation::pending::PendingStateSimulator;
use arb_exec_core::simulation::SimulationService;
use arb_exec_core::strategies::simulation_strategy::SimulationStrategy;
use arb_exec_core::strategies::single_chain::{SingleChainStrategy, SwapSubmitter};
use arb_exec_core::strategies::{StrategyRegistry, StrategySlot};
use arb_exec_core::stream::client::{RedisStreamClient, StreamClient};
use arb_exec_core::stream::{ConsumerConfig, DlqSubsystem, OpportunityConsumer};
use arb_exec_core::swap_step::SwapStepBuilder;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

/// Stands in for a boundary implementation this crate deliberately
/// doesn't ship (§1): concrete bridge/destination/commit-reveal/swap
/// wire integrations are a deployment choice. Registered so the
/// strategy context type-checks outside simulation mode; every call
/// fails loudly rather than silently no-opping.
struct Unconfigured(&'static str);

#[async_trait]
impl BridgeClient for Unconfigured {
    async fn quote(&self, _s: &str, _d: &str, _asset: Address, _amount: U256) -> anyhow::Result<BridgeQuote> {
        anyhow::bail!("{}: no bridge client configured for this deployment", self.0)
    }
    async fn submit(&self, _s: &str, _d: &str, _asset: Address, _amount: U256, _nonce: u64) -> anyhow::Result<String> {
        anyhow::bail!("{}: no bridge client configured for this deployment", self.0)
    }
    async fn poll_status(&self, _tx: &str) -> anyhow::Result<BridgeStatus> {
        anyhow::bail!("{}: no bridge client configured for this deployment", self.0)
    }
}

#[async_trait]
impl DestinationExecutor for Unconfigured {
    async fn ensure_allowance(&self, _c: &str, _t: Address, _o: Address, _s: Address, _a: U256) -> anyhow::Result<()> {
        anyhow::bail!("{}: no destination executor configured for this deployment", self.0)
    }
    async fn submit_sell(&self, _c: &str, _w: Address, _n: u64, _ti: Address, _to: Address, _a: U256) -> anyhow::Result<String> {
        anyhow::bail!("{}: no destination executor configured for this deployment", self.0)
    }
}

#[async_trait]
impl CommitRevealChain for Unconfigured {
    async fn current_block(&self, _chain: &str) -> anyhow::Result<u64> {
        anyhow::bail!("{}: no commit-reveal chain configured for this deployment", self.0)
    }
    async fn submit_commit(&self, _chain: &str, _commitment_hash: B256) -> anyhow::Result<u64> {
        anyhow::bail!("{}: no commit-reveal chain configured for this deployment", self.0)
    }
    async fn submit_reveal(&self, _chain: &str, _reveal: &RevealParams) -> anyhow::Result<String> {
        anyhow::bail!("{}: no commit-reveal chain configured for this deployment", self.0)
    }
}

#[async_trait]
impl SwapSubmitter for Unconfigured {
    async fn submit_swap(
        &self,
        _chain: &str,
        _wallet: Address,
        _nonce: u64,
        _steps: &[arb_exec_core::model::commitment::SwapPathStep],
        _amount_in: U256,
    ) -> anyhow::Result<String> {
        anyhow::bail!("{}: no swap submitter configured for this deployment", self.0)
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = cli::Cli::parse();
    let rt = tokio::runtime::Runtime::new().context("creating tokio runtime")?;
    rt.block_on(async move {
        match cli.command {
            cli::Command::Run {
                redis_url,
                source_stream,
                dlq_stream,
                evm_rpc,
                simulation_mode,
                once,
            } => run(redis_url, source_stream, dlq_stream, evm_rpc, simulation_mode, once).await,
            cli::Command::Replay {
                opportunity_id,
                redis_url,
                dlq_stream,
                target_stream,
            } => replay(opportunity_id, redis_url, dlq_stream, target_stream).await,
            cli::Command::Status {
                redis_url,
                dlq_stream,
                evm_rpc,
            } => status(redis_url, dlq_stream, evm_rpc).await,
        }
    })
}

async fn run(
    redis_url: String,
    source_stream: String,
    dlq_stream: String,
    evm_rpc: Vec<(String, String)>,
    simulation_mode: bool,
    once: bool,
) -> Result<()> {
    let app_config = AppConfig::from_env();

    let stream_client: Arc<dyn StreamClient> = Arc::new(RedisStreamClient::connect(&redis_url).await.context("connecting to redis")?);

    let wallet = Arc::new(EvmWallet::from_env("ARB_EXEC_CORE_PRIVATE_KEY", "ARB_EXEC_CORE_PRIVATE_KEY_FILE")?);
    let gas_policy = Arc::new(GasPolicy::new(3.0));
    let nonce_manager = Arc::new(NonceManager::new());
    let stats = Arc::new(ExecutionStats::default());
    let metrics = Arc::new(Metrics::new(Arc::clone(&stats)));

    let providers = Arc::new(ProviderManager::new(
        Arc::new(AlloyProviderConnector),
        Arc::clone(&gas_policy),
        Arc::clone(&nonce_manager),
        wallet.address,
        3,
        Arc::clone(&stats),
    ));
    for (chain, rpc_url) in &evm_rpc {
        providers.connect(chain, rpc_url).await.with_context(|| format!("connecting provider for {chain}"))?;
        info!(chain, "connected provider");
    }

    let simulation = Arc::new(SimulationService::new(
        Vec::new(),
        app_config.min_profit_for_simulation,
        app_config.time_critical_threshold,
        app_config.use_fallback,
        Arc::clone(&stats),
    ));
    let commitment_store = Arc::new(CommitmentStore::new(None));
    let commit_reveal = Arc::new(CommitRevealService::new(Arc::new(Unconfigured("commit-reveal")), Arc::clone(&commitment_store)));
    let cross_chain = Arc::new(CrossChainExecutor::new(
        CrossChainConfig::default(),
        Arc::clone(&gas_policy),
        Arc::clone(&nonce_manager),
        Arc::clone(&simulation),
        Arc::new(Unconfigured("cross-chain bridge")),
        Arc::new(Unconfigured("cross-chain destination")),
    ));
    let dex_registry = Arc::new(DexRegistry::build(&Default::default()));
    let swap_step_builder = Arc::new(SwapStepBuilder::new(DexRegistry::build(&Default::default()), 1024));
    let pending_simulator = Arc::new(PendingStateSimulator::new(HashMap::new()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    {
        let shutdown_tx = shutdown_tx.clone();
        ctrlc::set_handler(move || {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .context("installing ctrl-c handler")?;
    }

    let context = StrategyContext {
        providers: Arc::clone(&providers),
        evm_wallet: Arc::clone(&wallet),
        solana_wallet: None,
        nonce_manager: Arc::clone(&nonce_manager),
        gas_policy: Arc::clone(&gas_policy),
        simulation: Arc::clone(&simulation),
        commitment_store,
        commit_reveal,
        cross_chain,
        dex_registry,
        swap_step_builder,
        pending_simulator,
        stats: Arc::clone(&stats),
        shutdown: shutdown_rx.clone(),
    };

    let mut registry = StrategyRegistry::new(simulation_mode);
    registry.register(
        StrategySlot::Simulation,
        Box::new(SimulationStrategy::new(app_config.slippage_bps, app_config.time_critical_threshold)),
    );
    registry.register(
        StrategySlot::SingleChain,
        Box::new(SingleChainStrategy::new(Arc::new(Unconfigured("single-chain")), app_config.slippage_bps, app_config.time_critical_threshold)),
    );

    let breaker = Arc::new(CircuitBreaker::new(app_config.breaker_config()?)?);
    let orchestrator = Arc::new(ExecutionOrchestrator::new(app_config.orchestrator_config(), Arc::clone(&breaker), registry, context, Arc::clone(&stats)));

    let dlq = Arc::new(DlqSubsystem::new(Arc::clone(&stream_client), app_config.dlq_config(dlq_stream, source_stream.clone())));
    let (opp_tx, mut opp_rx) = mpsc::channel::<Opportunity>(256);
    let consumer = Arc::new(OpportunityConsumer::new(
        Arc::clone(&stream_client),
        Arc::clone(&dlq),
        opp_tx,
        app_config.consumer_config(source_stream),
        app_config.validation_config(),
        Arc::clone(&stats),
    ));

    if once {
        consumer.scan_once().await.context("consumer scan")?;
        dlq.scan(now()).await.context("dlq scan")?;
        drop(consumer);
        while let Ok(opportunity) = opp_rx.try_recv() {
            dispatch_one(&orchestrator, &metrics, &opportunity).await;
        }
        return Ok(());
    }

    consumer.start();
    let dlq_task = spawn_dlq_scan_loop(Arc::clone(&dlq), app_config.scan_interval, shutdown_rx.clone());

    let mut shutdown_rx_loop = shutdown_rx.clone();
    loop {
        tokio::select! {
            maybe_opportunity = opp_rx.recv() => {
                let Some(opportunity) = maybe_opportunity else {
                    warn!("opportunity channel closed, stopping dispatch loop");
                    break;
                };
                dispatch_one(&orchestrator, &metrics, &opportunity).await;
            }
            _ = shutdown_rx_loop.changed() => {
                if *shutdown_rx_loop.borrow() {
                    break;
                }
            }
        }
    }

    consumer.stop().await;
    let _ = dlq_task.await;
    info!(metrics = %metrics.render_text(), "final metrics snapshot");
    Ok(())
}

async fn dispatch_one(orchestrator: &ExecutionOrchestrator, metrics: &Metrics, opportunity: &Opportunity) {
    let started = std::time::Instant::now();
    match orchestrator.execute(opportunity, now()).await {
        Ok(outcome) => info!(id = %opportunity.id, chain = %outcome.chain, tx_hash = %outcome.tx_hash, "opportunity executed"),
        Err(e) => warn!(id = %opportunity.id, error = %e, "opportunity execution failed"),
    }
    metrics.observe_execution_latency(started.elapsed());
    metrics.set_active_executions(orchestrator.active_executions());
}

fn spawn_dlq_scan_loop(dlq: Arc<DlqSubsystem>, interval: Duration, mut shutdown_rx: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = dlq.scan(now()).await {
                        warn!(error = %e, "dlq scan failed");
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

async fn replay(opportunity_id: String, redis_url: String, dlq_stream: String, target_stream: String) -> Result<()> {
    let client: Arc<dyn StreamClient> = Arc::new(RedisStreamClient::connect(&redis_url).await.context("connecting to redis")?);
    let config = AppConfig::default().dlq_config(dlq_stream, target_stream);
    let dlq = DlqSubsystem::new(client, config);
    let replayed = dlq.replay_by_opportunity_id(&opportunity_id, now()).await?;
    println!("replayed {replayed} dlq entries for opportunity {opportunity_id}");
    Ok(())
}

async fn status(redis_url: String, dlq_stream: String, evm_rpc: Vec<(String, String)>) -> Result<()> {
    let client: Arc<dyn StreamClient> = Arc::new(RedisStreamClient::connect(&redis_url).await.context("connecting to redis")?);
    let config = AppConfig::default().dlq_config(dlq_stream, "opportunities".into());
    let dlq = DlqSubsystem::new(client, config);
    let stats = dlq.scan(now()).await?;

    println!("=== arbctl status ===");
    println!("dlq total entries:   {}", stats.total_count);
    println!("sampled this scan:   {}", stats.sampled_count);
    println!("oldest entry age:    {:?}s", stats.oldest_entry_age_secs);
    println!("auto-replayed:       {}", stats.auto_replayed_this_scan);
    for (code, count) in &stats.counts_by_code {
        println!("  {code}: {count}");
    }

    if !evm_rpc.is_empty() {
        println!();
        println!("=== provider reachability ===");
        for (chain, rpc_url) in evm_rpc {
            let outcome = async {
                let provider = AlloyProviderConnector.connect(&rpc_url).await?;
                provider.block_number().await
            }
            .await;
            match outcome {
                Ok(block) => println!("  {chain}: reachable (block {block})"),
                Err(e) => println!("  {chain}: unreachable ({e})"),
            }
        }
    }

    Ok(())
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

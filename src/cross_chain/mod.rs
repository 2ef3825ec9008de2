use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::gas::GasPolicy;
use crate::model::errors::ErrorCode;
use crate::nonce::NonceManager;
use crate::simulation::SimulationService;

/// A bridge's quote for moving `asset` from the source to destination
/// chain — fee and expiry feed the profitability and liveness checks in
/// steps 2 and 4.
#[derive(Debug, Clone)]
pub struct BridgeQuote {
    pub fee_usd: f64,
    pub native_price_usd: f64,
    pub expiry: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeStatus {
    Pending,
    InFlight,
    Completed,
    Failed,
    Refunded,
}

impl BridgeStatus {
    fn is_terminal(self) -> bool {
        matches!(self, BridgeStatus::Completed | BridgeStatus::Failed | BridgeStatus::Refunded)
    }
}

/// Boundary to a bridge protocol — quote, submit, poll. A stub
/// implementation is sufficient for tests; real wire formats are out of
/// scope.
#[async_trait]
pub trait BridgeClient: Send + Sync {
    async fn quote(
        &self,
        source_chain: &str,
        dest_chain: &str,
        asset: Address,
        amount: U256,
    ) -> anyhow::Result<BridgeQuote>;

    /// Submit the source-chain bridge transaction, returning its tx hash.
    async fn submit(
        &self,
        source_chain: &str,
        dest_chain: &str,
        asset: Address,
        amount: U256,
        nonce: u64,
    ) -> anyhow::Result<String>;

    async fn poll_status(&self, bridge_tx_hash: &str) -> anyhow::Result<BridgeStatus>;
}

/// Boundary to destination-chain execution — allowance management and
/// swap submission, separated from [`BridgeClient`] since a single
/// bridge provider rarely also executes swaps.
#[async_trait]
pub trait DestinationExecutor: Send + Sync {
    async fn ensure_allowance(
        &self,
        chain: &str,
        token: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> anyhow::Result<()>;

    /// Submit the destination sell, returning its tx hash.
    async fn submit_sell(
        &self,
        chain: &str,
        wallet: Address,
        nonce: u64,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> anyhow::Result<String>;
}

#[derive(Debug, Clone)]
pub struct CrossChainParams {
    pub opportunity_id: String,
    pub source_chain: String,
    pub dest_chain: String,
    pub asset: Address,
    pub amount_in: U256,
    pub wallet: Address,
    pub expected_profit_usd: f64,
    pub source_gas_gwei: f64,
    pub dest_gas_gwei: f64,
    pub dest_token_in: Address,
    pub dest_token_out: Address,
    pub dest_router: Address,
    /// Pre-built raw calldata for the destination sell, used only to
    /// drive the pre-bridge revert simulation in step 5.
    pub dest_raw_tx: Vec<u8>,
    pub time_remaining: Duration,
}

#[derive(Debug, Clone)]
pub struct CrossChainOutcome {
    pub destination_chain: String,
    pub source_tx_hash: String,
    pub bridge_tx_hash: String,
    pub destination_tx_hash: String,
    pub realized_profit_usd: f64,
}

/// An error from the pipeline that names the chain of record and, for
/// partial failures, the bridge tx hash needed for manual reconciliation
/// (§4.5 "Partial failures").
#[derive(Debug, Clone)]
pub struct CrossChainError {
    pub code: ErrorCode,
    pub chain: String,
    pub bridge_tx_hash: Option<String>,
}

impl std::fmt::Display for CrossChainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (chain={}", self.code, self.chain)?;
        if let Some(tx) = &self.bridge_tx_hash {
            write!(f, ", bridge_tx={tx}")?;
        }
        write!(f, ")")
    }
}

impl std::error::Error for CrossChainError {}

impl CrossChainError {
    fn source(code: ErrorCode, chain: &str) -> Self {
        CrossChainError {
            code,
            chain: chain.to_string(),
            bridge_tx_hash: None,
        }
    }
}

pub struct CrossChainConfig {
    /// Reject a bridge quote whose fee consumes this fraction (or more)
    /// of expected USD profit. Default 0.5 (§4.5 step 2).
    pub max_bridge_fee_to_profit_ratio: f64,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    pub destination_sell_timeout: Duration,
    /// Flat gas-units estimate used to convert gwei readings into a USD
    /// cost for the settlement step; real per-tx gas usage is only known
    /// post-broadcast.
    pub estimated_gas_units: u64,
}

impl Default for CrossChainConfig {
    fn default() -> Self {
        CrossChainConfig {
            max_bridge_fee_to_profit_ratio: 0.5,
            poll_interval: Duration::from_secs(15),
            poll_timeout: Duration::from_secs(300),
            destination_sell_timeout: Duration::from_secs(30),
            estimated_gas_units: 200_000,
        }
    }
}

/// Orchestrates the ten-step cross-chain pipeline (§4.5): source-leg gas
/// guard, bridge quote, nonce reservation, quote liveness, destination
/// pre-bridge simulation, bridge submission, bridge polling, destination
/// sell, and settlement. Mirrors the teacher's `bridge2.rs` commit/submit
/// shape, generalized from a single bridge call into the full two-leg
/// state machine.
pub struct CrossChainExecutor {
    config: CrossChainConfig,
    gas_policy: Arc<GasPolicy>,
    nonce_manager: Arc<NonceManager>,
    simulation: Arc<SimulationService>,
    bridge: Arc<dyn BridgeClient>,
    destination: Arc<dyn DestinationExecutor>,
}

impl CrossChainExecutor {
    pub fn new(
        config: CrossChainConfig,
        gas_policy: Arc<GasPolicy>,
        nonce_manager: Arc<NonceManager>,
        simulation: Arc<SimulationService>,
        bridge: Arc<dyn BridgeClient>,
        destination: Arc<dyn DestinationExecutor>,
    ) -> Self {
        CrossChainExecutor {
            config,
            gas_policy,
            nonce_manager,
            simulation,
            bridge,
            destination,
        }
    }

    #[instrument(skip(self, params, shutdown), fields(opportunity_id = %params.opportunity_id))]
    pub async fn execute(
        &self,
        params: CrossChainParams,
        now: i64,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<CrossChainOutcome, CrossChainError> {
        let CrossChainParams {
            opportunity_id: _,
            source_chain,
            dest_chain,
            asset,
            amount_in,
            wallet,
            expected_profit_usd,
            source_gas_gwei,
            dest_gas_gwei,
            dest_token_in,
            dest_token_out,
            dest_router,
            dest_raw_tx,
            time_remaining,
        } = params;

        // 1. Gas-spike guard on the source chain.
        self.gas_policy
            .check(&source_chain, source_gas_gwei)
            .map_err(|e| CrossChainError::source(e, &source_chain))?;

        // 2. Quote the bridge.
        let quote = self
            .bridge
            .quote(&source_chain, &dest_chain, asset, amount_in)
            .await
            .map_err(|e| CrossChainError::source(ErrorCode::ErrNoBridge(source_chain.clone(), dest_chain.clone()), &source_chain).with_hint(e))?;
        if expected_profit_usd > 0.0 && quote.fee_usd >= self.config.max_bridge_fee_to_profit_ratio * expected_profit_usd {
            return Err(CrossChainError::source(
                ErrorCode::ErrLowProfit,
                &source_chain,
            ));
        }

        // 3. Reserve a nonce on the source chain.
        let source_nonce = self
            .nonce_manager
            .reserve(&source_chain, wallet)
            .map_err(|e| CrossChainError::source(e, &source_chain))?;

        // 4. Validate quote liveness.
        if quote.expiry <= now {
            self.nonce_manager.fail(&source_chain, wallet, source_nonce);
            return Err(CrossChainError::source(
                ErrorCode::ErrQuoteExpired { expiry: quote.expiry, now },
                &source_chain,
            ));
        }

        // 5. Simulate the destination sell; bridging would strand funds
        // if it's predicted to revert.
        if let Some(result) = self
            .simulation
            .simulate(&dest_chain, &dest_raw_tx, expected_profit_usd, time_remaining)
            .await
            .map_err(|e| {
                self.nonce_manager.fail(&source_chain, wallet, source_nonce);
                CrossChainError::source(e, &source_chain)
            })?
        {
            if result.would_revert {
                self.nonce_manager.fail(&source_chain, wallet, source_nonce);
                return Err(CrossChainError::source(
                    ErrorCode::ErrSimRevertDest(
                        result.revert_reason.unwrap_or_else(|| "unknown".into()),
                    ),
                    &source_chain,
                ));
            }
        }

        // 6. Submit the bridge transaction.
        let source_tx_hash = match self.bridge.submit(&source_chain, &dest_chain, asset, amount_in, source_nonce).await {
            Ok(tx) => {
                self.nonce_manager.confirm(&source_chain, wallet, source_nonce);
                tx
            }
            Err(e) => {
                self.nonce_manager.fail(&source_chain, wallet, source_nonce);
                return Err(CrossChainError::source(
                    ErrorCode::ErrUnexpected(format!("bridge submission failed: {e}")),
                    &source_chain,
                ));
            }
        };

        // 7/8. Poll bridge status until terminal, timeout, or shutdown.
        let status = self.poll_bridge(&source_tx_hash, &mut shutdown).await;
        let status = match status {
            Some(s) => s,
            None => {
                return Err(CrossChainError {
                    code: ErrorCode::ErrShutdown,
                    chain: source_chain,
                    bridge_tx_hash: Some(source_tx_hash),
                });
            }
        };
        let status = match status {
            Ok(s) => s,
            Err(_timed_out) => {
                return Err(CrossChainError {
                    code: ErrorCode::ErrBridgeTimeout { tx_hash: source_tx_hash.clone() },
                    chain: source_chain,
                    bridge_tx_hash: Some(source_tx_hash),
                });
            }
        };
        if status != BridgeStatus::Completed {
            return Err(CrossChainError {
                code: ErrorCode::ErrUnexpected(format!("bridge terminated as {status:?}")),
                chain: dest_chain,
                bridge_tx_hash: Some(source_tx_hash),
            });
        }

        // 9. Destination sell: nonce on B, ensure allowance, submit.
        let dest_nonce = self.nonce_manager.reserve(&dest_chain, wallet).map_err(|e| CrossChainError {
            code: e,
            chain: dest_chain.clone(),
            bridge_tx_hash: Some(source_tx_hash.clone()),
        })?;

        self.gas_policy.check(&dest_chain, dest_gas_gwei).map_err(|e| {
            self.nonce_manager.fail(&dest_chain, wallet, dest_nonce);
            CrossChainError {
                code: e,
                chain: dest_chain.clone(),
                bridge_tx_hash: Some(source_tx_hash.clone()),
            }
        })?;

        if let Err(e) = self
            .destination
            .ensure_allowance(&dest_chain, dest_token_in, wallet, dest_router, amount_in)
            .await
        {
            self.nonce_manager.fail(&dest_chain, wallet, dest_nonce);
            return Err(CrossChainError {
                code: ErrorCode::ErrApproval(e.to_string()),
                chain: dest_chain,
                bridge_tx_hash: Some(source_tx_hash),
            });
        }

        let destination_tx_hash = match tokio::time::timeout(
            self.config.destination_sell_timeout,
            self.destination
                .submit_sell(&dest_chain, wallet, dest_nonce, dest_token_in, dest_token_out, amount_in),
        )
        .await
        {
            Ok(Ok(tx)) => {
                self.nonce_manager.confirm(&dest_chain, wallet, dest_nonce);
                tx
            }
            Ok(Err(e)) => {
                self.nonce_manager.fail(&dest_chain, wallet, dest_nonce);
                return Err(CrossChainError {
                    code: ErrorCode::ErrUnexpected(format!("destination sell failed: {e}")),
                    chain: dest_chain,
                    bridge_tx_hash: Some(source_tx_hash),
                });
            }
            Err(_) => {
                self.nonce_manager.fail(&dest_chain, wallet, dest_nonce);
                return Err(CrossChainError {
                    code: ErrorCode::ErrTimeout,
                    chain: dest_chain,
                    bridge_tx_hash: Some(source_tx_hash),
                });
            }
        };

        // 10. Settle.
        let gas_units = self.config.estimated_gas_units as f64;
        let gas_cost_usd = ((source_gas_gwei + dest_gas_gwei) * gas_units / 1e9) * quote.native_price_usd;
        let realized_profit_usd = expected_profit_usd - quote.fee_usd - gas_cost_usd;

        Ok(CrossChainOutcome {
            destination_chain: dest_chain,
            source_tx_hash: source_tx_hash.clone(),
            bridge_tx_hash: source_tx_hash,
            destination_tx_hash,
            realized_profit_usd,
        })
    }

    async fn poll_bridge(
        &self,
        bridge_tx_hash: &str,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<Result<BridgeStatus, ()>> {
        let deadline = tokio::time::Instant::now() + self.config.poll_timeout;
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if tokio::time::Instant::now() >= deadline {
                        return Some(Err(()));
                    }
                    match self.bridge.poll_status(bridge_tx_hash).await {
                        Ok(status) if status.is_terminal() => return Some(Ok(status)),
                        Ok(_) => continue,
                        Err(e) => {
                            warn!(bridge_tx_hash, error = %e, "bridge status poll failed, retrying");
                            continue;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(bridge_tx_hash, "bridge poll interrupted by shutdown");
                        return None;
                    }
                }
            }
        }
    }
}

impl CrossChainError {
    fn with_hint(mut self, e: anyhow::Error) -> Self {
        self.code = ErrorCode::ErrUnexpected(format!("{}: {e}", self.code));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use std::sync::Mutex;

    const WALLET: Address = address!("1111111111111111111111111111111111111111");
    const ASSET: Address = address!("2222222222222222222222222222222222222222");
    const ROUTER: Address = address!("3333333333333333333333333333333333333333");
    const TOKEN_OUT: Address = address!("4444444444444444444444444444444444444444");

    struct FakeBridge {
        fee_usd: f64,
        expiry: i64,
        statuses: Mutex<Vec<BridgeStatus>>,
        submit_fails: bool,
    }

    #[async_trait]
    impl BridgeClient for FakeBridge {
        async fn quote(&self, _s: &str, _d: &str, _asset: Address, _amount: U256) -> anyhow::Result<BridgeQuote> {
            Ok(BridgeQuote { fee_usd: self.fee_usd, native_price_usd: 2000.0, expiry: self.expiry })
        }
        async fn submit(&self, _s: &str, _d: &str, _asset: Address, _amount: U256, _nonce: u64) -> anyhow::Result<String> {
            if self.submit_fails {
                anyhow::bail!("broadcast rejected");
            }
            Ok("0xsource".into())
        }
        async fn poll_status(&self, _tx: &str) -> anyhow::Result<BridgeStatus> {
            let mut statuses = self.statuses.lock().unwrap();
            if statuses.is_empty() {
                Ok(BridgeStatus::Completed)
            } else {
                Ok(statuses.remove(0))
            }
        }
    }

    struct FakeDestination {
        sell_fails: bool,
    }

    #[async_trait]
    impl DestinationExecutor for FakeDestination {
        async fn ensure_allowance(&self, _c: &str, _t: Address, _o: Address, _s: Address, _a: U256) -> anyhow::Result<()> {
            Ok(())
        }
        async fn submit_sell(&self, _c: &str, _w: Address, _n: u64, _ti: Address, _to: Address, _a: U256) -> anyhow::Result<String> {
            if self.sell_fails {
                anyhow::bail!("sell reverted");
            }
            Ok("0xdest".into())
        }
    }

    fn params() -> CrossChainParams {
        CrossChainParams {
            opportunity_id: "opp-1".into(),
            source_chain: "arbitrum".into(),
            dest_chain: "base".into(),
            asset: ASSET,
            amount_in: U256::from(1_000u64),
            wallet: WALLET,
            expected_profit_usd: 100.0,
            source_gas_gwei: 1.0,
            dest_gas_gwei: 1.0,
            dest_token_in: ASSET,
            dest_token_out: TOKEN_OUT,
            dest_router: ROUTER,
            dest_raw_tx: vec![1, 2, 3],
            time_remaining: Duration::from_secs(60),
        }
    }

    fn executor(bridge: Arc<dyn BridgeClient>, destination: Arc<dyn DestinationExecutor>) -> CrossChainExecutor {
        CrossChainExecutor::new(
            CrossChainConfig {
                poll_interval: Duration::from_millis(1),
                poll_timeout: Duration::from_millis(50),
                ..CrossChainConfig::default()
            },
            Arc::new(GasPolicy::new(3.0)),
            Arc::new(NonceManager::new()),
            Arc::new(SimulationService::new(vec![], 0.0, Duration::from_secs(0), true, Arc::new(crate::model::stats::ExecutionStats::default()))),
            bridge,
            destination,
        )
    }

    #[tokio::test]
    async fn happy_path_settles_with_realized_profit() {
        let nonce_mgr = Arc::new(NonceManager::new());
        nonce_mgr.seed("arbitrum", WALLET, 0);
        nonce_mgr.seed("base", WALLET, 0);
        let exec = CrossChainExecutor::new(
            CrossChainConfig { poll_interval: Duration::from_millis(1), poll_timeout: Duration::from_millis(50), ..CrossChainConfig::default() },
            Arc::new(GasPolicy::new(3.0)),
            nonce_mgr,
            Arc::new(SimulationService::new(vec![], 0.0, Duration::from_secs(0), true, Arc::new(crate::model::stats::ExecutionStats::default()))),
            Arc::new(FakeBridge { fee_usd: 5.0, expiry: 10_000, statuses: Mutex::new(vec![]), submit_fails: false }),
            Arc::new(FakeDestination { sell_fails: false }),
        );
        let (_tx, rx) = watch::channel(false);
        let outcome = exec.execute(params(), 0, rx).await.unwrap();
        assert_eq!(outcome.destination_chain, "base");
        assert!(outcome.realized_profit_usd < 100.0);
    }

    #[tokio::test]
    async fn expensive_bridge_fee_rejected_before_nonce_reservation() {
        let exec = executor(
            Arc::new(FakeBridge { fee_usd: 60.0, expiry: 10_000, statuses: Mutex::new(vec![]), submit_fails: false }),
            Arc::new(FakeDestination { sell_fails: false }),
        );
        let (_tx, rx) = watch::channel(false);
        let err = exec.execute(params(), 0, rx).await.unwrap_err();
        assert_eq!(err.code.tag(), "ERR_LOW_PROFIT");
    }

    #[tokio::test]
    async fn expired_quote_releases_nonce() {
        let nonce_mgr = Arc::new(NonceManager::new());
        nonce_mgr.seed("arbitrum", WALLET, 0);
        let exec = CrossChainExecutor::new(
            CrossChainConfig::default(),
            Arc::new(GasPolicy::new(3.0)),
            Arc::clone(&nonce_mgr),
            Arc::new(SimulationService::new(vec![], 0.0, Duration::from_secs(0), true, Arc::new(crate::model::stats::ExecutionStats::default()))),
            Arc::new(FakeBridge { fee_usd: 5.0, expiry: -1, statuses: Mutex::new(vec![]), submit_fails: false }),
            Arc::new(FakeDestination { sell_fails: false }),
        );
        let (_tx, rx) = watch::channel(false);
        let err = exec.execute(params(), 0, rx).await.unwrap_err();
        assert_eq!(err.code.tag(), "ERR_QUOTE_EXPIRED");
        // the reservation advanced the in-memory counter to 1 on release,
        // same as any other failed reservation (nonce manager never rewinds).
        assert_eq!(nonce_mgr.reserve("arbitrum", WALLET).unwrap(), 1);
    }

    #[tokio::test]
    async fn bridge_submission_failure_is_tagged_with_source_chain() {
        let exec = executor(
            Arc::new(FakeBridge { fee_usd: 5.0, expiry: 10_000, statuses: Mutex::new(vec![]), submit_fails: true }),
            Arc::new(FakeDestination { sell_fails: false }),
        );
        let (_tx, rx) = watch::channel(false);
        let err = exec.execute(params(), 0, rx).await.unwrap_err();
        assert_eq!(err.chain, "arbitrum");
        assert!(err.bridge_tx_hash.is_none());
    }

    #[tokio::test]
    async fn destination_sell_failure_after_bridge_success_names_dest_chain_and_bridge_tx() {
        let exec = executor(
            Arc::new(FakeBridge { fee_usd: 5.0, expiry: 10_000, statuses: Mutex::new(vec![]), submit_fails: false }),
            Arc::new(FakeDestination { sell_fails: true }),
        );
        let (_tx, rx) = watch::channel(false);
        let err = exec.execute(params(), 0, rx).await.unwrap_err();
        assert_eq!(err.chain, "base");
        assert_eq!(err.bridge_tx_hash.as_deref(), Some("0xsource"));
    }

    #[tokio::test]
    async fn bridge_timeout_without_terminal_state_reports_source_tx() {
        let exec = CrossChainExecutor::new(
            CrossChainConfig { poll_interval: Duration::from_millis(1), poll_timeout: Duration::from_millis(5), ..CrossChainConfig::default() },
            Arc::new(GasPolicy::new(3.0)),
            Arc::new(NonceManager::new()),
            Arc::new(SimulationService::new(vec![], 0.0, Duration::from_secs(0), true, Arc::new(crate::model::stats::ExecutionStats::default()))),
            Arc::new(FakeBridge {
                fee_usd: 5.0,
                expiry: 10_000,
                statuses: Mutex::new(vec![BridgeStatus::Pending; 100]),
                submit_fails: false,
            }),
            Arc::new(FakeDestination { sell_fails: false }),
        );
        let (_tx, rx) = watch::channel(false);
        let err = exec.execute(params(), 0, rx).await.unwrap_err();
        assert_eq!(err.code.tag(), "ERR_BRIDGE_TIMEOUT");
        assert_eq!(err.bridge_tx_hash.as_deref(), Some("0xsource"));
    }

    #[tokio::test]
    async fn shutdown_interrupts_bridge_poll() {
        let exec = CrossChainExecutor::new(
            CrossChainConfig { poll_interval: Duration::from_millis(5), poll_timeout: Duration::from_secs(60), ..CrossChainConfig::default() },
            Arc::new(GasPolicy::new(3.0)),
            Arc::new(NonceManager::new()),
            Arc::new(SimulationService::new(vec![], 0.0, Duration::from_secs(0), true, Arc::new(crate::model::stats::ExecutionStats::default()))),
            Arc::new(FakeBridge {
                fee_usd: 5.0,
                expiry: 10_000,
                statuses: Mutex::new(vec![BridgeStatus::Pending; 1000]),
                submit_fails: false,
            }),
            Arc::new(FakeDestination { sell_fails: false }),
        );
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(true);
        });
        let err = exec.execute(params(), 0, rx).await.unwrap_err();
        assert_eq!(err.code.tag(), "ERR_SHUTDOWN");
    }
}
